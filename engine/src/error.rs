// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use controller::{ItemId, Timestamp, UserId};
use thiserror::Error as DError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected before training starts, the run can't begin
    Configuration,
    /// The dataset and the model mappings diverged
    DataConsistency,
}

#[derive(Debug, Clone, PartialEq, DError)]
pub enum ErrorKind {
    #[error("Item id({item}) has {found} neighbour candidates, {required} required")]
    InsufficientNeighbours {
        item: ItemId,
        found: usize,
        required: usize,
    },

    #[error("Matrix {name} is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    DimensionMismatch {
        name: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("No context feature samples between {0} and {1}")]
    MissingContextFeature(Timestamp, Timestamp),

    #[error("No context feature sample for time {0}")]
    UnresolvedContextTime(Timestamp),

    #[error("User id({0}) has no observed check-ins on positive item id({1})")]
    ZeroPositiveCount(UserId, ItemId),

    #[error("Couldn't found user with id({0})")]
    UnmappedUser(UserId),

    #[error("Couldn't found item with id({0})")]
    UnmappedItem(ItemId),

    #[error("No affinity row for internal item index {0}")]
    MissingAffinity(usize),

    #[error("Row {0} is out of bounds")]
    IndexOutOfBound(usize),

    #[error("Model mode {0} doesn't carry {1}")]
    UnsupportedMode(&'static str, &'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InsufficientNeighbours { .. }
            | ErrorKind::DimensionMismatch { .. }
            | ErrorKind::MissingContextFeature(..)
            | ErrorKind::UnsupportedMode(..)
            | ErrorKind::InvalidConfiguration(_) => ErrorCategory::Configuration,

            ErrorKind::UnresolvedContextTime(_)
            | ErrorKind::ZeroPositiveCount(..)
            | ErrorKind::UnmappedUser(_)
            | ErrorKind::UnmappedItem(_)
            | ErrorKind::MissingAffinity(_)
            | ErrorKind::IndexOutOfBound(_) => ErrorCategory::DataConsistency,
        }
    }
}
