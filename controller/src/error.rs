// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use thiserror::Error as DError;

#[derive(Debug, Clone, DError)]
pub enum ErrorKind {
    #[error("Malformed record at line {0}: {1}")]
    MalformedRecord(u64, String),

    #[error("Couldn't parse timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid split ratios, train({0}) and test({1})")]
    InvalidSplitRatio(f64, f64),
}
