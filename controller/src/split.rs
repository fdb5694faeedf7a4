// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{error::ErrorKind, CheckinDataset, Result, TimedCheckins};

/// Disjoint training, validation and test partitions of one dataset
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub training: TimedCheckins,
    pub validation: TimedCheckins,
    pub test: TimedCheckins,
}

/// Splits every user's history by time: the oldest `train_ratio` share goes
/// to training, the following `test_ratio` share to test and the most
/// recent remainder to validation.
pub fn chronological_split<D>(data: &D, train_ratio: f64, test_ratio: f64) -> Result<Split>
where
    D: CheckinDataset,
{
    if train_ratio < 0.0 || test_ratio < 0.0 || train_ratio + test_ratio > 1.0 {
        return Err(ErrorKind::InvalidSplitRatio(train_ratio, test_ratio).into());
    }

    let mut split = Split::default();

    for &user in data.all_users() {
        let mut events = data.user_events(user);
        events.sort_by_key(|c| c.time);

        let total = events.len();
        let training = (total as f64 * train_ratio).floor() as usize;
        let test = (total as f64 * test_ratio).floor() as usize;

        for (position, checkin) in events.into_iter().enumerate() {
            if position < training {
                split.training.push(*checkin);
            } else if position < training + test {
                split.test.push(*checkin);
            } else {
                split.validation.push(*checkin);
            }
        }
    }

    Ok(split)
}
