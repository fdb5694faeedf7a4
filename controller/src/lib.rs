// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

pub mod checkins;
pub mod error;
pub mod providers;
pub mod split;
pub mod table;

use anyhow::Error;
use std::collections::HashMap;

pub use checkins::{Checkin, DatasetStats, TimedCheckins};
pub use providers::{CoordinateTable, GeoCoordinateProvider, WeatherFeatureProvider, WeatherSeries};
pub use split::{chronological_split, Split};
pub use table::ToTable;

pub type Result<T> = std::result::Result<T, Error>;
pub type UserId = i64;
pub type ItemId = i64;

/// Unix time in seconds
pub type Timestamp = i64;

/// Event indices into `CheckinDataset::checkins`, grouped by some key
pub type EventIndex<K> = HashMap<K, Vec<usize>>;

/// Read-only view over an ordered collection of check-ins
pub trait CheckinDataset: Sync {
    /// Every event, in load order
    fn checkins(&self) -> &[Checkin];

    /// Distinct users in first-seen order
    fn all_users(&self) -> &[UserId];

    /// Distinct items in first-seen order
    fn all_items(&self) -> &[ItemId];

    /// Maps each user to the positions of its events
    fn events_by_user(&self) -> &EventIndex<UserId>;

    /// Maps each item to the positions of its events
    fn events_by_item(&self) -> &EventIndex<ItemId>;

    /// Every time the user checked into the item, in event order
    fn times_of(&self, user: UserId, item: ItemId) -> Vec<Timestamp>;

    /// Number of times the user checked into the item
    fn checkin_count(&self, user: UserId, item: ItemId) -> usize;

    fn len(&self) -> usize {
        self.checkins().len()
    }

    fn is_empty(&self) -> bool {
        self.checkins().is_empty()
    }

    /// Events of a single user, in event order
    fn user_events(&self, user: UserId) -> Vec<&Checkin> {
        let checkins = self.checkins();
        self.events_by_user()
            .get(&user)
            .map(|positions| positions.iter().map(|&pos| &checkins[pos]).collect())
            .unwrap_or_default()
    }

    /// Events on a single item, in event order
    fn item_events(&self, item: ItemId) -> Vec<&Checkin> {
        let checkins = self.checkins();
        self.events_by_item()
            .get(&item)
            .map(|positions| positions.iter().map(|&pos| &checkins[pos]).collect())
            .unwrap_or_default()
    }

    /// Earliest and latest check-in time
    fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut times = self.checkins().iter().map(|c| c.time);
        let first = times.next()?;

        Some(times.fold((first, first), |(min, max), t| (min.min(t), max.max(t))))
    }
}
