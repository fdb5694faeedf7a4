// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{CheckinDataset, EventIndex, ItemId, Timestamp, UserId};
use std::{collections::HashMap, iter::FromIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkin {
    pub user: UserId,
    pub item: ItemId,
    pub time: Timestamp,
}

impl Checkin {
    pub fn new(user: UserId, item: ItemId, time: Timestamp) -> Self {
        Self { user, item, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetStats {
    pub num_users: usize,
    pub num_items: usize,
    pub num_checkins: usize,
    pub distinct_pairs: usize,
}

impl DatasetStats {
    /// Fraction of the user × item grid with no check-in
    pub fn sparsity(&self) -> f64 {
        let cells = self.num_users * self.num_items;
        if cells == 0 {
            return 1.0;
        }

        1.0 - self.distinct_pairs as f64 / cells as f64
    }
}

/// In-memory check-in dataset, indexed by user, item and (user, item)
#[derive(Debug, Clone, Default)]
pub struct TimedCheckins {
    checkins: Vec<Checkin>,
    users: Vec<UserId>,
    items: Vec<ItemId>,
    by_user: EventIndex<UserId>,
    by_item: EventIndex<ItemId>,
    counts: HashMap<(UserId, ItemId), usize>,
}

impl TimedCheckins {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, checkin: Checkin) {
        let position = self.checkins.len();

        let user_events = self.by_user.entry(checkin.user).or_insert_with(Vec::new);
        if user_events.is_empty() {
            self.users.push(checkin.user);
        }
        user_events.push(position);

        let item_events = self.by_item.entry(checkin.item).or_insert_with(Vec::new);
        if item_events.is_empty() {
            self.items.push(checkin.item);
        }
        item_events.push(position);

        *self.counts.entry((checkin.user, checkin.item)).or_insert(0) += 1;
        self.checkins.push(checkin);
    }

    pub fn contains(&self, user: UserId, item: ItemId) -> bool {
        self.counts.contains_key(&(user, item))
    }

    /// Distinct items of a user, in first-seen order
    pub fn items_of(&self, user: UserId) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = Vec::new();
        for checkin in self.user_events(user) {
            if !items.contains(&checkin.item) {
                items.push(checkin.item);
            }
        }

        items
    }

    /// Keep only the events matching the predicate, reindexing everything
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Checkin) -> bool,
    {
        self.checkins.iter().copied().filter(|c| keep(c)).collect()
    }

    /// Drops items with fewer than `min_item` check-ins, then users with
    /// fewer than `min_user` remaining check-ins
    pub fn retain_active(&self, min_item: usize, min_user: usize) -> Self {
        let busy_items = self.retain(|c| self.by_item[&c.item].len() >= min_item);
        busy_items.retain(|c| busy_items.by_user[&c.user].len() >= min_user)
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            num_users: self.users.len(),
            num_items: self.items.len(),
            num_checkins: self.checkins.len(),
            distinct_pairs: self.counts.len(),
        }
    }
}

impl FromIterator<Checkin> for TimedCheckins {
    fn from_iter<I: IntoIterator<Item = Checkin>>(iter: I) -> Self {
        let mut dataset = Self::new();
        for checkin in iter {
            dataset.push(checkin);
        }

        dataset
    }
}

impl Extend<Checkin> for TimedCheckins {
    fn extend<I: IntoIterator<Item = Checkin>>(&mut self, iter: I) {
        for checkin in iter {
            self.push(checkin);
        }
    }
}

impl CheckinDataset for TimedCheckins {
    fn checkins(&self) -> &[Checkin] {
        &self.checkins
    }

    fn all_users(&self) -> &[UserId] {
        &self.users
    }

    fn all_items(&self) -> &[ItemId] {
        &self.items
    }

    fn events_by_user(&self) -> &EventIndex<UserId> {
        &self.by_user
    }

    fn events_by_item(&self) -> &EventIndex<ItemId> {
        &self.by_item
    }

    fn times_of(&self, user: UserId, item: ItemId) -> Vec<Timestamp> {
        self.user_events(user)
            .into_iter()
            .filter(|c| c.item == item)
            .map(|c| c.time)
            .collect()
    }

    fn checkin_count(&self, user: UserId, item: ItemId) -> usize {
        self.counts.get(&(user, item)).copied().unwrap_or(0)
    }
}
