// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{ItemId, Timestamp};
use std::{
    collections::{BTreeMap, HashMap},
    iter::FromIterator,
    ops::RangeInclusive,
};

pub trait GeoCoordinateProvider: Sync {
    /// Latitude and longitude in degrees
    fn lat_lon(&self, item: ItemId) -> Option<(f64, f64)>;
}

pub trait WeatherFeatureProvider: Sync {
    /// Feature value observed at the given time
    fn value_at(&self, time: Timestamp) -> Option<f64>;

    /// Smallest and largest value observed within the range
    fn min_max(&self, range: RangeInclusive<Timestamp>) -> Option<(f64, f64)>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateTable {
    coords: HashMap<ItemId, (f64, f64)>,
}

impl CoordinateTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, item: ItemId, lat: f64, lon: f64) {
        self.coords.insert(item, (lat, lon));
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

impl FromIterator<(ItemId, f64, f64)> for CoordinateTable {
    fn from_iter<I: IntoIterator<Item = (ItemId, f64, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (item, lat, lon) in iter {
            table.insert(item, lat, lon);
        }

        table
    }
}

impl GeoCoordinateProvider for CoordinateTable {
    fn lat_lon(&self, item: ItemId) -> Option<(f64, f64)> {
        self.coords.get(&item).copied()
    }
}

/// Weather samples, one per slot of `resolution` seconds
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSeries {
    resolution: i64,
    samples: BTreeMap<Timestamp, f64>,
}

impl WeatherSeries {
    pub fn new(resolution: i64) -> Self {
        Self {
            resolution: resolution.max(1),
            samples: BTreeMap::new(),
        }
    }

    /// Start of the slot containing `time`
    pub fn slot_of(&self, time: Timestamp) -> Timestamp {
        time - time.rem_euclid(self.resolution)
    }

    /// Stores a sample, replacing any previous one in the same slot
    pub fn insert(&mut self, time: Timestamp, value: f64) {
        let slot = self.slot_of(time);
        self.samples.insert(slot, value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl WeatherFeatureProvider for WeatherSeries {
    fn value_at(&self, time: Timestamp) -> Option<f64> {
        self.samples
            .get(&self.slot_of(time))
            .copied()
            .filter(|value| !value.is_nan())
    }

    fn min_max(&self, range: RangeInclusive<Timestamp>) -> Option<(f64, f64)> {
        let from = self.slot_of(*range.start());
        let to = *range.end();
        if from > to {
            return None;
        }

        self.samples
            .range(from..=to)
            .map(|(_, &value)| value)
            .filter(|value| !value.is_nan())
            .fold(None, |acc, value| match acc {
                None => Some((value, value)),
                Some((min, max)) => Some((value.min(min), value.max(max))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_lookup() {
        let table: CoordinateTable = vec![(1, 48.2, 16.37), (2, 47.07, 15.44)].into_iter().collect();

        assert_eq!(table.lat_lon(1), Some((48.2, 16.37)));
        assert_eq!(table.lat_lon(3), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn weather_resolves_times_within_a_slot() {
        let mut series = WeatherSeries::new(3600);
        series.insert(7200, 12.5);
        series.insert(10_800 + 60, 14.0);

        assert_eq!(series.value_at(7200), Some(12.5));
        assert_eq!(series.value_at(7200 + 3599), Some(12.5));
        assert_eq!(series.value_at(10_800), Some(14.0));
        assert_eq!(series.value_at(3599), None);
    }

    #[test]
    fn weather_min_max_over_range() {
        let mut series = WeatherSeries::new(1);
        series.insert(1, 5.0);
        series.insert(2, -3.0);
        series.insert(3, f64::NAN);
        series.insert(4, 9.0);

        assert_eq!(series.min_max(1..=4), Some((-3.0, 9.0)));
        assert_eq!(series.min_max(1..=1), Some((5.0, 5.0)));
        assert_eq!(series.min_max(5..=10), None);
        assert_eq!(series.value_at(3), None);
    }
}
