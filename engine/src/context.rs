// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{
    error::ErrorKind, factors::IdMapping, geo::GeoAffinityIndex, sparse::CsrMatrix,
    utils::cosine_similarity,
};
use anyhow::Error;
use controller::{CheckinDataset, Timestamp, WeatherFeatureProvider};
use std::collections::{BTreeSet, HashMap};

/// Maps a continuous context feature into `range_size` discrete buckets
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBucketizer {
    min: f64,
    max: f64,
    range_size: usize,
    lookup: HashMap<Timestamp, usize>,
}

impl ContextBucketizer {
    /// Bucketizer without any resolved time
    pub fn with_bounds(min: f64, max: f64, range_size: usize) -> Self {
        Self {
            min,
            max,
            range_size,
            lookup: HashMap::new(),
        }
    }

    /// Takes the feature bounds over the span of `times` and resolves every
    /// one of them to a bucket
    pub fn fit<W, I>(provider: &W, times: I, range_size: usize) -> Result<Self, Error>
    where
        W: WeatherFeatureProvider,
        I: IntoIterator<Item = Timestamp>,
    {
        let times: BTreeSet<Timestamp> = times.into_iter().collect();
        let (first, last) = match (times.iter().next(), times.iter().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(
                    ErrorKind::InvalidConfiguration("no check-in times to bucketize".into()).into(),
                )
            }
        };

        let (min, max) = provider
            .min_max(first..=last)
            .ok_or(ErrorKind::MissingContextFeature(first, last))?;

        let mut bucketizer = Self::with_bounds(min, max, range_size);
        for time in times {
            let value = provider
                .value_at(time)
                .ok_or(ErrorKind::UnresolvedContextTime(time))?;

            let bucket = bucketizer.bucket_of_value(value);
            bucketizer.lookup.insert(time, bucket);
        }

        if min == max {
            log::warn!("Context feature is constant ({}), every time maps to bucket 0", min);
        }

        log::info!(
            "Bucketized {} times into {} buckets over [{}, {}]",
            bucketizer.lookup.len(),
            range_size,
            min,
            max
        );

        Ok(bucketizer)
    }

    /// `floor((value - min) / (max - min) * (range_size - 1))`, clamped
    pub fn bucket_of_value(&self, value: f64) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 || !value.is_finite() {
            return 0;
        }

        let last = self.range_size.saturating_sub(1);
        let scaled = ((value - self.min) / span * last as f64).floor();

        if scaled <= 0.0 {
            0
        } else {
            (scaled as usize).min(last)
        }
    }

    pub fn bucket_at(&self, time: Timestamp) -> Result<usize, Error> {
        self.lookup
            .get(&time)
            .copied()
            .ok_or_else(|| ErrorKind::UnresolvedContextTime(time).into())
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Check-in counts per (user, item, bucket), over internal indices
#[derive(Debug, Clone, Default)]
pub struct InteractionTensor {
    range_size: usize,
    counts: HashMap<(usize, usize), Vec<u32>>,
}

impl InteractionTensor {
    pub fn new(range_size: usize) -> Self {
        Self {
            range_size,
            counts: HashMap::new(),
        }
    }

    pub fn build<D>(
        data: &D,
        users: &IdMapping,
        items: &IdMapping,
        bucketizer: &ContextBucketizer,
    ) -> Result<Self, Error>
    where
        D: CheckinDataset,
    {
        let mut tensor = Self::new(bucketizer.range_size());
        for checkin in data.checkins() {
            let user = users
                .internal(checkin.user)
                .ok_or(ErrorKind::UnmappedUser(checkin.user))?;
            let item = items
                .internal(checkin.item)
                .ok_or(ErrorKind::UnmappedItem(checkin.item))?;
            let bucket = bucketizer.bucket_at(checkin.time)?;

            tensor.add(user, item, bucket);
        }

        Ok(tensor)
    }

    pub fn add(&mut self, user: usize, item: usize, bucket: usize) {
        let range_size = self.range_size;
        let slots = self
            .counts
            .entry((user, item))
            .or_insert_with(|| vec![0; range_size]);

        if let Some(slot) = slots.get_mut(bucket) {
            *slot += 1;
        }
    }

    pub fn count(&self, user: usize, item: usize, bucket: usize) -> u32 {
        self.counts
            .get(&(user, item))
            .and_then(|slots| slots.get(bucket))
            .copied()
            .unwrap_or(0)
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }

    /// Distinct buckets each item was visited in, ascending
    pub fn item_buckets(&self, n_items: usize) -> Vec<Vec<usize>> {
        self.item_histograms(n_items)
            .into_iter()
            .map(|histogram| {
                histogram
                    .iter()
                    .enumerate()
                    .filter(|(_, count)| **count > 0.0)
                    .map(|(bucket, _)| bucket)
                    .collect()
            })
            .collect()
    }

    /// Visits per bucket for every item, summed over users
    pub fn item_histograms(&self, n_items: usize) -> Vec<Vec<f64>> {
        let mut histograms = vec![vec![0.0; self.range_size]; n_items];
        for (&(_, item), slots) in &self.counts {
            if let Some(histogram) = histograms.get_mut(item) {
                for (acc, count) in histogram.iter_mut().zip(slots.iter()) {
                    *acc += f64::from(*count);
                }
            }
        }

        histograms
    }

    /// One sparse vector per bucket, keyed by (user, item)
    fn bucket_vectors(&self) -> Vec<HashMap<(usize, usize), f64>> {
        let mut vectors = vec![HashMap::new(); self.range_size];
        for (&pair, slots) in &self.counts {
            for (bucket, &count) in slots.iter().enumerate() {
                if count > 0 {
                    vectors[bucket].insert(pair, f64::from(count));
                }
            }
        }

        vectors
    }
}

/// `MFC[t1, t2]`: cosine similarity between the (user, item) count vectors
/// of two buckets, zero diagonal, rows normalized
pub fn diffusion_matrix(tensor: &InteractionTensor) -> Result<CsrMatrix, Error> {
    let vectors = tensor.bucket_vectors();
    let range_size = tensor.range_size();

    let rows = (0..range_size)
        .map(|t1| {
            (0..range_size)
                .filter(|&t2| t2 != t1)
                .filter_map(|t2| cosine_similarity(&vectors[t1], &vectors[t2]).map(|sim| (t2, sim)))
                .collect()
        })
        .collect();

    let mut diffusion = CsrMatrix::from_rows(rows, range_size)?;
    diffusion.normalize_rows();
    Ok(diffusion)
}

/// `CL[l, l']`: cosine similarity between the bucket histograms of an item
/// and each of its geographic neighbours, rows normalized
pub fn climate_matrix(
    tensor: &InteractionTensor,
    geo: &GeoAffinityIndex,
    n_items: usize,
) -> Result<CsrMatrix, Error> {
    let profiles: Vec<HashMap<usize, f64>> = tensor
        .item_histograms(n_items)
        .into_iter()
        .map(|histogram| {
            histogram
                .into_iter()
                .enumerate()
                .filter(|(_, count)| *count > 0.0)
                .collect()
        })
        .collect();

    let mut rows = Vec::with_capacity(n_items);
    for item in 0..n_items {
        let row = geo
            .neighbours(item)?
            .iter()
            .filter(|&&other| other != item)
            .filter_map(|&other| {
                cosine_similarity(&profiles[item], &profiles[other]).map(|sim| (other, sim))
            })
            .collect();

        rows.push(row);
    }

    let mut climate = CsrMatrix::from_rows(rows, n_items)?;
    climate.normalize_rows();
    Ok(climate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCategory, parallel::WorkerPool};
    use assert_approx_eq::assert_approx_eq;
    use controller::{Checkin, CoordinateTable, TimedCheckins, WeatherSeries};

    #[test]
    fn bucket_of_value_floors() {
        let bucketizer = ContextBucketizer::with_bounds(0.0, 100.0, 10);

        assert_eq!(bucketizer.bucket_of_value(55.0), 4);
        assert_eq!(bucketizer.bucket_of_value(0.0), 0);
        assert_eq!(bucketizer.bucket_of_value(100.0), 9);
        assert_eq!(bucketizer.bucket_of_value(99.9), 8);
        assert_eq!(bucketizer.bucket_of_value(-5.0), 0);
        assert_eq!(bucketizer.bucket_of_value(150.0), 9);
    }

    #[test]
    fn constant_feature_maps_to_first_bucket() {
        let bucketizer = ContextBucketizer::with_bounds(3.0, 3.0, 10);
        assert_eq!(bucketizer.bucket_of_value(3.0), 0);
    }

    fn weather() -> WeatherSeries {
        let mut series = WeatherSeries::new(10);
        for (slot, value) in vec![0.0, 25.0, 50.0, 100.0].into_iter().enumerate() {
            series.insert(slot as i64 * 10, value);
        }

        series
    }

    #[test]
    fn fit_resolves_every_time() -> Result<(), Error> {
        let bucketizer = ContextBucketizer::fit(&weather(), vec![3, 15, 21, 35], 5)?;

        assert_eq!(bucketizer.bounds(), (0.0, 100.0));
        assert_eq!(bucketizer.bucket_at(3)?, 0);
        assert_eq!(bucketizer.bucket_at(15)?, 1);
        assert_eq!(bucketizer.bucket_at(21)?, 2);
        assert_eq!(bucketizer.bucket_at(35)?, 4);
        assert!(bucketizer.bucket_at(4).is_err());

        Ok(())
    }

    #[test]
    fn unresolved_time_is_an_error() {
        let err = ContextBucketizer::fit(&weather(), vec![3, 45], 5).unwrap_err();
        assert_eq!(err.downcast_ref::<ErrorKind>(), Some(&ErrorKind::UnresolvedContextTime(45)));
    }

    #[test]
    fn missing_feature_is_a_configuration_error() {
        let err = ContextBucketizer::fit(&WeatherSeries::new(10), vec![3, 45], 5).unwrap_err();
        let kind = err.downcast_ref::<ErrorKind>().unwrap();

        assert_eq!(kind, &ErrorKind::MissingContextFeature(3, 45));
        assert_eq!(kind.category(), ErrorCategory::Configuration);
    }

    fn tensor() -> InteractionTensor {
        let mut tensor = InteractionTensor::new(4);

        // (user 0, item 0) in buckets 0 and 1, (user 1, item 1) in 1 and 2
        tensor.add(0, 0, 0);
        tensor.add(0, 0, 1);
        tensor.add(0, 0, 1);
        tensor.add(1, 1, 1);
        tensor.add(1, 1, 2);

        tensor
    }

    #[test]
    fn tensor_counts() {
        let tensor = tensor();

        assert_eq!(tensor.count(0, 0, 1), 2);
        assert_eq!(tensor.count(1, 0, 1), 0);
        assert_eq!(tensor.item_buckets(3), vec![vec![0, 1], vec![1, 2], vec![]]);
    }

    #[test]
    fn diffusion_has_zero_diagonal_and_stochastic_rows() -> Result<(), Error> {
        let diffusion = diffusion_matrix(&tensor())?;

        for t in 0..4 {
            assert_approx_eq!(diffusion.get(t, t), 0.0);
        }

        assert_approx_eq!(diffusion.row_sum(0), 1.0, 1e-9);
        assert_approx_eq!(diffusion.row_sum(1), 1.0, 1e-9);
        assert_approx_eq!(diffusion.row_sum(2), 1.0, 1e-9);

        // bucket 3 was never observed
        assert_eq!(diffusion.row_nnz(3), 0);

        // bucket 0 only overlaps with bucket 1
        assert_approx_eq!(diffusion.get(0, 1), 1.0);

        Ok(())
    }

    #[test]
    fn climate_follows_geo_neighbours() -> Result<(), Error> {
        let items = IdMapping::from_ids(vec![1, 2, 3]);
        let coords: CoordinateTable = vec![(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 0.0, 5.0)].into_iter().collect();
        let geo = GeoAffinityIndex::build(&items, &coords, 1, true, &WorkerPool::new(1))?;

        let mut tensor = InteractionTensor::new(2);
        tensor.add(0, 0, 0);
        tensor.add(0, 1, 0);
        tensor.add(0, 2, 1);

        let climate = climate_matrix(&tensor, &geo, 3)?;

        assert_approx_eq!(climate.get(0, 1), 1.0);
        assert_approx_eq!(climate.get(1, 0), 1.0);
        // item 3's only neighbour shares no bucket with it
        assert_eq!(climate.row_nnz(2), 0);

        Ok(())
    }

    #[test]
    fn tensor_from_dataset() -> Result<(), Error> {
        let data: TimedCheckins = vec![Checkin::new(7, 70, 3), Checkin::new(7, 70, 35)].into_iter().collect();
        let users = IdMapping::from_ids(vec![7]);
        let items = IdMapping::from_ids(vec![70]);
        let bucketizer = ContextBucketizer::fit(&weather(), vec![3, 35], 5)?;

        let tensor = InteractionTensor::build(&data, &users, &items, &bucketizer)?;
        assert_eq!(tensor.count(0, 0, 0), 1);
        assert_eq!(tensor.count(0, 0, 4), 1);

        let unknown = IdMapping::from_ids(vec![8]);
        assert!(InteractionTensor::build(&data, &unknown, &items, &bucketizer).is_err());

        Ok(())
    }
}
