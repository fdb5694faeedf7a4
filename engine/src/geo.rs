// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{error::ErrorKind, factors::IdMapping, parallel::WorkerPool, sparse::CsrMatrix};
use anyhow::Error;
use controller::{GeoCoordinateProvider, ItemId};
use std::{cmp::Ordering, collections::BinaryHeap};

/// Mean earth radius
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two `(lat, lon)` points in degrees
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // rounding can push the root slightly above one, NaN must survive
    let root = a.sqrt();
    let root = if root > 1.0 { 1.0 } else { root };

    2.0 * EARTH_RADIUS_KM * root.asin()
}

/// Affinity of two items given their distance
pub fn distance_weight(distance: f64) -> f64 {
    1.0 / (0.5 + distance)
}

#[derive(Debug, Clone, Copy)]
pub struct Neighbour(pub usize, pub f64);

impl Neighbour {
    pub fn index(&self) -> usize {
        self.0
    }

    pub fn dist(&self) -> f64 {
        self.1
    }
}

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist()
            .partial_cmp(&other.dist())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.index().cmp(&other.index()))
    }
}

/// Keeps the `k` closest neighbours seen so far, the farthest on top
pub struct NearestNeighbours {
    k: usize,
    max_heap: BinaryHeap<Neighbour>,
}

impl NearestNeighbours {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    pub fn push(&mut self, neighbour: Neighbour) {
        if self.k == 0 {
            return;
        }

        if self.max_heap.len() < self.k {
            self.max_heap.push(neighbour);
        } else if let Some(farthest) = self.max_heap.peek() {
            if neighbour < *farthest {
                self.max_heap.pop();
                self.max_heap.push(neighbour);
            }
        }
    }

    /// Closest first
    pub fn into_sorted_vec(self) -> Vec<Neighbour> {
        self.max_heap.into_sorted_vec()
    }
}

/// The `k` closest items to `index` and the number of valid candidates seen.
/// Self-pairs, missing coordinates and undefined distances never qualify.
fn nearest_of(index: usize, points: &[Option<(f64, f64)>], k: usize) -> (Vec<Neighbour>, usize) {
    let origin = match points[index] {
        Some(origin) => origin,
        None => return (Vec::new(), 0),
    };

    let mut knn = NearestNeighbours::new(k);
    let mut candidates = 0;

    for (other, point) in points.iter().enumerate() {
        if other == index {
            continue;
        }

        let distance = match point {
            Some(point) => haversine_km(origin, *point),
            None => continue,
        };

        if distance.is_finite() {
            candidates += 1;
            knn.push(Neighbour(other, distance));
        }
    }

    (knn.into_sorted_vec(), candidates)
}

/// Row-normalized k-nearest-neighbour affinity `W` between items
#[derive(Debug, Clone)]
pub struct GeoAffinityIndex {
    affinity: CsrMatrix,
    neighbours: Vec<Vec<usize>>,
    excluded: Vec<ItemId>,
}

impl GeoAffinityIndex {
    /// Items with fewer than `k` candidates get an empty row and are
    /// reported, or abort the build when `strict` is set.
    pub fn build<G>(
        items: &IdMapping,
        coords: &G,
        k: usize,
        strict: bool,
        pool: &WorkerPool,
    ) -> Result<Self, Error>
    where
        G: GeoCoordinateProvider,
    {
        let points: Vec<Option<(f64, f64)>> = items
            .externals()
            .iter()
            .map(|&item| coords.lat_lon(item))
            .collect();

        let missing = points.iter().filter(|point| point.is_none()).count();
        if missing > 0 {
            log::warn!("{} items have no coordinates", missing);
        }

        let nearest = pool.map(points.len(), |index| nearest_of(index, &points, k));

        let mut weights = Vec::with_capacity(nearest.len());
        let mut neighbours = Vec::with_capacity(nearest.len());
        let mut excluded = Vec::new();

        for (index, (row, candidates)) in nearest.into_iter().enumerate() {
            if candidates < k {
                let item = items.external(index).unwrap_or_default();
                let err = ErrorKind::InsufficientNeighbours {
                    item,
                    found: candidates,
                    required: k,
                };

                if strict {
                    return Err(err.into());
                }

                log::error!("{}, excluding its affinity row", err);
                excluded.push(item);
                weights.push(Vec::new());
                neighbours.push(Vec::new());
                continue;
            }

            weights.push(
                row.iter()
                    .map(|n| (n.index(), distance_weight(n.dist())))
                    .collect(),
            );
            neighbours.push(row.iter().map(Neighbour::index).collect());
        }

        let mut affinity = CsrMatrix::from_rows(weights, items.len())?;
        affinity.normalize_rows();

        log::info!(
            "Built geo affinity for {} items, k = {}, {} excluded",
            items.len(),
            k,
            excluded.len()
        );

        Ok(Self {
            affinity,
            neighbours,
            excluded,
        })
    }

    pub fn affinity(&self) -> &CsrMatrix {
        &self.affinity
    }

    /// Internal indices of the nearest neighbours, closest first
    pub fn neighbours(&self, index: usize) -> Result<&[usize], Error> {
        self.neighbours
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| ErrorKind::MissingAffinity(index).into())
    }

    /// External ids of the items whose rows were left empty
    pub fn excluded(&self) -> &[ItemId] {
        &self.excluded
    }
}
