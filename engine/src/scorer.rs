// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{
    error::ErrorKind,
    factors::{FactorMatrix, LatentFactorStore},
    mode::Factor,
    parallel::WorkerPool,
    sparse::CsrMatrix,
    utils::dot,
};
use anyhow::Error;
use controller::ItemId;
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashSet},
};

/// The fixed neighbourhood graphs a model scores with, built once before
/// training and never mutated afterwards
#[derive(Debug, Clone, Default)]
pub struct Affinities {
    /// `W`, item to item
    pub geo: Option<CsrMatrix>,
    /// `CL`, item to item
    pub climate: Option<CsrMatrix>,
    /// `MFC`, bucket to bucket
    pub diffusion: Option<CsrMatrix>,
}

/// Neighbour-weighted factor sums, a snapshot of the factors at the time
/// they were computed
#[derive(Debug, Clone, Default)]
pub struct NeighbourSums {
    geo: Vec<Vec<f64>>,
    item_weather: Vec<Vec<f64>>,
    bucket_weather: Vec<Vec<f64>>,
}

fn weighted_sums(
    graph: &CsrMatrix,
    factors: &FactorMatrix,
    pool: &WorkerPool,
) -> Result<Vec<Vec<f64>>, Error> {
    pool.map(graph.n_rows(), |row| graph.weighted_sum(row, factors))
        .into_iter()
        .collect()
}

fn sum_row(sums: &[Vec<f64>], row: usize) -> Result<&[f64], Error> {
    sums.get(row)
        .map(Vec::as_slice)
        .ok_or_else(|| ErrorKind::MissingAffinity(row).into())
}

impl NeighbourSums {
    /// `sumGeo[l]`, `sumWeather[l]` and `sumWeather[t]` for every graph the
    /// mode of `store` uses
    pub fn compute(
        store: &LatentFactorStore,
        affinities: &Affinities,
        pool: &WorkerPool,
    ) -> Result<Self, Error> {
        let mode = store.mode();

        let geo = if mode.uses_geo() {
            let graph = affinities.geo.as_ref().ok_or(ErrorKind::MissingAffinity(0))?;
            weighted_sums(graph, store.matrix(Factor::L1)?, pool)?
        } else {
            Vec::new()
        };

        let item_weather = if mode.uses_item_weather() {
            let graph = affinities.climate.as_ref().ok_or(ErrorKind::MissingAffinity(0))?;
            weighted_sums(graph, store.matrix(Factor::L1)?, pool)?
        } else {
            Vec::new()
        };

        let bucket_weather = if mode.uses_context() {
            let graph = affinities.diffusion.as_ref().ok_or(ErrorKind::MissingAffinity(0))?;
            weighted_sums(graph, store.matrix(Factor::F)?, pool)?
        } else {
            Vec::new()
        };

        log::debug!(
            "Rebuilt neighbour sums ({} geo, {} item weather, {} bucket weather rows)",
            geo.len(),
            item_weather.len(),
            bucket_weather.len()
        );

        Ok(Self {
            geo,
            item_weather,
            bucket_weather,
        })
    }

    pub fn geo(&self, item: usize) -> Result<&[f64], Error> {
        sum_row(&self.geo, item)
    }

    pub fn item_weather(&self, item: usize) -> Result<&[f64], Error> {
        sum_row(&self.item_weather, item)
    }

    pub fn bucket_weather(&self, bucket: usize) -> Result<&[f64], Error> {
        sum_row(&self.bucket_weather, bucket)
    }
}

/// `a[i]·b[j]`, never holding two row locks at once
fn row_dot(a: &FactorMatrix, i: usize, b: &FactorMatrix, j: usize) -> Result<f64, Error> {
    let x = a.row(i)?;
    b.with_row(j, |y| dot(&x, y))
}

fn slice_dot(a: &FactorMatrix, i: usize, y: &[f64]) -> Result<f64, Error> {
    a.with_row(i, |x| dot(x, y))
}

/// Scores over internal indices. Pure in the factor state and the sums it
/// was given.
#[derive(Clone, Copy)]
pub struct Scorer<'a> {
    store: &'a LatentFactorStore,
    sums: &'a NeighbourSums,
}

impl<'a> Scorer<'a> {
    pub fn new(store: &'a LatentFactorStore, sums: &'a NeighbourSums) -> Self {
        Self { store, sums }
    }

    pub fn store(&self) -> &'a LatentFactorStore {
        self.store
    }

    pub fn sums(&self) -> &'a NeighbourSums {
        self.sums
    }

    /// `L1[l]·U1[u] + sumGeo[l]·U2[u] [+ sumWeather[l]·U3[u]]`
    pub fn score(&self, user: usize, item: usize) -> Result<f64, Error> {
        let mode = self.store.mode();
        let mut score = row_dot(
            self.store.matrix(Factor::U1)?,
            user,
            self.store.matrix(Factor::L1)?,
            item,
        )?;

        if mode.uses_geo() {
            score += slice_dot(self.store.matrix(Factor::U2)?, user, self.sums.geo(item)?)?;
        }

        if mode.uses_item_weather() {
            score += slice_dot(
                self.store.matrix(Factor::U3)?,
                user,
                self.sums.item_weather(item)?,
            )?;
        }

        Ok(score)
    }

    /// `score` plus `F[t]·L2[l] + sumWeather[t]·L3[l]` for context-aware
    /// models, plain `score` otherwise
    pub fn score_at(&self, user: usize, item: usize, bucket: usize) -> Result<f64, Error> {
        let mut score = self.score(user, item)?;
        if !self.store.mode().uses_context() {
            return Ok(score);
        }

        score += row_dot(
            self.store.matrix(Factor::F)?,
            bucket,
            self.store.matrix(Factor::L2)?,
            item,
        )?;
        score += slice_dot(
            self.store.matrix(Factor::L3)?,
            item,
            self.sums.bucket_weather(bucket)?,
        )?;

        Ok(score)
    }

    /// The `n` best scored candidates, best first. Candidates without a
    /// mapping are skipped, duplicates are scored once.
    pub fn top_n<I, F>(&self, n: usize, candidates: I, mut score: F) -> Result<Vec<ScoredItem>, Error>
    where
        I: IntoIterator<Item = ItemId>,
        F: FnMut(usize) -> Result<f64, Error>,
    {
        let mut heap = TopItems::new(n);
        let mut seen = HashSet::new();

        for item in candidates {
            if !seen.insert(item) {
                continue;
            }

            let index = match self.store.items().internal(item) {
                Some(index) => index,
                None => continue,
            };

            heap.push(ScoredItem {
                item,
                score: score(index)?,
            });
        }

        Ok(heap.into_sorted_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem {
    pub item: ItemId,
    pub score: f64,
}

/// Ranking order: higher score first, then lower item id
fn cmp_rank(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    match b.score.partial_cmp(&a.score) {
        Some(Ordering::Equal) | None => a.item.cmp(&b.item),
        Some(ordering) => ordering,
    }
}

impl Eq for ScoredItem {}

impl Ord for ScoredItem {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_rank(self, other)
    }
}

impl PartialOrd for ScoredItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_rank(self, other))
    }
}

/// Bounded heap keeping the `n` best ranked items, the worst on top
struct TopItems {
    n: usize,
    heap: BinaryHeap<ScoredItem>,
}

impl TopItems {
    fn new(n: usize) -> Self {
        Self {
            n,
            heap: BinaryHeap::with_capacity(n + 1),
        }
    }

    fn push(&mut self, scored: ScoredItem) {
        if self.n == 0 {
            return;
        }

        if self.heap.len() < self.n {
            self.heap.push(scored);
        } else if let Some(worst) = self.heap.peek() {
            if scored < *worst {
                self.heap.pop();
                self.heap.push(scored);
            }
        }
    }

    fn into_sorted_vec(self) -> Vec<ScoredItem> {
        self.heap.into_sorted_vec()
    }
}
