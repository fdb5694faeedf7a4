// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{
    context::{ContextBucketizer, InteractionTensor},
    error::ErrorKind,
    factors::LatentFactorStore,
    mode::Factor,
    parallel::WorkerPool,
    scorer::{Affinities, NeighbourSums, Scorer},
    utils::{add_scaled, difference},
};
use anyhow::Error;
use config::TrainingConfig;
use controller::CheckinDataset;
use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// `E(r) = Σ_{i=1}^{r} 1/i`
pub fn harmonic(r: usize) -> f64 {
    (1..=r).map(|i| 1.0 / i as f64).sum()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the smoothed margin loss at the current scores
pub fn delta(y_ul: f64, y_ul2: f64, epsilon: f64) -> f64 {
    let s = sigmoid(y_ul2 + epsilon - y_ul);
    s * (1.0 - s)
}

/// A less visited candidate is scored within `epsilon` of (or above) the
/// positive
pub fn incompatible(x_ul: u32, x_ul2: u32, y_ul: f64, y_ul2: f64, epsilon: f64) -> bool {
    x_ul > x_ul2 && y_ul < y_ul2 + epsilon
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    pub max_iter: usize,
    pub evaluation_at: usize,
    pub epsilon: f64,
    pub gamma: f64,
    pub context_gamma: f64,
    pub radius: f64,
    pub alpha: f64,
    pub beta: f64,
    pub mu: f64,
    pub seed: Option<u64>,
}

impl TrainingParams {
    pub fn from_config(training: &TrainingConfig) -> Self {
        Self {
            max_iter: training.max_iter,
            evaluation_at: training.evaluation_at,
            epsilon: training.epsilon,
            gamma: training.gamma,
            context_gamma: training.context_gamma,
            radius: training.radius,
            alpha: training.alpha,
            beta: training.beta,
            mu: training.bucket_radius_factor(),
            seed: training.seed,
        }
    }

    /// Every `evaluation_at` iterations except the first, plus the last one
    fn is_evaluation(&self, iteration: usize) -> bool {
        if self.evaluation_at == 0 {
            return false;
        }

        (iteration != 0 && iteration % self.evaluation_at == 0) || iteration + 1 == self.max_iter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationStats {
    pub iteration: usize,
    pub geo_updates: usize,
    pub context_updates: usize,
}

/// Training history of one user over internal indices
#[derive(Debug, Clone, Default)]
struct UserTask {
    user: usize,
    positives: Vec<usize>,
    counts: HashMap<usize, u32>,
    pairs: Vec<(usize, usize)>,
}

impl UserTask {
    fn count(&self, item: usize) -> u32 {
        self.counts.get(&item).copied().unwrap_or(0)
    }
}

struct ContextState<'a> {
    tensor: &'a InteractionTensor,
    item_buckets: Vec<Vec<usize>>,
    candidates: usize,
}

/// Pairwise rank optimisation over a training split
pub struct RankTrainer<'a> {
    store: &'a LatentFactorStore,
    affinities: &'a Affinities,
    context: Option<ContextState<'a>>,
    tasks: Vec<UserTask>,
    params: TrainingParams,
    seed: u64,
}

impl<'a> RankTrainer<'a> {
    /// `context` must be given for context-aware models, it's ignored
    /// otherwise
    pub fn new<D>(
        store: &'a LatentFactorStore,
        affinities: &'a Affinities,
        data: &D,
        context: Option<(&'a ContextBucketizer, &'a InteractionTensor)>,
        params: TrainingParams,
    ) -> Result<Self, Error>
    where
        D: CheckinDataset,
    {
        let uses_context = store.mode().uses_context();
        let context = match context {
            Some((bucketizer, tensor)) if uses_context => Some((bucketizer, tensor)),
            None if uses_context => {
                return Err(ErrorKind::InvalidConfiguration(
                    "context-aware training needs a bucketizer and an interaction tensor".into(),
                )
                .into())
            }
            _ => None,
        };

        let mut tasks = Vec::with_capacity(data.all_users().len());
        for &user in data.all_users() {
            let mut task = UserTask {
                user: store.user_index(user)?,
                ..Default::default()
            };
            let mut seen_pairs = HashSet::new();

            for checkin in data.user_events(user) {
                let item = store.item_index(checkin.item)?;
                if !task.counts.contains_key(&item) {
                    task.positives.push(item);
                    task.counts
                        .insert(item, data.checkin_count(user, checkin.item) as u32);
                }

                if let Some((bucketizer, _)) = context {
                    let pair = (item, bucketizer.bucket_at(checkin.time)?);
                    if seen_pairs.insert(pair) {
                        task.pairs.push(pair);
                    }
                }
            }

            tasks.push(task);
        }

        let context = context.map(|(_, tensor)| {
            let item_buckets = tensor.item_buckets(store.items().len());
            let candidates = item_buckets.iter().map(Vec::len).sum();

            ContextState {
                tensor,
                item_buckets,
                candidates,
            }
        });

        let seed = params.seed.unwrap_or_else(rand::random);

        Ok(Self {
            store,
            affinities,
            context,
            tasks,
            params,
            seed,
        })
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Runs every iteration, calling `evaluate` every `evaluation_at`
    /// iterations except the first one and after the last one
    pub fn train<F>(&self, pool: &WorkerPool, mut evaluate: F) -> Result<Vec<IterationStats>, Error>
    where
        F: FnMut(usize) -> Result<(), Error>,
    {
        log::info!(
            "Training {} model: {} users, {} items, {} iterations on {} threads",
            self.store.mode(),
            self.tasks.len(),
            self.store.items().len(),
            self.params.max_iter,
            pool.threads()
        );

        let mut history = Vec::with_capacity(self.params.max_iter);
        for iteration in 0..self.params.max_iter {
            let stats = self.run_iteration(iteration, pool)?;
            log::debug!(
                "Iteration {}: {} geo updates, {} context updates",
                iteration,
                stats.geo_updates,
                stats.context_updates
            );
            history.push(stats);

            if self.params.is_evaluation(iteration) {
                log::info!("Evaluating at iteration {}", iteration);
                evaluate(iteration)?;
            }
        }

        log::info!("Training finished after {} iterations", self.params.max_iter);
        Ok(history)
    }

    /// Rebuilds the neighbour sums, shuffles the negative pool and updates
    /// every user once
    pub fn run_iteration(&self, iteration: usize, pool: &WorkerPool) -> Result<IterationStats, Error> {
        let sums = NeighbourSums::compute(self.store, self.affinities, pool)?;
        let scorer = Scorer::new(self.store, &sums);

        let mut negatives: Vec<usize> = (0..self.store.items().len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(iteration as u64));
        negatives.shuffle(&mut rng);

        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<Error>> = Mutex::new(None);
        let geo_updates = AtomicUsize::new(0);
        let context_updates = AtomicUsize::new(0);

        pool.for_each_chunk(self.tasks.len(), |chunk| {
            for index in chunk {
                if abort.load(Ordering::Relaxed) {
                    return;
                }

                let task = &self.tasks[index];
                let result = self.geo_pass(&scorer, task, &negatives).and_then(|geo| {
                    geo_updates.fetch_add(geo, Ordering::Relaxed);
                    self.context_pass(&scorer, task, &negatives)
                });

                match result {
                    Ok(context) => {
                        context_updates.fetch_add(context, Ordering::Relaxed);
                    }
                    Err(err) => {
                        abort.store(true, Ordering::Relaxed);
                        first_error.lock().get_or_insert(err);
                        return;
                    }
                }
            }
        });

        if let Some(err) = first_error.into_inner() {
            return Err(err);
        }

        Ok(IterationStats {
            iteration,
            geo_updates: geo_updates.into_inner(),
            context_updates: context_updates.into_inner(),
        })
    }

    fn zero_count(&self, user: usize, item: usize) -> Error {
        ErrorKind::ZeroPositiveCount(
            self.store.users().external(user).unwrap_or_default(),
            self.store.items().external(item).unwrap_or_default(),
        )
        .into()
    }

    /// One early-exit negative scan per positive item, returns the number
    /// of updates made
    fn geo_pass(&self, scorer: &Scorer, task: &UserTask, negatives: &[usize]) -> Result<usize, Error> {
        let epsilon = self.params.epsilon;
        let user = task.user;
        let mut updates = 0;

        for &item in &task.positives {
            let x_ul = task.count(item);
            if x_ul == 0 {
                return Err(self.zero_count(user, item));
            }

            let y_ul = scorer.score(user, item)?;
            let mut scanned = 0;

            for &other in negatives {
                if other == item {
                    continue;
                }

                scanned += 1;
                let y_ul2 = scorer.score(user, other)?;

                if incompatible(x_ul, task.count(other), y_ul, y_ul2, epsilon) {
                    let eta = harmonic(negatives.len() / scanned) * delta(y_ul, y_ul2, epsilon);
                    self.geo_update(scorer.sums(), user, item, other, eta)?;
                    updates += 1;
                    break;
                }
            }
        }

        Ok(updates)
    }

    fn geo_update(
        &self,
        sums: &NeighbourSums,
        user: usize,
        item: usize,
        other: usize,
        eta: f64,
    ) -> Result<(), Error> {
        let mode = self.store.mode();
        let step = self.params.gamma * eta;
        let radius = self.params.radius;

        let u1 = self.store.matrix(Factor::U1)?;
        let l1 = self.store.matrix(Factor::L1)?;

        let towards = difference(&l1.row(other)?, &l1.row(item)?);
        let u1_old = u1.update_projected(user, radius, |row| add_scaled(row, &towards, -step))?;

        if mode.uses_geo() {
            let g = difference(sums.geo(other)?, sums.geo(item)?);
            self.store
                .matrix(Factor::U2)?
                .update_projected(user, self.params.alpha * radius, |row| {
                    add_scaled(row, &g, -step)
                })?;
        }

        if mode.uses_item_weather() {
            let g = difference(sums.item_weather(other)?, sums.item_weather(item)?);
            self.store
                .matrix(Factor::U3)?
                .update_projected(user, self.params.beta * radius, |row| {
                    add_scaled(row, &g, -step)
                })?;
        }

        l1.update_projected(other, radius, |row| add_scaled(row, &u1_old, -step))?;
        l1.update_projected(item, radius, |row| add_scaled(row, &u1_old, step))?;

        Ok(())
    }

    /// Negative scan over (item, bucket) candidates for every distinct
    /// (item, bucket) pair of the user
    fn context_pass(&self, scorer: &Scorer, task: &UserTask, negatives: &[usize]) -> Result<usize, Error> {
        let context = match &self.context {
            Some(context) => context,
            None => return Ok(0),
        };

        let epsilon = self.params.epsilon;
        let user = task.user;
        let mut updates = 0;

        for &(item, bucket) in &task.pairs {
            let x = context.tensor.count(user, item, bucket);
            if x == 0 {
                return Err(self.zero_count(user, item));
            }

            let y = scorer.score_at(user, item, bucket)?;
            let mut scanned = 0;

            'scan: for &other in negatives {
                if other == item {
                    continue;
                }

                for &other_bucket in &context.item_buckets[other] {
                    scanned += 1;
                    let x2 = context.tensor.count(user, other, other_bucket);
                    let y2 = scorer.score_at(user, other, other_bucket)?;

                    if incompatible(x, x2, y, y2, epsilon) {
                        let eta = harmonic(context.candidates / scanned) * delta(y, y2, epsilon);
                        self.context_update(scorer.sums(), (item, bucket), (other, other_bucket), eta)?;
                        updates += 1;
                        break 'scan;
                    }
                }
            }
        }

        Ok(updates)
    }

    fn context_update(
        &self,
        sums: &NeighbourSums,
        (item, bucket): (usize, usize),
        (other, other_bucket): (usize, usize),
        eta: f64,
    ) -> Result<(), Error> {
        let step = self.params.context_gamma * eta;
        let item_radius = self.params.beta * self.params.radius;
        let bucket_radius = self.params.mu * self.params.radius;

        let f = self.store.matrix(Factor::F)?;
        let l2 = self.store.matrix(Factor::L2)?;
        let l3 = self.store.matrix(Factor::L3)?;

        let towards = difference(&l2.row(other)?, &l2.row(item)?);
        let f_old = f.update_projected(bucket, bucket_radius, |row| add_scaled(row, &towards, -step))?;

        let g = difference(sums.bucket_weather(other_bucket)?, sums.bucket_weather(bucket)?);
        l3.update_projected(item, item_radius, |row| add_scaled(row, &g, -step))?;

        l2.update_projected(other, item_radius, |row| add_scaled(row, &f_old, -step))?;
        l2.update_projected(item, item_radius, |row| add_scaled(row, &f_old, step))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorCategory,
        factors::{FactorMatrix, IdMapping, NormalInit},
        mode::Mode,
        sparse::CsrMatrix,
        utils::euclidean_norm,
    };
    use assert_approx_eq::assert_approx_eq;
    use controller::{Checkin, TimedCheckins, WeatherSeries};

    fn params() -> TrainingParams {
        TrainingParams {
            max_iter: 1,
            evaluation_at: 0,
            epsilon: 0.3,
            gamma: 0.1,
            context_gamma: 0.1,
            radius: 1.0,
            alpha: 0.2,
            beta: 0.2,
            mu: 0.2,
            seed: Some(3),
        }
    }

    #[test]
    fn rank_weights() {
        assert_approx_eq!(harmonic(0), 0.0);
        assert_approx_eq!(harmonic(1), 1.0);
        assert_approx_eq!(harmonic(3), 1.0 + 0.5 + 1.0 / 3.0);
        assert_approx_eq!(delta(0.0, 0.0, 0.0), 0.25);
        assert!(delta(5.0, 0.0, 0.3) < delta(0.0, 0.0, 0.3));
    }

    #[test]
    fn incompatibility_predicate() {
        assert!(incompatible(2, 1, 0.5, 0.4, 0.3));
        assert!(!incompatible(2, 1, 1.0, 0.4, 0.3));
        assert!(!incompatible(1, 1, 0.0, 1.0, 0.3));
        assert!(!incompatible(1, 2, 0.0, 1.0, 0.3));
    }

    #[test]
    fn evaluation_schedule() {
        let mut params = params();
        params.max_iter = 12;
        params.evaluation_at = 5;

        assert!(!params.is_evaluation(0));
        assert!(!params.is_evaluation(4));
        assert!(params.is_evaluation(5));
        assert!(params.is_evaluation(10));
        assert!(params.is_evaluation(11));

        params.evaluation_at = 0;
        assert!(!params.is_evaluation(11));
    }

    #[test]
    fn no_incompatible_negative_means_no_update() -> Result<(), Error> {
        let store = LatentFactorStore::from_matrices(
            Mode::Basic,
            IdMapping::from_ids(vec![1]),
            IdMapping::from_ids(vec![10, 20]),
            2,
            0,
            vec![
                (Factor::U1, FactorMatrix::from_rows(vec![vec![1.0, 0.0]], 2)?),
                (
                    Factor::L1,
                    FactorMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 0.0]], 2)?,
                ),
            ],
        )?;
        let before = store.clone();

        let data: TimedCheckins = vec![Checkin::new(1, 10, 0)].into_iter().collect();
        let affinities = Affinities::default();
        let pool = WorkerPool::new(1);
        let trainer = RankTrainer::new(&store, &affinities, &data, None, params())?;

        let stats = trainer.run_iteration(0, &pool)?;
        assert_eq!(stats.geo_updates, 0);
        assert_eq!(store.matrix(Factor::U1)?.to_rows(), before.matrix(Factor::U1)?.to_rows());
        assert_eq!(store.matrix(Factor::L1)?.to_rows(), before.matrix(Factor::L1)?.to_rows());

        Ok(())
    }

    fn geo_fixture() -> Result<(LatentFactorStore, Affinities, TimedCheckins), Error> {
        geo_fixture_for(Mode::GeoAware { weather: false })
    }

    fn geo_fixture_for(mode: Mode) -> Result<(LatentFactorStore, Affinities, TimedCheckins), Error> {
        let users = IdMapping::from_ids(vec![1, 2, 3]);
        let items = IdMapping::from_ids(vec![10, 20, 30, 40]);
        let store = LatentFactorStore::for_mode(mode, users, items, 3, 0);
        store.init_normal(&mut NormalInit::new(0.0, 1.0, Some(11))?);

        let geo = CsrMatrix::from_rows(
            vec![
                vec![(1, 1.0)],
                vec![(0, 0.5), (2, 0.5)],
                vec![(1, 0.5), (3, 0.5)],
                vec![(2, 1.0)],
            ],
            4,
        )?;

        let climate = if mode.uses_item_weather() {
            Some(CsrMatrix::from_rows(
                vec![
                    vec![(1, 1.0)],
                    vec![(0, 1.0)],
                    vec![(3, 1.0)],
                    vec![(2, 1.0)],
                ],
                4,
            )?)
        } else {
            None
        };

        let affinities = Affinities {
            geo: Some(geo),
            climate,
            ..Default::default()
        };

        let data = vec![
            Checkin::new(1, 10, 0),
            Checkin::new(1, 10, 5),
            Checkin::new(2, 20, 1),
            Checkin::new(2, 20, 7),
            Checkin::new(3, 30, 2),
            Checkin::new(3, 30, 9),
        ]
        .into_iter()
        .collect();

        Ok((store, affinities, data))
    }

    #[test]
    fn updated_rows_stay_within_radius() -> Result<(), Error> {
        let (store, affinities, data) = geo_fixture()?;
        let mut params = params();
        params.epsilon = 100.0;
        params.radius = 0.1;
        params.max_iter = 3;

        let pool = WorkerPool::new(2);
        let trainer = RankTrainer::new(&store, &affinities, &data, None, params)?;
        let history = trainer.train(&pool, |_| Ok(()))?;

        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|stats| stats.geo_updates == 3));

        for user in 0..3 {
            assert!(euclidean_norm(&store.get_row(Factor::U1, user)?) <= 0.1 + 1e-9);
            assert!(euclidean_norm(&store.get_row(Factor::U2, user)?) <= 0.02 + 1e-9);
        }

        for item in 0..3 {
            assert!(euclidean_norm(&store.get_row(Factor::L1, item)?) <= 0.1 + 1e-9);
        }

        Ok(())
    }

    #[test]
    fn weather_rows_stay_within_radius() -> Result<(), Error> {
        let (store, affinities, data) = geo_fixture_for(Mode::GeoAware { weather: true })?;
        let mut params = params();
        params.epsilon = 100.0;
        params.radius = 0.1;
        params.max_iter = 2;

        let pool = WorkerPool::new(2);
        let trainer = RankTrainer::new(&store, &affinities, &data, None, params)?;
        let history = trainer.train(&pool, |_| Ok(()))?;
        assert!(history.iter().all(|stats| stats.geo_updates == 3));

        // beta · C
        for user in 0..3 {
            assert!(euclidean_norm(&store.get_row(Factor::U3, user)?) <= 0.02 + 1e-9);
            assert!(euclidean_norm(&store.get_row(Factor::U2, user)?) <= 0.02 + 1e-9);
        }

        Ok(())
    }

    #[test]
    fn evaluation_callback_follows_schedule() -> Result<(), Error> {
        let (store, affinities, data) = geo_fixture()?;
        let mut params = params();
        params.max_iter = 8;
        params.evaluation_at = 3;

        let pool = WorkerPool::new(1);
        let trainer = RankTrainer::new(&store, &affinities, &data, None, params)?;

        let mut evaluated = Vec::new();
        trainer.train(&pool, |iteration| {
            evaluated.push(iteration);
            Ok(())
        })?;

        assert_eq!(evaluated, vec![3, 6, 7]);
        Ok(())
    }

    #[test]
    fn seeded_single_threaded_runs_match() -> Result<(), Error> {
        let mut params = params();
        params.epsilon = 1.0;
        params.max_iter = 2;

        let run = |params: TrainingParams| -> Result<Vec<Vec<f64>>, Error> {
            let (store, affinities, data) = geo_fixture()?;
            let pool = WorkerPool::new(1);
            RankTrainer::new(&store, &affinities, &data, None, params)?.train(&pool, |_| Ok(()))?;
            Ok(store.matrix(Factor::L1)?.to_rows())
        };

        assert_eq!(run(params.clone())?, run(params)?);
        Ok(())
    }

    #[test]
    fn zero_positive_count_is_fatal() -> Result<(), Error> {
        let users = IdMapping::from_ids(vec![1]);
        let items = IdMapping::from_ids(vec![10, 20]);
        let store = LatentFactorStore::for_mode(Mode::ContextAware, users, items, 2, 2);
        store.init_normal(&mut NormalInit::new(0.0, 0.1, Some(5))?);

        let affinities = Affinities {
            geo: Some(CsrMatrix::from_rows(vec![vec![(1, 1.0)], vec![(0, 1.0)]], 2)?),
            climate: None,
            diffusion: Some(CsrMatrix::from_rows(vec![vec![(1, 1.0)], vec![(0, 1.0)]], 2)?),
        };

        let mut weather = WeatherSeries::new(10);
        weather.insert(0, 1.0);
        weather.insert(10, 2.0);
        let bucketizer = ContextBucketizer::fit(&weather, vec![0, 10], 2)?;

        let data: TimedCheckins = vec![Checkin::new(1, 10, 0), Checkin::new(1, 20, 10)]
            .into_iter()
            .collect();

        // a tensor that lost track of the training events
        let tensor = InteractionTensor::new(2);

        let pool = WorkerPool::new(1);
        let trainer = RankTrainer::new(
            &store,
            &affinities,
            &data,
            Some((&bucketizer, &tensor)),
            params(),
        )?;

        let err = trainer.run_iteration(0, &pool).unwrap_err();
        let kind = err.downcast_ref::<ErrorKind>().unwrap();

        assert_eq!(kind, &ErrorKind::ZeroPositiveCount(1, 10));
        assert_eq!(kind.category(), ErrorCategory::DataConsistency);

        Ok(())
    }

    #[test]
    fn context_pass_updates_bucket_factors() -> Result<(), Error> {
        let users = IdMapping::from_ids(vec![1]);
        let items = IdMapping::from_ids(vec![10, 20]);
        let store = LatentFactorStore::for_mode(Mode::ContextAware, users.clone(), items.clone(), 2, 2);
        store.set_row(Factor::L2, 1, &[1.0, 0.0])?;

        let affinities = Affinities {
            geo: Some(CsrMatrix::from_rows(vec![vec![(1, 1.0)], vec![(0, 1.0)]], 2)?),
            climate: None,
            diffusion: Some(CsrMatrix::from_rows(vec![vec![(1, 1.0)], vec![(0, 1.0)]], 2)?),
        };

        let mut weather = WeatherSeries::new(10);
        weather.insert(0, 1.0);
        weather.insert(10, 2.0);
        let bucketizer = ContextBucketizer::fit(&weather, vec![0, 1, 10], 2)?;

        // item 10 visited twice in bucket 0, item 20 once in bucket 1
        let data: TimedCheckins = vec![
            Checkin::new(1, 10, 0),
            Checkin::new(1, 10, 1),
            Checkin::new(1, 20, 10),
        ]
        .into_iter()
        .collect();
        let tensor = InteractionTensor::build(&data, &users, &items, &bucketizer)?;

        let pool = WorkerPool::new(1);
        let trainer = RankTrainer::new(
            &store,
            &affinities,
            &data,
            Some((&bucketizer, &tensor)),
            params(),
        )?;

        let stats = trainer.run_iteration(0, &pool)?;
        assert_eq!(stats.context_updates, 1);

        // F[0] moved away from L2[20] - L2[10]
        let step = 0.1 * harmonic(2) * delta(0.0, 0.0, 0.3);
        let f = store.get_row(Factor::F, 0)?;
        assert_approx_eq!(f[0], -step);
        assert_approx_eq!(f[1], 0.0);
        assert_eq!(store.get_row(Factor::F, 1)?, vec![0.0, 0.0]);
        assert!(euclidean_norm(&f) <= 0.2 + 1e-9);

        // the negative's L2 row was rewritten, then pulled onto the beta · C ball
        let l2 = store.get_row(Factor::L2, 1)?;
        assert_approx_eq!(l2[0], 0.2);
        assert_approx_eq!(l2[1], 0.0);

        for item in 0..2 {
            assert!(euclidean_norm(&store.get_row(Factor::L2, item)?) <= 0.2 + 1e-9);
            assert!(euclidean_norm(&store.get_row(Factor::L3, item)?) <= 0.2 + 1e-9);
        }

        Ok(())
    }

    #[test]
    fn context_models_require_buckets() -> Result<(), Error> {
        let store = LatentFactorStore::for_mode(
            Mode::ContextAware,
            IdMapping::from_ids(vec![1]),
            IdMapping::from_ids(vec![10]),
            2,
            2,
        );
        let data: TimedCheckins = vec![Checkin::new(1, 10, 0)].into_iter().collect();
        let affinities = Affinities::default();
        let pool = WorkerPool::new(1);

        assert!(RankTrainer::new(&store, &affinities, &data, None, params()).is_err());
        Ok(())
    }
}
