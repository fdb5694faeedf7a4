// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

pub mod metrics;

pub use metrics::{Measure, MeasureValues};

use crate::{parallel::WorkerPool, scorer::ScoredItem};
use anyhow::Error;
use controller::{CheckinDataset, ItemId, Timestamp, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Anything able to rank candidate items for a user
pub trait Recommender: Sync {
    /// The `n` best candidates for `user`, best first
    fn recommend(&self, user: UserId, n: usize, candidates: &[ItemId]) -> Result<Vec<ScoredItem>, Error>;

    /// Like `recommend`, in the context of `time`
    fn recommend_at(
        &self,
        user: UserId,
        _time: Timestamp,
        n: usize,
        candidates: &[ItemId],
    ) -> Result<Vec<ScoredItem>, Error> {
        self.recommend(user, n, candidates)
    }

    fn is_time_aware(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    AlreadyKnown,
    NoCandidates,
    UnknownUser,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Skipped(Skip),
    Scored(UserId, MeasureValues),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationReport {
    pub values: MeasureValues,
    pub num_users: usize,
    pub num_candidates: usize,
    pub num_events: usize,
    pub skipped_known: usize,
    pub skipped_no_candidates: usize,
    pub skipped_unknown_user: usize,
}

impl EvaluationReport {
    pub fn get(&self, measure: Measure) -> f64 {
        self.values.get(measure)
    }

    /// Headline values keyed by measure name
    pub fn measures(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|(measure, value)| (measure.name().to_string(), value))
            .collect()
    }

    /// Event and user counters keyed by name
    pub fn counters(&self) -> BTreeMap<String, usize> {
        let mut counters = BTreeMap::new();
        counters.insert("users".to_string(), self.num_users);
        counters.insert("candidates".to_string(), self.num_candidates);
        counters.insert("events".to_string(), self.num_events);
        counters.insert("skipped (known)".to_string(), self.skipped_known);
        counters.insert("skipped (no candidates)".to_string(), self.skipped_no_candidates);
        counters.insert("skipped (unknown user)".to_string(), self.skipped_unknown_user);
        counters
    }
}

/// Leave-one-event-out ranking evaluation over a held-out split
pub struct Evaluator {
    top_n: usize,
}

impl Evaluator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Scores every test event against `candidates = test items ∩ training
    /// items`, skipping events the user already saw in training
    pub fn evaluate<R, D>(
        &self,
        recommender: &R,
        test: &D,
        training: &D,
        pool: &WorkerPool,
    ) -> Result<EvaluationReport, Error>
    where
        R: Recommender,
        D: CheckinDataset,
    {
        let training_items: HashSet<ItemId> = training.all_items().iter().copied().collect();
        let candidates: Vec<ItemId> = test
            .all_items()
            .iter()
            .copied()
            .filter(|item| training_items.contains(item))
            .collect();
        let candidate_set: HashSet<ItemId> = candidates.iter().copied().collect();

        let training_checkins = training.checkins();
        let known: HashMap<UserId, HashSet<ItemId>> = training
            .events_by_user()
            .iter()
            .map(|(&user, positions)| {
                let items = positions.iter().map(|&pos| training_checkins[pos].item).collect();
                (user, items)
            })
            .collect();

        let events = test.checkins();
        let time_aware = recommender.is_time_aware();

        let outcomes = pool.map(events.len(), |index| -> Result<Outcome, Error> {
            let event = &events[index];

            let seen = match known.get(&event.user) {
                Some(seen) => seen,
                None => return Ok(Outcome::Skipped(Skip::UnknownUser)),
            };

            if seen.contains(&event.item) {
                return Ok(Outcome::Skipped(Skip::AlreadyKnown));
            }

            if !candidate_set.contains(&event.item) {
                return Ok(Outcome::Skipped(Skip::NoCandidates));
            }

            let recommended = if time_aware {
                recommender.recommend_at(event.user, event.time, self.top_n, &candidates)?
            } else {
                recommender.recommend(event.user, self.top_n, &candidates)?
            };

            let ranked: Vec<ItemId> = recommended.iter().map(|scored| scored.item).collect();
            let correct: HashSet<ItemId> = std::iter::once(event.item).collect();

            Ok(Outcome::Scored(event.user, MeasureValues::compute(&ranked, &correct)))
        });

        let mut report = EvaluationReport {
            num_candidates: candidates.len(),
            num_events: events.len(),
            ..Default::default()
        };

        let mut per_user: BTreeMap<UserId, MeasureValues> = BTreeMap::new();
        for outcome in outcomes {
            match outcome? {
                Outcome::Skipped(Skip::AlreadyKnown) => report.skipped_known += 1,
                Outcome::Skipped(Skip::NoCandidates) => report.skipped_no_candidates += 1,
                Outcome::Skipped(Skip::UnknownUser) => report.skipped_unknown_user += 1,
                Outcome::Scored(user, values) => match per_user.get_mut(&user) {
                    Some(acc) => acc.halve_with(&values),
                    None => {
                        per_user.insert(user, values);
                    }
                },
            }
        }

        for (user, values) in &per_user {
            log::debug!("User id({}): {:?}", user, values);
            report.values.add(values);
        }

        report.num_users = per_user.len();
        if report.num_users > 0 {
            report.values.scale(1.0 / report.num_users as f64);
        }

        log::info!(
            "Evaluated {} users over {} candidates, prec@5 = {:.4}, skipped {} known, {} without candidates, {} unknown users",
            report.num_users,
            report.num_candidates,
            report.get(Measure::PrecisionAt5),
            report.skipped_known,
            report.skipped_no_candidates,
            report.skipped_unknown_user
        );

        Ok(report)
    }
}
