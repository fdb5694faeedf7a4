// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use crate::{
    context::ContextBucketizer,
    error::ErrorKind,
    evaluation::Recommender,
    factors::LatentFactorStore,
    mode::Mode,
    parallel::WorkerPool,
    scorer::{Affinities, NeighbourSums, ScoredItem, Scorer},
};
use anyhow::Error;
use controller::{ItemId, Timestamp, UserId};

/// Scoring over external ids on top of a factor state
#[derive(Clone, Copy)]
pub struct Predictor<'a> {
    scorer: Scorer<'a>,
    bucketizer: Option<&'a ContextBucketizer>,
}

impl<'a> Predictor<'a> {
    pub fn new(scorer: Scorer<'a>, bucketizer: Option<&'a ContextBucketizer>) -> Self {
        Self { scorer, bucketizer }
    }

    fn mode(&self) -> Mode {
        self.scorer.store().mode()
    }

    fn bucket_at(&self, time: Timestamp) -> Result<Option<usize>, Error> {
        if !self.mode().uses_context() {
            return Ok(None);
        }

        match self.bucketizer {
            Some(bucketizer) => bucketizer.bucket_at(time).map(Some),
            None => Err(ErrorKind::InvalidConfiguration(
                "context model without a bucketizer can't resolve times".into(),
            )
            .into()),
        }
    }

    pub fn predict(&self, user: UserId, item: ItemId) -> Result<f64, Error> {
        let store = self.scorer.store();
        self.scorer.score(store.user_index(user)?, store.item_index(item)?)
    }

    /// Context-aware models score at the bucket of `time`, the rest ignore it
    pub fn predict_at(&self, user: UserId, item: ItemId, time: Timestamp) -> Result<f64, Error> {
        let store = self.scorer.store();
        let (user, item) = (store.user_index(user)?, store.item_index(item)?);

        match self.bucket_at(time)? {
            Some(bucket) => self.scorer.score_at(user, item, bucket),
            None => self.scorer.score(user, item),
        }
    }
}

impl<'a> Recommender for Predictor<'a> {
    fn recommend(&self, user: UserId, n: usize, candidates: &[ItemId]) -> Result<Vec<ScoredItem>, Error> {
        let user = self.scorer.store().user_index(user)?;
        let scorer = self.scorer;

        scorer.top_n(n, candidates.iter().copied(), |item| scorer.score(user, item))
    }

    fn recommend_at(
        &self,
        user: UserId,
        time: Timestamp,
        n: usize,
        candidates: &[ItemId],
    ) -> Result<Vec<ScoredItem>, Error> {
        let bucket = match self.bucket_at(time)? {
            Some(bucket) => bucket,
            None => return self.recommend(user, n, candidates),
        };

        let user = self.scorer.store().user_index(user)?;
        let scorer = self.scorer;

        scorer.top_n(n, candidates.iter().copied(), |item| {
            scorer.score_at(user, item, bucket)
        })
    }

    fn is_time_aware(&self) -> bool {
        self.mode().uses_context()
    }
}

/// Trained factors together with everything needed to score with them
#[derive(Debug, Clone)]
pub struct TrainedModel {
    store: LatentFactorStore,
    affinities: Affinities,
    sums: NeighbourSums,
    bucketizer: Option<ContextBucketizer>,
}

impl TrainedModel {
    /// Computes the neighbour sums of the final factor state
    pub fn new(
        store: LatentFactorStore,
        affinities: Affinities,
        bucketizer: Option<ContextBucketizer>,
        pool: &WorkerPool,
    ) -> Result<Self, Error> {
        let sums = NeighbourSums::compute(&store, &affinities, pool)?;

        Ok(Self {
            store,
            affinities,
            sums,
            bucketizer,
        })
    }

    pub fn store(&self) -> &LatentFactorStore {
        &self.store
    }

    pub fn affinities(&self) -> &Affinities {
        &self.affinities
    }

    pub fn bucketizer(&self) -> Option<&ContextBucketizer> {
        self.bucketizer.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.store.mode()
    }

    pub fn predictor(&self) -> Predictor<'_> {
        Predictor::new(Scorer::new(&self.store, &self.sums), self.bucketizer.as_ref())
    }

    pub fn predict(&self, user: UserId, item: ItemId) -> Result<f64, Error> {
        self.predictor().predict(user, item)
    }

    pub fn predict_at(&self, user: UserId, item: ItemId, time: Timestamp) -> Result<f64, Error> {
        self.predictor().predict_at(user, item, time)
    }
}

impl Recommender for TrainedModel {
    fn recommend(&self, user: UserId, n: usize, candidates: &[ItemId]) -> Result<Vec<ScoredItem>, Error> {
        self.predictor().recommend(user, n, candidates)
    }

    fn recommend_at(
        &self,
        user: UserId,
        time: Timestamp,
        n: usize,
        candidates: &[ItemId],
    ) -> Result<Vec<ScoredItem>, Error> {
        self.predictor().recommend_at(user, time, n, candidates)
    }

    fn is_time_aware(&self) -> bool {
        self.mode().uses_context()
    }
}
