// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

pub mod context;
pub mod error;
pub mod evaluation;
pub mod factors;
pub mod geo;
pub mod mode;
pub mod model;
pub mod parallel;
pub mod scorer;
pub mod sparse;
pub mod trainer;
pub mod utils;

pub use evaluation::{EvaluationReport, Evaluator, Measure, Recommender};
pub use factors::{IdMapping, LatentFactorStore, NormalInit};
pub use mode::{Factor, Mode};
pub use model::{Predictor, TrainedModel};
pub use scorer::ScoredItem;
pub use trainer::IterationStats;

use crate::{
    context::{climate_matrix, diffusion_matrix, ContextBucketizer, InteractionTensor},
    error::ErrorKind,
    geo::GeoAffinityIndex,
    parallel::WorkerPool,
    scorer::{Affinities, NeighbourSums, Scorer},
    trainer::{RankTrainer, TrainingParams},
};
use anyhow::Error;
use config::Config;
use controller::{CheckinDataset, GeoCoordinateProvider, WeatherFeatureProvider};

/// Reports taken while training
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSnapshot {
    pub iteration: usize,
    pub validation: EvaluationReport,
    pub test: EvaluationReport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub iterations: Vec<IterationStats>,
    pub evaluations: Vec<EvaluationSnapshot>,
    /// Items left without a geo affinity row
    pub excluded_items: Vec<controller::ItemId>,
}

pub struct Engine {
    config: Config,
    pool: WorkerPool,
}

impl Engine {
    pub fn with_config(config: Config) -> Self {
        let pool = WorkerPool::with_threads(config.training.threads);
        Self { config, pool }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        Mode::from_config(&self.config.model)
    }

    /// Store over the users and items of the training split, initialised
    /// from the configured normal distribution
    pub fn initial_store<D>(&self, training: &D) -> Result<LatentFactorStore, Error>
    where
        D: CheckinDataset,
    {
        let users = IdMapping::from_ids(training.all_users().iter().copied());
        let items = IdMapping::from_ids(training.all_items().iter().copied());
        let store = LatentFactorStore::for_mode(
            self.mode(),
            users,
            items,
            self.config.model.dimensions,
            self.config.context.range_size,
        );

        let training_config = &self.config.training;
        let mut init = NormalInit::new(
            training_config.init_mean,
            training_config.init_stddev,
            training_config.seed,
        )?;
        store.init_normal(&mut init);

        Ok(store)
    }

    /// Builds the neighbourhood graphs, then runs the rank trainer over
    /// `training`, evaluating against `validation` and `test` periodically
    pub fn train<D, G, W>(
        &self,
        training: &D,
        validation: &D,
        test: &D,
        store: LatentFactorStore,
        coords: &G,
        weather: Option<&W>,
    ) -> Result<(TrainedModel, TrainingSummary), Error>
    where
        D: CheckinDataset,
        G: GeoCoordinateProvider,
        W: WeatherFeatureProvider,
    {
        store.check_dimensions()?;
        let mode = store.mode();
        let model_config = &self.config.model;

        log::info!("Preparing {} model", mode);

        let mut summary = TrainingSummary::default();
        let mut affinities = Affinities::default();

        let geo = if mode.uses_geo() {
            let index = GeoAffinityIndex::build(
                store.items(),
                coords,
                model_config.neighbours,
                model_config.strict_neighbours,
                &self.pool,
            )?;
            summary.excluded_items = index.excluded().to_vec();
            affinities.geo = Some(index.affinity().clone());
            Some(index)
        } else {
            None
        };

        let buckets = if mode.uses_buckets() {
            let weather = weather.ok_or_else(|| {
                ErrorKind::InvalidConfiguration(format!("{} model needs weather samples", mode))
            })?;

            let times = training
                .checkins()
                .iter()
                .chain(validation.checkins())
                .chain(test.checkins())
                .map(|checkin| checkin.time);

            let bucketizer = ContextBucketizer::fit(weather, times, self.config.context.range_size)?;
            let tensor = InteractionTensor::build(training, store.users(), store.items(), &bucketizer)?;

            if mode.uses_item_weather() {
                let geo = geo.as_ref().ok_or(ErrorKind::MissingAffinity(0))?;
                affinities.climate = Some(climate_matrix(&tensor, geo, store.items().len())?);
            }

            if mode.uses_context() {
                affinities.diffusion = Some(diffusion_matrix(&tensor)?);
            }

            Some((bucketizer, tensor))
        } else {
            None
        };

        let evaluator = Evaluator::new(self.config.evaluation.top_n);
        let params = TrainingParams::from_config(&self.config.training);

        {
            let context = if mode.uses_context() {
                buckets.as_ref().map(|(bucketizer, tensor)| (bucketizer, tensor))
            } else {
                None
            };
            let bucketizer = buckets.as_ref().map(|(bucketizer, _)| bucketizer);

            let trainer = RankTrainer::new(&store, &affinities, training, context, params)?;
            let evaluations = &mut summary.evaluations;

            summary.iterations = trainer.train(&self.pool, |iteration| {
                let sums = NeighbourSums::compute(&store, &affinities, &self.pool)?;
                let predictor = Predictor::new(Scorer::new(&store, &sums), bucketizer);

                let validation = evaluator.evaluate(&predictor, validation, training, &self.pool)?;
                let test = evaluator.evaluate(&predictor, test, training, &self.pool)?;

                log::info!(
                    "Iteration {}: validation prec@5 = {:.4}, test prec@5 = {:.4}",
                    iteration,
                    validation.get(Measure::PrecisionAt5),
                    test.get(Measure::PrecisionAt5)
                );

                evaluations.push(EvaluationSnapshot {
                    iteration,
                    validation,
                    test,
                });

                Ok(())
            })?;
        }

        let bucketizer = buckets.map(|(bucketizer, _)| bucketizer);
        let model = TrainedModel::new(store, affinities, bucketizer, &self.pool)?;

        Ok((model, summary))
    }

    /// Evaluates `model` over `test`, `training` being the split it was
    /// trained on
    pub fn evaluate<R, D>(&self, model: &R, test: &D, training: &D) -> Result<EvaluationReport, Error>
    where
        R: Recommender,
        D: CheckinDataset,
    {
        Evaluator::new(self.config.evaluation.top_n).evaluate(model, test, training, &self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ModelMode;
    use controller::{Checkin, CoordinateTable, TimedCheckins, WeatherSeries};

    fn test_config(mode: ModelMode) -> Config {
        let mut config = Config::default();
        config.model.mode = mode;
        config.model.dimensions = 4;
        config.model.neighbours = 2;
        config.training.max_iter = 4;
        config.training.evaluation_at = 2;
        config.training.gamma = 0.05;
        config.training.context_gamma = 0.05;
        config.training.seed = Some(17);
        config.training.threads = Some(2);
        config.context.range_size = 3;
        config.evaluation.top_n = 3;
        config
    }

    fn coords() -> CoordinateTable {
        (0..5).map(|i| (100 + i, 0.0, i as f64)).collect()
    }

    fn weather() -> WeatherSeries {
        let mut series = WeatherSeries::new(1);
        for t in 0..40 {
            series.insert(t, (t % 7) as f64);
        }

        series
    }

    fn splits() -> (TimedCheckins, TimedCheckins, TimedCheckins) {
        let mut training = TimedCheckins::new();
        let mut t = 0;
        for user in 1..=3 {
            for item in 100..104 {
                if (user + item) % 3 != 0 {
                    training.push(Checkin::new(user, item, t));
                    t += 1;
                }
            }
        }

        let validation = vec![Checkin::new(1, 104, 30), Checkin::new(2, 104, 31)].into_iter().collect();
        let test = vec![
            Checkin::new(3, 104, 32),
            Checkin::new(1, 100, 33),
            Checkin::new(3, 102, 34),
        ]
        .into_iter()
        .collect();

        (training, validation, test)
    }

    fn train(mode: ModelMode) -> Result<(Engine, TrainedModel, TrainingSummary), Error> {
        let engine = Engine::with_config(test_config(mode));
        let (training, validation, test) = splits();
        let store = engine.initial_store(&training)?;

        let (model, summary) =
            engine.train(&training, &validation, &test, store, &coords(), Some(&weather()))?;

        Ok((engine, model, summary))
    }

    #[test]
    fn trains_every_mode() -> Result<(), Error> {
        for mode in vec![ModelMode::Basic, ModelMode::Geo, ModelMode::Context] {
            let (_, model, summary) = train(mode)?;

            assert_eq!(summary.iterations.len(), 4);
            assert_eq!(
                summary.evaluations.iter().map(|s| s.iteration).collect::<Vec<_>>(),
                vec![2, 3]
            );
            assert!(model.predict(1, 101)?.is_finite());
            assert_eq!(model.store().users().len(), 3);
        }

        Ok(())
    }

    #[test]
    fn weather_aware_geo_model_carries_climate() -> Result<(), Error> {
        let mut config = test_config(ModelMode::Geo);
        config.model.weather_aware = true;

        let engine = Engine::with_config(config);
        let (training, validation, test) = splits();
        let store = engine.initial_store(&training)?;
        let (model, _) = engine.train(&training, &validation, &test, store, &coords(), Some(&weather()))?;

        assert_eq!(model.mode(), Mode::GeoAware { weather: true });
        assert!(model.affinities().climate.is_some());
        assert!(model.store().matrix(Factor::U3).is_ok());

        Ok(())
    }

    #[test]
    fn final_evaluation_is_repeatable() -> Result<(), Error> {
        let (engine, model, _) = train(ModelMode::Context)?;
        let (training, _, test) = splits();

        let first = engine.evaluate(&model, &test, &training)?;
        let second = engine.evaluate(&model, &test, &training)?;

        assert_eq!(first, second);
        assert_eq!(first.skipped_known, 1);
        for (_, value) in first.values.iter() {
            assert!((0.0..=1.0).contains(&value));
        }

        Ok(())
    }

    #[test]
    fn context_mode_needs_weather() -> Result<(), Error> {
        let engine = Engine::with_config(test_config(ModelMode::Context));
        let (training, validation, test) = splits();
        let store = engine.initial_store(&training)?;

        let result = engine.train(&training, &validation, &test, store, &coords(), None::<&WeatherSeries>);
        assert!(result.is_err());

        Ok(())
    }
}
