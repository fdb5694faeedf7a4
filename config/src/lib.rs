// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use anyhow::{anyhow, Error};
use serde::Deserialize;
use std::path::Path;

/// Which score terms a model carries.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// `L1·U1` only
    Basic,
    /// Adds the geographic neighbourhood term `sumGeo·U2`
    Geo,
    /// Geo plus the context bucket terms `F·L2 + sumWeather·L3`
    Context,
}

impl Default for ModelMode {
    fn default() -> Self {
        Self::Geo
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub mode: ModelMode,
    pub weather_aware: bool,
    pub dimensions: usize,
    pub neighbours: usize,
    pub strict_neighbours: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mode: ModelMode::Geo,
            weather_aware: false,
            dimensions: 100,
            neighbours: 300,
            strict_neighbours: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_iter: usize,
    pub evaluation_at: usize,
    pub epsilon: f64,
    pub gamma: f64,
    pub context_gamma: f64,
    pub radius: f64,
    pub alpha: f64,
    pub beta: f64,
    pub mu: Option<f64>,
    pub init_mean: f64,
    pub init_stddev: f64,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
}

impl TrainingConfig {
    /// Radius factor of the bucket factor matrix, `beta` unless `mu` is set
    pub fn bucket_radius_factor(&self) -> f64 {
        self.mu.unwrap_or(self.beta)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            evaluation_at: 20,
            epsilon: 0.3,
            gamma: 0.0001,
            context_gamma: 0.00001,
            radius: 1.0,
            alpha: 0.2,
            beta: 0.2,
            mu: None,
            init_mean: 0.0,
            init_stddev: 0.01,
            seed: None,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    pub range_size: usize,
    pub resolution_secs: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            range_size: 10,
            resolution_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub top_n: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub min_item_checkins: usize,
    pub min_user_checkins: usize,
    pub train_ratio: f64,
    pub test_ratio: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            min_item_checkins: 20,
            min_user_checkins: 20,
            train_ratio: 0.7,
            test_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub context: ContextConfig,
    pub evaluation: EvaluationConfig,
    pub data: DataConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let parsed: Self = toml::from_str(&contents)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let model = &self.model;
        let training = &self.training;

        if model.dimensions == 0 {
            return Err(anyhow!("Configuration error: dimensions must be positive"));
        }

        if model.mode != ModelMode::Basic && model.neighbours == 0 {
            return Err(anyhow!("Configuration error: neighbours must be positive"));
        }

        if model.weather_aware && model.mode == ModelMode::Basic {
            return Err(anyhow!(
                "Configuration error: weather awareness needs geographic neighbourhoods"
            ));
        }

        if model.weather_aware && model.mode == ModelMode::Context {
            return Err(anyhow!(
                "Configuration error: weather_aware only applies to geo mode, context mode always runs its bucket pass"
            ));
        }

        if self.uses_context() && self.context.range_size < 2 {
            return Err(anyhow!("Configuration error: range_size must be at least 2"));
        }

        if self.context.resolution_secs <= 0 {
            return Err(anyhow!("Configuration error: resolution_secs must be positive"));
        }

        let positives = [
            ("radius", training.radius),
            ("alpha", training.alpha),
            ("beta", training.beta),
            ("mu", training.bucket_radius_factor()),
            ("gamma", training.gamma),
            ("context_gamma", training.context_gamma),
        ];

        for (name, value) in positives.iter() {
            if value.is_nan() || *value <= 0.0 {
                return Err(anyhow!("Configuration error: {} must be positive", name));
            }
        }

        if training.epsilon < 0.0 || training.init_stddev < 0.0 {
            return Err(anyhow!("Configuration error: epsilon and init_stddev can't be negative"));
        }

        if training.threads == Some(0) {
            return Err(anyhow!("Configuration error: threads must be positive"));
        }

        if self.evaluation.top_n == 0 {
            return Err(anyhow!("Configuration error: top_n must be positive"));
        }

        let data = &self.data;
        if data.train_ratio <= 0.0 || data.test_ratio < 0.0 || data.train_ratio + data.test_ratio > 1.0 {
            return Err(anyhow!("Configuration error: invalid split ratios"));
        }

        Ok(())
    }

    /// Whether the model needs context buckets at all
    pub fn uses_context(&self) -> bool {
        self.model.mode == ModelMode::Context || self.model.weather_aware
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Error;

    #[test]
    fn load_example_config() -> Result<(), Error> {
        let expected = Config {
            model: ModelConfig {
                mode: ModelMode::Context,
                weather_aware: false,
                dimensions: 100,
                neighbours: 300,
                strict_neighbours: false,
            },
            training: TrainingConfig {
                max_iter: 1000,
                evaluation_at: 20,
                epsilon: 0.3,
                gamma: 0.0001,
                context_gamma: 0.00001,
                radius: 1.0,
                alpha: 0.2,
                beta: 0.2,
                mu: Some(0.1),
                init_mean: 0.0,
                init_stddev: 0.01,
                seed: Some(42),
                threads: None,
            },
            context: ContextConfig {
                range_size: 10,
                resolution_secs: 3600,
            },
            evaluation: EvaluationConfig { top_n: 20 },
            data: DataConfig::default(),
        };

        let loaded = Config::load("example.toml")?;
        assert_eq!(expected, loaded);

        Ok(())
    }

    #[test]
    fn partial_config_uses_defaults() -> Result<(), Error> {
        let parsed: Config = toml::from_str("[model]\nmode = \"basic\"\n")?;

        assert_eq!(parsed.model.mode, ModelMode::Basic);
        assert_eq!(parsed.training, TrainingConfig::default());
        assert_eq!(parsed.context.range_size, 10);
        assert!(parsed.validate().is_ok());

        Ok(())
    }

    #[test]
    fn mu_defaults_to_beta() {
        let mut training = TrainingConfig::default();
        assert_eq!(training.bucket_radius_factor(), training.beta);

        training.mu = Some(0.5);
        assert_eq!(training.bucket_radius_factor(), 0.5);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.model.neighbours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.mode = ModelMode::Basic;
        config.model.weather_aware = true;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.mode = ModelMode::Context;
        config.model.weather_aware = true;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.mode = ModelMode::Context;
        config.context.range_size = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.gamma = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.train_ratio = 0.9;
        config.data.test_ratio = 0.2;
        assert!(config.validate().is_err());
    }
}
