// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use config::{ModelConfig, ModelMode};
use std::fmt;

/// The factor matrices a model may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    U1,
    U2,
    U3,
    L1,
    L2,
    L3,
    F,
}

impl Factor {
    pub const ALL: [Factor; 7] = [
        Factor::U1,
        Factor::U2,
        Factor::U3,
        Factor::L1,
        Factor::L2,
        Factor::L3,
        Factor::F,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Factor::U1 => "U1",
            Factor::U2 => "U2",
            Factor::U3 => "U3",
            Factor::L1 => "L1",
            Factor::L2 => "L2",
            Factor::L3 => "L3",
            Factor::F => "F",
        }
    }

    pub fn is_user(self) -> bool {
        matches!(self, Factor::U1 | Factor::U2 | Factor::U3)
    }

    pub fn is_item(self) -> bool {
        matches!(self, Factor::L1 | Factor::L2 | Factor::L3)
    }
}

/// Score terms carried by a model.
///
/// * `Basic`: `L1[l]·U1[u]`
/// * `GeoAware`: adds `sumGeo[l]·U2[u]`, plus `sumWeather[l]·U3[u]` when
///   `weather` is set
/// * `ContextAware`: geo terms plus `F[t]·L2[l] + sumWeather[t]·L3[l]` when
///   scoring at a bucket `t`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Basic,
    GeoAware { weather: bool },
    ContextAware,
}

impl Mode {
    pub fn from_config(model: &ModelConfig) -> Self {
        match model.mode {
            ModelMode::Basic => Mode::Basic,
            ModelMode::Geo => Mode::GeoAware {
                weather: model.weather_aware,
            },
            ModelMode::Context => Mode::ContextAware,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Basic => "basic",
            Mode::GeoAware { weather: false } => "geo",
            Mode::GeoAware { weather: true } => "geo+weather",
            Mode::ContextAware => "context",
        }
    }

    pub fn uses_geo(self) -> bool {
        !matches!(self, Mode::Basic)
    }

    pub fn uses_item_weather(self) -> bool {
        matches!(self, Mode::GeoAware { weather: true })
    }

    pub fn uses_context(self) -> bool {
        matches!(self, Mode::ContextAware)
    }

    /// Whether check-in times have to be mapped into context buckets
    pub fn uses_buckets(self) -> bool {
        self.uses_item_weather() || self.uses_context()
    }

    pub fn carries(self, factor: Factor) -> bool {
        match factor {
            Factor::U1 | Factor::L1 => true,
            Factor::U2 => self.uses_geo(),
            Factor::U3 => self.uses_item_weather(),
            Factor::L2 | Factor::L3 | Factor::F => self.uses_context(),
        }
    }

    pub fn factors(self) -> Vec<Factor> {
        Factor::ALL
            .iter()
            .copied()
            .filter(|&factor| self.carries(factor))
            .collect()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_per_mode() {
        use Factor::*;

        assert_eq!(Mode::Basic.factors(), vec![U1, L1]);
        assert_eq!(Mode::GeoAware { weather: false }.factors(), vec![U1, U2, L1]);
        assert_eq!(Mode::GeoAware { weather: true }.factors(), vec![U1, U2, U3, L1]);
        assert_eq!(Mode::ContextAware.factors(), vec![U1, U2, L1, L2, L3, F]);
    }

    #[test]
    fn from_config_flags() {
        let mut model = ModelConfig::default();
        model.weather_aware = true;
        assert_eq!(Mode::from_config(&model), Mode::GeoAware { weather: true });

        model.mode = ModelMode::Context;
        assert_eq!(Mode::from_config(&model), Mode::ContextAware);
        assert!(Mode::ContextAware.uses_buckets());
        assert!(!Mode::Basic.uses_geo());
    }
}
