use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pulse::PulseShape;

pub const DEFAULT_TARGET_BPM: f64 = 130.0;

/// Inclusive `[min, max]` band. Serialized as a two element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band(pub f64, pub f64);

impl Band {
    pub fn min(&self) -> f64 {
        self.0.min(self.1)
    }

    pub fn max(&self) -> f64 {
        self.0.max(self.1)
    }

    /// Clamps `value` into the band. Never panics: inverted bounds are
    /// swapped and a NaN value lands on the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min()).min(self.max())
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min() && value <= self.max()
    }

    fn is_valid(&self) -> bool {
        self.0.is_finite() && self.1.is_finite() && self.0 > 0.0 && self.0 <= self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Beat pulse, section energy, build-up and segment punch.
    #[default]
    TrapNation,
    /// Confidence and loudness multipliers with a coarse beat position step.
    Simple,
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trap-nation" => Ok(Strategy::TrapNation),
            "simple" => Ok(Strategy::Simple),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("target base bpm must be a positive number, got {0}")]
    TargetBpm(f64),
    #[error("{name} must satisfy 0 < min <= max, got [{min}, {max}]")]
    Band { name: &'static str, min: f64, max: f64 },
    #[error("{name} must be a finite non-negative number, got {value}")]
    Value { name: &'static str, value: f64 },
    #[error("pulse phases must satisfy 0 < attack_end < decay_end < 1, got {attack_end} and {decay_end}")]
    PulseShape { attack_end: f64, decay_end: f64 },
    #[error("unknown strategy {0:?}, expected \"trap-nation\" or \"simple\"")]
    UnknownStrategy(String),
}

/// Tunables for the rate engine. Missing keys fall back to the defaults
/// when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub target_base_bpm: f64,
    pub strategy: Strategy,
    /// Rate before the first beat.
    pub intro_rate: f64,
    /// After the last beat the rate is `0.5 + confidence * outro_gain`.
    pub outro_gain: f64,
    pub tempo_ratio_range: Band,
    /// Final clamp of the trap-nation strategy.
    pub output_range: Band,
    /// Final clamp of the simple strategy.
    pub simple_output_range: Band,
    pub pulse: PulseShape,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            target_base_bpm: DEFAULT_TARGET_BPM,
            strategy: Strategy::default(),
            intro_rate: 0.4,
            outro_gain: 0.5,
            tempo_ratio_range: Band(0.6, 1.4),
            output_range: Band(0.4, 2.5),
            simple_output_range: Band(0.3, 3.0),
            pulse: PulseShape::default(),
        }
    }
}

impl RateConfig {
    /// Target bpm used for the tempo ratio, falling back to the default
    /// when the configured one is unusable.
    pub fn target_bpm(&self) -> f64 {
        if self.target_base_bpm.is_finite() && self.target_base_bpm > 0.0 {
            self.target_base_bpm
        } else {
            DEFAULT_TARGET_BPM
        }
    }

    /// Output band of the configured strategy.
    pub fn active_output_range(&self) -> Band {
        match self.strategy {
            Strategy::TrapNation => self.output_range,
            Strategy::Simple => self.simple_output_range,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_base_bpm.is_finite() && self.target_base_bpm > 0.0) {
            return Err(ConfigError::TargetBpm(self.target_base_bpm));
        }

        for (name, value) in [("intro_rate", self.intro_rate), ("outro_gain", self.outro_gain)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Value { name, value });
            }
        }

        for (name, band) in [
            ("tempo_ratio_range", self.tempo_ratio_range),
            ("output_range", self.output_range),
            ("simple_output_range", self.simple_output_range),
        ] {
            if !band.is_valid() {
                return Err(ConfigError::Band {
                    name,
                    min: band.0,
                    max: band.1,
                });
            }
        }

        let PulseShape {
            attack_end,
            decay_end,
        } = self.pulse;
        if !(attack_end > 0.0 && attack_end < decay_end && decay_end < 1.0) {
            return Err(ConfigError::PulseShape {
                attack_end,
                decay_end,
            });
        }

        Ok(())
    }
}
