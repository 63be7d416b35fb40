//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Tunables for set resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the deterministic RNG.
    pub rng_seed: u64,
    /// Half-width of the day-of-match form factor, in [0, 1).
    pub condition_noise: f64,
    pub base_duration_minutes: u32,
    /// Durations fall in `[base, base + spread)`.
    pub duration_spread_minutes: u32,
    /// Neutral dice: no form noise, stronger side always wins.
    pub deterministic: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rng_seed: 42,
            condition_noise: 0.10,
            base_duration_minutes: 25,
            duration_spread_minutes: 20,
            deterministic: false,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("condition noise must be within [0, 1), got {0}")]
    InvalidNoise(f64),
    #[error("duration spread must be > 0")]
    ZeroDurationSpread,
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.condition_noise.is_finite() || !(0.0..1.0).contains(&self.condition_noise) {
            return Err(ConfigError::InvalidNoise(self.condition_noise));
        }
        if self.duration_spread_minutes == 0 {
            return Err(ConfigError::ZeroDurationSpread);
        }
        Ok(())
    }

    /// Parse and validate YAML; missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
