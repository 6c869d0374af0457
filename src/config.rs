use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cache::CacheConfig;
use crate::error::{ForecastError, Result};
use crate::market_data::MarketDataConfig;
use crate::models::forecast_network::ModelConfig;
use crate::training::TrainingConfig;

/// Ten years of calendar days
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// actix worker threads; actix picks one per core when absent
    pub workers: Option<usize>,
    /// Value of `Access-Control-Allow-Origin` on every response
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
            allowed_origin: "*".to_string(),
        }
    }
}

/// Limits on the requested horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub default_days: usize,
    pub max_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            default_days: 3,
            max_days: 30,
        }
    }
}

/// Complete service configuration, usually read from a TOML file.
///
/// Every section and field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub market_data: MarketDataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
    pub cache: CacheConfig,
}

impl ServiceConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ForecastError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> { Err(ForecastError::Config(message.to_string())) };

        if self.model.look_back == 0 {
            return invalid("model.look_back must be at least 1");
        }
        if self.model.hidden_sizes.is_empty() || self.model.hidden_sizes.contains(&0) {
            return invalid("model.hidden_sizes must list at least one non-zero layer size");
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return invalid("model.dropout must be in [0, 1)");
        }
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            return invalid("training.test_fraction must be in (0, 1)");
        }
        if !(0.0..1.0).contains(&self.training.validation_split) {
            return invalid("training.validation_split must be in [0, 1)");
        }
        if self.training.learning_rate <= 0.0 || !self.training.learning_rate.is_finite() {
            return invalid("training.learning_rate must be positive");
        }
        if self.training.batch_size == 0 {
            return invalid("training.batch_size must be at least 1");
        }
        if self.training.min_samples == 0 {
            return invalid("training.min_samples must be at least 1");
        }
        if self.forecast.max_days == 0 {
            return invalid("forecast.max_days must be at least 1");
        }
        if self.forecast.default_days == 0 || self.forecast.default_days > self.forecast.max_days {
            return invalid("forecast.default_days must be in 1..=max_days");
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.market_data.lookback_days) {
            return invalid("market_data.lookback_days must be in 1..=3650");
        }
        Ok(())
    }
}
