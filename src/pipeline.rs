//! Request-scoped forecasting: validate → fetch → scale → window → train →
//! evaluate → forecast.

use chrono::{NaiveDate, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::{CacheKey, ModelCache, TrainedModel};
use crate::config::{ForecastConfig, ServiceConfig};
use crate::error::{ForecastError, Result};
use crate::forecast::forecast;
use crate::market_data::{fetch_price_series, MarketDataProvider, PricePoint, PriceSeries};
use crate::metrics::Evaluation;
use crate::models::forecast_network::ForecastNetwork;
use crate::scaler::MinMaxScaler;
use crate::training::create_trainer;
use crate::windows::Windows;

/// Body of `POST /prediction/` as sent by clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub symbol: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub days: Option<usize>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub symbol: String,
    pub reference_date: NaiveDate,
    pub days: usize,
}

impl ForecastRequest {
    /// Validates a client payload without touching the network.
    ///
    /// The symbol is trimmed and upper-cased, `start_date` must be
    /// `YYYY-MM-DD` (default `today`) and `days` must be in `1..=max_days`.
    pub fn from_payload(payload: &PredictionRequest, today: NaiveDate, limits: &ForecastConfig) -> Result<Self> {
        let symbol = payload.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ForecastError::InvalidRequest("symbol must not be empty".to_string()));
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        {
            return Err(ForecastError::InvalidRequest(format!("invalid symbol '{}'", symbol)));
        }

        let reference_date = match payload.start_date.as_deref().map(str::trim) {
            None | Some("") => today,
            Some(raw) => parse_date(raw)?,
        };

        let days = payload.days.unwrap_or(limits.default_days);
        if days == 0 || days > limits.max_days {
            return Err(ForecastError::InvalidRequest(format!(
                "days must be between 1 and {}",
                limits.max_days
            )));
        }

        Ok(ForecastRequest {
            symbol,
            reference_date,
            days,
        })
    }
}

/// Strict `YYYY-MM-DD`: four-digit year, no sign.
fn parse_date(raw: &str) -> Result<NaiveDate> {
    let invalid = || ForecastError::InvalidRequest("Invalid date format. Please use YYYY-MM-DD.".to_string());
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

/// Successful forecast, serialised as the HTTP response body.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub symbol: String,
    pub historical_data: Vec<PricePoint>,
    pub predicted_data: Vec<f64>,
    pub predicted_dates: Vec<NaiveDate>,
    /// `clamp(100 - MAPE, 0, 100)` on the held-out windows
    pub accuracy: f64,
    pub test_mse: f64,
    /// Whether the model came from the cache instead of a fresh training run
    pub cached: bool,
}

/// Runs forecasts against one market data provider.
///
/// Holds no per-request state; the optional model cache is the only thing
/// shared between requests.
pub struct ForecastPipeline {
    provider: Arc<dyn MarketDataProvider>,
    config: ServiceConfig,
    cache: Option<ModelCache>,
}

impl ForecastPipeline {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: ServiceConfig) -> Self {
        let cache = config.cache.enabled.then(|| ModelCache::new(&config.cache));
        ForecastPipeline {
            provider,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Validates `payload` against today's date and runs it.
    pub fn handle(&self, payload: &PredictionRequest) -> Result<ForecastReport> {
        let request = ForecastRequest::from_payload(payload, Utc::now().date_naive(), &self.config.forecast)?;
        self.run(&request)
    }

    pub fn run(&self, request: &ForecastRequest) -> Result<ForecastReport> {
        let series = fetch_price_series(
            self.provider.as_ref(),
            &request.symbol,
            request.reference_date,
            &self.config.market_data,
        )?;
        let closes = series.closes();

        let key = CacheKey::new(&request.symbol, &closes, &self.config.model, &self.config.training);
        let cached = self.cache.as_ref().and_then(|cache| cache.get(&key));
        let was_cached = cached.is_some();
        let mut model = match cached {
            Some(model) => {
                info!("Reusing cached model for {}", request.symbol);
                model
            }
            None => {
                let model = self.train_model(&series)?;
                if let Some(cache) = &self.cache {
                    cache.insert(key, model.clone());
                }
                model
            }
        };

        let scaled = model.scaler.transform(&closes);
        let last_date = series
            .last_date()
            .ok_or_else(|| ForecastError::InsufficientSamples { got: 0, required: 1 })?;
        let projection = forecast(
            &mut model.network,
            &model.scaler,
            scaled.as_slice().unwrap_or(&[]),
            self.config.model.look_back,
            request.days,
            last_date,
        )?;
        info!(
            "Predicted prices for the next {} days of {}: {:?}",
            request.days,
            request.symbol,
            projection.prices()
        );

        Ok(ForecastReport {
            symbol: request.symbol.clone(),
            historical_data: series.points().to_vec(),
            predicted_data: projection.prices(),
            predicted_dates: projection.dates(),
            accuracy: model.evaluation.accuracy,
            test_mse: model.evaluation.test_mse,
            cached: was_cached,
        })
    }

    /// Fits the scaler on the whole series, trains a fresh network on the
    /// chronologically earlier windows and evaluates it on the rest.
    pub fn train_model(&self, series: &PriceSeries) -> Result<TrainedModel> {
        let model_config = &self.config.model;
        let training_config = &self.config.training;

        let closes = series.closes();
        let scaler = MinMaxScaler::fit(&closes)?;
        let scaled = scaler.transform(&closes);
        let windows = Windows::build(scaled.view(), model_config.look_back, training_config.min_samples)?;
        info!(
            "Shape of X: {:?}, shape of y: {:?}",
            windows.inputs.shape(),
            windows.targets.shape()
        );

        let test_size = training_config.test_size(windows.len());
        let (train_all, test) = windows.split_at(windows.len() - test_size);
        let validation_size = training_config.validation_size(train_all.len());
        let (train, validation) = train_all.split_at(train_all.len() - validation_size);

        let mut rng = match training_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let network = ForecastNetwork::new(model_config, &mut rng);
        info!(
            "Built network with layers {:?} ({} parameters)",
            network.hidden_sizes(),
            network.num_parameters()
        );

        let mut trainer = create_trainer(network, training_config.clone());
        let validation = (!validation.is_empty()).then_some(&validation);
        trainer.train(&train, validation)?;

        let predicted = trainer.predict(&test);
        let actual = test.targets.to_vec();
        let evaluation = Evaluation::from_predictions(
            &actual,
            &predicted,
            &scaler.inverse_transform(&actual),
            &scaler.inverse_transform(&predicted),
        );
        if !evaluation.test_mse.is_finite() {
            return Err(ForecastError::TrainingFailure(
                "model produced non-finite test predictions".to_string(),
            ));
        }
        info!(
            "Model accuracy for {}: {:.2}% (MAPE {:.2}%, test MSE {:.6}, {} test windows)",
            series.symbol(),
            evaluation.accuracy,
            evaluation.mape,
            evaluation.test_mse,
            evaluation.test_samples
        );

        Ok(TrainedModel {
            network: trainer.into_network(),
            scaler,
            evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn payload(symbol: &str, start_date: Option<&str>, days: Option<usize>) -> PredictionRequest {
        PredictionRequest {
            symbol: symbol.to_string(),
            start_date: start_date.map(str::to_string),
            days,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let request = ForecastRequest::from_payload(&payload(" aapl ", None, None), today(), &ForecastConfig::default()).unwrap();
        assert_eq!(request.symbol, "AAPL");
        assert_eq!(request.reference_date, today());
        assert_eq!(request.days, 3);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let err = ForecastRequest::from_payload(&payload("AAPL", Some("2019/13/45"), None), today(), &ForecastConfig::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_out_of_calendar_dates_rejected() {
        let limits = ForecastConfig::default();
        for raw in ["-262143-01-05", "+10000-01-03", "20240-01-01", "2024-1-05", "2024-02-30"] {
            let err = ForecastRequest::from_payload(&payload("AAPL", Some(raw), None), today(), &limits).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest, "{} accepted", raw);
        }
        let request = ForecastRequest::from_payload(&payload("AAPL", Some("0001-01-01"), None), today(), &limits).unwrap();
        assert_eq!(request.reference_date, NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
    }

    #[test]
    fn test_days_bounds() {
        let limits = ForecastConfig::default();
        assert!(ForecastRequest::from_payload(&payload("AAPL", None, Some(0)), today(), &limits).is_err());
        assert!(ForecastRequest::from_payload(&payload("AAPL", None, Some(31)), today(), &limits).is_err());
        assert_eq!(
            ForecastRequest::from_payload(&payload("AAPL", Some("2024-01-05"), Some(30)), today(), &limits)
                .unwrap()
                .days,
            30
        );
    }

    #[test]
    fn test_symbol_rejected_when_empty_or_odd() {
        let limits = ForecastConfig::default();
        assert!(ForecastRequest::from_payload(&payload("  ", None, None), today(), &limits).is_err());
        assert!(ForecastRequest::from_payload(&payload("AA PL", None, None), today(), &limits).is_err());
        assert!(ForecastRequest::from_payload(&payload("BRK-B", None, None), today(), &limits).is_ok());
    }
}
