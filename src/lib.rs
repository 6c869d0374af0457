//! # Stock Forecast
//!
//! Short-horizon stock price forecasting. Every request fetches roughly three
//! months of daily closes, trains a fresh stacked LSTM on them and projects
//! the next few trading days autoregressively.
//!
//! ## Core Components
//!
//! - **Market data**: provider trait with a Yahoo Finance chart API client
//! - **Preprocessing**: min-max scaling and fixed-length sliding windows
//! - **Model**: stacked LSTM layers with dropout and a linear head, trained with BPTT
//! - **Training**: mini-batch Adam or SGD, gradient clipping, MSE loss
//! - **Forecasting**: recursive multi-step prediction over the following weekdays
//! - **Service**: request validation, optional model cache and an actix-web HTTP API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stock_forecast::{ForecastPipeline, PredictionRequest, ServiceConfig, YahooFinance};
//!
//! let config = ServiceConfig::default();
//! let provider = YahooFinance::new(&config.market_data).unwrap();
//! let pipeline = ForecastPipeline::new(Arc::new(provider), config);
//!
//! let report = pipeline.handle(&PredictionRequest {
//!     symbol: "AAPL".to_string(),
//!     start_date: Some("2024-06-12".to_string()),
//!     days: Some(3),
//! });
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod layers;
pub mod loss;
pub mod market_data;
pub mod metrics;
pub mod models;
pub mod optimizers;
pub mod pipeline;
pub mod scaler;
pub mod server;
pub mod training;
pub mod utils;
pub mod windows;

// Re-export commonly used items
pub use config::ServiceConfig;
pub use error::{ErrorKind, ForecastError, Result};
pub use forecast::{forecast, Forecast, ForecastPoint};
pub use market_data::{DailyBar, MarketDataProvider, PricePoint, PriceSeries, YahooFinance};
pub use models::forecast_network::{ForecastNetwork, ModelConfig};
pub use models::SequenceRegressor;
pub use pipeline::{ForecastPipeline, ForecastReport, ForecastRequest, PredictionRequest};
pub use scaler::MinMaxScaler;
pub use training::{create_trainer, Trainer, TrainingConfig};
