use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Failure category reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    DataUnavailable,
    InsufficientData,
    TrainingFailure,
    PredictionInvalid,
    ProviderFailure,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::TrainingFailure => "training_failure",
            ErrorKind::PredictionInvalid => "prediction_invalid",
            ErrorKind::ProviderFailure => "provider_failure",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced anywhere between request validation and the final forecast.
///
/// Each variant maps to exactly one [`ErrorKind`]; the kind travels to the HTTP
/// boundary untouched so callers can tell a bad symbol from a failed model.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no market data for {symbol} between {start} and {end}")]
    DataUnavailable {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("not enough data points for {symbol}: got {got} rows, need at least {required}")]
    InsufficientData {
        symbol: String,
        got: usize,
        required: usize,
    },

    #[error("not enough samples after windowing: got {got}, need at least {required}")]
    InsufficientSamples { got: usize, required: usize },

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("prediction invalid: {0}")]
    PredictionInvalid(String),

    #[error("market data provider error: {0}")]
    ProviderFailure(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ForecastError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            ForecastError::InsufficientData { .. } | ForecastError::InsufficientSamples { .. } => {
                ErrorKind::InsufficientData
            }
            ForecastError::TrainingFailure(_) => ErrorKind::TrainingFailure,
            ForecastError::PredictionInvalid(_) => ErrorKind::PredictionInvalid,
            ForecastError::ProviderFailure(_) => ErrorKind::ProviderFailure,
            ForecastError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(error: reqwest::Error) -> Self {
        ForecastError::ProviderFailure(error.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(error: toml::de::Error) -> Self {
        ForecastError::Config(error.to_string())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(error: std::io::Error) -> Self {
        ForecastError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
