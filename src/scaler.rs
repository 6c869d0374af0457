use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Min-max scaler mapping a price series into [0, 1].
///
/// Fit once on the full historical series; the same instance is then used to
/// scale the windows and to invert every model output for that request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientSamples { got: 0, required: 1 });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::TrainingFailure(
                "cannot fit scaler on non-finite prices".to_string(),
            ));
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Ok(MinMaxScaler { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of the fitted range; a constant series uses a unit range.
    fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    pub fn scale(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }

    pub fn transform(&self, values: &[f64]) -> Array1<f64> {
        values.iter().map(|&v| self.scale(v)).collect()
    }

    pub fn inverse_transform(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse(v)).collect()
    }
}
