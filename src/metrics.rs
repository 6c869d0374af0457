//! Test-set error metrics.
//!
//! Accuracy is defined once for the whole crate: `clamp(100 - MAPE, 0, 100)`,
//! with MAPE measured in price units after inverse scaling.

use serde::Serialize;

/// Mean squared error; zero for empty input.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Mean absolute percentage error in percent.
///
/// Pairs whose actual value is zero are skipped; returns `None` when no pair
/// remains.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });

    if count == 0 {
        None
    } else {
        Some(sum / count as f64 * 100.0)
    }
}

pub fn accuracy_from_mape(mape: f64) -> f64 {
    if mape.is_finite() {
        (100.0 - mape).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Held-out evaluation of one trained model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// MSE in scaled space
    pub test_mse: f64,
    /// MAPE in price units, percent
    pub mape: f64,
    /// `clamp(100 - mape, 0, 100)`
    pub accuracy: f64,
    pub test_samples: usize,
}

impl Evaluation {
    pub fn from_predictions(
        scaled_actual: &[f64],
        scaled_predicted: &[f64],
        price_actual: &[f64],
        price_predicted: &[f64],
    ) -> Self {
        let test_mse = mean_squared_error(scaled_actual, scaled_predicted);
        let mape = mean_absolute_percentage_error(price_actual, price_predicted).unwrap_or(100.0);
        Evaluation {
            test_mse,
            mape,
            accuracy: accuracy_from_mape(mape),
            test_samples: scaled_actual.len(),
        }
    }
}
