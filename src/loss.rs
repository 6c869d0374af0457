use ndarray::{Array2, Zip};

/// Objective minimised by the [`Trainer`](crate::training::Trainer).
///
/// Predictions and targets are `(1, batch)` matrices of scaled closes.
pub trait LossFunction {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64;

    /// d(loss)/d(predictions), same shape as `predictions`
    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64>;
}

/// Mean squared error over every element of the batch
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl LossFunction for MSELoss {
    fn compute_loss(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }
        let mut total = 0.0;
        Zip::from(predictions).and(targets).for_each(|&p, &t| total += (p - t).powi(2));
        total / predictions.len() as f64
    }

    fn compute_gradient(&self, predictions: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let scale = 2.0 / predictions.len().max(1) as f64;
        Zip::from(predictions)
            .and(targets)
            .map_collect(|&p, &t| scale * (p - t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_mse_loss_and_gradient() {
        let predictions = arr2(&[[1.0, 2.0, 3.0, 4.0]]);
        let targets = arr2(&[[1.5, 2.5, 2.5, 3.5]]);

        assert!((MSELoss.compute_loss(&predictions, &targets) - 0.25).abs() < 1e-12);
        assert_eq!(
            MSELoss.compute_gradient(&predictions, &targets),
            arr2(&[[-0.25, -0.25, 0.25, 0.25]])
        );
    }

    #[test]
    fn test_perfect_prediction_has_zero_gradient() {
        let values = arr2(&[[0.3, 0.7]]);
        assert_eq!(MSELoss.compute_loss(&values, &values), 0.0);
        assert!(MSELoss.compute_gradient(&values, &values).iter().all(|&g| g == 0.0));
    }
}
