/// Stacked LSTM regressor used for price forecasting.
pub mod forecast_network;

/// Anything that maps a window of scaled values to the next scaled value.
///
/// The forecaster only needs this, which keeps the autoregressive loop
/// independent of the network that produced the model.
pub trait SequenceRegressor {
    fn predict_next(&mut self, window: &[f64]) -> f64;
}

impl<F> SequenceRegressor for F
where
    F: FnMut(&[f64]) -> f64,
{
    fn predict_next(&mut self, window: &[f64]) -> f64 {
        self(window)
    }
}
