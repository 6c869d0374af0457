use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{ForecastError, Result};
use crate::loss::{LossFunction, MSELoss};
use crate::models::forecast_network::ForecastNetwork;
use crate::models::SequenceRegressor;
use crate::optimizers::{AnyOptimizer, Optimizer, OptimizerKind};
use crate::windows::Windows;

/// Configuration for training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    pub clip_gradient: Option<f64>,
    /// Share of windows held out for the accuracy estimate
    pub test_fraction: f64,
    /// Share of the training split held out for per-epoch validation loss
    pub validation_split: f64,
    /// Minimum number of windows needed to train at all
    pub min_samples: usize,
    pub log_every: usize,
    /// Fixed seed for weight init and dropout; random when absent
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 15,
            batch_size: 32,
            learning_rate: 0.001,
            optimizer: OptimizerKind::Adam,
            clip_gradient: Some(5.0),
            test_fraction: 0.2,
            validation_split: 0.0,
            min_samples: 5,
            log_every: 5,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Number of windows held out for testing: ceil(n * test_fraction),
    /// at least one and leaving at least one for training.
    pub fn test_size(&self, samples: usize) -> usize {
        if samples < 2 {
            return 0;
        }
        let wanted = (samples as f64 * self.test_fraction).ceil() as usize;
        wanted.clamp(1, samples - 1)
    }

    /// Number of training windows moved to validation.
    pub fn validation_size(&self, train_samples: usize) -> usize {
        if self.validation_split <= 0.0 || train_samples < 2 {
            return 0;
        }
        let wanted = (train_samples as f64 * self.validation_split).floor() as usize;
        wanted.min(train_samples - 1)
    }
}

/// Training metrics tracked during training
#[derive(Debug, Clone, Serialize)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub time_elapsed: f64,
}

/// Mini-batch trainer for the forecasting network
pub struct Trainer<L: LossFunction, O: Optimizer> {
    pub network: ForecastNetwork,
    pub loss_function: L,
    pub optimizer: O,
    pub config: TrainingConfig,
    pub metrics_history: Vec<TrainingMetrics>,
}

impl<L: LossFunction, O: Optimizer> Trainer<L, O> {
    pub fn new(network: ForecastNetwork, loss_function: L, optimizer: O) -> Self {
        Trainer {
            network,
            loss_function,
            optimizer,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// One optimisation step on windows `range`; returns the batch loss.
    pub fn train_batch(&mut self, windows: &Windows, range: std::ops::Range<usize>) -> f64 {
        let (inputs, targets) = windows.batch(range);
        let (outputs, cache) = self.network.forward_with_cache(&inputs);

        let loss = self.loss_function.compute_loss(&outputs, &targets);
        let grad_output = self.loss_function.compute_gradient(&outputs, &targets);
        let mut gradients = self.network.backward(&grad_output, &cache);

        if let Some(max_norm) = self.config.clip_gradient {
            gradients.clip_global_norm(max_norm);
        }

        self.optimizer.begin_step();
        self.network.update_parameters(&gradients, &mut self.optimizer);
        loss
    }

    /// Train for the configured number of epochs, in temporal order.
    ///
    /// Fails with `TrainingFailure` as soon as an epoch loss is not finite.
    pub fn train(&mut self, train_data: &Windows, validation_data: Option<&Windows>) -> Result<()> {
        if train_data.is_empty() {
            return Err(ForecastError::TrainingFailure("no training windows".to_string()));
        }

        let batch_size = self.config.batch_size.max(1);
        let log_every = self.config.log_every.max(1);
        info!(
            "Training on {} windows for {} epochs (batch size {})",
            train_data.len(),
            self.config.epochs,
            batch_size
        );

        for epoch in 0..self.config.epochs {
            let start_time = Instant::now();
            self.network.train();

            let mut epoch_loss = 0.0;
            let mut seen = 0;
            let mut start = 0;
            while start < train_data.len() {
                let end = (start + batch_size).min(train_data.len());
                let loss = self.train_batch(train_data, start..end);
                epoch_loss += loss * (end - start) as f64;
                seen += end - start;
                start = end;
            }
            epoch_loss /= seen as f64;

            if !epoch_loss.is_finite() {
                return Err(ForecastError::TrainingFailure(format!(
                    "loss diverged at epoch {}",
                    epoch
                )));
            }

            let validation_loss = match validation_data {
                Some(val) if !val.is_empty() => Some(self.evaluate(val)),
                _ => None,
            };

            let metrics = TrainingMetrics {
                epoch,
                train_loss: epoch_loss,
                validation_loss,
                time_elapsed: start_time.elapsed().as_secs_f64(),
            };

            if epoch % log_every == 0 || epoch + 1 == self.config.epochs {
                match validation_loss {
                    Some(val_loss) => debug!(
                        "Epoch {}: Train Loss: {:.6}, Val Loss: {:.6}, Time: {:.2}s",
                        epoch, epoch_loss, val_loss, metrics.time_elapsed
                    ),
                    None => debug!(
                        "Epoch {}: Train Loss: {:.6}, Time: {:.2}s",
                        epoch, epoch_loss, metrics.time_elapsed
                    ),
                }
            }
            self.metrics_history.push(metrics);
        }

        self.network.eval();
        Ok(())
    }

    /// Mean loss over `data` with dropout disabled
    pub fn evaluate(&mut self, data: &Windows) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        let was_training = self.network.is_training;
        self.network.eval();
        let (inputs, targets) = data.batch(0..data.len());
        let outputs = self.network.forward(&inputs);
        let loss = self.loss_function.compute_loss(&outputs, &targets);
        if was_training {
            self.network.train();
        }
        loss
    }

    /// Scaled predictions for every window in `data`, dropout disabled
    pub fn predict(&mut self, data: &Windows) -> Vec<f64> {
        (0..data.len())
            .map(|i| self.network.predict_next(&data.window(i)))
            .collect()
    }

    pub fn get_latest_metrics(&self) -> Option<&TrainingMetrics> {
        self.metrics_history.last()
    }

    pub fn get_metrics_history(&self) -> &[TrainingMetrics] {
        &self.metrics_history
    }

    pub fn into_network(self) -> ForecastNetwork {
        self.network
    }
}

/// Trainer with MSE loss and the optimizer named in `config`
pub fn create_trainer(network: ForecastNetwork, config: TrainingConfig) -> Trainer<MSELoss, AnyOptimizer> {
    let optimizer = AnyOptimizer::new(config.optimizer, config.learning_rate);
    Trainer::new(network, MSELoss, optimizer).with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forecast_network::ModelConfig;
    use ndarray::Array1;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sine_windows(n: usize, look_back: usize) -> Windows {
        let series: Array1<f64> = (0..n).map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin()).collect();
        Windows::build(series.view(), look_back, 1).unwrap()
    }

    fn small_network(seed: u64) -> ForecastNetwork {
        let config = ModelConfig {
            look_back: 6,
            hidden_sizes: vec![8, 4],
            dropout: 0.1,
        };
        ForecastNetwork::new(&config, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_split_sizes() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_size(50), 10);
        assert_eq!(config.test_size(7), 2);
        assert_eq!(config.test_size(2), 1);
        assert_eq!(config.test_size(1), 0);

        let config = TrainingConfig { validation_split: 0.25, ..TrainingConfig::default() };
        assert_eq!(config.validation_size(40), 10);
        assert_eq!(TrainingConfig::default().validation_size(40), 0);
    }

    #[test]
    fn test_training_reduces_loss() {
        let windows = sine_windows(60, 6);
        let config = TrainingConfig {
            epochs: 30,
            batch_size: 8,
            learning_rate: 0.01,
            ..TrainingConfig::default()
        };
        let mut trainer = create_trainer(small_network(21), config);

        let before = trainer.evaluate(&windows);
        trainer.train(&windows, None).unwrap();
        let after = trainer.evaluate(&windows);

        assert_eq!(trainer.get_metrics_history().len(), 30);
        assert!(after < before, "loss went from {} to {}", before, after);
    }

    #[test]
    fn test_validation_loss_recorded() {
        let windows = sine_windows(30, 6);
        let (train, val) = windows.split_at(18);
        let config = TrainingConfig { epochs: 2, ..TrainingConfig::default() };
        let mut trainer = create_trainer(small_network(3), config);

        trainer.train(&train, Some(&val)).unwrap();
        let latest = trainer.get_latest_metrics().unwrap();
        assert_eq!(latest.epoch, 1);
        assert!(latest.validation_loss.is_some());
        assert!(!trainer.network.is_training);
    }

    #[test]
    fn test_predict_one_value_per_window() {
        let windows = sine_windows(20, 6);
        let mut trainer = create_trainer(small_network(5), TrainingConfig { epochs: 1, ..TrainingConfig::default() });
        trainer.train(&windows, None).unwrap();

        let predictions = trainer.predict(&windows);
        assert_eq!(predictions.len(), windows.len());
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_empty_training_set_is_a_training_failure() {
        let windows = sine_windows(20, 6);
        let (empty, _) = windows.split_at(0);
        let mut trainer = create_trainer(small_network(5), TrainingConfig::default());
        let err = trainer.train(&empty, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TrainingFailure);
    }
}
