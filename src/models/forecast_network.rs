use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::layers::dropout::Dropout;
use crate::layers::linear::{LinearGradients, LinearLayer};
use crate::layers::lstm_cell::{LSTMCell, LSTMCellCache, LSTMCellGradients};
use crate::models::SequenceRegressor;
use crate::optimizers::Optimizer;

/// Network topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of past closes fed to the network
    pub look_back: usize,
    /// Units per stacked LSTM layer, bottom first
    pub hidden_sizes: Vec<usize>,
    /// Dropout applied after every recurrent layer while training
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            look_back: 15,
            hidden_sizes: vec![128, 64, 32],
            dropout: 0.2,
        }
    }
}

/// One LSTM layer and the dropout that follows it.
#[derive(Clone, Debug)]
struct RecurrentLayer {
    cell: LSTMCell,
    dropout: Dropout,
}

/// Values kept from a forward pass for backpropagation through time
pub struct ForecastNetworkCache {
    /// `[layer][timestep]`
    cell_caches: Vec<Vec<LSTMCellCache>>,
    /// Dropout masks per layer; the last layer only has one for its final step
    dropout_masks: Vec<Vec<Option<Array2<f64>>>>,
    head_input: Array2<f64>,
}

/// Gradients for every parameter of the network
#[derive(Clone, Debug)]
pub struct ForecastNetworkGradients {
    pub layers: Vec<LSTMCellGradients>,
    pub head: LinearGradients,
}

impl ForecastNetworkGradients {
    pub fn global_norm(&self) -> f64 {
        let layers: f64 = self.layers.iter().map(|g| g.squared_norm()).sum();
        (layers + self.head.squared_norm()).sqrt()
    }

    /// Rescale so the global norm does not exceed `max_norm`
    pub fn clip_global_norm(&mut self, max_norm: f64) {
        let norm = self.global_norm();
        if norm > max_norm && norm.is_finite() {
            let factor = max_norm / norm;
            for layer in &mut self.layers {
                layer.scale(factor);
            }
            self.head.scale(factor);
        }
    }
}

/// Stacked LSTM regressor mapping a window of scaled closes to the next one.
///
/// Every layer but the last hands its whole output sequence to the next layer;
/// the last layer's final hidden state goes through dropout into a single
/// linear unit.
#[derive(Clone, Debug)]
pub struct ForecastNetwork {
    layers: Vec<RecurrentLayer>,
    head: LinearLayer,
    pub input_size: usize,
    pub is_training: bool,
}

impl ForecastNetwork {
    pub fn new(config: &ModelConfig, rng: &mut impl Rng) -> Self {
        let input_size = 1;
        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut layer_input = input_size;

        for &hidden_size in &config.hidden_sizes {
            layers.push(RecurrentLayer {
                cell: LSTMCell::new(layer_input, hidden_size, rng),
                dropout: Dropout::new(config.dropout, rng),
            });
            layer_input = hidden_size;
        }

        let head = LinearLayer::new(layer_input, 1, rng);

        ForecastNetwork {
            layers,
            head,
            input_size,
            is_training: true,
        }
    }

    /// Set training mode for all dropout layers
    pub fn train(&mut self) {
        self.is_training = true;
        for layer in &mut self.layers {
            layer.dropout.train();
        }
    }

    /// Set evaluation mode for all dropout layers
    pub fn eval(&mut self) {
        self.is_training = false;
        for layer in &mut self.layers {
            layer.dropout.eval();
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.cell.hidden_size).collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.cell.num_parameters()).sum::<usize>() + self.head.num_parameters()
    }

    /// Forward pass for a batch; each element of `sequence` is `(1, batch)`.
    /// Returns the `(1, batch)` predictions.
    pub fn forward(&mut self, sequence: &[Array2<f64>]) -> Array2<f64> {
        let (output, _) = self.forward_with_cache(sequence);
        output
    }

    pub fn forward_with_cache(&mut self, sequence: &[Array2<f64>]) -> (Array2<f64>, ForecastNetworkCache) {
        let batch_size = sequence.first().map(|x| x.ncols()).unwrap_or(0);
        let last_layer = self.layers.len().saturating_sub(1);

        let mut current: Vec<Array2<f64>> = sequence.to_vec();
        let mut cell_caches = Vec::with_capacity(self.layers.len());
        let mut dropout_masks = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let (mut hx, mut cx) = layer.cell.zero_state(batch_size);
            let mut outputs = Vec::with_capacity(current.len());
            let mut caches = Vec::with_capacity(current.len());

            for input in &current {
                let (hy, cy, cache) = layer.cell.forward_with_cache(input, &hx, &cx);
                caches.push(cache);
                outputs.push(hy.clone());
                hx = hy;
                cx = cy;
            }

            // Intermediate layers drop out every timestep, the last only its final state
            let mut masks = Vec::new();
            if index == last_layer {
                let (dropped, mask) = layer.dropout.forward(&hx);
                masks.push(mask);
                current = vec![dropped];
            } else {
                current = outputs
                    .iter()
                    .map(|h| {
                        let (dropped, mask) = layer.dropout.forward(h);
                        masks.push(mask);
                        dropped
                    })
                    .collect();
            }

            cell_caches.push(caches);
            dropout_masks.push(masks);
        }

        let head_input = current
            .pop()
            .unwrap_or_else(|| Array2::zeros((self.head.input_size, batch_size)));
        let output = self.head.forward(&head_input);

        let cache = ForecastNetworkCache {
            cell_caches,
            dropout_masks,
            head_input,
        };
        (output, cache)
    }

    /// Backpropagation through time from the `(1, batch)` output gradient.
    pub fn backward(&self, grad_output: &Array2<f64>, cache: &ForecastNetworkCache) -> ForecastNetworkGradients {
        let (head_gradients, d_head_input) = self.head.backward(&cache.head_input, grad_output);

        let mut layer_gradients: Vec<LSTMCellGradients> = Vec::with_capacity(self.layers.len());
        let mut upstream: Vec<Option<Array2<f64>>> = Vec::new();

        for (index, layer) in self.layers.iter().enumerate().rev() {
            let caches = &cache.cell_caches[index];
            let masks = &cache.dropout_masks[index];
            let steps = caches.len();

            // Gradient w.r.t. this layer's (pre-dropout) hidden output at every step
            let dh_seq: Vec<Option<Array2<f64>>> = if index + 1 == self.layers.len() {
                let mut seq = vec![None; steps];
                if let Some(slot) = seq.last_mut() {
                    *slot = Some(layer.dropout.backward(&d_head_input, masks[0].as_ref()));
                }
                seq
            } else {
                upstream
                    .iter()
                    .zip(masks.iter())
                    .map(|(grad, mask)| grad.as_ref().map(|g| layer.dropout.backward(g, mask.as_ref())))
                    .collect()
            };

            let mut gradients = layer.cell.zero_gradients();
            let mut dx_seq = vec![None; steps];
            let (mut dh_next, mut dc_next) = match caches.first() {
                Some(first) => layer.cell.zero_state(first.hx.ncols()),
                None => break,
            };

            for t in (0..steps).rev() {
                let dh = match &dh_seq[t] {
                    Some(grad) => &dh_next + grad,
                    None => dh_next.clone(),
                };
                let (step_gradients, dx, dhx, dcx) = layer.cell.backward(&dh, &dc_next, &caches[t]);
                gradients.accumulate(&step_gradients);
                dx_seq[t] = Some(dx);
                dh_next = dhx;
                dc_next = dcx;
            }

            layer_gradients.push(gradients);
            upstream = dx_seq;
        }

        layer_gradients.reverse();
        ForecastNetworkGradients {
            layers: layer_gradients,
            head: head_gradients,
        }
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &ForecastNetworkGradients, optimizer: &mut O) {
        for (i, (layer, layer_gradients)) in self.layers.iter_mut().zip(gradients.layers.iter()).enumerate() {
            layer.cell.update_parameters(layer_gradients, optimizer, &format!("layer_{}", i));
        }
        self.head.update_parameters(&gradients.head, optimizer, "head");
    }
}

impl SequenceRegressor for ForecastNetwork {
    fn predict_next(&mut self, window: &[f64]) -> f64 {
        let was_training = self.is_training;
        if was_training {
            self.eval();
        }

        let sequence: Vec<Array2<f64>> = window
            .iter()
            .map(|&v| Array2::from_elem((1, 1), v))
            .collect();
        let output = self.forward(&sequence);

        if was_training {
            self.train();
        }
        output[[0, 0]]
    }
}
