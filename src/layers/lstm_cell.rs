use ndarray::{s, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use crate::utils::{sigmoid, tanh_grad_from_output};

/// Holds gradients for all LSTM cell parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LSTMCellGradients {
    pub w_ih: Array2<f64>,
    pub w_hh: Array2<f64>,
    pub bias: Array2<f64>,
}

impl LSTMCellGradients {
    pub fn accumulate(&mut self, other: &LSTMCellGradients) {
        self.w_ih += &other.w_ih;
        self.w_hh += &other.w_hh;
        self.bias += &other.bias;
    }

    pub fn squared_norm(&self) -> f64 {
        [&self.w_ih, &self.w_hh, &self.bias]
            .iter()
            .map(|m| m.iter().map(|x| x * x).sum::<f64>())
            .sum()
    }

    pub fn scale(&mut self, factor: f64) {
        self.w_ih *= factor;
        self.w_hh *= factor;
        self.bias *= factor;
    }
}

/// Caches intermediate values of one timestep for the backward pass
#[derive(Clone, Debug)]
pub struct LSTMCellCache {
    pub input: Array2<f64>,
    pub hx: Array2<f64>,
    pub cx: Array2<f64>,
    pub input_gate: Array2<f64>,
    pub forget_gate: Array2<f64>,
    pub cell_gate: Array2<f64>,
    pub output_gate: Array2<f64>,
    pub tanh_cy: Array2<f64>,
}

/// LSTM cell operating on column batches.
///
/// Inputs are `(input_size, batch)` and states `(hidden_size, batch)`:
/// - i_t = σ(W_xi x_t + W_hi h_t-1 + b_i)
/// - f_t = σ(W_xf x_t + W_hf h_t-1 + b_f)
/// - g_t = tanh(W_xg x_t + W_hg h_t-1 + b_g)
/// - o_t = σ(W_xo x_t + W_ho h_t-1 + b_o)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
#[derive(Clone, Debug)]
pub struct LSTMCell {
    pub w_ih: Array2<f64>, // (4*hidden_size, input_size)
    pub w_hh: Array2<f64>, // (4*hidden_size, hidden_size)
    pub bias: Array2<f64>, // (4*hidden_size, 1)
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LSTMCell {
    /// Glorot-uniform weights, zero biases with the forget gate bias set to one.
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut impl Rng) -> Self {
        let gate_rows = 4 * hidden_size;
        let ih_limit = (6.0 / (input_size + gate_rows) as f64).sqrt();
        let hh_limit = (6.0 / (hidden_size + gate_rows) as f64).sqrt();

        let w_ih = Array2::random_using((gate_rows, input_size), Uniform::new(-ih_limit, ih_limit), rng);
        let w_hh = Array2::random_using((gate_rows, hidden_size), Uniform::new(-hh_limit, hh_limit), rng);
        let mut bias = Array2::zeros((gate_rows, 1));
        bias.slice_mut(s![hidden_size..2 * hidden_size, ..]).fill(1.0);

        LSTMCell {
            w_ih,
            w_hh,
            bias,
            input_size,
            hidden_size,
        }
    }

    pub fn zero_state(&self, batch_size: usize) -> (Array2<f64>, Array2<f64>) {
        (
            Array2::zeros((self.hidden_size, batch_size)),
            Array2::zeros((self.hidden_size, batch_size)),
        )
    }

    pub fn forward(&self, input: &Array2<f64>, hx: &Array2<f64>, cx: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let (hy, cy, _) = self.forward_with_cache(input, hx, cx);
        (hy, cy)
    }

    pub fn forward_with_cache(&self, input: &Array2<f64>, hx: &Array2<f64>, cx: &Array2<f64>) -> (Array2<f64>, Array2<f64>, LSTMCellCache) {
        let h = self.hidden_size;

        // All four gates in one product: [input, forget, cell, output]
        let gates = self.w_ih.dot(input) + self.w_hh.dot(hx) + &self.bias;

        let input_gate = gates.slice(s![0..h, ..]).mapv(sigmoid);
        let forget_gate = gates.slice(s![h..2 * h, ..]).mapv(sigmoid);
        let cell_gate = gates.slice(s![2 * h..3 * h, ..]).mapv(f64::tanh);
        let output_gate = gates.slice(s![3 * h..4 * h, ..]).mapv(sigmoid);

        let cy = &forget_gate * cx + &input_gate * &cell_gate;
        let tanh_cy = cy.mapv(f64::tanh);
        let hy = &output_gate * &tanh_cy;

        let cache = LSTMCellCache {
            input: input.clone(),
            hx: hx.clone(),
            cx: cx.clone(),
            input_gate,
            forget_gate,
            cell_gate,
            output_gate,
            tanh_cy,
        };

        (hy, cy, cache)
    }

    /// Backward pass for one timestep.
    ///
    /// Returns (parameter_gradients, input_gradient, hidden_gradient, cell_gradient);
    /// parameter gradients are summed over the batch columns.
    pub fn backward(&self, dhy: &Array2<f64>, dcy: &Array2<f64>, cache: &LSTMCellCache) -> (LSTMCellGradients, Array2<f64>, Array2<f64>, Array2<f64>) {
        let h = self.hidden_size;
        let batch_size = dhy.ncols();

        // ∂L/∂o_t = ∂L/∂h_t ⊙ tanh(c_t)
        let do_raw = dhy * &cache.tanh_cy * &cache.output_gate * cache.output_gate.mapv(|x| 1.0 - x);

        // Cell state gradient from the hidden path plus the carried one
        let dcy_total = dcy + &(dhy * &cache.output_gate * cache.tanh_cy.mapv(tanh_grad_from_output));

        let df_raw = &dcy_total * &cache.cx * &cache.forget_gate * cache.forget_gate.mapv(|x| 1.0 - x);
        let di_raw = &dcy_total * &cache.cell_gate * &cache.input_gate * cache.input_gate.mapv(|x| 1.0 - x);
        let dg_raw = &dcy_total * &cache.input_gate * cache.cell_gate.mapv(tanh_grad_from_output);

        let mut dgates = Array2::zeros((4 * h, batch_size));
        dgates.slice_mut(s![0..h, ..]).assign(&di_raw);
        dgates.slice_mut(s![h..2 * h, ..]).assign(&df_raw);
        dgates.slice_mut(s![2 * h..3 * h, ..]).assign(&dg_raw);
        dgates.slice_mut(s![3 * h..4 * h, ..]).assign(&do_raw);

        let gradients = LSTMCellGradients {
            w_ih: dgates.dot(&cache.input.t()),
            w_hh: dgates.dot(&cache.hx.t()),
            bias: dgates.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };

        let dx = self.w_ih.t().dot(&dgates);
        let dhx = self.w_hh.t().dot(&dgates);
        let dcx = &dcy_total * &cache.forget_gate;

        (gradients, dx, dhx, dcx)
    }

    /// Initialize zero gradients for accumulation
    pub fn zero_gradients(&self) -> LSTMCellGradients {
        LSTMCellGradients {
            w_ih: Array2::zeros(self.w_ih.raw_dim()),
            w_hh: Array2::zeros(self.w_hh.raw_dim()),
            bias: Array2::zeros(self.bias.raw_dim()),
        }
    }

    /// Apply gradients using the provided optimizer
    pub fn update_parameters<O: crate::optimizers::Optimizer>(&mut self, gradients: &LSTMCellGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_w_ih", prefix), &mut self.w_ih, &gradients.w_ih);
        optimizer.update(&format!("{}_w_hh", prefix), &mut self.w_hh, &gradients.w_hh);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    pub fn num_parameters(&self) -> usize {
        self.w_ih.len() + self.w_hh.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lstm_cell_forward_batch() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LSTMCell::new(1, 4, &mut rng);

        let input = arr2(&[[0.2, 0.5, 0.9]]);
        let (hx, cx) = cell.zero_state(3);
        let (hy, cy) = cell.forward(&input, &hx, &cx);

        assert_eq!(hy.shape(), &[4, 3]);
        assert_eq!(cy.shape(), &[4, 3]);
        assert!(hy.iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_forget_bias_initialised_to_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LSTMCell::new(2, 3, &mut rng);
        assert!(cell.bias.slice(s![0..3, ..]).iter().all(|&b| b == 0.0));
        assert!(cell.bias.slice(s![3..6, ..]).iter().all(|&b| b == 1.0));
        assert_eq!(cell.num_parameters(), 12 * 2 + 12 * 3 + 12);
    }

    #[test]
    fn test_backward_shapes_and_bias_sum() {
        let mut rng = StdRng::seed_from_u64(11);
        let cell = LSTMCell::new(2, 3, &mut rng);

        let input = arr2(&[[1.0, 0.5], [0.5, -0.5]]);
        let hx = arr2(&[[0.1, 0.0], [0.2, 0.1], [0.3, -0.1]]);
        let cx = Array2::zeros((3, 2));
        let (_, _, cache) = cell.forward_with_cache(&input, &hx, &cx);

        let dhy = Array2::ones((3, 2));
        let dcy = Array2::zeros((3, 2));
        let (gradients, dx, dhx, dcx) = cell.backward(&dhy, &dcy, &cache);

        assert_eq!(gradients.w_ih.shape(), &[12, 2]);
        assert_eq!(gradients.w_hh.shape(), &[12, 3]);
        assert_eq!(gradients.bias.shape(), &[12, 1]);
        assert_eq!(dx.shape(), &[2, 2]);
        assert_eq!(dhx.shape(), &[3, 2]);
        assert_eq!(dcx.shape(), &[3, 2]);
    }

    #[test]
    fn test_input_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(5);
        let cell = LSTMCell::new(1, 2, &mut rng);
        let hx = arr2(&[[0.1], [-0.2]]);
        let cx = arr2(&[[0.05], [0.3]]);

        // L = sum(h_t)
        let loss_at = |x: f64| {
            let (hy, _) = cell.forward(&arr2(&[[x]]), &hx, &cx);
            hy.sum()
        };

        let x0 = 0.4;
        let (_, _, cache) = cell.forward_with_cache(&arr2(&[[x0]]), &hx, &cx);
        let (_, dx, _, _) = cell.backward(&Array2::ones((2, 1)), &Array2::zeros((2, 1)), &cache);

        let eps = 1e-6;
        let numeric = (loss_at(x0 + eps) - loss_at(x0 - eps)) / (2.0 * eps);
        assert!((dx[[0, 0]] - numeric).abs() < 1e-6);
    }
}
