use ndarray::{Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use crate::optimizers::Optimizer;

/// Holds gradients for linear layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

impl LinearGradients {
    pub fn squared_norm(&self) -> f64 {
        self.weight.iter().chain(self.bias.iter()).map(|x| x * x).sum()
    }

    pub fn scale(&mut self, factor: f64) {
        self.weight *= factor;
        self.bias *= factor;
    }
}

/// Fully connected output head: output = weight · input + bias
///
/// `weight` is `(output_size, input_size)`, inputs are `(input_size, batch)`.
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub input_size: usize,
    pub output_size: usize,
}

impl LinearLayer {
    /// Create a new linear layer with Glorot-uniform weights and zero bias
    pub fn new(input_size: usize, output_size: usize, rng: &mut impl Rng) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weight = Array2::random_using((output_size, input_size), Uniform::new(-limit, limit), rng);
        let bias = Array2::zeros((output_size, 1));

        Self {
            weight,
            bias,
            input_size,
            output_size,
        }
    }

    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>) -> Self {
        let (output_size, input_size) = weight.dim();
        Self {
            weight,
            bias,
            input_size,
            output_size,
        }
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        self.weight.dot(input) + &self.bias
    }

    /// Backward pass given the input seen in `forward`.
    ///
    /// Returns the parameter gradients (bias summed over the batch) and the
    /// gradient with respect to the input.
    pub fn backward(&self, input: &Array2<f64>, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let gradients = LinearGradients {
            weight: grad_output.dot(&input.t()),
            bias: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };
        let input_grad = self.weight.t().dot(grad_output);
        (gradients, input_grad)
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &LinearGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::optimizers::SGD;

    #[test]
    fn test_linear_layer_forward() {
        let layer = LinearLayer::from_weights(arr2(&[[2.0, -1.0]]), arr2(&[[0.5]]));
        let input = arr2(&[[1.0, 3.0], [4.0, 1.0]]);

        let output = layer.forward(&input);
        assert_eq!(output, arr2(&[[-1.5, 5.5]]));
    }

    #[test]
    fn test_linear_layer_backward() {
        let mut rng = StdRng::seed_from_u64(2);
        let layer = LinearLayer::new(3, 1, &mut rng);
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let grad_output = arr2(&[[1.0, 1.0]]);

        let (gradients, input_grad) = layer.backward(&input, &grad_output);

        assert_eq!(gradients.weight, arr2(&[[3.0, 7.0, 11.0]]));
        assert_eq!(gradients.bias, arr2(&[[2.0]]));
        assert_eq!(input_grad.shape(), &[3, 2]);
    }

    #[test]
    fn test_linear_layer_learns_with_sgd() {
        let mut layer = LinearLayer::from_weights(arr2(&[[0.0, 0.0]]), arr2(&[[0.0]]));
        let mut optimizer = SGD::new(0.05);
        let input = arr2(&[[1.0], [2.0]]);
        let target = arr2(&[[3.0]]);

        let initial_error = (&layer.forward(&input) - &target).mapv(f64::abs).sum();
        for _ in 0..50 {
            let output = layer.forward(&input);
            let grad_output = &output - &target;
            let (gradients, _) = layer.backward(&input, &grad_output);
            layer.update_parameters(&gradients, &mut optimizer, "head");
        }
        let final_error = (&layer.forward(&input) - &target).mapv(f64::abs).sum();

        assert!(final_error < initial_error * 0.1);
        assert_eq!(layer.num_parameters(), 3);
    }
}
