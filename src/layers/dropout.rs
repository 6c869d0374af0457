use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

/// Inverted dropout applied to the output of a recurrent layer.
///
/// In training mode each call draws a fresh keep-mask and scales the kept
/// activations by `1 / keep_prob`, so evaluation needs no rescaling. The mask is
/// returned to the caller instead of being stored, because one layer applies
/// dropout at every timestep and backpropagation needs each of those masks.
#[derive(Clone, Debug)]
pub struct Dropout {
    pub dropout_rate: f64,
    pub is_training: bool,
    rng: StdRng,
}

impl Dropout {
    pub fn new(dropout_rate: f64, rng: &mut impl Rng) -> Self {
        Dropout {
            dropout_rate: dropout_rate.clamp(0.0, 1.0),
            is_training: true,
            rng: StdRng::seed_from_u64(rng.gen()),
        }
    }

    pub fn train(&mut self) {
        self.is_training = true;
    }

    pub fn eval(&mut self) {
        self.is_training = false;
    }

    fn keep_prob(&self) -> f64 {
        1.0 - self.dropout_rate
    }

    /// Returns the dropped activations and the mask used, if any.
    pub fn forward(&mut self, input: &Array2<f64>) -> (Array2<f64>, Option<Array2<f64>>) {
        if !self.is_training || self.dropout_rate == 0.0 {
            return (input.clone(), None);
        }

        let keep_prob = self.keep_prob();
        let mask = Array2::random_using(input.raw_dim(), Uniform::new(0.0, 1.0), &mut self.rng)
            .mapv(|x| if x < keep_prob { 1.0 } else { 0.0 });
        let output = input * &mask / keep_prob;
        (output, Some(mask))
    }

    pub fn backward(&self, grad_output: &Array2<f64>, mask: Option<&Array2<f64>>) -> Array2<f64> {
        match mask {
            Some(mask) => grad_output * mask / self.keep_prob(),
            None => grad_output.clone(),
        }
    }
}
