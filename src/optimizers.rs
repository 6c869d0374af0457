use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Optimizer trait for parameter updates during training
///
/// `begin_step` is called once per mini-batch before the per-parameter
/// `update` calls, so stateful optimizers can advance their clocks.
pub trait Optimizer {
    fn begin_step(&mut self) {}
    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>);
}

/// Stochastic Gradient Descent: θ = θ - η∇θ
pub struct SGD {
    learning_rate: f64,
}

impl SGD {
    pub fn new(learning_rate: f64) -> Self {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        param.scaled_add(-self.learning_rate, gradient);
    }
}

/// Adam optimizer with adaptive learning rates
///
/// Implements: m_t = β₁m_{t-1} + (1-β₁)g_t
///             v_t = β₂v_{t-1} + (1-β₂)g_t²
///             θ_t = θ_{t-1} - η * m̂_t / (√v̂_t + ε)
/// where m̂_t and v̂_t are bias-corrected with the step count `t`.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: HashMap<String, Array2<f64>>,
    v: HashMap<String, Array2<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam::with_params(learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn with_params(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        // Callers that never call begin_step still get a valid bias correction
        let t = self.t.max(1);

        let m_t = self
            .m
            .entry(param_id.to_string())
            .or_insert_with(|| Array2::zeros(param.raw_dim()));
        *m_t = self.beta1 * &*m_t + (1.0 - self.beta1) * gradient;
        let m_hat = &*m_t / (1.0 - self.beta1.powi(t));

        let v_t = self
            .v
            .entry(param_id.to_string())
            .or_insert_with(|| Array2::zeros(param.raw_dim()));
        *v_t = self.beta2 * &*v_t + (1.0 - self.beta2) * (gradient * gradient);
        let v_hat = &*v_t / (1.0 - self.beta2.powi(t));

        let update = self.learning_rate * m_hat / (v_hat.mapv(f64::sqrt) + self.epsilon);
        *param -= &update;
    }
}

/// Optimizer choice exposed through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Optimizer selected at runtime from [`OptimizerKind`].
pub enum AnyOptimizer {
    Adam(Adam),
    Sgd(SGD),
}

impl AnyOptimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f64) -> Self {
        match kind {
            OptimizerKind::Adam => AnyOptimizer::Adam(Adam::new(learning_rate)),
            OptimizerKind::Sgd => AnyOptimizer::Sgd(SGD::new(learning_rate)),
        }
    }
}

impl Optimizer for AnyOptimizer {
    fn begin_step(&mut self) {
        match self {
            AnyOptimizer::Adam(opt) => opt.begin_step(),
            AnyOptimizer::Sgd(opt) => opt.begin_step(),
        }
    }

    fn update(&mut self, param_id: &str, param: &mut Array2<f64>, gradient: &Array2<f64>) {
        match self {
            AnyOptimizer::Adam(opt) => opt.update(param_id, param, gradient),
            AnyOptimizer::Sgd(opt) => opt.update(param_id, param, gradient),
        }
    }
}
