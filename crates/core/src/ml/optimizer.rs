//! Gradient-descent optimizers. State is kept per parameter slot so one
//! optimizer instance can drive every tensor of a network.

use std::collections::HashMap;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptimizerKind {
    Adam { learning_rate: f64 },
    Sgd { learning_rate: f64 },
}

impl OptimizerKind {
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Adam { learning_rate } | Self::Sgd { learning_rate } => *learning_rate,
        }
    }

    pub fn build(&self) -> Optimizer {
        match *self {
            Self::Adam { learning_rate } => Optimizer::adam(learning_rate),
            Self::Sgd { learning_rate } => Optimizer::sgd(learning_rate),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Moments {
    first: Vec<f64>,
    second: Vec<f64>,
}

#[derive(Clone, Debug)]
pub enum Optimizer {
    Sgd { learning_rate: f64 },
    Adam { learning_rate: f64, step: u64, moments: HashMap<usize, Moments> },
}

impl Optimizer {
    pub fn sgd(learning_rate: f64) -> Self {
        Self::Sgd { learning_rate }
    }

    pub fn adam(learning_rate: f64) -> Self {
        Self::Adam { learning_rate, step: 0, moments: HashMap::new() }
    }

    /// Advances the step counter; call once per mini-batch before `update`.
    pub fn begin_step(&mut self) {
        if let Self::Adam { step, .. } = self {
            *step += 1;
        }
    }

    pub fn update(&mut self, slot: usize, params: &mut [f64], grads: &[f64]) {
        match self {
            Self::Sgd { learning_rate } => {
                for (param, grad) in params.iter_mut().zip(grads) {
                    *param -= *learning_rate * grad;
                }
            }
            Self::Adam { learning_rate, step, moments } => {
                let state = moments.entry(slot).or_insert_with(|| Moments {
                    first: vec![0.0; params.len()],
                    second: vec![0.0; params.len()],
                });
                let t = (*step).max(1) as i32;
                let first_correction = 1.0 - ADAM_BETA1.powi(t);
                let second_correction = 1.0 - ADAM_BETA2.powi(t);

                for (index, (param, grad)) in params.iter_mut().zip(grads).enumerate() {
                    let m = ADAM_BETA1 * state.first[index] + (1.0 - ADAM_BETA1) * grad;
                    let v = ADAM_BETA2 * state.second[index] + (1.0 - ADAM_BETA2) * grad * grad;
                    state.first[index] = m;
                    state.second[index] = v;

                    let m_hat = m / first_correction;
                    let v_hat = v / second_correction;
                    *param -= *learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
                }
            }
        }
    }
}
