use serde::{Serialize, Deserialize};
use std::f64::consts::E;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is a vector-valued activation; `Layer` applies it over the
    /// whole pre-activation row via [`softmax`], not element-wise.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    /// Element-wise activation. `Softmax` passes values through unchanged
    /// here; the layer normalises the full row afterwards.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Element-wise derivative of the activation.
    ///
    /// For `Softmax` the layer is always paired with cross-entropy, whose
    /// gradient is already taken w.r.t. the logits (`predicted - onehot`),
    /// so this returns 1.0 to pass that delta through unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }

    /// Whether He initialization suits this activation (ReLU family).
    pub fn prefers_he_init(&self) -> bool {
        matches!(self, ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. })
    }
}

/// Numerically stable softmax over a row of logits.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
