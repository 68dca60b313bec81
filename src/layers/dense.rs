use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::{softmax, ActivationFunction};
use crate::math::matrix::Matrix;

/// Fully connected layer computing `a = σ(x · W + b)`.
///
/// `weights` has shape (input_size, size). The cached `inputs` and
/// `pre_neurons` rows are only populated by the training forward pass and
/// are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    #[serde(skip)]
    inputs: Vec<f64>,
    #[serde(skip)]
    pre_neurons: Vec<f64>,
}

/// Gradient buffers shaped like one layer's parameters.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl LayerGradients {
    pub fn zeros_like(layer: &Layer) -> LayerGradients {
        LayerGradients {
            weights: Matrix::zeros(layer.weights.rows, layer.weights.cols),
            biases: Matrix::zeros(1, layer.size),
        }
    }

    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.biases.fill(0.0);
    }

    pub fn scale(&mut self, factor: f64) {
        self.weights.scale_in_place(factor);
        self.biases.scale_in_place(factor);
    }
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = if activation.prefers_he_init() {
            Matrix::he(input_size, size, rng)
        } else {
            Matrix::xavier(input_size, size, rng)
        };
        Layer::from_parts(weights, Matrix::zeros(1, size), activation)
    }

    /// Builds a layer from explicit parameters (e.g. when loading or in tests).
    pub fn from_parts(weights: Matrix, biases: Matrix, activation: ActivationFunction) -> Layer {
        assert_eq!(biases.rows, 1);
        assert_eq!(weights.cols, biases.cols);
        Layer {
            size: weights.cols,
            weights,
            biases,
            activator: activation,
            inputs: Vec::new(),
            pre_neurons: Vec::new(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    fn pre_activation(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.left_multiply(input);
        for (zi, b) in z.iter_mut().zip(&self.biases.data) {
            *zi += b;
        }
        z
    }

    fn apply_activation(&self, z: &[f64]) -> Vec<f64> {
        match self.activator {
            ActivationFunction::Softmax => softmax(z),
            ref act => z.iter().map(|&x| act.function(x)).collect(),
        }
    }

    /// Inference-only pass; leaves the layer untouched so it can be shared
    /// across threads.
    pub fn activate(&self, input: &[f64]) -> Vec<f64> {
        self.apply_activation(&self.pre_activation(input))
    }

    /// Training pass; caches the input and `z` for [`Layer::backward`].
    pub fn feed_from(&mut self, input: &[f64]) -> Vec<f64> {
        let z = self.pre_activation(input);
        let a = self.apply_activation(&z);
        self.inputs = input.to_vec();
        self.pre_neurons = z;
        a
    }

    /// Accumulates this layer's gradients for one sample into `grads` and
    /// returns ∂L/∂a for the previous layer.
    ///
    /// `delta` is ∂L/∂a for this layer (error in activation space). Must be
    /// called after `feed_from` on the same sample.
    pub fn backward(&self, delta: &[f64], grads: &mut LayerGradients) -> Vec<f64> {
        // δ = error ⊙ σ'(z)
        let layer_delta: Vec<f64> = delta
            .iter()
            .zip(&self.pre_neurons)
            .map(|(d, &z)| d * self.activator.derivative(z))
            .collect();

        grads.weights.add_outer(&self.inputs, &layer_delta);
        for (b, d) in grads.biases.data.iter_mut().zip(&layer_delta) {
            *b += d;
        }

        self.weights.right_multiply(&layer_delta)
    }

    pub fn is_finite(&self) -> bool {
        self.weights.is_finite() && self.biases.is_finite()
    }
}
