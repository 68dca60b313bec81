use crate::layers::dense::LayerGradients;
use crate::math::matrix::Matrix;
use crate::network::network::Network;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// First and second moment estimates for one layer.
struct Moments {
    m_w: Matrix,
    v_w: Matrix,
    m_b: Matrix,
    v_b: Matrix,
}

/// Adam optimizer.
///
/// Moment buffers are sized for a specific network at construction time and
/// start at zero; build a new `Adam` for every training run so no state
/// carries over from a previous one.
pub struct Adam {
    pub learning_rate: f64,
    step: u64,
    moments: Vec<Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64, network: &Network) -> Adam {
        let moments = network.layers.iter()
            .map(|layer| Moments {
                m_w: Matrix::zeros(layer.weights.rows, layer.weights.cols),
                v_w: Matrix::zeros(layer.weights.rows, layer.weights.cols),
                m_b: Matrix::zeros(1, layer.size),
                v_b: Matrix::zeros(1, layer.size),
            })
            .collect();
        Adam { learning_rate, step: 0, moments }
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Applies one bias-corrected Adam update to every layer.
    ///
    /// `grads[i]` must be the (already averaged) gradients of layer `i`.
    pub fn step(&mut self, network: &mut Network, grads: &[LayerGradients]) {
        assert_eq!(grads.len(), network.layers.len());
        assert_eq!(self.moments.len(), network.layers.len(), "optimizer built for another network");
        self.step += 1;
        let t = self.step as i32;
        let lr_t = self.learning_rate * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));

        for ((layer, grad), mom) in network.layers.iter_mut().zip(grads).zip(&mut self.moments) {
            update(&mut layer.weights, &grad.weights, &mut mom.m_w, &mut mom.v_w, lr_t);
            update(&mut layer.biases, &grad.biases, &mut mom.m_b, &mut mom.v_b, lr_t);
        }
    }
}

fn update(param: &mut Matrix, grad: &Matrix, m: &mut Matrix, v: &mut Matrix, lr_t: f64) {
    for i in 0..param.data.len() {
        let g = grad.data[i];
        m.data[i] = BETA1 * m.data[i] + (1.0 - BETA1) * g;
        v.data[i] = BETA2 * v.data[i] + (1.0 - BETA2) * g * g;
        param.data[i] -= lr_t * m.data[i] / (v.data[i].sqrt() + EPSILON);
    }
}
