/// Sparse categorical cross-entropy for use with a Softmax output layer.
///
/// Targets are integer class indices rather than one-hot rows.
pub struct SparseCrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl SparseCrossEntropyLoss {
    /// L = -log(predicted[target] + eps)
    ///
    /// `predicted`: softmax probabilities, shape [n_classes]
    /// `target`   : index of the true class
    pub fn loss(predicted: &[f64], target: usize) -> f64 {
        -(predicted[target] + EPS).ln()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the logits:
    ///   ∂L/∂z_i = predicted[i] - 1{i == target}
    ///
    /// The Softmax layer's own derivative is identity, so this delta passes
    /// through it unchanged.
    pub fn derivative(predicted: &[f64], target: usize) -> Vec<f64> {
        predicted.iter().enumerate()
            .map(|(i, p)| if i == target { p - 1.0 } else { *p })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_is_negative_log_of_target_probability() {
        let p = [0.1, 0.7, 0.2];
        assert!((SparseCrossEntropyLoss::loss(&p, 1) - (-(0.7f64).ln())).abs() < 1e-9);
    }

    #[test]
    fn gradient_subtracts_one_at_target() {
        let g = SparseCrossEntropyLoss::derivative(&[0.25, 0.5, 0.25], 2);
        assert_eq!(g, vec![0.25, 0.5, -0.75]);
        assert!(g.iter().sum::<f64>().abs() < 1e-12);
    }
}
