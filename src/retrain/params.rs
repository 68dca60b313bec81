use std::path::PathBuf;

use serde::Serialize;

/// Knobs for one retraining run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrainParams {
    pub epochs: usize,
    /// Requested batch size; clamped per partition to the samples available.
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction of each class held out for validation.
    pub validation_split: f64,
    /// Fixes shuffling and the split when set.
    pub seed: Option<u64>,
}

impl RetrainParams {
    pub fn with_epochs(epochs: usize) -> RetrainParams {
        RetrainParams { epochs, ..RetrainParams::default() }
    }
}

impl Default for RetrainParams {
    fn default() -> Self {
        RetrainParams {
            epochs: 10,
            batch_size: 8,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: None,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainSummary {
    pub epochs: usize,
    pub final_loss: f64,
    pub final_accuracy: f64,
    pub final_val_loss: Option<f64>,
    pub final_val_accuracy: Option<f64>,
    pub train_samples: usize,
    pub val_samples: usize,
    pub classes: usize,
    pub backup_path: Option<PathBuf>,
    pub model_version: u64,
}
