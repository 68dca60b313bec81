use serde::{Serialize, Deserialize};

/// Per-epoch training statistics emitted by `train_loop`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f64,
    /// Fraction of training samples the network classified correctly while
    /// passing over them this epoch.
    pub train_accuracy: f64,
    /// Mean validation loss, if a validation set was provided.
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

impl EpochStats {
    /// One log line per epoch, e.g.
    /// `Epoch 3/10 - loss: 0.4122, accuracy: 0.8750, val_loss: 0.5010, val_accuracy: 0.7500`.
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "Epoch {}/{} - loss: {:.4}, accuracy: {:.4}",
            self.epoch, self.total_epochs, self.train_loss, self.train_accuracy
        );
        if let (Some(vl), Some(va)) = (self.val_loss, self.val_accuracy) {
            line.push_str(&format!(", val_loss: {:.4}, val_accuracy: {:.4}", vl, va));
        }
        line
    }
}

/// All epochs of one completed `train_loop` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainHistory {
    pub epochs: Vec<EpochStats>,
}

impl TrainHistory {
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}
