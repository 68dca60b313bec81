/// Configuration for a `train_loop` run.
///
/// - `epochs`        : total number of full passes over the training data
/// - `batch_size`    : samples per mini-batch for gradient updates
/// - `val_batch_size`: samples per chunk when evaluating the validation set
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub val_batch_size: usize,
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig { epochs, batch_size, val_batch_size: batch_size }
    }
}

/// Inputs with their integer class labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSet {
    pub inputs: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl LabeledSet {
    pub fn push(&mut self, input: Vec<f64>, label: usize) {
        self.inputs.push(input);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
