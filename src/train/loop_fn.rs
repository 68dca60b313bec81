use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::TrainError;
use crate::layers::dense::LayerGradients;
use crate::loss::cross_entropy::SparseCrossEntropyLoss;
use crate::network::network::Network;
use crate::optim::adam::Adam;
use crate::train::epoch_stats::{EpochStats, TrainHistory};
use crate::train::train_config::{LabeledSet, TrainConfig};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` with mini-batch Adam on sparse cross-entropy for
/// `config.epochs` epochs.
///
/// `on_epoch` is invoked once at the end of every completed epoch with that
/// epoch's statistics. The network is modified in place; on error it may be
/// left partially trained, so callers train a copy of whatever they serve.
///
/// # Errors
/// - `EmptyTrainingSet` if `train` has no samples
/// - `InputSize` / `LabelOutOfRange` if a sample does not fit the network
/// - `Diverged` if the loss or any weight becomes non-finite
pub fn train_loop<R: Rng + ?Sized>(
    network: &mut Network,
    train: &LabeledSet,
    val: Option<&LabeledSet>,
    optimizer: &mut Adam,
    config: &TrainConfig,
    rng: &mut R,
    on_epoch: &mut dyn FnMut(&EpochStats),
) -> Result<TrainHistory, TrainError> {
    if train.is_empty() {
        return Err(TrainError::EmptyTrainingSet);
    }
    check_fits(network, train)?;
    if let Some(v) = val {
        check_fits(network, v)?;
    }

    let batch_size = config.batch_size.max(1);
    let val_batch_size = config.val_batch_size.max(1);
    let mut grads: Vec<LayerGradients> = network.layers.iter()
        .map(LayerGradients::zeros_like)
        .collect();
    let mut history = TrainHistory::default();

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        let (train_loss, train_accuracy) =
            run_one_epoch(network, train, optimizer, batch_size, &mut grads, rng);

        let (val_loss, val_accuracy) = match val.filter(|v| !v.is_empty()) {
            Some(v) => {
                let (l, a) = evaluate(network, v, val_batch_size);
                (Some(l), Some(a))
            }
            None => (None, None),
        };

        if !train_loss.is_finite() || !network.is_finite() {
            return Err(TrainError::Diverged { epoch });
        }

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        on_epoch(&stats);
        history.epochs.push(stats);
    }

    Ok(history)
}

/// Mean loss and accuracy of `network` over `set`, evaluated in chunks of
/// `batch_size` without touching the weights.
pub fn evaluate(network: &Network, set: &LabeledSet, batch_size: usize) -> (f64, f64) {
    let n = set.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mut total_loss = 0.0;
    let mut correct = 0usize;
    for (inputs, labels) in set.inputs.chunks(batch_size.max(1)).zip(set.labels.chunks(batch_size.max(1))) {
        for (input, &label) in inputs.iter().zip(labels) {
            let output = network.predict(input);
            total_loss += SparseCrossEntropyLoss::loss(&output, label);
            if argmax(&output) == label {
                correct += 1;
            }
        }
    }
    (total_loss / n as f64, correct as f64 / n as f64)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn check_fits(network: &Network, set: &LabeledSet) -> Result<(), TrainError> {
    let expected = network.input_size();
    if let Some(bad) = set.inputs.iter().find(|x| x.len() != expected) {
        return Err(TrainError::InputSize { expected, found: bad.len() });
    }
    let classes = network.output_size();
    if let Some(&label) = set.labels.iter().find(|&&l| l >= classes) {
        return Err(TrainError::LabelOutOfRange { label, classes });
    }
    Ok(())
}

/// Runs one full epoch of mini-batch Adam over the training data.
/// Returns (mean loss, accuracy) over all samples.
fn run_one_epoch<R: Rng + ?Sized>(
    network: &mut Network,
    set: &LabeledSet,
    optimizer: &mut Adam,
    batch_size: usize,
    grads: &mut [LayerGradients],
    rng: &mut R,
) -> (f64, f64) {
    let n = set.len();
    let mut total_loss = 0.0;
    let mut correct = 0usize;

    // Shuffle sample order each epoch.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    for batch in indices.chunks(batch_size) {
        grads.iter_mut().for_each(LayerGradients::reset);

        for &idx in batch {
            let label = set.labels[idx];
            let output = network.forward(&set.inputs[idx]);

            total_loss += SparseCrossEntropyLoss::loss(&output, label);
            if argmax(&output) == label {
                correct += 1;
            }

            let mut delta = SparseCrossEntropyLoss::derivative(&output, label);
            for i in (0..network.layers.len()).rev() {
                delta = network.layers[i].backward(&delta, &mut grads[i]);
            }
        }

        let inv_batch = 1.0 / batch.len() as f64;
        grads.iter_mut().for_each(|g| g.scale(inv_batch));
        optimizer.step(network, grads);
    }

    (total_loss / n as f64, correct as f64 / n as f64)
}

/// Index of the first maximum element in a slice.
pub(crate) fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &x)| if x > bv { (i, x) } else { (bi, bv) })
        .0
}
