//! The body of one retraining run, executed on the caller's thread.
//!
//! Steps: scan and label the dataset, split it, train a private copy of the
//! served network with a fresh optimizer, then back up, persist, reload and
//! publish. Nothing visible to predictions changes until the final publish.

use std::path::Path;

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::{load_samples, stratified_split, DatasetIndex};
use crate::error::{DatasetError, ModelError, RetrainError};
use crate::model::ModelHandle;
use crate::optim::Adam;
use crate::retrain::params::{RetrainParams, RetrainSummary};
use crate::train::{train_loop, EpochStats, TrainConfig};

pub(crate) fn run(
    handle: &ModelHandle,
    dataset: &Path,
    params: &RetrainParams,
    log: &dyn Fn(&str),
    progress: &dyn Fn(usize, usize),
) -> Result<RetrainSummary, RetrainError> {
    // Each line goes to the run log and to tracing once.
    let note = |message: &str| {
        tracing::info!(target: "landcover_nn::retrain", "{}", message);
        log(message);
    };

    if params.epochs == 0 {
        return Err(RetrainError::InvalidParams("epochs must be at least 1".to_owned()));
    }
    if !(0.0..1.0).contains(&params.validation_split) {
        return Err(RetrainError::InvalidParams(format!(
            "validation split {} is outside [0, 1)",
            params.validation_split
        )));
    }

    note(&format!("Loading training data from {}", dataset.display()));
    let index = DatasetIndex::scan(dataset)?;
    note(&format!(
        "Scanned {} folders ({}) with {} images",
        index.folders.len(),
        index.folder_names().join(", "),
        index.sample_count()
    ));
    let current = handle.snapshot()?;

    let (classes, skipped) = index.label_with(&current.mapping);
    for name in &skipped {
        note(&format!(
            "Warning: skipping folder '{}' (empty or not a class of the current model)",
            name
        ));
    }
    let samples: usize = classes.iter().map(|c| c.files.len()).sum();
    if classes.len() < 2 || samples == 0 {
        return Err(DatasetError::InsufficientData { classes: classes.len(), samples }.into());
    }
    let names: Vec<&str> = classes.iter().map(|c| c.folder.as_str()).collect();
    note(&format!("Found {} images across {} classes: {}", samples, classes.len(), names.join(", ")));

    if classes.len() != current.mapping.len() {
        note(&format!(
            "Warning: dataset has {} classes but the model outputs {}; training on the classes present",
            classes.len(),
            current.mapping.len()
        ));
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let plan = stratified_split(&classes, params.validation_split, &mut rng);
    let train = load_samples(&plan.train)?;
    let val = load_samples(&plan.val)?;
    note(&format!("Training samples: {}, validation samples: {}", train.len(), val.len()));
    if val.is_empty() {
        note("Warning: validation set is empty; training without validation");
    }

    let batch_size = params.batch_size.max(1).min(train.len().max(1));
    let val_batch_size = params.batch_size.max(1).min(val.len().max(1));
    if batch_size != params.batch_size {
        note(&format!("Batch size clamped to {}", batch_size));
    }

    note(&format!(
        "Recompiling model with fresh optimizer (Adam, learning rate {})...",
        params.learning_rate
    ));
    let mut network = current.network.clone();
    let mut optimizer = Adam::new(params.learning_rate, &network);
    let config = TrainConfig { epochs: params.epochs, batch_size, val_batch_size };

    note(&format!("Starting training for {} epochs...", params.epochs));
    let val_set = if val.is_empty() { None } else { Some(&val) };
    let history = train_loop(
        &mut network,
        &train,
        val_set,
        &mut optimizer,
        &config,
        &mut rng,
        &mut |stats: &EpochStats| {
            tracing::info!(
                target: "landcover_nn::retrain",
                epoch = stats.epoch,
                loss = stats.train_loss,
                accuracy = stats.train_accuracy,
                val_loss = ?stats.val_loss,
                val_accuracy = ?stats.val_accuracy,
                "{}",
                stats.log_line()
            );
            log(&stats.log_line());
            progress(stats.epoch, stats.total_epochs);
        },
    )?;
    // train_loop returns one entry per epoch and epochs >= 1.
    let last = history
        .last()
        .cloned()
        .ok_or_else(|| RetrainError::InvalidParams("no epochs were run".to_owned()))?;

    note("Training completed. Saving model...");
    let store = handle.store();
    let backup = store.backup_current(Local::now())?;
    if let Some(path) = &backup {
        note(&format!("Backed up previous model to {}", path.display()));
    }

    let swapped = store
        .persist_network(&network)
        .and_then(|()| store.load())
        .and_then(|(reloaded, mapping)| handle.publish(reloaded, mapping));
    let version = match swapped {
        Ok(version) => version,
        Err(err) => {
            restore(handle, backup.as_deref(), &err, &note);
            return Err(err.into());
        }
    };
    note(&format!("Model saved and reloaded from disk (version {})", version));

    Ok(RetrainSummary {
        epochs: last.total_epochs,
        final_loss: last.train_loss,
        final_accuracy: last.train_accuracy,
        final_val_loss: last.val_loss,
        final_val_accuracy: last.val_accuracy,
        train_samples: train.len(),
        val_samples: val.len(),
        classes: classes.len(),
        backup_path: backup,
        model_version: version,
    })
}

/// Puts the previous model file back after a failed save or reload.
fn restore(handle: &ModelHandle, backup: Option<&Path>, cause: &ModelError, log: &dyn Fn(&str)) {
    let Some(backup) = backup else { return };
    match handle.store().restore_backup(backup) {
        Ok(()) => log(&format!("Save failed ({}); restored previous model file", cause)),
        Err(err) => {
            tracing::error!(error = %err, backup = %backup.display(), "Could not restore model backup");
            log(&format!("Save failed ({}) and restoring the backup failed: {}", cause, err));
        }
    }
}
