//! Error types for every failure domain of the service.
//!
//! Prediction and ingestion errors are local to one request or file.
//! Retraining errors end the run that raised them and never touch the
//! model currently being served.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Raw bytes (or a file) could not be decoded as an image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("could not read image {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which persisted artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Mapping,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => f.write_str("model"),
            ArtifactKind::Mapping => f.write_str("class mapping"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no model is currently loaded")]
    NotLoaded,
    #[error("{kind} file missing: {path}")]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },
    #[error("failed to read {kind} file {path}: {source}")]
    Read {
        kind: ArtifactKind,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{kind} already exists at {path}")]
    AlreadyExists { kind: ArtifactKind, path: PathBuf },
    #[error("invalid class mapping in {path}: {reason}")]
    InvalidMapping { path: PathBuf, reason: String },
    #[error("shape mismatch: {0}")]
    Shape(String),
}

/// Failure of a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("training data path not found: {0}")]
    NotFound(PathBuf),
    #[error("training data path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("need at least 2 classes with samples for training, found {classes} classes and {samples} samples")]
    InsufficientData { classes: usize, samples: usize },
    #[error("corrupt training image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: DecodeError,
    },
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("sample has {found} features but the network expects {expected}")]
    InputSize { expected: usize, found: usize },
    #[error("label {label} is outside the {classes} network outputs")]
    LabelOutOfRange { label: usize, classes: usize },
    #[error("training diverged at epoch {epoch} (non-finite loss or weights)")]
    Diverged { epoch: usize },
}

/// Failure of one retraining run. The served model is unchanged.
#[derive(Debug, Error)]
pub enum RetrainError {
    #[error("a retraining run is already in progress")]
    Conflict,
    #[error("invalid retraining parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{0}")]
    Panicked(String),
}

/// Reasons a retrain request is refused before any work starts.
#[derive(Debug, Error)]
pub enum StartRetrainError {
    #[error("a retraining run is already in progress")]
    Conflict,
    #[error("training data path not found: {0}")]
    DatasetPathNotFound(PathBuf),
    #[error("epochs must be at least 1")]
    InvalidEpochs,
    #[error("failed to spawn retraining worker: {0}")]
    Spawn(std::io::Error),
}

/// Failure of a whole bulk upload (per-file failures are reported inline).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to create batch directory {path}: {source}")]
    CreateBatchDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
