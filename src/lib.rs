pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;

pub mod preprocess;
pub mod classes;
pub mod dataset;
pub mod model;
pub mod retrain;
pub mod ingest;
pub mod stats;
pub mod config;
pub mod error;
pub mod logging;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Network, NetworkSpec, LayerSpec};
pub use optim::adam::Adam;
pub use train::{train_loop, TrainConfig, EpochStats};

pub use preprocess::{preprocess_image_bytes, ImageTensor};
pub use classes::{ClassCode, ClassIndex, ReverseMapping};
pub use model::{ModelHandle, ModelPaths, PredictionResult};
pub use retrain::{RetrainOrchestrator, RetrainParams, RetrainSummary, TrainingRun, TrainingStatus};
pub use ingest::{BulkIngestor, BulkValidationReport, FileValidation, UploadedFile};
pub use stats::ServiceStats;
pub use config::AppConfig;
pub use error::{DecodeError, ModelError, PredictError, RetrainError, StartRetrainError};
