//! Retraining Orchestrator: background retraining with an observable
//! [`TrainingRun`] and an atomic model swap on success.

pub mod orchestrator;
pub mod params;
pub(crate) mod pipeline;
pub mod run;

pub use orchestrator::RetrainOrchestrator;
pub use params::{RetrainParams, RetrainSummary};
pub use run::{epoch_progress, TrainingRun, TrainingStatus};
