use std::sync::Arc;

use landcover_nn::config::AppConfig;
use landcover_nn::ingest::BulkIngestor;
use landcover_nn::model::ModelHandle;
use landcover_nn::retrain::RetrainOrchestrator;
use landcover_nn::stats::{ServiceStats, SystemMonitor};

/// Everything request handlers share. Built once at startup; each part
/// guards its own mutable state.
pub struct AppState {
    pub config: AppConfig,
    pub handle: Arc<ModelHandle>,
    pub orchestrator: RetrainOrchestrator,
    pub ingestor: BulkIngestor,
    pub stats: ServiceStats,
    pub monitor: SystemMonitor,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, handle: ModelHandle) -> AppState {
        let handle = Arc::new(handle);
        let orchestrator = RetrainOrchestrator::new(Arc::clone(&handle), config.retrain_params());
        let ingestor = BulkIngestor::new(config.paths.upload_root.clone());
        AppState {
            config,
            handle,
            orchestrator,
            ingestor,
            stats: ServiceStats::new(),
            monitor: SystemMonitor::new(),
        }
    }
}
