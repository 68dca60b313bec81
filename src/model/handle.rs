use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use crate::classes::ReverseMapping;
use crate::error::{ModelError, PredictError, RetrainError};
use crate::model::paths::ModelPaths;
use crate::model::prediction::{interpret, PredictionResult};
use crate::model::store::ModelStore;
use crate::network::{InputType, Network};
use crate::preprocess::{preprocess_image_bytes, ImageTensor, FEATURE_COUNT, TARGET_HEIGHT, TARGET_WIDTH};
use crate::retrain::{self, RetrainParams, RetrainSummary};

/// A network together with the mapping that names its outputs.
///
/// The two are only ever published together, so a reader never pairs a
/// network with a mapping from another generation.
#[derive(Debug)]
pub struct LoadedModel {
    pub network: Network,
    pub mapping: ReverseMapping,
    pub version: u64,
}

impl LoadedModel {
    pub fn new(network: Network, mapping: ReverseMapping, version: u64) -> Result<LoadedModel, ModelError> {
        network.check_shapes().map_err(ModelError::Shape)?;
        if network.input_size() != FEATURE_COUNT {
            return Err(ModelError::Shape(format!(
                "model expects {} input features, images provide {}",
                network.input_size(),
                FEATURE_COUNT
            )));
        }
        if let Some(InputType::ImageRgb { width, height }) =
            network.metadata.as_ref().and_then(|m| m.input_type.as_ref())
        {
            if (*width, *height) != (TARGET_WIDTH, TARGET_HEIGHT) {
                return Err(ModelError::Shape(format!(
                    "model was built for {}x{} images, not {}x{}",
                    width, height, TARGET_WIDTH, TARGET_HEIGHT
                )));
            }
        }
        if network.output_size() != mapping.len() {
            return Err(ModelError::Shape(format!(
                "model has {} outputs but the mapping names {} classes",
                network.output_size(),
                mapping.len()
            )));
        }
        Ok(LoadedModel { network, mapping, version })
    }

    pub fn predict(&self, tensor: &ImageTensor) -> Result<PredictionResult, ModelError> {
        let probabilities = self.network.predict(tensor.as_slice());
        interpret(&probabilities, &self.mapping)
    }
}

/// The process-wide classifier.
///
/// Prediction takes a snapshot of the current [`LoadedModel`] and never
/// waits on retraining. Retraining works on a private copy and swaps the
/// result in only after it is persisted and reloaded.
pub struct ModelHandle {
    store: ModelStore,
    current: RwLock<Option<Arc<LoadedModel>>>,
    next_version: AtomicU64,
    retrain_guard: Mutex<()>,
}

impl ModelHandle {
    /// Loads both artifacts. A missing artifact is fatal to the caller.
    pub fn load(paths: ModelPaths) -> Result<ModelHandle, ModelError> {
        let store = ModelStore::new(paths);
        let (network, mapping) = store.load()?;
        let model = LoadedModel::new(network, mapping, 1)?;
        tracing::info!(
            model = %store.paths().model_path().display(),
            classes = model.mapping.len(),
            "Model loaded"
        );
        Ok(ModelHandle {
            store,
            current: RwLock::new(Some(Arc::new(model))),
            next_version: AtomicU64::new(2),
            retrain_guard: Mutex::new(()),
        })
    }

    pub fn paths(&self) -> &ModelPaths {
        self.store.paths()
    }

    pub(crate) fn store(&self) -> &ModelStore {
        &self.store
    }

    /// The model predictions are currently served from.
    pub fn snapshot(&self) -> Result<Arc<LoadedModel>, ModelError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ModelError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_ok()
    }

    pub fn version(&self) -> Option<u64> {
        self.snapshot().ok().map(|m| m.version)
    }

    pub fn predict(&self, tensor: &ImageTensor) -> Result<PredictionResult, ModelError> {
        self.snapshot()?.predict(tensor)
    }

    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult, PredictError> {
        let tensor = preprocess_image_bytes(bytes)?;
        Ok(self.predict(&tensor)?)
    }

    /// Retrains on the directory tree at `dataset` and swaps the result in.
    ///
    /// Only one run may be active per handle; a second concurrent call
    /// fails with [`RetrainError::Conflict`]. On any error the served model
    /// and the files on disk are left as they were.
    pub fn retrain(
        &self,
        dataset: &Path,
        params: &RetrainParams,
        log: &dyn Fn(&str),
        progress: &dyn Fn(usize, usize),
    ) -> Result<RetrainSummary, RetrainError> {
        let _guard = self.try_begin_retrain().ok_or(RetrainError::Conflict)?;
        retrain::pipeline::run(self, dataset, params, log, progress)
    }

    fn try_begin_retrain(&self) -> Option<MutexGuard<'_, ()>> {
        match self.retrain_guard.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Publishes a new generation built from artifacts already on disk.
    pub(crate) fn publish(&self, network: Network, mapping: ReverseMapping) -> Result<u64, ModelError> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let model = Arc::new(LoadedModel::new(network, mapping, version)?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(model);
        Ok(version)
    }

    #[cfg(test)]
    pub(crate) fn unload(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
