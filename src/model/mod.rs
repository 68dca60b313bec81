pub mod handle;
pub mod paths;
pub mod prediction;
pub mod store;

pub use handle::{LoadedModel, ModelHandle};
pub use paths::ModelPaths;
pub use prediction::{interpret, PredictionResult, TopPrediction};
pub use store::ModelStore;
