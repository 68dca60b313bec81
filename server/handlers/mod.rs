pub mod bulk;
pub mod predict;
pub mod retrain;
pub mod status;
