use serde::{Deserialize, Serialize};

/// Describes how to interpret the input fed to a Network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputType {
    /// RGB image resized to width×height, normalized to [0, 1], flattened as R,G,B,...
    ImageRgb { width: u32, height: u32 },
}

impl InputType {
    pub fn feature_count(&self) -> usize {
        match self {
            InputType::ImageRgb { width, height } => *width as usize * *height as usize * 3,
        }
    }
}

/// Optional annotations attached to a saved Network.
/// All fields are Option<> so models without metadata deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    pub input_type: Option<InputType>,
}
