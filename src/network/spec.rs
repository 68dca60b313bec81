use std::path::Path;

use serde::{Serialize, Deserialize};
use crate::activation::activation::ActivationFunction;
use crate::network::metadata::{InputType, ModelMetadata};
use crate::preprocess::{FEATURE_COUNT, TARGET_HEIGHT, TARGET_WIDTH};

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`      : number of neurons in this layer
/// - `input_size`: output size of the previous layer, or the raw input
///                  dimension for the first layer
/// - `activation`: activation function applied after the linear transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// A serializable description of a network architecture, used to build a
/// freshly initialised model before any training has happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl NetworkSpec {
    /// The default land-cover classifier: flattened 64×64 RGB input, one
    /// ReLU hidden layer and a Softmax over `classes` outputs.
    pub fn landcover(hidden_units: usize, classes: usize) -> NetworkSpec {
        NetworkSpec {
            name: "landcover_rgb".to_owned(),
            layers: vec![
                LayerSpec { size: hidden_units, input_size: FEATURE_COUNT, activation: ActivationFunction::ReLU },
                LayerSpec { size: classes, input_size: hidden_units, activation: ActivationFunction::Softmax },
            ],
            metadata: Some(ModelMetadata {
                description: Some("Land-cover classifier over 64x64 RGB tiles".to_owned()),
                input_type: Some(InputType::ImageRgb { width: TARGET_WIDTH, height: TARGET_HEIGHT }),
            }),
        }
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &Path) -> std::io::Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Checks that consecutive layers line up and that the first layer
    /// matches the declared input type, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err(format!("network spec '{}' has no layers", self.name));
        }
        if let Some(input) = self.metadata.as_ref().and_then(|m| m.input_type.as_ref()) {
            if self.layers[0].input_size != input.feature_count() {
                return Err(format!(
                    "first layer takes {} inputs but the input type provides {}",
                    self.layers[0].input_size,
                    input.feature_count()
                ));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[1].input_size != pair[0].size {
                return Err(format!(
                    "layer {} expects {} inputs but layer {} has {} neurons",
                    i + 1, pair[1].input_size, i, pair[0].size
                ));
            }
        }
        Ok(())
    }
}
