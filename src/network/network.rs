use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::layers::dense::Layer;
use crate::network::metadata::ModelMetadata;
use crate::network::spec::NetworkSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl Network {
    /// Builds a freshly initialised network from an architecture spec.
    pub fn from_spec<R: Rng + ?Sized>(spec: &NetworkSpec, rng: &mut R) -> Network {
        let layers = spec.layers.iter()
            .map(|l| Layer::new(l.size, l.input_size, l.activation.clone(), rng))
            .collect();
        Network { layers, metadata: spec.metadata.clone() }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map(|l| l.size).unwrap_or(0)
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &mut self.layers {
            current = layer.feed_from(&current);
        }
        current
    }

    /// Read-only forward pass used for serving.
    pub fn predict(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.activate(&current);
        }
        current
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(Layer::is_finite)
    }

    /// Checks every parameter buffer and that each layer consumes exactly
    /// what the previous one produces. Deserialized networks skip the
    /// constructor asserts, so this must pass before any forward pass.
    pub fn check_shapes(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no layers".to_owned());
        }
        for (i, layer) in self.layers.iter().enumerate() {
            let (w, b) = (&layer.weights, &layer.biases);
            if w.data.len() != w.rows * w.cols {
                return Err(format!(
                    "layer {} weights hold {} values, expected {}x{}",
                    i, w.data.len(), w.rows, w.cols
                ));
            }
            if w.cols != layer.size {
                return Err(format!("layer {} has {} neurons but {} weight columns", i, layer.size, w.cols));
            }
            if b.rows != 1 || b.cols != layer.size || b.data.len() != layer.size {
                return Err(format!(
                    "layer {} biases are {}x{} ({} values), expected 1x{}",
                    i, b.rows, b.cols, b.data.len(), layer.size
                ));
            }
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[1].input_size() != pair[0].size {
                return Err(format!(
                    "layer {} takes {} inputs but layer {} has {} neurons",
                    i + 1, pair[1].input_size(), i, pair[0].size
                ));
            }
        }
        Ok(())
    }

    /// Serializes the network weights to a JSON file.
    pub fn save_json(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::io::Write::flush(&mut writer)?;
        writer.get_ref().sync_all()
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: &Path) -> std::io::Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::math::matrix::Matrix;
    use crate::network::spec::LayerSpec;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    fn small_spec() -> NetworkSpec {
        NetworkSpec {
            name: "small".into(),
            layers: vec![
                LayerSpec { size: 4, input_size: 3, activation: ActivationFunction::ReLU },
                LayerSpec { size: 2, input_size: 4, activation: ActivationFunction::Softmax },
            ],
            metadata: None,
        }
    }

    #[test]
    fn predict_equals_training_forward() {
        let mut net = Network::from_spec(&small_spec(), &mut StdRng::seed_from_u64(1));
        let input = [0.2, 0.4, 0.6];
        assert_eq!(net.predict(&input), net.forward(&input));
        assert_eq!((net.input_size(), net.output_size()), (3, 2));
    }

    #[test]
    fn json_reload_reproduces_outputs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.json");
        let net = Network::from_spec(&small_spec(), &mut StdRng::seed_from_u64(2));
        net.save_json(&path).unwrap();
        let loaded = Network::load_json(&path).unwrap();
        let input = [0.9, 0.1, 0.5];
        assert_eq!(net.predict(&input), loaded.predict(&input));
    }

    #[test]
    fn spec_validation_catches_width_mismatch() {
        let mut spec = small_spec();
        assert!(spec.validate().is_ok());
        spec.layers[1].input_size = 5;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn landcover_spec_matches_image_input() {
        let mut spec = NetworkSpec::landcover(8, 9);
        assert!(spec.validate().is_ok());
        spec.layers[0].input_size = 100;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn shape_check_rejects_broken_chains_and_buffers() {
        let net = Network::from_spec(&small_spec(), &mut StdRng::seed_from_u64(4));
        assert!(net.check_shapes().is_ok());

        let mut chain = net.clone();
        chain.layers[1] = Layer::from_parts(
            Matrix::zeros(5, 2),
            Matrix::zeros(1, 2),
            ActivationFunction::Softmax,
        );
        assert!(chain.check_shapes().unwrap_err().contains("takes 5 inputs"));

        let mut value = serde_json::to_value(&net).unwrap();
        value["layers"][0]["weights"]["data"].as_array_mut().unwrap().pop();
        let truncated: Network = serde_json::from_value(value).unwrap();
        assert!(truncated.check_shapes().unwrap_err().contains("weights hold 11 values"));

        let mut value = serde_json::to_value(&net).unwrap();
        value["layers"][1]["biases"]["cols"] = serde_json::json!(3);
        let wide_bias: Network = serde_json::from_value(value).unwrap();
        assert!(wide_bias.check_shapes().is_err());
    }
}
