//! TOML configuration. Every key has a default, so a partial file (or no
//! file at all) is valid.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::ModelPaths;
use crate::retrain::RetrainParams;

/// Read from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "landcover.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub model_dir: PathBuf,
    pub model_file: String,
    pub mapping_file: String,
    pub upload_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            model_dir: PathBuf::from("models"),
            model_file: "model_rgb.json".to_owned(),
            mapping_file: "reverse_mapping_rgb.json".to_owned(),
            upload_root: PathBuf::from("uploads/bulk_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub default_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    /// Hidden layer width used by `init-model`.
    pub hidden_units: usize,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            default_epochs: 10,
            batch_size: 8,
            learning_rate: 0.001,
            validation_split: 0.2,
            hidden_units: 64,
            seed: None,
        }
    }
}

impl AppConfig {
    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists,
    /// else the defaults. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        match path {
            Some(path) => AppConfig::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    AppConfig::from_file(default)
                } else {
                    Ok(AppConfig::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            dir: self.paths.model_dir.clone(),
            model_file: self.paths.model_file.clone(),
            mapping_file: self.paths.mapping_file.clone(),
        }
    }

    pub fn retrain_params(&self) -> RetrainParams {
        RetrainParams {
            epochs: self.training.default_epochs,
            batch_size: self.training.batch_size,
            learning_rate: self.training.learning_rate,
            validation_split: self.training.validation_split,
            seed: self.training.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("landcover.toml");
        std::fs::write(
            &path,
            "[server]\naddr = \"127.0.0.1:9000\"\n\n[training]\ndefault_epochs = 3\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.addr.port(), 9000);
        assert_eq!(config.server.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!(config.training.default_epochs, 3);
        assert_eq!(config.training.batch_size, 8);
        assert_eq!(config.paths, PathsConfig::default());
        assert_eq!(config.retrain_params().epochs, 3);
        assert_eq!(config.model_paths().model_path(), PathBuf::from("models/model_rgb.json"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/landcover.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
