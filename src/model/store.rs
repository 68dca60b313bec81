use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::classes::ReverseMapping;
use crate::error::{ArtifactKind, ModelError};
use crate::model::paths::ModelPaths;
use crate::network::Network;

/// Reads and writes the model artifacts on disk.
#[derive(Debug, Clone)]
pub struct ModelStore {
    paths: ModelPaths,
}

impl ModelStore {
    pub fn new(paths: ModelPaths) -> ModelStore {
        ModelStore { paths }
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Loads the model and its mapping. Both must exist.
    pub fn load(&self) -> Result<(Network, ReverseMapping), ModelError> {
        let model_path = self.paths.model_path();
        let mapping_path = self.paths.mapping_path();
        if !model_path.exists() {
            return Err(ModelError::MissingArtifact { kind: ArtifactKind::Model, path: model_path });
        }
        if !mapping_path.exists() {
            return Err(ModelError::MissingArtifact { kind: ArtifactKind::Mapping, path: mapping_path });
        }
        let network = self.load_network()?;
        let mapping = ReverseMapping::load_json(&mapping_path)?;
        Ok((network, mapping))
    }

    pub fn load_network(&self) -> Result<Network, ModelError> {
        let path = self.paths.model_path();
        Network::load_json(&path).map_err(|source| ModelError::Read {
            kind: ArtifactKind::Model,
            path,
            source,
        })
    }

    /// Moves the current canonical model aside to a timestamped backup.
    /// Existing backups are never overwritten. Returns `None` when there is
    /// no canonical model to back up.
    pub fn backup_current(&self, now: DateTime<Local>) -> Result<Option<PathBuf>, ModelError> {
        let current = self.paths.model_path();
        if !current.exists() {
            return Ok(None);
        }
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let mut attempt = 0;
        let backup = loop {
            let candidate = self.paths.backup_path(&stamp, attempt);
            if !candidate.exists() {
                break candidate;
            }
            attempt += 1;
        };
        std::fs::rename(&current, &backup).map_err(|source| ModelError::Write {
            path: backup.clone(),
            source,
        })?;
        Ok(Some(backup))
    }

    /// Writes `network` to the canonical path via a staging file, so the
    /// canonical file is never observed half-written.
    pub fn persist_network(&self, network: &Network) -> Result<(), ModelError> {
        let staging = self.paths.staging_path();
        network.save_json(&staging).map_err(|source| ModelError::Write {
            path: staging.clone(),
            source,
        })?;
        let target = self.paths.model_path();
        std::fs::rename(&staging, &target).map_err(|source| ModelError::Write { path: target, source })
    }

    /// Puts a backup back in place of the canonical model.
    pub fn restore_backup(&self, backup: &Path) -> Result<(), ModelError> {
        let target = self.paths.model_path();
        std::fs::rename(backup, &target).map_err(|source| ModelError::Write { path: target, source })
    }

    /// Writes a complete artifact pair. Refuses to replace existing files
    /// unless `overwrite` is set.
    pub fn install(&self, network: &Network, mapping: &ReverseMapping, overwrite: bool) -> Result<(), ModelError> {
        network.check_shapes().map_err(ModelError::Shape)?;
        if network.output_size() != mapping.len() {
            return Err(ModelError::Shape(format!(
                "network has {} outputs but mapping has {} classes",
                network.output_size(),
                mapping.len()
            )));
        }
        if !overwrite {
            for (kind, path) in [
                (ArtifactKind::Model, self.paths.model_path()),
                (ArtifactKind::Mapping, self.paths.mapping_path()),
            ] {
                if path.exists() {
                    return Err(ModelError::AlreadyExists { kind, path });
                }
            }
        }
        std::fs::create_dir_all(&self.paths.dir).map_err(|source| ModelError::Write {
            path: self.paths.dir.clone(),
            source,
        })?;
        self.persist_network(network)?;
        mapping.save_json(&self.paths.mapping_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{LayerSpec, NetworkSpec};
    use crate::activation::ActivationFunction;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    fn tiny_network() -> Network {
        let spec = NetworkSpec {
            name: "tiny".into(),
            layers: vec![LayerSpec { size: 2, input_size: 3, activation: ActivationFunction::Softmax }],
            metadata: None,
        };
        Network::from_spec(&spec, &mut StdRng::seed_from_u64(9))
    }

    #[test]
    fn missing_artifacts_are_reported_by_kind() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(ModelPaths::new(dir.path()));
        assert!(matches!(
            store.load().unwrap_err(),
            ModelError::MissingArtifact { kind: ArtifactKind::Model, .. }
        ));

        tiny_network().save_json(&store.paths().model_path()).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            ModelError::MissingArtifact { kind: ArtifactKind::Mapping, .. }
        ));
    }

    #[test]
    fn install_refuses_to_overwrite_without_flag() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(ModelPaths::new(dir.path().join("models")));
        let mapping = ReverseMapping::new(vec![10, 20]);
        store.install(&tiny_network(), &mapping, false).unwrap();
        assert!(matches!(
            store.install(&tiny_network(), &mapping, false).unwrap_err(),
            ModelError::AlreadyExists { .. }
        ));
        store.install(&tiny_network(), &mapping, true).unwrap();
        let (_, loaded) = store.load().unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn backups_never_overwrite_each_other() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(ModelPaths::new(dir.path()));
        let now = Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        store.persist_network(&tiny_network()).unwrap();
        let first = store.backup_current(now).unwrap().unwrap();
        store.persist_network(&tiny_network()).unwrap();
        let second = store.backup_current(now).unwrap().unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("model_rgb_backup_20250304_050607.json"));
        assert!(second.ends_with("model_rgb_backup_20250304_050607_1.json"));
        assert!(!store.paths().model_path().exists());
        assert_eq!(store.backup_current(now).unwrap(), None);
    }
}
