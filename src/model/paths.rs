use std::path::{Path, PathBuf};

/// Well-known locations of the persisted model artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub dir: PathBuf,
    pub model_file: String,
    pub mapping_file: String,
}

impl ModelPaths {
    pub fn new(dir: impl Into<PathBuf>) -> ModelPaths {
        ModelPaths {
            dir: dir.into(),
            model_file: "model_rgb.json".to_owned(),
            mapping_file: "reverse_mapping_rgb.json".to_owned(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.dir.join(&self.mapping_file)
    }

    /// Temporary file the next model is written to before being renamed
    /// over the canonical path.
    pub fn staging_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", self.model_file))
    }

    /// `model_rgb_backup_<stamp>.json`, or `..._<stamp>_<n>.json` when
    /// `attempt > 0`.
    pub fn backup_path(&self, stamp: &str, attempt: u32) -> PathBuf {
        let path = Path::new(&self.model_file);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("model");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
        let name = if attempt == 0 {
            format!("{}_backup_{}.{}", stem, stamp, ext)
        } else {
            format!("{}_backup_{}_{}.{}", stem, stamp, attempt, ext)
        };
        self.dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_names_carry_stamp_and_suffix() {
        let paths = ModelPaths::new("models");
        assert_eq!(paths.model_path(), PathBuf::from("models/model_rgb.json"));
        assert_eq!(
            paths.backup_path("20250101_120000", 0),
            PathBuf::from("models/model_rgb_backup_20250101_120000.json")
        );
        assert_eq!(
            paths.backup_path("20250101_120000", 2),
            PathBuf::from("models/model_rgb_backup_20250101_120000_2.json")
        );
    }
}
