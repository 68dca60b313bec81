//! Land-cover class identifiers.
//!
//! A [`ClassCode`] is the stable domain code (10 = trees, …, 95 = mangroves).
//! A [`ClassIndex`] is the position in the classifier's output layer. The
//! two are linked by a [`ReverseMapping`] that is versioned with the model.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ArtifactKind, ModelError};

pub type ClassCode = u16;
pub type ClassIndex = usize;

/// Known land-cover classes in ascending code order.
pub const CLASS_TABLE: [(ClassCode, &str); 9] = [
    (10, "trees"),
    (20, "shrubland"),
    (30, "grassland"),
    (40, "cropland"),
    (50, "built-up"),
    (60, "bare_sparse"),
    (80, "water"),
    (90, "wetland"),
    (95, "mangroves"),
];

pub const BARE_SPARSE: ClassCode = 60;

/// Human-readable name for a code; unknown codes render as `unknown_<code>`.
pub fn class_name(code: ClassCode) -> String {
    CLASS_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| format!("unknown_{}", code))
}

/// Resolves a dataset folder name to a class code.
///
/// Accepts a known class name (case-insensitive) or a numeric code.
pub fn resolve_folder(name: &str) -> Option<ClassCode> {
    let trimmed = name.trim();
    CLASS_TABLE
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(trimmed))
        .map(|(code, _)| *code)
        .or_else(|| trimmed.parse::<ClassCode>().ok())
}

/// ClassIndex → ClassCode table persisted next to the model weights.
///
/// Stored on disk as a JSON object keyed by index, e.g. `{"0": 10, "1": 20}`.
/// Indices are always contiguous from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseMapping {
    codes: Vec<ClassCode>,
}

impl ReverseMapping {
    /// Builds a mapping where index `i` maps to `codes[i]`.
    pub fn new(codes: Vec<ClassCode>) -> ReverseMapping {
        ReverseMapping { codes }
    }

    /// Index i → i-th code of [`CLASS_TABLE`].
    pub fn landcover_default() -> ReverseMapping {
        ReverseMapping::new(CLASS_TABLE.iter().map(|(code, _)| *code).collect())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code_for(&self, index: ClassIndex) -> Option<ClassCode> {
        self.codes.get(index).copied()
    }

    pub fn index_for(&self, code: ClassCode) -> Option<ClassIndex> {
        self.codes.iter().position(|&c| c == code)
    }

    pub fn codes(&self) -> &[ClassCode] {
        &self.codes
    }

    pub fn load_json(path: &Path) -> Result<ReverseMapping, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            kind: ArtifactKind::Mapping,
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<String, ClassCode> =
            serde_json::from_str(&text).map_err(|e| ModelError::InvalidMapping {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut by_index = BTreeMap::new();
        for (key, code) in raw {
            let index: ClassIndex = key.trim().parse().map_err(|_| ModelError::InvalidMapping {
                path: path.to_path_buf(),
                reason: format!("key '{}' is not a class index", key),
            })?;
            if by_index.insert(index, code).is_some() {
                return Err(ModelError::InvalidMapping {
                    path: path.to_path_buf(),
                    reason: format!("index {} appears more than once", index),
                });
            }
        }
        // BTreeMap iterates in index order, so contiguity is i == position.
        if let Some((pos, (&index, _))) = by_index.iter().enumerate().find(|(pos, (i, _))| *pos != **i) {
            return Err(ModelError::InvalidMapping {
                path: path.to_path_buf(),
                reason: format!("indices are not contiguous: expected {} but found {}", pos, index),
            });
        }
        if by_index.is_empty() {
            return Err(ModelError::InvalidMapping {
                path: path.to_path_buf(),
                reason: "mapping is empty".to_owned(),
            });
        }
        Ok(ReverseMapping::new(by_index.into_values().collect()))
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ModelError> {
        let raw: BTreeMap<String, ClassCode> = self
            .codes
            .iter()
            .enumerate()
            .map(|(i, &code)| (i.to_string(), code))
            .collect();
        let text = serde_json::to_string_pretty(&raw)
            .map_err(|e| ModelError::Shape(format!("could not serialize mapping: {}", e)))?;
        std::fs::write(path, text).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn names_known_and_unknown_codes() {
        assert_eq!(class_name(10), "trees");
        assert_eq!(class_name(95), "mangroves");
        assert_eq!(class_name(70), "unknown_70");
    }

    #[test]
    fn folders_resolve_by_name_or_code() {
        assert_eq!(resolve_folder("Trees"), Some(10));
        assert_eq!(resolve_folder("built-up"), Some(50));
        assert_eq!(resolve_folder("60"), Some(60));
        assert_eq!(resolve_folder("forest"), None);
    }

    #[test]
    fn mapping_persists_as_index_keyed_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        ReverseMapping::new(vec![60, 10]).save_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["0"], 60);
        assert_eq!(value["1"], 10);

        let loaded = ReverseMapping::load_json(&path).unwrap();
        assert_eq!(loaded.code_for(0), Some(60));
        assert_eq!(loaded.index_for(10), Some(1));
        assert_eq!(loaded.code_for(2), None);
    }

    #[test]
    fn mapping_with_gaps_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"0": 10, "2": 30}"#).unwrap();
        let err = ReverseMapping::load_json(&path).unwrap_err();
        assert!(matches!(err, ModelError::InvalidMapping { .. }));
    }

    #[test]
    fn repeated_index_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, r#"{"0": 10, "00": 20, "1": 30}"#).unwrap();
        match ReverseMapping::load_json(&path) {
            Err(ModelError::InvalidMapping { reason, .. }) => assert!(reason.contains("more than once")),
            other => panic!("expected an invalid mapping, got {:?}", other),
        }
    }

    #[test]
    fn default_mapping_covers_the_class_table() {
        let mapping = ReverseMapping::landcover_default();
        assert_eq!(mapping.len(), CLASS_TABLE.len());
        assert_eq!(mapping.code_for(5), Some(BARE_SPARSE));
    }
}
