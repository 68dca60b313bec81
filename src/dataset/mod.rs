//! Directory-tree datasets: `<root>/<class folder>/<image>`.
//!
//! This is the layout bulk ingestion writes, so a batch directory can be
//! used for retraining as-is.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::classes::{resolve_folder, ClassCode, ClassIndex, ReverseMapping};
use crate::error::DatasetError;
use crate::preprocess::preprocess_image_path;
use crate::train::LabeledSet;

/// File extensions treated as training images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// One class subdirectory and the images found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFolder {
    pub name: String,
    pub code: Option<ClassCode>,
    pub files: Vec<PathBuf>,
}

/// Result of scanning a dataset root.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetIndex {
    pub root: PathBuf,
    /// Sorted by folder name.
    pub folders: Vec<ClassFolder>,
}

/// A class folder that resolved to an output index of the current model.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledClass {
    pub index: ClassIndex,
    pub code: ClassCode,
    pub folder: String,
    pub files: Vec<PathBuf>,
}

/// Sample paths assigned to each partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPlan {
    pub train: Vec<(PathBuf, ClassIndex)>,
    pub val: Vec<(PathBuf, ClassIndex)>,
}

impl DatasetIndex {
    pub fn scan(root: &Path) -> Result<DatasetIndex, DatasetError> {
        if !root.exists() {
            return Err(DatasetError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DatasetError::NotADirectory(root.to_path_buf()));
        }

        let mut folders = Vec::new();
        for entry in read_dir_sorted(root)? {
            if !entry.is_dir() || is_hidden(&entry) {
                continue;
            }
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let files = read_dir_sorted(&entry)?
                .into_iter()
                .filter(|p| p.is_file() && !is_hidden(p) && has_image_extension(p))
                .collect();
            folders.push(ClassFolder { code: resolve_folder(&name), name, files });
        }

        Ok(DatasetIndex { root: root.to_path_buf(), folders })
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.folders.iter().map(|f| f.files.len()).sum()
    }

    /// Splits folders into those the model can learn (their code has an
    /// output index in `mapping` and they hold at least one image) and the
    /// names of those it cannot.
    pub fn label_with(&self, mapping: &ReverseMapping) -> (Vec<LabelledClass>, Vec<String>) {
        let mut usable = Vec::new();
        let mut skipped = Vec::new();
        for folder in &self.folders {
            let labelled = folder
                .code
                .and_then(|code| mapping.index_for(code).map(|index| (index, code)));
            match labelled {
                Some((index, code)) if !folder.files.is_empty() => usable.push(LabelledClass {
                    index,
                    code,
                    folder: folder.name.clone(),
                    files: folder.files.clone(),
                }),
                _ => skipped.push(folder.name.clone()),
            }
        }
        (usable, skipped)
    }
}

/// Class-stratified random split: within each class, `floor(n × fraction)`
/// samples go to validation and the rest to training.
pub fn stratified_split<R: Rng + ?Sized>(
    classes: &[LabelledClass],
    validation_fraction: f64,
    rng: &mut R,
) -> SplitPlan {
    let fraction = validation_fraction.clamp(0.0, 1.0);
    let mut plan = SplitPlan::default();
    for class in classes {
        let mut files = class.files.clone();
        files.shuffle(rng);
        let n_val = (files.len() as f64 * fraction).floor() as usize;
        let (val, train) = files.split_at(n_val);
        plan.val.extend(val.iter().map(|p| (p.clone(), class.index)));
        plan.train.extend(train.iter().map(|p| (p.clone(), class.index)));
    }
    plan
}

/// Decodes every listed image. Any undecodable file fails the whole load.
pub fn load_samples(entries: &[(PathBuf, ClassIndex)]) -> Result<LabeledSet, DatasetError> {
    let mut set = LabeledSet::default();
    for (path, label) in entries {
        let tensor = preprocess_image_path(path).map_err(|source| DatasetError::Decode {
            path: path.clone(),
            source,
        })?;
        set.push(tensor.into_vec(), *label);
    }
    Ok(set)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DatasetError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    Ok(paths)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    fn touch(dir: &Path, folder: &str, files: &[&str]) {
        let class_dir = dir.join(folder);
        std::fs::create_dir_all(&class_dir).unwrap();
        for f in files {
            std::fs::write(class_dir.join(f), b"x").unwrap();
        }
    }

    #[test]
    fn scan_lists_image_files_per_folder() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "trees", &["a.png", "b.JPG", "notes.txt", ".hidden.png"]);
        touch(dir.path(), "60", &["c.png"]);
        std::fs::write(dir.path().join("stray.png"), b"x").unwrap();

        let index = DatasetIndex::scan(dir.path()).unwrap();
        assert_eq!(index.folder_names(), vec!["60", "trees"]);
        assert_eq!(index.folders[0].code, Some(60));
        assert_eq!(index.folders[1].files.len(), 2);
        assert_eq!(index.sample_count(), 3);
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = DatasetIndex::scan(Path::new("/nonexistent/dataset")).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[test]
    fn labelling_skips_unknown_and_empty_folders() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "trees", &["a.png"]);
        touch(dir.path(), "water", &["b.png"]);
        touch(dir.path(), "forest", &["c.png"]);
        touch(dir.path(), "cropland", &[]);

        let index = DatasetIndex::scan(dir.path()).unwrap();
        let mapping = ReverseMapping::new(vec![80, 10, 40]);
        let (usable, skipped) = index.label_with(&mapping);

        let labels: Vec<(String, ClassIndex)> =
            usable.iter().map(|c| (c.folder.clone(), c.index)).collect();
        assert_eq!(labels, vec![("trees".to_owned(), 1), ("water".to_owned(), 0)]);
        assert_eq!(skipped, vec!["cropland".to_owned(), "forest".to_owned()]);
    }

    #[test]
    fn split_is_stratified_per_class() {
        let make = |index, n: usize| LabelledClass {
            index,
            code: 10,
            folder: String::new(),
            files: (0..n).map(|i| PathBuf::from(format!("{}_{}.png", index, i))).collect(),
        };
        let classes = vec![make(0, 10), make(1, 5), make(2, 4)];
        let plan = stratified_split(&classes, 0.2, &mut StdRng::seed_from_u64(1));

        let count = |v: &[(PathBuf, ClassIndex)], c| v.iter().filter(|(_, l)| *l == c).count();
        assert_eq!((count(&plan.val, 0), count(&plan.train, 0)), (2, 8));
        assert_eq!((count(&plan.val, 1), count(&plan.train, 1)), (1, 4));
        assert_eq!((count(&plan.val, 2), count(&plan.train, 2)), (0, 4));
    }

    #[test]
    fn corrupt_image_fails_loading() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = load_samples(&[(path, 0)]).unwrap_err();
        assert!(matches!(err, DatasetError::Decode { .. }));
    }
}
