//! Bulk Validation Ingestor.
//!
//! Uploaded files land in `<upload root>/batch_<stamp>/<class>/<file>`, the
//! same layout [`crate::dataset`] reads, and each one is checked against
//! the served model to flag likely mislabelled images.

pub mod batch;
pub mod policy;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::classes::resolve_folder;
use crate::dataset::IMAGE_EXTENSIONS;
use crate::error::IngestError;
use crate::model::ModelHandle;
use crate::preprocess::preprocess_image_bytes;

pub use batch::{split_upload_name, BatchDir};
pub use policy::{judge, Verdict, BARE_SPARSE_LOOKALIKES, LOOKALIKE_THRESHOLD};

/// One file from a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Client-supplied name including the class folder, e.g. `trees/a.png`.
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileValidation {
    pub filename: String,
    pub claimed_class: String,
    pub predicted_class: String,
    pub confidence: f64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileValidation {
    fn failed(filename: &str, claimed_class: &str, error: String) -> FileValidation {
        FileValidation {
            filename: filename.to_owned(),
            claimed_class: claimed_class.to_owned(),
            predicted_class: "n/a".to_owned(),
            confidence: 0.0,
            valid: false,
            note: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkValidationReport {
    pub batch_id: String,
    pub batch_path: PathBuf,
    /// Every file received, including rejected ones.
    pub total_files: usize,
    /// Files written into the batch directory.
    pub saved_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub results: Vec<FileValidation>,
}

/// Writes uploads into batch directories under one root.
#[derive(Debug, Clone)]
pub struct BulkIngestor {
    upload_root: PathBuf,
}

impl BulkIngestor {
    pub fn new(upload_root: impl Into<PathBuf>) -> BulkIngestor {
        BulkIngestor { upload_root: upload_root.into() }
    }

    pub fn ingest(&self, handle: &ModelHandle, files: &[UploadedFile]) -> Result<BulkValidationReport, IngestError> {
        self.ingest_at(handle, files, Local::now())
    }

    /// Like [`ingest`](Self::ingest) with an explicit batch timestamp.
    ///
    /// Only failing to create the batch directory aborts the call; every
    /// per-file problem becomes an invalid entry in the report.
    pub fn ingest_at(
        &self,
        handle: &ModelHandle,
        files: &[UploadedFile],
        now: DateTime<Local>,
    ) -> Result<BulkValidationReport, IngestError> {
        let batch = BatchDir::create(&self.upload_root, now)?;
        tracing::info!(batch = %batch.id, files = files.len(), "Ingesting bulk upload");

        let mut results = Vec::with_capacity(files.len());
        let mut saved_files = 0;
        for file in files {
            let (entry, saved) = ingest_one(handle, &batch.path, file);
            if let Some(err) = &entry.error {
                tracing::warn!(file = %file.filename, error = %err, "Upload rejected");
            }
            saved_files += usize::from(saved);
            results.push(entry);
        }

        let valid_files = results.iter().filter(|r| r.valid).count();
        Ok(BulkValidationReport {
            batch_id: batch.id,
            batch_path: batch.path,
            total_files: files.len(),
            saved_files,
            valid_files,
            invalid_files: files.len() - valid_files,
            results,
        })
    }
}

/// Returns the file's entry and whether it was written to disk.
fn ingest_one(handle: &ModelHandle, batch_path: &Path, file: &UploadedFile) -> (FileValidation, bool) {
    if !is_image_upload(file) {
        let content_type = file.content_type.as_deref().unwrap_or("unknown");
        return (
            FileValidation::failed(&file.filename, "unknown", format!("not an image (content type {})", content_type)),
            false,
        );
    }
    let Some((folder, name)) = split_upload_name(&file.filename) else {
        return (
            FileValidation::failed(
                &file.filename,
                "unknown",
                "file must be in class folder (e.g., trees/image1.png)".to_owned(),
            ),
            false,
        );
    };

    // Decode first so undecodable bytes never reach the batch directory.
    let tensor = match preprocess_image_bytes(&file.bytes) {
        Ok(tensor) => tensor,
        Err(e) => return (FileValidation::failed(&file.filename, "error", e.to_string()), false),
    };

    let class_dir = batch_path.join(&folder);
    let target = class_dir.join(&name);
    if target.exists() {
        return (
            FileValidation::failed(&file.filename, "error", format!("duplicate file {}/{} in batch", folder, name)),
            false,
        );
    }
    if let Err(e) = std::fs::create_dir_all(&class_dir).and_then(|()| std::fs::write(&target, &file.bytes)) {
        return (
            FileValidation::failed(&file.filename, "error", format!("could not save file: {}", e)),
            false,
        );
    }

    let prediction = match handle.predict(&tensor) {
        Ok(p) => p,
        Err(e) => return (FileValidation::failed(&file.filename, "error", e.to_string()), true),
    };
    let verdict = judge(resolve_folder(&folder), &prediction);
    (
        FileValidation {
            filename: file.filename.clone(),
            claimed_class: folder,
            predicted_class: prediction.predicted_class_name,
            confidence: prediction.confidence,
            valid: verdict.valid,
            note: verdict.note,
            error: None,
        },
        true,
    )
}

fn is_image_upload(file: &UploadedFile) -> bool {
    match file.content_type.as_deref() {
        Some(ct) => ct.trim().to_ascii_lowercase().starts_with("image/"),
        // No declared type: fall back to the extension.
        None => Path::new(&file.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::classes::ReverseMapping;
    use crate::layers::Layer;
    use crate::math::Matrix;
    use crate::model::{ModelPaths, ModelStore};
    use crate::network::Network;
    use crate::preprocess::FEATURE_COUNT;
    use chrono::TimeZone;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::{tempdir, TempDir};

    /// Handle whose model always outputs `probs` over `codes`.
    fn fixed_handle(dir: &TempDir, probs: &[f64], codes: Vec<u16>) -> ModelHandle {
        let network = Network {
            layers: vec![Layer::from_parts(
                Matrix::zeros(FEATURE_COUNT, probs.len()),
                Matrix::from_vec(1, probs.len(), probs.iter().map(|p| p.ln()).collect()),
                ActivationFunction::Softmax,
            )],
            metadata: None,
        };
        let paths = ModelPaths::new(dir.path().join("models"));
        ModelStore::new(paths.clone())
            .install(&network, &ReverseMapping::new(codes), false)
            .unwrap();
        ModelHandle::load(paths).unwrap()
    }

    fn png_upload(name: &str) -> UploadedFile {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 110, 90]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        UploadedFile {
            filename: name.to_owned(),
            content_type: Some("image/png".to_owned()),
            bytes: buf.into_inner(),
        }
    }

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn exact_match_is_valid_and_saved_under_class_folder() {
        let dir = tempdir().unwrap();
        let handle = fixed_handle(&dir, &[0.8, 0.1, 0.1], vec![10, 40, 60]);
        let ingestor = BulkIngestor::new(dir.path().join("uploads"));

        let report = ingestor.ingest_at(&handle, &[png_upload("trees/a.png")], stamp()).unwrap();
        assert_eq!(report.batch_id, "batch_20250102_030405");
        assert_eq!((report.total_files, report.valid_files, report.invalid_files), (1, 1, 0));
        let entry = &report.results[0];
        assert_eq!(entry.claimed_class, "trees");
        assert_eq!(entry.predicted_class, "trees");
        assert!(entry.valid);
        assert_eq!(entry.note, None);
        assert!(report.batch_path.join("trees").join("a.png").is_file());
    }

    #[test]
    fn bare_sparse_tolerance_depends_on_confidence() {
        let dir = tempdir().unwrap();
        let confident = fixed_handle(&dir, &[0.05, 0.90, 0.05], vec![10, 40, 60]);
        let report = BulkIngestor::new(dir.path().join("u1"))
            .ingest_at(&confident, &[png_upload("bare_sparse/b.png")], stamp())
            .unwrap();
        let entry = &report.results[0];
        assert_eq!(entry.predicted_class, "cropland");
        assert!(entry.valid);
        assert!(entry.note.as_deref().unwrap().contains("similar to bare_sparse"));

        let dir = tempdir().unwrap();
        let unsure = fixed_handle(&dir, &[0.2, 0.7, 0.1], vec![10, 40, 60]);
        let report = BulkIngestor::new(dir.path().join("u2"))
            .ingest_at(&unsure, &[png_upload("bare_sparse/b.png")], stamp())
            .unwrap();
        let entry = &report.results[0];
        assert_eq!(entry.predicted_class, "cropland");
        assert!(!entry.valid);
        assert_eq!(entry.note, None);
    }

    #[test]
    fn bad_files_are_reported_without_stopping_the_batch() {
        let dir = tempdir().unwrap();
        let handle = fixed_handle(&dir, &[0.8, 0.1, 0.1], vec![10, 40, 60]);
        let ingestor = BulkIngestor::new(dir.path().join("uploads"));

        let mut text = png_upload("trees/notes.txt");
        text.content_type = Some("text/plain".to_owned());
        let mut corrupt = png_upload("trees/broken.png");
        corrupt.bytes = b"not really a png".to_vec();
        let files = vec![
            text,
            png_upload("loose.png"),
            corrupt,
            png_upload("cropland/c.png"),
            png_upload("trees/d.png"),
        ];

        let report = ingestor.ingest_at(&handle, &files, stamp()).unwrap();
        assert_eq!(report.total_files, 5);
        assert_eq!(report.saved_files, 2);
        assert_eq!(report.valid_files, 1);
        assert_eq!(report.invalid_files, 4);

        let errors: Vec<bool> = report.results.iter().map(|r| r.error.is_some()).collect();
        assert_eq!(errors, vec![true, true, true, false, false]);
        assert_eq!(report.results[1].claimed_class, "unknown");
        assert_eq!(report.results[2].claimed_class, "error");
        assert_eq!(report.results[2].predicted_class, "n/a");
        assert!(!report.batch_path.join("trees").join("broken.png").exists());
        assert!(!report.results[3].valid);
        assert!(report.batch_path.join("cropland").join("c.png").is_file());
    }

    #[test]
    fn missing_content_type_falls_back_to_extension() {
        let mut upload = png_upload("trees/a.png");
        upload.content_type = None;
        assert!(is_image_upload(&upload));
        upload.filename = "trees/a.csv".to_owned();
        assert!(!is_image_upload(&upload));
    }
}
