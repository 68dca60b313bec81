use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::IngestError;

/// A freshly created, empty batch directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDir {
    pub id: String,
    pub path: PathBuf,
}

impl BatchDir {
    /// Creates `<root>/batch_<YYYYmmdd_HHMMSS>`, adding `_<n>` when a batch
    /// with that stamp already exists.
    pub fn create(root: &Path, now: DateTime<Local>) -> Result<BatchDir, IngestError> {
        std::fs::create_dir_all(root).map_err(|source| IngestError::CreateBatchDir {
            path: root.to_path_buf(),
            source,
        })?;
        let stamp = now.format("%Y%m%d_%H%M%S");
        let mut attempt = 0u32;
        loop {
            let id = if attempt == 0 {
                format!("batch_{}", stamp)
            } else {
                format!("batch_{}_{}", stamp, attempt)
            };
            let path = root.join(&id);
            match std::fs::create_dir(&path) {
                Ok(()) => return Ok(BatchDir { id, path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(IngestError::CreateBatchDir { path, source }),
            }
        }
    }
}

/// Splits an upload name like `trees/img1.png` (or `data\trees\img1.png`)
/// into its class folder (lowercased) and file name. The folder is the
/// segment right above the file.
pub fn split_upload_name(name: &str) -> Option<(String, String)> {
    let normalized = name.replace('\\', "/");
    let mut parts = normalized.rsplit('/');
    let file = parts.next()?;
    let folder = parts.next()?;
    if !is_plain_segment(file) || !is_plain_segment(folder) {
        return None;
    }
    Some((folder.to_lowercase(), file.to_owned()))
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(':')
}
