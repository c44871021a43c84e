//! Uploaded results files
//!
//! Layout: `<uploads>/event_<id>/event_<id>_results.<ext>`. One file per
//! event; a new upload replaces the previous one whatever its extension.

use marathon_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Largest accepted upload (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Accepted extensions, in lookup preference order
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

const EVENT_PREFIX: &str = "event_";

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn event_dir(&self, event_id: i64) -> PathBuf {
        self.root.join(format!("{}{}", EVENT_PREFIX, event_id))
    }

    pub fn file_path(&self, event_id: i64, extension: &str) -> PathBuf {
        self.event_dir(event_id)
            .join(format!("{}{}_results.{}", EVENT_PREFIX, event_id, extension))
    }

    /// Check an upload and return its normalized extension
    pub fn validate(file_name: Option<&str>, size: usize) -> Result<&'static str> {
        if size == 0 {
            return Err(Error::InvalidInput("File is empty".to_string()));
        }

        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let extension = extension
            .as_deref()
            .and_then(|ext| SUPPORTED_EXTENSIONS.iter().copied().find(|s| *s == ext))
            .ok_or_else(|| {
                Error::InvalidInput("Only .xlsx, .xls and .csv files are supported".to_string())
            })?;

        if size > MAX_UPLOAD_BYTES {
            return Err(Error::InvalidInput(
                "File size exceeds maximum limit of 10MB".to_string(),
            ));
        }

        Ok(extension)
    }

    /// Validate and store an upload for an event, replacing any previous file
    pub async fn save(&self, event_id: i64, file_name: Option<&str>, bytes: &[u8]) -> Result<PathBuf> {
        let extension = Self::validate(file_name, bytes.len())?;

        let dir = self.event_dir(event_id);
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await?;
            tracing::info!(dir = %dir.display(), "Created upload directory");
        }

        for other in SUPPORTED_EXTENSIONS.iter().filter(|ext| **ext != extension) {
            let stale = self.file_path(event_id, other);
            if stale.exists() {
                tokio::fs::remove_file(&stale).await?;
                tracing::debug!(file = %stale.display(), "Removed previous upload");
            }
        }

        let path = self.file_path(event_id, extension);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(
            event_id,
            file = %path.display(),
            bytes = bytes.len(),
            "Results file saved (replaced if existed)"
        );

        Ok(path)
    }

    /// Stored file for an event, preferring `.xlsx`, then `.xls`, then `.csv`
    pub fn find(&self, event_id: i64) -> Option<PathBuf> {
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.file_path(event_id, ext))
            .find(|path| path.exists())
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
