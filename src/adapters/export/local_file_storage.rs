//! Local Filesystem Export Storage - Implementation of ExportStorage.
//!
//! Writes exported documents into a single output directory, standing in
//! for a browser download. A later export with the same filename replaces
//! the earlier one.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::ports::{ExportStorage, ExportedDocument, SavedExport, StorageError};

/// Maximum document size accepted (10 MB).
pub const MAX_EXPORT_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Local directory storage for exported documents.
///
/// # Atomic Writes
///
/// Uses a write-to-temp-then-rename pattern:
/// 1. Write content to `.{filename}.tmp`
/// 2. Sync to disk
/// 3. Rename to `{filename}`
///
/// A crash mid-write never leaves a truncated export behind.
#[derive(Debug, Clone)]
pub struct LocalExportStorage {
    output_dir: PathBuf,
    max_size_bytes: u64,
}

impl LocalExportStorage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_size_bytes: MAX_EXPORT_SIZE_BYTES,
        }
    }

    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Rejects names that are empty, hidden, or could leave the directory.
    fn validate_filename(filename: &str) -> Result<(), StorageError> {
        let invalid = filename.trim().is_empty()
            || filename.starts_with('.')
            || filename.contains(['/', '\\', '\0'])
            || filename.contains("..");
        if invalid {
            return Err(StorageError::invalid_filename(filename));
        }
        Ok(())
    }

    async fn ensure_output_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            StorageError::io(format!(
                "Failed to create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl ExportStorage for LocalExportStorage {
    async fn save(&self, document: &ExportedDocument) -> Result<SavedExport, StorageError> {
        Self::validate_filename(&document.filename)?;

        let size = document.content.len() as u64;
        if size > self.max_size_bytes {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_size_bytes,
            });
        }

        self.ensure_output_dir().await?;

        let temp_path = self.output_dir.join(format!(".{}.tmp", document.filename));
        let final_path = self.output_dir.join(&document.filename);

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::io(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let written = async {
            file.write_all(&document.content).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            )));
        }

        fs::rename(&temp_path, &final_path).await.map_err(|e| {
            StorageError::io(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                final_path.display(),
                e
            ))
        })?;

        tracing::info!(path = %final_path.display(), size_bytes = size, "Export saved");

        Ok(SavedExport {
            path: final_path,
            size_bytes: size,
        })
    }
}
