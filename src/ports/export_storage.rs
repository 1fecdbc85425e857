//! Export Storage Port - where exported documents are delivered.
//!
//! Delivery is one-way: documents are written, never read back.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use super::transcript_exporter::ExportedDocument;

/// Port for persisting an exported document (the "download").
///
/// # Contract
///
/// Implementations must:
/// - write atomically (no partial file on failure)
/// - reject filenames that would escape the target location
#[async_trait]
pub trait ExportStorage: Send + Sync {
    /// Saves `document` under its suggested filename.
    ///
    /// Returns where the document ended up.
    async fn save(&self, document: &ExportedDocument) -> Result<SavedExport, StorageError>;
}

/// Location and size of a saved export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedExport {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Errors from export storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("document of {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: u64, max: u64 },
}

impl StorageError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn invalid_filename(name: impl Into<String>) -> Self {
        Self::InvalidFilename(name.into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
