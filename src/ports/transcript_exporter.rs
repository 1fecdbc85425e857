//! Transcript Exporter Port - session to downloadable document.
//!
//! Exporting is pure and synchronous: the same session data and date always
//! produce byte-identical output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::ReflectionSession;

use super::export_storage::StorageError;

/// Port for rendering a session into a document.
pub trait TranscriptExporter: Send + Sync {
    /// Renders `session` as of `generated_on`.
    ///
    /// # Errors
    ///
    /// - `ReflectionMissing` until the student has submitted a reflection
    fn export(
        &self,
        session: &ReflectionSession,
        generated_on: NaiveDate,
    ) -> Result<ExportedDocument, ExportError>;
}

/// Document formats an exporter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Markdown,
}

impl ExportFormat {
    /// MIME content type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
        }
    }
}

/// Exported document with content and download metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub content: Vec<u8>,
    pub content_type: String,
    /// Suggested filename for download.
    pub filename: String,
    pub format: ExportFormat,
}

impl ExportedDocument {
    pub fn new(content: Vec<u8>, format: ExportFormat, base_filename: &str) -> Self {
        Self {
            content,
            content_type: format.content_type().to_string(),
            filename: format!("{}.{}", base_filename, format.extension()),
            format,
        }
    }

    /// Create from markdown text.
    pub fn from_markdown(markdown: String, base_filename: &str) -> Self {
        Self::new(markdown.into_bytes(), ExportFormat::Markdown, base_filename)
    }

    /// Content as UTF-8 text, when it is text.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Errors that can occur while exporting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("nothing to export yet: the reflection has not been submitted")]
    ReflectionMissing,

    #[error("failed to save export: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_document_metadata() {
        let doc = ExportedDocument::from_markdown("# Hi".into(), "convince-me-2024-05-01");
        assert_eq!(doc.filename, "convince-me-2024-05-01.md");
        assert_eq!(doc.content_type, "text/markdown; charset=utf-8");
        assert_eq!(doc.as_text(), Some("# Hi"));
    }

    #[test]
    fn export_error_wraps_storage_error() {
        let err: ExportError = StorageError::io("disk full").into();
        assert_eq!(err.to_string(), "failed to save export: I/O error: disk full");
    }
}
