//! Export adapters.
//!
//! - `MarkdownTranscriptExporter` - renders a session as a markdown document
//! - `LocalExportStorage` - writes exported documents into a local directory

mod local_file_storage;
mod markdown_exporter;

pub use local_file_storage::{LocalExportStorage, MAX_EXPORT_SIZE_BYTES};
pub use markdown_exporter::{MarkdownTranscriptExporter, DEFAULT_BRAND};
