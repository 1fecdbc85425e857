//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the activity lifecycle and the outside world. Adapters implement them.
//!
//! - `AIProvider` - text-generation boundary (chat replies, evaluation)
//! - `Localizer` - key-based translated strings
//! - `TranscriptExporter` - session to downloadable document
//! - `ExportStorage` - delivery of exported documents
//! - `ApiKeyStore` - scoped AI credential

mod ai_provider;
mod api_key_store;
mod export_storage;
mod localizer;
mod transcript_exporter;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, CompletionStream, FinishReason,
    Message, MessageRole, ProviderInfo, RequestMetadata, RequestPurpose, StreamChunk, TokenUsage,
};
pub use api_key_store::ApiKeyStore;
pub use export_storage::{ExportStorage, SavedExport, StorageError};
pub use localizer::{interpolate, Locale, Localizer};
pub use transcript_exporter::{ExportError, ExportFormat, ExportedDocument, TranscriptExporter};
