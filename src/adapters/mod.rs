//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the activity lifecycle to external systems:
//! - `ai` - Gemini REST provider and a mock for tests
//! - `credentials` - in-memory API key store
//! - `export` - markdown rendering and local-directory delivery
//! - `i18n` - embedded translation catalogues

pub mod ai;
pub mod credentials;
pub mod export;
pub mod i18n;

pub use ai::{GeminiConfig, GeminiProvider, MockAIProvider, MockError, MockResponse};
pub use credentials::InMemoryApiKeyStore;
pub use export::{LocalExportStorage, MarkdownTranscriptExporter};
pub use i18n::{CatalogLocalizer, CatalogError};
