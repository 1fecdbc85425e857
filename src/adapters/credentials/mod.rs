//! Credential adapters.

mod in_memory_api_key_store;

pub use in_memory_api_key_store::InMemoryApiKeyStore;
