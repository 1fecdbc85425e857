//! In-memory API key store.
//!
//! Holds the AI credential for the lifetime of the owning context only.
//! Nothing is written to disk.

use secrecy::{ExposeSecret, Secret};
use std::sync::{PoisonError, RwLock};

use crate::ports::ApiKeyStore;

/// Process-local [`ApiKeyStore`].
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    key: RwLock<Option<Secret<String>>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `key` (ignored when blank).
    pub fn with_key(key: &str) -> Self {
        let store = Self::new();
        store.set(key);
        store
    }
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn set(&self, key: &str) -> bool {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return false;
        }
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Secret::new(trimmed.to_string()));
        true
    }

    fn clear(&self) {
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    fn get(&self) -> Option<Secret<String>> {
        let slot = self.key.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .map(|secret| Secret::new(secret.expose_secret().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let store = InMemoryApiKeyStore::new();
        assert!(!store.is_set());
        assert!(store.get().is_none());
    }

    #[test]
    fn set_trims_whitespace() {
        let store = InMemoryApiKeyStore::new();
        assert!(store.set("  AIza-test-key \n"));
        assert_eq!(store.get().unwrap().expose_secret(), "AIza-test-key");
    }

    #[test]
    fn blank_key_is_ignored() {
        let store = InMemoryApiKeyStore::with_key("first");
        assert!(!store.set("   "));
        assert_eq!(store.get().unwrap().expose_secret(), "first");
    }

    #[test]
    fn clear_forgets_key() {
        let store = InMemoryApiKeyStore::with_key("AIza-test-key");
        store.clear();
        assert!(!store.is_set());
    }

    #[test]
    fn debug_output_does_not_leak_key() {
        let store = InMemoryApiKeyStore::with_key("AIza-super-secret");
        assert!(!format!("{:?}", store).contains("AIza-super-secret"));
    }
}
