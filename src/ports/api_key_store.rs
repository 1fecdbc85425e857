//! API Key Store Port - the scoped credential for the AI service.
//!
//! The key lives only as long as the `AppContext` holding the store and is
//! cleared on explicit sign-out.

use secrecy::Secret;

/// Port for holding the AI service credential.
pub trait ApiKeyStore: Send + Sync {
    /// Stores `key` after trimming. Blank input is ignored.
    ///
    /// Returns true when a key was stored.
    fn set(&self, key: &str) -> bool;

    /// Forgets the stored key.
    fn clear(&self);

    /// The current key, if any.
    fn get(&self) -> Option<Secret<String>>;

    fn is_set(&self) -> bool {
        self.get().is_some()
    }
}
