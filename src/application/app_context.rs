//! Application-wide context.
//!
//! Holds the cross-cutting state the activities share: the stored AI
//! credential and the user's display preferences. It is created once by the
//! composition root and passed to whatever needs it.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::ports::{ApiKeyStore, Locale};

/// User preferences that outlive a single activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub locale: Locale,
    pub animations_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            animations_enabled: true,
        }
    }
}

/// Scoped credential and preferences.
#[derive(Clone)]
pub struct AppContext {
    api_keys: Arc<dyn ApiKeyStore>,
    preferences: Arc<RwLock<Preferences>>,
}

impl AppContext {
    pub fn new(api_keys: Arc<dyn ApiKeyStore>) -> Self {
        Self::with_preferences(api_keys, Preferences::default())
    }

    pub fn with_preferences(api_keys: Arc<dyn ApiKeyStore>, preferences: Preferences) -> Self {
        Self {
            api_keys,
            preferences: Arc::new(RwLock::new(preferences)),
        }
    }

    /// The credential store, for adapters that read the key per request.
    pub fn api_keys(&self) -> Arc<dyn ApiKeyStore> {
        Arc::clone(&self.api_keys)
    }

    /// Stores the key; returns false for a blank one.
    pub fn set_api_key(&self, key: &str) -> bool {
        let stored = self.api_keys.set(key);
        if stored {
            tracing::info!("API key stored");
        }
        stored
    }

    pub fn has_api_key(&self) -> bool {
        self.api_keys.is_set()
    }

    /// Forgets the stored credential.
    pub fn sign_out(&self) {
        self.api_keys.clear();
        tracing::info!("Signed out, API key cleared");
    }

    pub fn preferences(&self) -> Preferences {
        *self
            .preferences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn locale(&self) -> Locale {
        self.preferences().locale
    }

    pub fn set_locale(&self, locale: Locale) {
        self.update(|p| p.locale = locale);
    }

    pub fn animations_enabled(&self) -> bool {
        self.preferences().animations_enabled
    }

    pub fn set_animations_enabled(&self, enabled: bool) {
        self.update(|p| p.animations_enabled = enabled);
    }

    fn update(&self, change: impl FnOnce(&mut Preferences)) {
        let mut preferences = self
            .preferences
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        change(&mut preferences);
    }
}
