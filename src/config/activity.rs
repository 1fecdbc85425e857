//! Activity policy configuration

use serde::Deserialize;

use crate::ports::Locale;

use super::error::ValidationError;

/// Activity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    /// Interface language ("en", "it", "it-IT", ...)
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// One end-of-chat threshold for every activity
    pub min_messages_override: Option<usize>,

    /// Minimum reflection length in characters
    #[serde(default = "default_min_reflection_chars")]
    pub min_reflection_chars: usize,
}

impl ActivityConfig {
    /// The configured locale.
    pub fn locale(&self) -> Result<Locale, ValidationError> {
        self.default_locale
            .parse()
            .map_err(|_| ValidationError::InvalidLocale(self.default_locale.clone()))
    }

    /// Validate activity configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.locale()?;
        if self.min_messages_override == Some(0) {
            return Err(ValidationError::InvalidMessageThreshold);
        }
        if self.min_reflection_chars == 0 {
            return Err(ValidationError::InvalidReflectionLength);
        }
        Ok(())
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            min_messages_override: None,
            min_reflection_chars: default_min_reflection_chars(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_min_reflection_chars() -> usize {
    1
}
