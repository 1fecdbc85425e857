//! AI-driven characters taking part in an activity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// A character the AI plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    style: Option<String>,
}

impl Persona {
    /// # Errors
    ///
    /// - `ValidationFailed` if the name is blank
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation(
                "name",
                "Character name cannot be empty",
            ));
        }
        Ok(Self {
            name,
            bio: None,
            style: None,
        })
    }

    /// Short biography used to ground the character.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Speaking style hint for dialogue activities.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }
}

/// Display name for a cast: names joined with " & ".
pub fn cast_display_name(personas: &[Persona]) -> String {
    personas
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(" & ")
}
