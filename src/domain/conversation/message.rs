//! Message entity for activity conversations.
//!
//! Messages are immutable records of what the student (or moderator) and
//! the AI-driven characters said. Position in the conversation is the only
//! ordering signal; the optional timestamp is informational.

use crate::domain::foundation::{DomainError, MessageId, Timestamp};
use serde::{Deserialize, Serialize};

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The student or moderator typing into the activity.
    User,
    /// Generic AI reply with no persona attached.
    Assistant,
    /// Notices injected by the activity itself (e.g. "the interview begins").
    System,
    /// An AI-driven persona speaking in character.
    Character,
}

impl Role {
    /// Returns true for roles whose text is produced by the AI boundary.
    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Assistant | Self::Character)
    }

    /// Stable tag used in logs and serialized transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Character => "character",
        }
    }
}

/// An immutable message within a conversation.
///
/// # Invariants
///
/// - `content` is non-empty after trimming (validated at construction)
/// - once built, a message never changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Timestamp>,
}

impl Message {
    /// Creates a new message with the given role and content, stamped now.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if content is blank
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        Self::validate_content(&content)?;

        Ok(Self {
            id: MessageId::new(),
            role,
            content,
            character_name: None,
            timestamp: Some(Timestamp::now()),
        })
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(Role::User, content)
    }

    /// Creates a system notice.
    pub fn system(content: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(Role::System, content)
    }

    /// Creates an unnamed assistant message.
    pub fn assistant(content: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(Role::Assistant, content)
    }

    /// Creates a message spoken by a named character.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if content or name is blank
    pub fn character(
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation(
                "character_name",
                "Character name cannot be empty",
            ));
        }
        Ok(Self::new(Role::Character, content)?.with_character_name(name))
    }

    /// Attaches a speaker name to the message.
    pub fn with_character_name(mut self, name: impl Into<String>) -> Self {
        self.character_name = Some(name.into());
        self
    }

    /// Replaces the timestamp, or clears it with `None`.
    pub fn with_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the message ID.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the content exactly as appended.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the speaking character, if any.
    pub fn character_name(&self) -> Option<&str> {
        self.character_name.as_deref()
    }

    /// Returns when the message was created, if known.
    pub fn timestamp(&self) -> Option<&Timestamp> {
        self.timestamp.as_ref()
    }

    /// Returns true if this message is from the user.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    fn validate_content(content: &str) -> Result<(), DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::validation(
                "content",
                "Message content cannot be empty",
            ));
        }
        Ok(())
    }
}
