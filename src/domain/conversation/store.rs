//! Ordered, append-only message log for one activity session.

use super::message::Message;

/// Chronological sequence of messages.
///
/// # Invariants
///
/// - messages are returned in exactly the order they were appended
/// - appended messages are never modified or removed, except by `reset`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the end of the conversation.
    ///
    /// Content and role are already validated by `Message`'s constructors.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Clears every message.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Read-only view of the ordered messages.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages sent by the student or moderator.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
