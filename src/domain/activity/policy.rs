//! Named gating thresholds for an activity.

use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationStore;

/// Messages required before the chat can end, unless an activity says otherwise.
pub const DEFAULT_MIN_MESSAGES: usize = 4;

/// Shortest accepted reflection, in characters of trimmed text.
pub const DEFAULT_MIN_REFLECTION_CHARS: usize = 1;

/// Which messages count towards the end-of-chat threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCount {
    AllMessages,
    UserMessages,
}

/// Minimum conversation length before "end chat" is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndChatPolicy {
    pub min_messages: usize,
    pub counted: MessageCount,
}

impl EndChatPolicy {
    pub fn all_messages(min_messages: usize) -> Self {
        Self {
            min_messages,
            counted: MessageCount::AllMessages,
        }
    }

    pub fn user_messages(min_messages: usize) -> Self {
        Self {
            min_messages,
            counted: MessageCount::UserMessages,
        }
    }

    /// Messages in `store` that count towards the threshold.
    pub fn counted_messages(&self, store: &ConversationStore) -> usize {
        match self.counted {
            MessageCount::AllMessages => store.len(),
            MessageCount::UserMessages => store.user_message_count(),
        }
    }

    pub fn is_satisfied(&self, store: &ConversationStore) -> bool {
        self.counted_messages(store) >= self.min_messages
    }

    /// How many more counted messages are needed.
    pub fn remaining(&self, store: &ConversationStore) -> usize {
        self.min_messages.saturating_sub(self.counted_messages(store))
    }
}

impl Default for EndChatPolicy {
    fn default() -> Self {
        Self::all_messages(DEFAULT_MIN_MESSAGES)
    }
}

/// Gating rules for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPolicy {
    pub end_chat: EndChatPolicy,
    pub min_reflection_chars: usize,
}

impl ActivityPolicy {
    pub fn new(end_chat: EndChatPolicy) -> Self {
        Self {
            end_chat,
            min_reflection_chars: DEFAULT_MIN_REFLECTION_CHARS,
        }
    }

    /// Replaces the end-of-chat threshold, keeping what is counted.
    pub fn with_min_messages(mut self, min_messages: usize) -> Self {
        self.end_chat.min_messages = min_messages;
        self
    }

    /// Sets the minimum reflection length; zero is raised to one.
    pub fn with_min_reflection_chars(mut self, chars: usize) -> Self {
        self.min_reflection_chars = chars.max(DEFAULT_MIN_REFLECTION_CHARS);
        self
    }
}

impl Default for ActivityPolicy {
    fn default() -> Self {
        Self::new(EndChatPolicy::default())
    }
}
