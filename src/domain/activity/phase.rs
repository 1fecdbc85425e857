//! Lifecycle phases shared by every activity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// The phase an activity is in. Exactly one is active at a time.
///
/// Phases only move forward:
/// - `Chatting` → `Reflection` → `Feedback`
///
/// Returning to `Chatting` is a full reset, not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityPhase {
    #[default]
    Chatting,
    Reflection,
    Feedback,
}

impl ActivityPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chatting => "chatting",
            Self::Reflection => "reflection",
            Self::Feedback => "feedback",
        }
    }
}

impl StateMachine for ActivityPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Chatting, Self::Reflection) | (Self::Reflection, Self::Feedback)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Chatting => vec![Self::Reflection],
            Self::Reflection => vec![Self::Feedback],
            Self::Feedback => vec![],
        }
    }
}
