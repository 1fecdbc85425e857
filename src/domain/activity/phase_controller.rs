//! Gatekeeper for phase transitions.
//!
//! A failed guard is not an error condition for the student: the UI reads
//! `can_end_chat` / `can_submit_reflection` to disable the action, and the
//! `GuardFailure` value only explains why.

use thiserror::Error;

use super::phase::ActivityPhase;
use super::policy::ActivityPolicy;
use crate::domain::conversation::ConversationStore;
use crate::domain::foundation::StateMachine;

/// Why a phase transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardFailure {
    #[error("action not available while {current:?}")]
    WrongPhase { current: ActivityPhase },

    #[error("{required} messages needed, {actual} so far")]
    NotEnoughMessages { required: usize, actual: usize },

    #[error("reflection is empty")]
    ReflectionEmpty,

    #[error("reflection needs {required} characters, has {actual}")]
    ReflectionTooShort { required: usize, actual: usize },
}

/// Tracks the active phase of one activity and enforces its policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityPhaseController {
    phase: ActivityPhase,
    policy: ActivityPolicy,
}

impl ActivityPhaseController {
    pub fn new(policy: ActivityPolicy) -> Self {
        Self {
            phase: ActivityPhase::Chatting,
            policy,
        }
    }

    pub fn phase(&self) -> ActivityPhase {
        self.phase
    }

    pub fn policy(&self) -> &ActivityPolicy {
        &self.policy
    }

    /// Checks the chatting → reflection guard without changing state.
    pub fn check_end_chat(&self, store: &ConversationStore) -> Result<(), GuardFailure> {
        if self.phase != ActivityPhase::Chatting {
            return Err(GuardFailure::WrongPhase {
                current: self.phase,
            });
        }
        let policy = &self.policy.end_chat;
        if !policy.is_satisfied(store) {
            return Err(GuardFailure::NotEnoughMessages {
                required: policy.min_messages,
                actual: policy.counted_messages(store),
            });
        }
        Ok(())
    }

    pub fn can_end_chat(&self, store: &ConversationStore) -> bool {
        self.check_end_chat(store).is_ok()
    }

    /// Moves from chatting to reflection when the conversation is long enough.
    pub fn end_chat(&mut self, store: &ConversationStore) -> Result<(), GuardFailure> {
        self.check_end_chat(store)?;
        self.advance(ActivityPhase::Reflection)
    }

    /// Checks the reflection → feedback guard without changing state.
    pub fn check_submit_reflection(&self, reflection: &str) -> Result<(), GuardFailure> {
        if self.phase != ActivityPhase::Reflection {
            return Err(GuardFailure::WrongPhase {
                current: self.phase,
            });
        }
        check_reflection_text(reflection, self.policy.min_reflection_chars)
    }

    pub fn can_submit_reflection(&self, reflection: &str) -> bool {
        self.check_submit_reflection(reflection).is_ok()
    }

    /// Moves from reflection to feedback when the reflection is acceptable.
    pub fn submit_reflection(&mut self, reflection: &str) -> Result<(), GuardFailure> {
        self.check_submit_reflection(reflection)?;
        self.advance(ActivityPhase::Feedback)
    }

    /// Back to chatting from any phase.
    pub fn reset(&mut self) {
        self.phase = ActivityPhase::Chatting;
    }

    fn advance(&mut self, target: ActivityPhase) -> Result<(), GuardFailure> {
        self.phase = self
            .phase
            .transition_to(target)
            .map_err(|_| GuardFailure::WrongPhase {
                current: self.phase,
            })?;
        Ok(())
    }
}

/// Validates reflection text: trimmed, non-empty, at least `min_chars` long.
pub fn check_reflection_text(text: &str, min_chars: usize) -> Result<(), GuardFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GuardFailure::ReflectionEmpty);
    }
    let actual = trimmed.chars().count();
    if actual < min_chars {
        return Err(GuardFailure::ReflectionTooShort {
            required: min_chars,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::EndChatPolicy;
    use crate::domain::conversation::Message;

    fn store_of(n: usize) -> ConversationStore {
        let mut store = ConversationStore::new();
        for i in 0..n {
            store.append(Message::user(format!("message {}", i)).unwrap());
        }
        store
    }

    fn controller() -> ActivityPhaseController {
        ActivityPhaseController::new(ActivityPolicy::default())
    }

    mod end_chat {
        use super::*;

        #[test]
        fn refused_below_threshold() {
            let mut c = controller();
            let result = c.end_chat(&store_of(3));
            assert_eq!(
                result,
                Err(GuardFailure::NotEnoughMessages {
                    required: 4,
                    actual: 3
                })
            );
            assert_eq!(c.phase(), ActivityPhase::Chatting);
        }

        #[test]
        fn allowed_at_threshold() {
            let mut c = controller();
            assert!(c.can_end_chat(&store_of(4)));
            c.end_chat(&store_of(4)).unwrap();
            assert_eq!(c.phase(), ActivityPhase::Reflection);
        }

        #[test]
        fn uses_configured_threshold() {
            let mut c =
                ActivityPhaseController::new(ActivityPolicy::new(EndChatPolicy::all_messages(1)));
            assert!(c.end_chat(&store_of(1)).is_ok());
        }

        #[test]
        fn refused_outside_chatting() {
            let mut c = controller();
            c.end_chat(&store_of(4)).unwrap();
            assert_eq!(
                c.end_chat(&store_of(4)),
                Err(GuardFailure::WrongPhase {
                    current: ActivityPhase::Reflection
                })
            );
        }
    }

    mod submit_reflection {
        use super::*;

        fn in_reflection(policy: ActivityPolicy) -> ActivityPhaseController {
            let mut c = ActivityPhaseController::new(policy);
            c.end_chat(&store_of(10)).unwrap();
            c
        }

        #[test]
        fn whitespace_only_is_refused() {
            let mut c = in_reflection(ActivityPolicy::default());
            assert_eq!(
                c.submit_reflection("   \n "),
                Err(GuardFailure::ReflectionEmpty)
            );
            assert_eq!(c.phase(), ActivityPhase::Reflection);
        }

        #[test]
        fn non_empty_text_moves_to_feedback() {
            let mut c = in_reflection(ActivityPolicy::default());
            c.submit_reflection("I learned a lot").unwrap();
            assert_eq!(c.phase(), ActivityPhase::Feedback);
        }

        #[test]
        fn minimum_length_counts_trimmed_characters() {
            let policy = ActivityPolicy::default().with_min_reflection_chars(5);
            let c = in_reflection(policy);
            assert_eq!(
                c.check_submit_reflection("  àèì  "),
                Err(GuardFailure::ReflectionTooShort {
                    required: 5,
                    actual: 3
                })
            );
            assert!(c.can_submit_reflection("àèìòù"));
        }

        #[test]
        fn refused_while_chatting() {
            let c = controller();
            assert!(!c.can_submit_reflection("A thoughtful reflection"));
        }
    }

    #[test]
    fn reset_returns_to_chatting_from_feedback() {
        let mut c = controller();
        c.end_chat(&store_of(4)).unwrap();
        c.submit_reflection("done").unwrap();
        c.reset();
        assert_eq!(c.phase(), ActivityPhase::Chatting);
    }
}
