//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time, the state machine trait and error types
//! used by every activity.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{MessageId, SessionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
