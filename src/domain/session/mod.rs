//! Session domain module.
//!
//! `ReflectionSession` ties one activity run together: the conversation,
//! the phase controller, the reflection and the evaluation. It is the unit
//! that gets exported and the unit a reset starts over.

mod aggregate;
mod errors;
mod evaluation;

pub use aggregate::{ReflectionSession, SessionSetup, SessionTicket};
pub use errors::SessionError;
pub use evaluation::{
    EvaluationReport, EvaluationState, CONVERSATION_RATIONALE, CONVERSATION_SCORE,
    REFLECTION_RATIONALE, REFLECTION_SCORE,
};
