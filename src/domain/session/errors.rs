//! Session-specific error types.

use thiserror::Error;

use crate::domain::activity::{ActivityPhase, GuardFailure};
use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors raised by `ReflectionSession` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("operation requires phase {expected:?}, session is {actual:?}")]
    WrongPhase {
        expected: ActivityPhase,
        actual: ActivityPhase,
    },

    #[error(transparent)]
    Guard(#[from] GuardFailure),

    #[error("an evaluation is already in flight")]
    EvaluationPending,

    #[error("the session has already been evaluated")]
    AlreadyEvaluated,

    #[error("no reflection has been submitted")]
    ReflectionMissing,

    #[error("the session was reset after this request started")]
    StaleTicket,

    #[error("{0}")]
    Validation(#[from] DomainError),
}

impl SessionError {
    pub fn wrong_phase(expected: ActivityPhase, actual: ActivityPhase) -> Self {
        SessionError::WrongPhase { expected, actual }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::WrongPhase { .. } => ErrorCode::WrongPhase,
            SessionError::Guard(_) => ErrorCode::InvalidStateTransition,
            SessionError::EvaluationPending => ErrorCode::EvaluationPending,
            SessionError::AlreadyEvaluated => ErrorCode::InvalidStateTransition,
            SessionError::ReflectionMissing => ErrorCode::EmptyField,
            SessionError::StaleTicket => ErrorCode::StaleSession,
            SessionError::Validation(err) => err.code,
        }
    }
}
