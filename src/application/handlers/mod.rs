//! Application handlers.
//!
//! Each handler orchestrates one user action against a shared
//! `ReflectionSession` and the ports it needs.
//!
//! Handlers lock the session only to validate, snapshot or apply a result.
//! The lock is never held across an AI call.

pub mod export_transcript;
pub mod request_evaluation;
pub mod send_message;
pub mod start_activity;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::session::ReflectionSession;

pub use export_transcript::ExportTranscriptHandler;
pub use request_evaluation::{
    EvaluationEvent, EvaluationOutcome, EvaluationRequester, RequestEvaluationError,
};
pub use send_message::{
    DialogueTurnCommand, SendMessageCommand, SendMessageError, SendMessageHandler,
    SendMessageResult, RECENT_DIALOGUE_MESSAGES,
};
pub use start_activity::{StartActivityCommand, StartActivityError, StartActivityHandler};

/// A session shared between the front end and in-flight handlers.
pub type SharedSession = Arc<Mutex<ReflectionSession>>;

/// Wraps a session for sharing.
pub fn share(session: ReflectionSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}
