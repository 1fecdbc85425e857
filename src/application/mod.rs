//! Application layer - command handlers and prompt composition.
//!
//! Handlers orchestrate the session aggregate and the ports. They lock the
//! shared session only to validate, snapshot or apply, never across a call
//! to the AI boundary.

pub mod app_context;
pub mod handlers;
pub mod prompts;

pub use app_context::{AppContext, Preferences};
pub use handlers::{
    share, DialogueTurnCommand, EvaluationEvent, EvaluationOutcome, EvaluationRequester,
    ExportTranscriptHandler, RequestEvaluationError, SendMessageCommand, SendMessageError,
    SendMessageHandler, SendMessageResult, SharedSession, StartActivityCommand,
    StartActivityError, StartActivityHandler, RECENT_DIALOGUE_MESSAGES,
};
pub use prompts::PromptBuilder;
