//! StartActivity command handler.
//!
//! Builds a fresh `ReflectionSession` for an activity: resolves the
//! reflection questions in the current locale and applies configured
//! policy overrides on top of the activity's defaults.

use thiserror::Error;

use crate::domain::activity::{ActivityType, Persona};
use crate::domain::reflection::ReflectionQuestion;
use crate::domain::session::{ReflectionSession, SessionSetup};

use super::{share, SharedSession};
use crate::application::PromptBuilder;

/// Command to start an activity.
#[derive(Debug, Clone)]
pub struct StartActivityCommand {
    pub activity_type: ActivityType,
    pub personas: Vec<Persona>,
    pub topic: Option<String>,
}

impl StartActivityCommand {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            personas: Vec::new(),
            topic: None,
        }
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.personas.push(persona);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Errors that can occur when starting an activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartActivityError {
    #[error("{activity} needs {required} character(s), got {actual}")]
    MissingCharacters {
        activity: ActivityType,
        required: usize,
        actual: usize,
    },
}

/// Handler for StartActivity commands.
#[derive(Clone)]
pub struct StartActivityHandler {
    prompts: PromptBuilder,
    min_messages_override: Option<usize>,
    min_reflection_chars: Option<usize>,
}

impl StartActivityHandler {
    pub fn new(prompts: PromptBuilder) -> Self {
        Self {
            prompts,
            min_messages_override: None,
            min_reflection_chars: None,
        }
    }

    /// Applies one end-of-chat threshold to every activity.
    pub fn with_min_messages_override(mut self, min_messages: Option<usize>) -> Self {
        self.min_messages_override = min_messages;
        self
    }

    pub fn with_min_reflection_chars(mut self, chars: usize) -> Self {
        self.min_reflection_chars = Some(chars);
        self
    }

    /// Setup for `cmd`, without starting it.
    pub fn setup_for(&self, cmd: StartActivityCommand) -> Result<SessionSetup, StartActivityError> {
        let activity = cmd.activity_type;
        let required = if activity.is_dialogue() { 2 } else { 1 };
        if cmd.personas.len() < required {
            return Err(StartActivityError::MissingCharacters {
                activity,
                required,
                actual: cmd.personas.len(),
            });
        }

        let mut policy = activity.default_policy();
        if let Some(min) = self.min_messages_override {
            policy = policy.with_min_messages(min);
        }
        if let Some(chars) = self.min_reflection_chars {
            policy = policy.with_min_reflection_chars(chars);
        }

        let questions = activity
            .reflection_question_keys()
            .into_iter()
            .map(|key| {
                let text = self.prompts.t(&key, &[]);
                ReflectionQuestion::new(key, text)
            })
            .collect();

        let mut setup = SessionSetup::new(activity)
            .with_policy(policy)
            .with_questions(questions);
        for persona in cmd.personas {
            setup = setup.with_persona(persona);
        }
        if let Some(topic) = cmd.topic.filter(|t| !t.trim().is_empty()) {
            setup = setup.with_topic(topic.trim());
        }
        Ok(setup)
    }

    /// Starts the activity in the chatting phase.
    pub fn handle(&self, cmd: StartActivityCommand) -> Result<SharedSession, StartActivityError> {
        let setup = self.setup_for(cmd)?;
        let session = ReflectionSession::new(setup);
        tracing::info!(
            session_id = %session.id(),
            activity = %session.activity_type(),
            locale = %self.prompts.locale(),
            "Activity started"
        );
        Ok(share(session))
    }
}
