//! SendMessage command handler.
//!
//! Handles the chatting phase: a student message goes into the
//! conversation, the character's reply comes back from the AI provider and
//! is appended after it.
//!
//! Two kinds of turn are supported:
//! - a chat turn, where the first character answers the student
//! - a dialogue turn, where one of two characters speaks next, optionally
//!   in response to a moderator message
//!
//! A failed AI call appends nothing in place of the reply. The caller gets
//! the error with a localized notice to show instead.

use std::sync::Arc;

use thiserror::Error;

use crate::application::PromptBuilder;
use crate::domain::activity::{ActivityPhase, Persona};
use crate::domain::conversation::{Message, Role};
use crate::domain::foundation::{DomainError, MessageId};
use crate::domain::session::{SessionError, SessionTicket};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, MessageRole, RequestMetadata, RequestPurpose,
    TokenUsage,
};

use super::SharedSession;

/// How many earlier messages a dialogue prompt quotes.
pub const RECENT_DIALOGUE_MESSAGES: usize = 6;

/// Command to send a student message in a single-character chat.
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub content: String,
}

impl SendMessageCommand {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Command to let one character of a two-character dialogue speak.
#[derive(Debug, Clone)]
pub struct DialogueTurnCommand {
    /// Index into the session's characters.
    pub speaker: usize,
    /// What the moderator said just before, if anything.
    pub moderator_message: Option<String>,
}

impl DialogueTurnCommand {
    pub fn new(speaker: usize) -> Self {
        Self {
            speaker,
            moderator_message: None,
        }
    }

    pub fn with_moderator_message(mut self, message: impl Into<String>) -> Self {
        self.moderator_message = Some(message.into());
        self
    }
}

/// Errors that can occur when sending a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    /// Message content is empty or whitespace only.
    #[error("Validation error: message content cannot be empty")]
    EmptyContent,

    #[error("the activity has no character to answer")]
    NoCharacter,

    #[error("dialogue speaker {index} does not exist")]
    UnknownSpeaker { index: usize },

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The AI call failed. `notice` is the localized text to show instead.
    #[error("AI provider error: {cause}")]
    AIProvider { cause: String, notice: String },

    /// The session was reset while the reply was generated; it was dropped.
    #[error("the session was reset before the reply arrived")]
    Superseded,
}

impl From<DomainError> for SendMessageError {
    fn from(err: DomainError) -> Self {
        SendMessageError::Session(SessionError::Validation(err))
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct SendMessageResult {
    /// ID of the student or moderator message that was stored, if any.
    pub user_message_id: Option<MessageId>,
    /// The character reply that was appended.
    pub reply: Message,
    pub usage: TokenUsage,
    /// Whether "end chat" is now allowed.
    pub can_end_chat: bool,
}

/// Handler for chat and dialogue turns.
#[derive(Clone)]
pub struct SendMessageHandler {
    ai_provider: Arc<dyn AIProvider>,
    prompts: PromptBuilder,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl SendMessageHandler {
    pub fn new(ai_provider: Arc<dyn AIProvider>, prompts: PromptBuilder) -> Self {
        Self {
            ai_provider,
            prompts,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Handles a chat turn with the session's first character.
    pub async fn handle(
        &self,
        session: &SharedSession,
        cmd: SendMessageCommand,
    ) -> Result<SendMessageResult, SendMessageError> {
        let content = cmd.content.trim();
        if content.is_empty() {
            return Err(SendMessageError::EmptyContent);
        }

        let (ticket, persona, request, user_message_id) = {
            let mut session = session.lock().await;
            let persona = session
                .personas()
                .first()
                .cloned()
                .ok_or(SendMessageError::NoCharacter)?;

            let message = Message::user(content)?;
            let user_message_id = *message.id();
            session.append_message(message)?;

            let system_prompt = self.prompts.character_instruction(
                session.activity_type(),
                &persona,
                session.topic(),
            );
            let mut request = self.request(session.ticket(), RequestPurpose::ChatTurn)
                .with_system_prompt(system_prompt);
            for message in session.messages() {
                let role = match message.role() {
                    Role::User => MessageRole::User,
                    Role::Assistant | Role::Character => MessageRole::Assistant,
                    Role::System => continue,
                };
                request = request.with_message(role, message.content());
            }
            (session.ticket(), persona, request, user_message_id)
        };

        let (reply, usage) = self.generate(request, &persona).await?;
        self.apply_reply(session, &ticket, reply, usage, Some(user_message_id))
            .await
    }

    /// Handles a dialogue turn for `cmd.speaker`, addressing the other
    /// character.
    pub async fn handle_dialogue_turn(
        &self,
        session: &SharedSession,
        cmd: DialogueTurnCommand,
    ) -> Result<SendMessageResult, SendMessageError> {
        let moderator_message = match cmd.moderator_message.as_deref().map(str::trim) {
            Some("") => return Err(SendMessageError::EmptyContent),
            other => other.map(str::to_string),
        };

        let (ticket, speaker, request, user_message_id) = {
            let mut session = session.lock().await;
            let personas = session.personas();
            if personas.len() < 2 {
                return Err(SendMessageError::NoCharacter);
            }
            let speaker = personas
                .get(cmd.speaker)
                .cloned()
                .ok_or(SendMessageError::UnknownSpeaker { index: cmd.speaker })?;
            let target: Persona = personas[(cmd.speaker + 1) % personas.len()].clone();

            if session.phase() != ActivityPhase::Chatting {
                return Err(SessionError::wrong_phase(ActivityPhase::Chatting, session.phase()).into());
            }

            let recent = session
                .conversation()
                .recent(RECENT_DIALOGUE_MESSAGES)
                .to_vec();
            let theme = session
                .topic()
                .map(str::to_string)
                .unwrap_or_else(|| self.prompts.activity_title(session.activity_type()));

            let user_message_id = match &moderator_message {
                Some(text) => {
                    let message = Message::user(text.as_str())?;
                    let id = *message.id();
                    session.append_message(message)?;
                    Some(id)
                }
                None => None,
            };

            let prompt = self.prompts.dialogue_prompt(
                &speaker,
                &target,
                &theme,
                &recent,
                moderator_message.as_deref(),
            );
            let request = self
                .request(session.ticket(), RequestPurpose::DialogueTurn)
                .with_system_prompt(self.prompts.dialogue_instruction(&speaker))
                .with_message(MessageRole::User, prompt);
            (session.ticket(), speaker, request, user_message_id)
        };

        let (reply, usage) = self.generate(request, &speaker).await?;
        self.apply_reply(session, &ticket, reply, usage, user_message_id)
            .await
    }

    fn request(&self, ticket: SessionTicket, purpose: RequestPurpose) -> CompletionRequest {
        let mut request = CompletionRequest::new(RequestMetadata::new(ticket.session_id, purpose))
            .with_temperature_opt(self.temperature);
        if let Some(max) = self.max_tokens {
            request = request.with_max_tokens(max);
        }
        request
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        persona: &Persona,
    ) -> Result<(Message, TokenUsage), SendMessageError> {
        let trace_id = request.metadata.trace_id.clone();
        tracing::debug!(
            trace_id = %trace_id,
            character = persona.name(),
            messages = request.messages.len(),
            "Requesting character reply"
        );

        let result = match self.ai_provider.complete(request).await {
            Ok(response) if response.content.trim().is_empty() => Err(AIError::EmptyResponse),
            other => other,
        };

        match result {
            Ok(response) => {
                let reply = Message::character(persona.name(), response.content.trim())?;
                Ok((reply, response.usage))
            }
            Err(err) => {
                tracing::warn!(trace_id = %trace_id, error = %err, "Character reply failed");
                let notice = match err {
                    AIError::EmptyResponse => self.prompts.no_response_notice(),
                    ref other => self.prompts.apologetic_notice(Some(&other.to_string())),
                };
                Err(SendMessageError::AIProvider {
                    cause: err.to_string(),
                    notice,
                })
            }
        }
    }

    async fn apply_reply(
        &self,
        session: &SharedSession,
        ticket: &SessionTicket,
        reply: Message,
        usage: TokenUsage,
        user_message_id: Option<MessageId>,
    ) -> Result<SendMessageResult, SendMessageError> {
        let mut session = session.lock().await;
        match session.append_reply(ticket, reply.clone()) {
            Ok(()) => Ok(SendMessageResult {
                user_message_id,
                reply,
                usage,
                can_end_chat: session.can_end_chat(),
            }),
            Err(SessionError::StaleTicket) => {
                tracing::warn!(
                    session_id = %ticket.session_id,
                    epoch = ticket.epoch,
                    "Discarding reply for a reset session"
                );
                Err(SendMessageError::Superseded)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockAIProvider, MockError};
    use crate::adapters::i18n::CatalogLocalizer;
    use crate::application::handlers::share;
    use crate::domain::activity::ActivityType;
    use crate::domain::session::{ReflectionSession, SessionSetup};
    use crate::ports::Locale;
    use tokio::sync::Notify;

    fn prompts() -> PromptBuilder {
        PromptBuilder::new(Arc::new(CatalogLocalizer::embedded().unwrap()), Locale::En)
    }

    fn handler(provider: &MockAIProvider) -> SendMessageHandler {
        SendMessageHandler::new(Arc::new(provider.clone()), prompts())
    }

    fn galileo() -> Persona {
        Persona::new("Galileo Galilei").unwrap().with_bio("Astronomer from Pisa.")
    }

    fn chat_session() -> SharedSession {
        share(ReflectionSession::new(
            SessionSetup::new(ActivityType::MysteryCharacter).with_persona(galileo()),
        ))
    }

    fn dialogue_session() -> SharedSession {
        share(ReflectionSession::new(
            SessionSetup::new(ActivityType::YouModerate)
                .with_persona(galileo())
                .with_persona(Persona::new("Isaac Newton").unwrap())
                .with_topic("planetary motion"),
        ))
    }

    mod chat_turn {
        use super::*;

        #[tokio::test]
        async fn appends_student_message_and_reply() {
            let provider = MockAIProvider::new().with_response("I study the heavens.");
            let session = chat_session();

            let result = handler(&provider)
                .handle(&session, SendMessageCommand::new("  Are you an astronomer? "))
                .await
                .unwrap();

            assert_eq!(result.reply.content(), "I study the heavens.");
            assert_eq!(result.reply.character_name(), Some("Galileo Galilei"));
            assert!(!result.can_end_chat);

            let session = session.lock().await;
            let contents: Vec<&str> = session.messages().iter().map(|m| m.content()).collect();
            assert_eq!(contents, vec!["Are you an astronomer?", "I study the heavens."]);
            assert_eq!(Some(*session.messages()[0].id()), result.user_message_id);
        }

        #[tokio::test]
        async fn sends_persona_and_history() {
            let provider = MockAIProvider::new().with_response("First").with_response("Second");
            let session = chat_session();
            let handler = handler(&provider);

            handler.handle(&session, SendMessageCommand::new("Hello")).await.unwrap();
            handler.handle(&session, SendMessageCommand::new("Again")).await.unwrap();

            let calls = provider.get_calls();
            let last = &calls[1];
            assert!(last
                .system_prompt
                .as_deref()
                .unwrap()
                .starts_with("You are Galileo Galilei. Astronomer from Pisa."));
            let roles: Vec<MessageRole> = last.messages.iter().map(|m| m.role).collect();
            assert_eq!(
                roles,
                vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
            );
            assert_eq!(last.metadata.purpose, RequestPurpose::ChatTurn);
        }

        #[tokio::test]
        async fn blank_message_is_rejected() {
            let provider = MockAIProvider::new();
            let session = chat_session();

            let result = handler(&provider).handle(&session, SendMessageCommand::new("   ")).await;

            assert_eq!(result.unwrap_err(), SendMessageError::EmptyContent);
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test]
        async fn ai_failure_keeps_student_message_only() {
            let provider = MockAIProvider::new().with_error(MockError::Network {
                message: "connection reset".into(),
            });
            let session = chat_session();

            let err = handler(&provider)
                .handle(&session, SendMessageCommand::new("Hello"))
                .await
                .unwrap_err();

            match err {
                SendMessageError::AIProvider { notice, .. } => {
                    assert!(notice.starts_with("I am sorry, I could not answer just now."));
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(session.lock().await.messages().len(), 1);
        }

        #[tokio::test]
        async fn blank_reply_is_treated_as_no_response() {
            let provider = MockAIProvider::new().with_response("   ");
            let session = chat_session();

            let err = handler(&provider)
                .handle(&session, SendMessageCommand::new("Hello"))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                SendMessageError::AIProvider { ref notice, .. }
                    if notice == "I have nothing to add at the moment."
            ));
        }

        #[tokio::test]
        async fn rejected_after_chat_ended() {
            let provider = MockAIProvider::new();
            let session = chat_session();
            {
                let mut s = session.lock().await;
                for _ in 0..4 {
                    s.append_message(Message::user("q").unwrap()).unwrap();
                }
                s.end_chat().unwrap();
            }

            let err = handler(&provider)
                .handle(&session, SendMessageCommand::new("Hello"))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                SendMessageError::Session(SessionError::WrongPhase { .. })
            ));
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test]
        async fn session_without_character_is_rejected() {
            let provider = MockAIProvider::new();
            let session = share(ReflectionSession::new(SessionSetup::new(
                ActivityType::WikiChatbot,
            )));

            let err = handler(&provider)
                .handle(&session, SendMessageCommand::new("Hello"))
                .await
                .unwrap_err();
            assert_eq!(err, SendMessageError::NoCharacter);
        }

        #[tokio::test]
        async fn reply_after_reset_is_discarded() {
            let gate = Arc::new(Notify::new());
            let provider = MockAIProvider::new()
                .with_response("Too late")
                .with_gate(gate.clone());
            let session = chat_session();

            let task = tokio::spawn({
                let handler = handler(&provider);
                let session = session.clone();
                async move {
                    handler
                        .handle(&session, SendMessageCommand::new("Hello"))
                        .await
                }
            });

            while provider.call_count() == 0 {
                tokio::task::yield_now().await;
            }
            session.lock().await.reset();
            gate.notify_one();

            let result = task.await.unwrap();
            assert_eq!(result.unwrap_err(), SendMessageError::Superseded);
            assert!(session.lock().await.messages().is_empty());
        }
    }

    mod dialogue_turn {
        use super::*;

        #[tokio::test]
        async fn speaker_replies_to_moderator() {
            let provider = MockAIProvider::new().with_response("Gravity, of course.");
            let session = dialogue_session();

            let result = handler(&provider)
                .handle_dialogue_turn(
                    &session,
                    DialogueTurnCommand::new(1).with_moderator_message("Why do planets orbit?"),
                )
                .await
                .unwrap();

            assert_eq!(result.reply.character_name(), Some("Isaac Newton"));
            assert!(result.user_message_id.is_some());

            let call = &provider.get_calls()[0];
            assert_eq!(call.metadata.purpose, RequestPurpose::DialogueTurn);
            assert!(call
                .system_prompt
                .as_deref()
                .unwrap()
                .starts_with("You are Isaac Newton."));
            let prompt = &call.messages[0].content;
            assert!(prompt.starts_with(
                "You are talking with Galileo Galilei about: planetary motion."
            ));
            assert!(prompt.contains("The moderator says: Why do planets orbit?"));

            let session = session.lock().await;
            assert_eq!(session.messages().len(), 2);
            assert!(session.messages()[0].is_user());
        }

        #[tokio::test]
        async fn speaker_continues_without_moderator() {
            let provider = MockAIProvider::new()
                .with_response("The Earth moves.")
                .with_response("Indeed, by gravity.");
            let session = dialogue_session();
            let handler = handler(&provider);

            handler
                .handle_dialogue_turn(&session, DialogueTurnCommand::new(0))
                .await
                .unwrap();
            let result = handler
                .handle_dialogue_turn(&session, DialogueTurnCommand::new(1))
                .await
                .unwrap();

            assert_eq!(result.user_message_id, None);
            let prompt = &provider.get_calls()[1].messages[0].content;
            assert!(prompt.contains("Galileo Galilei: The Earth moves.\n"));
            assert!(prompt.ends_with(
                "Continue the discussion with Galileo Galilei about planetary motion, speaking as Isaac Newton."
            ));
        }

        #[tokio::test]
        async fn unknown_speaker_is_rejected() {
            let provider = MockAIProvider::new();
            let err = handler(&provider)
                .handle_dialogue_turn(&dialogue_session(), DialogueTurnCommand::new(2))
                .await
                .unwrap_err();
            assert_eq!(err, SendMessageError::UnknownSpeaker { index: 2 });
        }

        #[tokio::test]
        async fn blank_moderator_message_is_rejected() {
            let provider = MockAIProvider::new();
            let err = handler(&provider)
                .handle_dialogue_turn(
                    &dialogue_session(),
                    DialogueTurnCommand::new(0).with_moderator_message("  "),
                )
                .await
                .unwrap_err();
            assert_eq!(err, SendMessageError::EmptyContent);
        }

        #[tokio::test]
        async fn single_character_session_cannot_hold_dialogue() {
            let provider = MockAIProvider::new();
            let err = handler(&provider)
                .handle_dialogue_turn(&chat_session(), DialogueTurnCommand::new(0))
                .await
                .unwrap_err();
            assert_eq!(err, SendMessageError::NoCharacter);
        }
    }
}
