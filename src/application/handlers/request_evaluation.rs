//! Evaluation requester.
//!
//! Sends the transcript and the student's reflection to the AI provider and
//! stores the evaluation on the session. A failed or empty evaluation is
//! replaced by a localized fallback text, so the session never stays
//! pending once the request is over.
//!
//! At most one evaluation is in flight per session. A reset while it is in
//! flight makes the eventual result stale; it is logged and dropped.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::application::PromptBuilder;
use crate::domain::session::{EvaluationReport, SessionError, SessionTicket};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, MessageRole, RequestMetadata, RequestPurpose,
};

use super::SharedSession;

/// Progress of a streaming evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationEvent {
    /// Everything received so far.
    Partial { text: String },
    /// Final text to display.
    Complete { text: String },
    /// The evaluation failed; `text` is the fallback shown instead.
    Failed { text: String, cause: String },
}

/// How an evaluation request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Ready(EvaluationReport),
    Fallback { text: String, cause: String },
}

impl EvaluationOutcome {
    /// Text stored on the session.
    pub fn text(&self) -> &str {
        match self {
            EvaluationOutcome::Ready(report) => &report.text,
            EvaluationOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EvaluationOutcome::Fallback { .. })
    }
}

/// Errors that prevent an evaluation from being requested or stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestEvaluationError {
    #[error("an evaluation is already in progress")]
    AlreadyPending,

    #[error("the session has already been evaluated")]
    AlreadyEvaluated,

    /// The session was reset before the evaluation arrived; it was dropped.
    #[error("the session was reset before the evaluation arrived")]
    Superseded,

    #[error(transparent)]
    Session(SessionError),
}

impl From<SessionError> for RequestEvaluationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::EvaluationPending => RequestEvaluationError::AlreadyPending,
            SessionError::AlreadyEvaluated => RequestEvaluationError::AlreadyEvaluated,
            SessionError::StaleTicket => RequestEvaluationError::Superseded,
            other => RequestEvaluationError::Session(other),
        }
    }
}

/// Requests and stores the AI evaluation of a session.
#[derive(Clone)]
pub struct EvaluationRequester {
    ai_provider: Arc<dyn AIProvider>,
    prompts: PromptBuilder,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl EvaluationRequester {
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

    /// Requests the evaluation and waits for it.
    ///
    /// Provider failures are not errors here: they resolve the session with
    /// the fallback text and return `EvaluationOutcome::Fallback`.
    ///
    /// # Errors
    ///
    /// - `AlreadyPending` if another request is in flight
    /// - `AlreadyEvaluated` if the session already has its evaluation
    /// - `Superseded` if the session was reset meanwhile
    /// - `Session` before the reflection has been submitted
    pub async fn request_evaluation(
        &self,
        session: &SharedSession,
    ) -> Result<EvaluationOutcome, RequestEvaluationError> {
        let (ticket, request) = self.begin(session).await?;
        let guard = PendingGuard::new(session, ticket);

        let result = self
            .ai_provider
            .complete(request)
            .await
            .map(|response| response.content);
        let outcome = self.resolve(session, &ticket, result).await;
        guard.disarm();
        outcome
    }

    /// Like [`request_evaluation`](Self::request_evaluation), forwarding
    /// progress to `events` as text arrives.
    ///
    /// The last event is `Complete` or `Failed` unless the result was
    /// superseded. A closed receiver does not stop the evaluation.
    ///
    /// Partials never wait for channel space: each one carries the whole
    /// text so far, so one is skipped while only a single slot is left, and
    /// that slot goes to the final event. The receiver may be drained after
    /// this call returns.
    pub async fn request_evaluation_streaming(
        &self,
        session: &SharedSession,
        events: mpsc::Sender<EvaluationEvent>,
    ) -> Result<EvaluationOutcome, RequestEvaluationError> {
        let (ticket, request) = self.begin(session).await?;
        let guard = PendingGuard::new(session, ticket);

        let result = match self.ai_provider.stream_complete(request).await {
            Ok(mut stream) => {
                let mut accumulated = String::new();
                let mut failure = None;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            if chunk.delta.is_empty() {
                                continue;
                            }
                            accumulated.push_str(&chunk.delta);
                            if events.capacity() > 1 {
                                let _ = events.try_send(EvaluationEvent::Partial {
                                    text: accumulated.clone(),
                                });
                            }
                        }
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                match failure {
                    Some(err) => Err(err),
                    None => Ok(accumulated),
                }
            }
            Err(err) => Err(err),
        };

        let outcome = self.resolve(session, &ticket, result).await;
        guard.disarm();
        let outcome = outcome?;
        let event = match &outcome {
            EvaluationOutcome::Ready(report) => EvaluationEvent::Complete {
                text: report.text.clone(),
            },
            EvaluationOutcome::Fallback { text, cause } => EvaluationEvent::Failed {
                text: text.clone(),
                cause: cause.clone(),
            },
        };
        let _ = events.send(event).await;
        Ok(outcome)
    }

    /// Marks the session pending and builds the request.
    async fn begin(
        &self,
        session: &SharedSession,
    ) -> Result<(SessionTicket, CompletionRequest), RequestEvaluationError> {
        let mut session = session.lock().await;
        let ticket = session.begin_evaluation()?;

        let character = session
            .character_display_name()
            .unwrap_or_else(|| self.prompts.t("labels.ai", &[]));
        let topic = session
            .topic()
            .map(str::to_string)
            .unwrap_or_else(|| self.prompts.activity_title(session.activity_type()));
        let snippet = session.personas().first().and_then(|p| p.bio());

        let system_prompt = self
            .prompts
            .evaluation_instruction(&character, &topic, snippet);
        let conversation = self
            .prompts
            .conversation_text(session.messages(), &character);
        let data_prompt = self
            .prompts
            .evaluation_prompt(&conversation, session.user_reflection().unwrap_or_default());

        let mut request = CompletionRequest::new(RequestMetadata::new(
            ticket.session_id,
            RequestPurpose::Evaluation,
        ))
        .with_system_prompt(system_prompt)
        .with_message(MessageRole::User, data_prompt)
        .with_temperature_opt(self.temperature);
        if let Some(max) = self.max_tokens {
            request = request.with_max_tokens(max);
        }

        tracing::info!(
            session_id = %ticket.session_id,
            trace_id = %request.metadata.trace_id,
            messages = session.messages().len(),
            "Evaluation requested"
        );
        Ok((ticket, request))
    }

    /// Stores the result, or the fallback when there is none.
    async fn resolve(
        &self,
        session: &SharedSession,
        ticket: &SessionTicket,
        result: Result<String, AIError>,
    ) -> Result<EvaluationOutcome, RequestEvaluationError> {
        let result = match result {
            Ok(raw) if raw.trim().is_empty() => Err(AIError::EmptyResponse),
            other => other,
        };

        let outcome = match result {
            Ok(raw) => {
                let report = EvaluationReport::parse(&raw);
                let text = self.prompts.feedback_text(&report);
                EvaluationOutcome::Ready(report.with_text(text))
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %ticket.session_id,
                    error = %err,
                    "Evaluation unavailable, using fallback text"
                );
                EvaluationOutcome::Fallback {
                    text: self.prompts.evaluation_unavailable(),
                    cause: err.to_string(),
                }
            }
        };

        let mut guard = session.lock().await;
        let stored = match &outcome {
            EvaluationOutcome::Ready(report) => guard.complete_evaluation(ticket, report.clone()),
            EvaluationOutcome::Fallback { text, cause } => {
                guard.fail_evaluation(ticket, text.as_str(), cause.as_str())
            }
        };

        match stored {
            Ok(()) => {
                tracing::info!(
                    session_id = %ticket.session_id,
                    fallback = outcome.is_fallback(),
                    "Evaluation stored"
                );
                Ok(outcome)
            }
            Err(SessionError::StaleTicket) => {
                tracing::warn!(
                    session_id = %ticket.session_id,
                    epoch = ticket.epoch,
                    "Discarding evaluation for a reset session"
                );
                Err(RequestEvaluationError::Superseded)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Returns the session to `NotRequested` if an evaluation request is
/// dropped between `begin` and `resolve`.
struct PendingGuard {
    session: SharedSession,
    ticket: Option<SessionTicket>,
}

impl PendingGuard {
    fn new(session: &SharedSession, ticket: SessionTicket) -> Self {
        Self {
            session: Arc::clone(session),
            ticket: Some(ticket),
        }
    }

    fn disarm(mut self) {
        self.ticket = None;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        tracing::warn!(
            session_id = %ticket.session_id,
            "Evaluation request cancelled before it resolved"
        );
        match self.session.try_lock() {
            Ok(mut session) => {
                session.abandon_evaluation(&ticket);
            }
            Err(_) => {
                // The lock is busy; release the pending state once it frees.
                let session = Arc::clone(&self.session);
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        session.lock().await.abandon_evaluation(&ticket);
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockAIProvider, MockError};
    use crate::adapters::i18n::CatalogLocalizer;
    use crate::application::handlers::share;
    use crate::domain::activity::{ActivityPhase, ActivityType, Persona};
    use crate::domain::conversation::Message;
    use crate::domain::session::{EvaluationState, ReflectionSession, SessionSetup};
    use crate::ports::Locale;
    use tokio::sync::Notify;

    fn requester(provider: &MockAIProvider) -> EvaluationRequester {
        EvaluationRequester::new(
            Arc::new(provider.clone()),
            PromptBuilder::new(Arc::new(CatalogLocalizer::embedded().unwrap()), Locale::En),
        )
    }

    fn chatting_session() -> ReflectionSession {
        let setup = SessionSetup::new(ActivityType::MysteryCharacter).with_persona(
            Persona::new("Galileo Galilei")
                .unwrap()
                .with_bio("Astronomer from Pisa."),
        );
        let mut session = ReflectionSession::new(setup);
        session.append_message(Message::user("Are you an astronomer?").unwrap()).unwrap();
        session
            .append_message(Message::character("Galileo Galilei", "I study the heavens.").unwrap())
            .unwrap();
        session.append_message(Message::user("Did you see moons?").unwrap()).unwrap();
        session
            .append_message(Message::character("Galileo Galilei", "Four, around Jupiter.").unwrap())
            .unwrap();
        session
    }

    fn feedback_session() -> SharedSession {
        let mut session = chatting_session();
        session.end_chat().unwrap();
        session
            .set_reflection_draft("I learned about the moons of Jupiter")
            .unwrap();
        session.submit_reflection().unwrap();
        share(session)
    }

    async fn wait_for_call(provider: &MockAIProvider) {
        while provider.call_count() == 0 {
            tokio::task::yield_now().await;
        }
    }

    mod request {
        use super::*;

        #[tokio::test]
        async fn stores_ready_evaluation() {
            let provider = MockAIProvider::new().with_response("Good engagement.");
            let session = feedback_session();

            let outcome = requester(&provider).request_evaluation(&session).await.unwrap();

            assert_eq!(outcome.text(), "Good engagement.");
            let session = session.lock().await;
            assert_eq!(session.ai_evaluation(), Some("Good engagement."));
            assert!(session.completed_at().is_some());
        }

        #[tokio::test]
        async fn payload_carries_transcript_and_reflection() {
            let provider = MockAIProvider::new().with_response("Fine.");
            let session = feedback_session();

            requester(&provider).request_evaluation(&session).await.unwrap();

            let call = &provider.get_calls()[0];
            assert_eq!(call.metadata.purpose, RequestPurpose::Evaluation);
            let system = call.system_prompt.as_deref().unwrap();
            assert!(system.contains("The student talked with Galileo Galilei"));
            assert!(system.contains("Character notes: Astronomer from Pisa."));
            assert!(system.contains("theme: Mystery Character."));

            let data = &call.messages[0].content;
            assert!(data.contains(
                "Student: Are you an astronomer?\n\nGalileo Galilei: I study the heavens."
            ));
            assert!(data.contains("I learned about the moons of Jupiter"));
        }

        #[tokio::test]
        async fn placeholders_typed_by_the_student_stay_verbatim() {
            let provider = MockAIProvider::new().with_response("Fine.");
            let mut session = chatting_session();
            session
                .append_message(Message::user("What does {{userReflection}} mean?").unwrap())
                .unwrap();
            session.end_chat().unwrap();
            session.set_reflection_draft("I learned a lot").unwrap();
            session.submit_reflection().unwrap();
            let session = share(session);

            requester(&provider).request_evaluation(&session).await.unwrap();

            let data = &provider.get_calls()[0].messages[0].content;
            assert!(data.contains("Student: What does {{userReflection}} mean?"));
            assert!(data.contains("I learned a lot"));
        }

        #[tokio::test]
        async fn parses_scores_out_of_feedback() {
            let provider = MockAIProvider::new().with_response(
                "CONVERSATION_SCORE: 8\nCONVERSATION_RATIONALE: Focused.\n\
                 REFLECTION_SCORE: 7\nREFLECTION_RATIONALE: Honest.\n\nGreat curiosity.",
            );
            let session = feedback_session();

            let outcome = requester(&provider).request_evaluation(&session).await.unwrap();

            match outcome {
                EvaluationOutcome::Ready(report) => {
                    assert_eq!(report.conversation_score, Some(8));
                    assert_eq!(report.reflection_score, Some(7));
                    assert_eq!(report.text, "Great curiosity.");
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        #[tokio::test]
        async fn scores_only_reply_gets_composed_summary() {
            let provider =
                MockAIProvider::new().with_response("CONVERSATION_SCORE: 8\nREFLECTION_SCORE: 6");
            let session = feedback_session();

            let outcome = requester(&provider).request_evaluation(&session).await.unwrap();

            assert!(outcome.text().starts_with("**Conversation score:** 8/10"));
            assert!(outcome.text().contains("### Overall feedback"));
        }

        #[tokio::test]
        async fn failure_resolves_with_fallback() {
            let provider = MockAIProvider::new().with_error(MockError::Unavailable {
                message: "no API key configured".into(),
            });
            let session = feedback_session();

            let outcome = requester(&provider).request_evaluation(&session).await.unwrap();

            assert!(outcome.is_fallback());
            let session = session.lock().await;
            assert!(!session.evaluation().is_pending());
            assert_eq!(
                session.ai_evaluation(),
                Some(
                    "The evaluation could not be generated right now. \
                     Your reflection has been saved and you can still download it."
                )
            );
            match session.evaluation() {
                EvaluationState::Fallback { cause, .. } => {
                    assert!(cause.contains("no API key configured"))
                }
                other => panic!("unexpected state: {:?}", other),
            }
        }

        #[tokio::test]
        async fn blank_reply_resolves_with_fallback() {
            let provider = MockAIProvider::new().with_response("  \n ");
            let session = feedback_session();

            let outcome = requester(&provider).request_evaluation(&session).await.unwrap();
            assert!(outcome.is_fallback());
        }

        #[tokio::test]
        async fn requires_submitted_reflection() {
            let provider = MockAIProvider::new();
            let session = share(chatting_session());

            let err = requester(&provider).request_evaluation(&session).await.unwrap_err();

            assert_eq!(
                err,
                RequestEvaluationError::Session(SessionError::wrong_phase(
                    ActivityPhase::Feedback,
                    ActivityPhase::Chatting
                ))
            );
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test]
        async fn second_request_after_completion_is_rejected() {
            let provider = MockAIProvider::new().with_response("Done.");
            let session = feedback_session();
            let requester = requester(&provider);

            requester.request_evaluation(&session).await.unwrap();
            let err = requester.request_evaluation(&session).await.unwrap_err();

            assert_eq!(err, RequestEvaluationError::AlreadyEvaluated);
            assert_eq!(provider.call_count(), 1);
        }
    }

    mod concurrency {
        use super::*;

        #[tokio::test]
        async fn second_request_while_pending_is_rejected() {
            let gate = Arc::new(Notify::new());
            let provider = MockAIProvider::new()
                .with_response("Good engagement.")
                .with_gate(gate.clone());
            let session = feedback_session();
            let requester = requester(&provider);

            let first = tokio::spawn({
                let requester = requester.clone();
                let session = session.clone();
                async move { requester.request_evaluation(&session).await }
            });
            wait_for_call(&provider).await;

            let err = requester.request_evaluation(&session).await.unwrap_err();
            assert_eq!(err, RequestEvaluationError::AlreadyPending);

            gate.notify_one();
            assert!(first.await.unwrap().is_ok());
            assert_eq!(provider.call_count(), 1);
        }

        #[tokio::test]
        async fn result_after_reset_is_discarded() {
            let gate = Arc::new(Notify::new());
            let provider = MockAIProvider::new()
                .with_response("Stale feedback.")
                .with_gate(gate.clone());
            let session = feedback_session();

            let pending = tokio::spawn({
                let requester = requester(&provider);
                let session = session.clone();
                async move { requester.request_evaluation(&session).await }
            });
            wait_for_call(&provider).await;
            session.lock().await.reset();
            gate.notify_one();

            assert_eq!(
                pending.await.unwrap().unwrap_err(),
                RequestEvaluationError::Superseded
            );
            let session = session.lock().await;
            assert_eq!(session.phase(), ActivityPhase::Chatting);
            assert_eq!(session.evaluation(), &EvaluationState::NotRequested);
        }
    }

    mod cancellation {
        use super::*;

        #[tokio::test]
        async fn dropped_request_leaves_session_retryable() {
            let gate = Arc::new(Notify::new());
            let provider = MockAIProvider::new()
                .with_response("Never delivered.")
                .with_response("Second try.")
                .with_gate(gate.clone());
            let session = feedback_session();
            let requester = requester(&provider);

            let pending = tokio::spawn({
                let requester = requester.clone();
                let session = session.clone();
                async move { requester.request_evaluation(&session).await }
            });
            wait_for_call(&provider).await;
            assert!(session.lock().await.evaluation().is_pending());

            pending.abort();
            assert!(pending.await.unwrap_err().is_cancelled());
            assert_eq!(
                session.lock().await.evaluation(),
                &EvaluationState::NotRequested
            );

            gate.notify_one();
            let outcome = requester.request_evaluation(&session).await.unwrap();
            assert_eq!(outcome.text(), "Second try.");
        }
    }

    mod streaming {
        use super::*;

        async fn drain(mut rx: mpsc::Receiver<EvaluationEvent>) -> Vec<EvaluationEvent> {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        }

        #[tokio::test]
        async fn forwards_partials_then_complete() {
            let provider = MockAIProvider::new().with_response("Good engagement overall.");
            let session = feedback_session();
            let (tx, rx) = mpsc::channel(64);

            let outcome = requester(&provider)
                .request_evaluation_streaming(&session, tx)
                .await
                .unwrap();
            let events = drain(rx).await;

            assert_eq!(
                events.first(),
                Some(&EvaluationEvent::Partial {
                    text: "Good ".to_string()
                })
            );
            assert_eq!(
                events.last(),
                Some(&EvaluationEvent::Complete {
                    text: "Good engagement overall.".to_string()
                })
            );
            assert_eq!(outcome.text(), "Good engagement overall.");
            assert_eq!(
                session.lock().await.ai_evaluation(),
                Some("Good engagement overall.")
            );
        }

        #[tokio::test]
        async fn mid_stream_failure_ends_with_fallback() {
            let provider = MockAIProvider::new().with_stream_failure(
                "Half an",
                MockError::Network {
                    message: "reset by peer".into(),
                },
            );
            let session = feedback_session();
            let (tx, rx) = mpsc::channel(64);

            let outcome = requester(&provider)
                .request_evaluation_streaming(&session, tx)
                .await
                .unwrap();
            let events = drain(rx).await;

            assert!(outcome.is_fallback());
            assert!(events.contains(&EvaluationEvent::Partial {
                text: "Half an".to_string()
            }));
            assert!(matches!(
                events.last(),
                Some(EvaluationEvent::Failed { cause, .. }) if cause.contains("reset by peer")
            ));
            assert!(session.lock().await.evaluation().is_resolved());
        }

        #[tokio::test]
        async fn small_channel_drained_afterwards_still_gets_final_event() {
            let reply = "one two three four five six seven eight nine ten";
            let provider = MockAIProvider::new().with_response(reply);
            let session = feedback_session();
            let (tx, rx) = mpsc::channel(2);

            let outcome = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                requester(&provider).request_evaluation_streaming(&session, tx),
            )
            .await
            .expect("streaming evaluation blocked on a full channel")
            .unwrap();
            let events = drain(rx).await;

            assert_eq!(outcome.text(), reply);
            assert!(events.len() <= 2);
            assert_eq!(
                events.last(),
                Some(&EvaluationEvent::Complete {
                    text: reply.to_string()
                })
            );
            assert!(session.lock().await.evaluation().is_resolved());
        }

        #[tokio::test]
        async fn closed_receiver_does_not_stop_evaluation() {
            let provider = MockAIProvider::new().with_response("Still stored.");
            let session = feedback_session();
            let (tx, rx) = mpsc::channel(1);
            drop(rx);

            let outcome = requester(&provider)
                .request_evaluation_streaming(&session, tx)
                .await
                .unwrap();

            assert_eq!(outcome.text(), "Still stored.");
        }
    }
}
