//! ReflectionSession aggregate.
//!
//! One activity run: the conversation, the phase it is in, the reflection
//! and the evaluation. Owned by a single activity instance and never
//! persisted except through an export.
//!
//! # Asynchronous results
//!
//! AI calls run outside the aggregate. Callers take a `SessionTicket`
//! before awaiting and hand it back with the result; a ticket issued before
//! a `reset` is stale and its result is discarded.

use crate::domain::activity::{
    cast_display_name, ActivityPhase, ActivityPhaseController, ActivityPolicy, ActivityType,
    GuardFailure, Persona,
};
use crate::domain::conversation::{ConversationStore, Message};
use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::reflection::{ReflectionCollector, ReflectionQuestion};

use super::errors::SessionError;
use super::evaluation::{EvaluationReport, EvaluationState};

/// Everything needed to start (and restart) an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub activity_type: ActivityType,
    pub personas: Vec<Persona>,
    pub topic: Option<String>,
    pub policy: ActivityPolicy,
    pub questions: Vec<ReflectionQuestion>,
}

impl SessionSetup {
    /// Setup with the activity's default policy and no questions.
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            personas: Vec::new(),
            topic: None,
            policy: activity_type.default_policy(),
            questions: Vec::new(),
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

    pub fn with_policy(mut self, policy: ActivityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_questions(mut self, questions: Vec<ReflectionQuestion>) -> Self {
        self.questions = questions;
        self
    }
}

/// Proof that an asynchronous request was started against a given run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub session_id: SessionId,
    pub epoch: u64,
}

/// One run of an activity.
///
/// # Invariants
///
/// - exactly one phase is active
/// - messages can only be appended while chatting
/// - `user_reflection` is set iff the phase is `Feedback`
/// - at most one evaluation is outstanding
/// - `epoch` strictly increases on every reset
#[derive(Debug, Clone)]
pub struct ReflectionSession {
    id: SessionId,
    epoch: u64,
    setup: SessionSetup,
    conversation: ConversationStore,
    controller: ActivityPhaseController,
    collector: ReflectionCollector,
    user_reflection: Option<String>,
    evaluation: EvaluationState,
    created_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl ReflectionSession {
    pub fn new(setup: SessionSetup) -> Self {
        let controller = ActivityPhaseController::new(setup.policy);
        let collector =
            ReflectionCollector::new(setup.questions.clone(), setup.policy.min_reflection_chars);
        Self {
            id: SessionId::new(),
            epoch: 0,
            setup,
            conversation: ConversationStore::new(),
            controller,
            collector,
            user_reflection: None,
            evaluation: EvaluationState::NotRequested,
            created_at: Timestamp::now(),
            completed_at: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn activity_type(&self) -> ActivityType {
        self.setup.activity_type
    }

    pub fn personas(&self) -> &[Persona] {
        &self.setup.personas
    }

    /// Names of the characters in cast order.
    pub fn character_names(&self) -> Vec<&str> {
        self.setup.personas.iter().map(|p| p.name()).collect()
    }

    /// Cast name as shown in headers: "A" or "A & B".
    pub fn character_display_name(&self) -> Option<String> {
        if self.setup.personas.is_empty() {
            None
        } else {
            Some(cast_display_name(&self.setup.personas))
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.setup.topic.as_deref()
    }

    pub fn policy(&self) -> &ActivityPolicy {
        &self.setup.policy
    }

    pub fn phase(&self) -> ActivityPhase {
        self.controller.phase()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.all()
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn reflection_questions(&self) -> &[ReflectionQuestion] {
        self.collector.questions()
    }

    pub fn reflection_draft(&self) -> &str {
        self.collector.answer()
    }

    /// Characters the draft still needs before it can be submitted.
    pub fn reflection_chars_remaining(&self) -> usize {
        self.collector.remaining_chars()
    }

    pub fn user_reflection(&self) -> Option<&str> {
        self.user_reflection.as_deref()
    }

    pub fn evaluation(&self) -> &EvaluationState {
        &self.evaluation
    }

    /// Evaluation text once resolved, whether real or fallback.
    pub fn ai_evaluation(&self) -> Option<&str> {
        self.evaluation.text()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn completed_at(&self) -> Option<&Timestamp> {
        self.completed_at.as_ref()
    }

    /// Ticket binding an asynchronous request to the current run.
    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            session_id: self.id,
            epoch: self.epoch,
        }
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        ticket.session_id == self.id && ticket.epoch == self.epoch
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chatting
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a message to the conversation.
    ///
    /// # Errors
    ///
    /// - `WrongPhase` once the chat has ended
    pub fn append_message(&mut self, message: Message) -> Result<(), SessionError> {
        self.require_phase(ActivityPhase::Chatting)?;
        self.conversation.append(message);
        Ok(())
    }

    /// Appends a reply produced for `ticket`, unless the session moved on.
    ///
    /// # Errors
    ///
    /// - `StaleTicket` if the session was reset since the ticket was taken
    /// - `WrongPhase` if the chat ended while the reply was generated
    pub fn append_reply(
        &mut self,
        ticket: &SessionTicket,
        message: Message,
    ) -> Result<(), SessionError> {
        if !self.is_current(ticket) {
            return Err(SessionError::StaleTicket);
        }
        self.append_message(message)
    }

    pub fn can_end_chat(&self) -> bool {
        self.controller.can_end_chat(&self.conversation)
    }

    /// Counted messages still missing before the chat can end.
    pub fn messages_until_end(&self) -> usize {
        self.setup.policy.end_chat.remaining(&self.conversation)
    }

    /// chatting → reflection.
    pub fn end_chat(&mut self) -> Result<(), GuardFailure> {
        self.controller.end_chat(&self.conversation)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reflection
    // ─────────────────────────────────────────────────────────────────────────

    /// Stores what the student has typed so far.
    ///
    /// # Errors
    ///
    /// - `WrongPhase` outside the reflection phase
    pub fn set_reflection_draft(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require_phase(ActivityPhase::Reflection)?;
        self.collector.set_answer(text);
        Ok(())
    }

    pub fn can_submit_reflection(&self) -> bool {
        self.controller.phase() == ActivityPhase::Reflection && self.collector.can_submit()
    }

    /// reflection → feedback, storing the trimmed reflection.
    pub fn submit_reflection(&mut self) -> Result<(), GuardFailure> {
        if self.controller.phase() != ActivityPhase::Reflection {
            return Err(GuardFailure::WrongPhase {
                current: self.controller.phase(),
            });
        }
        let reflection = self.collector.submit()?;
        self.controller.submit_reflection(&reflection)?;
        self.user_reflection = Some(reflection);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Marks the evaluation in flight and returns the ticket to resolve it.
    ///
    /// # Errors
    ///
    /// - `WrongPhase` before the reflection is submitted
    /// - `EvaluationPending` if a request is already outstanding
    /// - `AlreadyEvaluated` once a result is in
    pub fn begin_evaluation(&mut self) -> Result<SessionTicket, SessionError> {
        self.require_phase(ActivityPhase::Feedback)?;
        if self.user_reflection.is_none() {
            return Err(SessionError::ReflectionMissing);
        }
        match self.evaluation {
            EvaluationState::Pending => return Err(SessionError::EvaluationPending),
            EvaluationState::Ready(_) | EvaluationState::Fallback { .. } => {
                return Err(SessionError::AlreadyEvaluated)
            }
            EvaluationState::NotRequested => {}
        }
        self.evaluation = EvaluationState::Pending;
        Ok(self.ticket())
    }

    /// Stores a successful evaluation.
    pub fn complete_evaluation(
        &mut self,
        ticket: &SessionTicket,
        report: EvaluationReport,
    ) -> Result<(), SessionError> {
        self.resolve(ticket, EvaluationState::Ready(report))
    }

    /// Stores the fallback text after a failed evaluation.
    pub fn fail_evaluation(
        &mut self,
        ticket: &SessionTicket,
        text: impl Into<String>,
        cause: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.resolve(
            ticket,
            EvaluationState::Fallback {
                text: text.into(),
                cause: cause.into(),
            },
        )
    }

    /// Returns a pending evaluation to `NotRequested` when its request was
    /// cancelled before resolving. Does nothing for a stale ticket or a
    /// resolved evaluation.
    pub fn abandon_evaluation(&mut self, ticket: &SessionTicket) -> bool {
        if !self.is_current(ticket) || !self.evaluation.is_pending() {
            return false;
        }
        self.evaluation = EvaluationState::NotRequested;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts over: new id, empty conversation, no reflection or evaluation,
    /// back to chatting. Outstanding tickets become stale.
    pub fn reset(&mut self) {
        self.id = SessionId::new();
        self.epoch += 1;
        self.conversation.reset();
        self.controller.reset();
        self.collector.reset();
        self.user_reflection = None;
        self.evaluation = EvaluationState::NotRequested;
        self.created_at = Timestamp::now();
        self.completed_at = None;
    }

    fn resolve(
        &mut self,
        ticket: &SessionTicket,
        outcome: EvaluationState,
    ) -> Result<(), SessionError> {
        if !self.is_current(ticket) {
            return Err(SessionError::StaleTicket);
        }
        if !self.evaluation.is_pending() {
            return Err(SessionError::AlreadyEvaluated);
        }
        self.evaluation = outcome;
        self.completed_at = Some(Timestamp::now());
        Ok(())
    }

    fn require_phase(&self, expected: ActivityPhase) -> Result<(), SessionError> {
        let actual = self.controller.phase();
        if actual != expected {
            return Err(SessionError::wrong_phase(expected, actual));
        }
        Ok(())
    }
}
