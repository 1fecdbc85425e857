//! Prompt construction.
//!
//! Every instruction and payload sent to the AI boundary is assembled here
//! from localized templates. Nothing in the handlers carries prompt text.

use std::sync::Arc;

use crate::domain::activity::{ActivityType, Persona};
use crate::domain::conversation::{Message, Role};
use crate::domain::session::EvaluationReport;
use crate::ports::{Locale, Localizer};

/// Builds localized prompts for chat turns, dialogue turns and evaluation.
#[derive(Clone)]
pub struct PromptBuilder {
    localizer: Arc<dyn Localizer>,
    locale: Locale,
}

impl PromptBuilder {
    pub fn new(localizer: Arc<dyn Localizer>, locale: Locale) -> Self {
        Self { localizer, locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Translates `key` in this builder's locale.
    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.localizer.translate(self.locale, key, params)
    }

    pub fn activity_title(&self, activity: ActivityType) -> String {
        self.t(&activity.title_key(), &[])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat turns
    // ─────────────────────────────────────────────────────────────────────────

    /// System instruction for a single character answering the student.
    ///
    /// Convince-me games with a topic get the persuasion instruction.
    pub fn character_instruction(
        &self,
        activity: ActivityType,
        persona: &Persona,
        topic: Option<&str>,
    ) -> String {
        match (activity, topic) {
            (ActivityType::ConvinceMe, Some(topic)) => self.t(
                "ai.systemInstructions.convinceMe",
                &[("name", persona.name()), ("topic", topic)],
            ),
            _ => self.t(
                "ai.systemInstructions.character",
                &[("name", persona.name()), ("bio", persona.bio().unwrap_or_default())],
            ),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dialogue turns
    // ─────────────────────────────────────────────────────────────────────────

    pub fn dialogue_instruction(&self, persona: &Persona) -> String {
        self.t(
            "ai.systemInstructions.dialogue",
            &[
                ("name", persona.name()),
                ("bio", persona.bio().unwrap_or_default()),
                ("style", persona.style().unwrap_or_default()),
            ],
        )
    }

    /// Turn prompt for `speaker` addressing `target`.
    ///
    /// Lists `recent` as "Name: content" lines (system messages as notices),
    /// then either relays the moderator's message or asks to continue.
    pub fn dialogue_prompt(
        &self,
        speaker: &Persona,
        target: &Persona,
        theme: &str,
        recent: &[Message],
        moderator_message: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "{}\n\n{}\n",
            self.t(
                "ai.prompts.dialogueContext",
                &[("character", target.name()), ("theme", theme)]
            ),
            self.t("ai.prompts.recentMessages", &[])
        );

        for message in recent {
            let line = match message.role() {
                Role::System => self.t(
                    "ai.prompts.systemNotice",
                    &[("content", message.content())],
                ),
                _ => format!("{}: {}", self.dialogue_speaker(message), message.content()),
            };
            prompt.push_str(&line);
            prompt.push('\n');
        }

        match moderator_message {
            Some(text) => {
                prompt.push_str(&self.t("ai.prompts.moderatorResponse", &[("message", text)]));
                prompt.push_str("\n\n");
                prompt.push_str(&self.t(
                    "ai.prompts.respondToModerator",
                    &[("character", target.name()), ("name", speaker.name())],
                ));
            }
            None => {
                prompt.push('\n');
                prompt.push_str(&self.t(
                    "ai.prompts.continueDiscussion",
                    &[
                        ("character", target.name()),
                        ("theme", theme),
                        ("name", speaker.name()),
                    ],
                ));
            }
        }
        prompt
    }

    fn dialogue_speaker(&self, message: &Message) -> String {
        match (message.role(), message.character_name()) {
            (Role::User, _) => self.t("labels.moderator", &[]),
            (_, Some(name)) => name.to_string(),
            (_, None) => self.t("labels.ai", &[]),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluation_instruction(
        &self,
        character: &str,
        topic: &str,
        snippet: Option<&str>,
    ) -> String {
        let not_available = self.t("ai.prompts.notAvailable", &[]);
        self.t(
            "ai.systemInstructions.evaluation",
            &[
                ("character", character),
                ("topic", topic),
                ("snippet", snippet.unwrap_or(not_available.as_str())),
            ],
        )
    }

    /// Transcript as "speaker: content" paragraphs.
    ///
    /// The student is labelled as such; every other message is attributed
    /// to `character`.
    pub fn conversation_text(&self, messages: &[Message], character: &str) -> String {
        let student = self.t("labels.student", &[]);
        messages
            .iter()
            .map(|m| {
                let speaker = if m.is_user() { student.as_str() } else { character };
                format!("{}: {}", speaker, m.content())
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn evaluation_prompt(&self, conversation_text: &str, reflection: &str) -> String {
        self.t(
            "ai.prompts.evaluation",
            &[
                ("conversationText", conversation_text),
                ("userReflection", reflection),
            ],
        )
    }

    /// Text to show for a parsed evaluation.
    ///
    /// Free-text feedback is used as is. Without it, a summary of scores and
    /// rationales followed by the default overall feedback is composed.
    pub fn feedback_text(&self, report: &EvaluationReport) -> String {
        if report.has_feedback() {
            return report.text.clone();
        }

        let not_available = self.t("ai.prompts.notAvailable", &[]);
        let no_rationale = self.t("ai.prompts.noRationale", &[]);
        let score = |s: Option<u32>| s.map(|v| v.to_string()).unwrap_or_else(|| not_available.clone());
        let conversation_score = score(report.conversation_score);
        let reflection_score = score(report.reflection_score);

        let summary = self.t(
            "ai.prompts.evaluationFallback",
            &[
                ("conversationScore", conversation_score.as_str()),
                ("reflectionScore", reflection_score.as_str()),
                (
                    "conversationRationale",
                    report.conversation_rationale.as_deref().unwrap_or(no_rationale.as_str()),
                ),
                (
                    "reflectionRationale",
                    report.reflection_rationale.as_deref().unwrap_or(no_rationale.as_str()),
                ),
            ],
        );

        format!(
            "{}\n{}\n\n{}",
            summary,
            self.t("ai.prompts.overallFeedback", &[]),
            self.t("ai.prompts.defaultFeedback", &[])
        )
    }

    /// Text substituted when the evaluation cannot be produced.
    pub fn evaluation_unavailable(&self) -> String {
        self.t("ai.prompts.evaluationUnavailable", &[])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notices
    // ─────────────────────────────────────────────────────────────────────────

    /// Shown when a character produced no reply.
    pub fn no_response_notice(&self) -> String {
        self.t("ai.prompts.noResponseMoment", &[])
    }

    /// Shown when a character reply failed.
    pub fn apologetic_notice(&self, details: Option<&str>) -> String {
        let base = self.t("ai.prompts.apologeticError", &[]);
        match details {
            Some(error) => format!("{}{}", base, self.t("ai.prompts.errorDetails", &[("error", error)])),
            None => base,
        }
    }
}
