//! Markdown transcript exporter.
//!
//! Renders a finished (or finishing) session into the downloadable
//! markdown document:
//!
//! ```text
//! # Reflection Activity: Mystery Character
//!
//! ## Character: Galileo Galilei
//!
//! ## Conversation
//!
//! **Student:** Are you an astronomer?
//!
//! ## Student Reflection
//!
//! ## AI Evaluation            (only once evaluated)
//!
//! ---
//! Generated by AI-Debate.Tech - 2024-05-01
//! ```

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::conversation::{Message, Role};
use crate::domain::session::ReflectionSession;
use crate::ports::{ExportError, ExportedDocument, Locale, Localizer, TranscriptExporter};

/// Footer brand when none is configured.
pub const DEFAULT_BRAND: &str = "AI-Debate.Tech";

/// Markdown implementation of [`TranscriptExporter`].
#[derive(Clone)]
pub struct MarkdownTranscriptExporter {
    localizer: Arc<dyn Localizer>,
    locale: Locale,
    brand: String,
}

impl MarkdownTranscriptExporter {
    pub fn new(localizer: Arc<dyn Localizer>, locale: Locale) -> Self {
        Self {
            localizer,
            locale,
            brand: DEFAULT_BRAND.to_string(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.localizer.translate(self.locale, key, params)
    }

    fn speaker(&self, message: &Message) -> String {
        match (message.role(), message.character_name()) {
            (Role::User, _) => self.t("labels.student", &[]),
            (Role::System, _) => self.t("labels.system", &[]),
            (_, Some(name)) => name.to_string(),
            (_, None) => self.t("labels.ai", &[]),
        }
    }

    fn render(&self, session: &ReflectionSession, reflection: &str, date: &str) -> String {
        let activity = self.t(&session.activity_type().title_key(), &[]);
        let mut md = format!(
            "# {}\n\n",
            self.t("export.title", &[("activity", activity.as_str())])
        );

        if let Some(name) = session.character_display_name() {
            md.push_str(&format!("## {}\n\n", self.t("export.character", &[("name", name.as_str())])));
        }
        if let Some(topic) = session.topic() {
            md.push_str(&format!("## {}\n\n", self.t("export.topic", &[("topic", topic)])));
        }

        md.push_str(&format!("## {}\n\n", self.t("export.conversation", &[])));
        for message in session.messages() {
            md.push_str(&format!("**{}:** {}\n\n", self.speaker(message), message.content()));
        }

        md.push_str(&format!(
            "## {}\n\n{}\n\n",
            self.t("export.reflection", &[]),
            reflection
        ));

        if let Some(evaluation) = session.ai_evaluation() {
            md.push_str(&format!(
                "## {}\n\n{}\n\n",
                self.t("export.evaluation", &[]),
                evaluation
            ));
        }

        md.push_str(&format!(
            "---\n{}\n",
            self.t("export.footer", &[("brand", self.brand.as_str()), ("date", date)])
        ));
        md
    }
}

impl TranscriptExporter for MarkdownTranscriptExporter {
    fn export(
        &self,
        session: &ReflectionSession,
        generated_on: NaiveDate,
    ) -> Result<ExportedDocument, ExportError> {
        let reflection = session
            .user_reflection()
            .ok_or(ExportError::ReflectionMissing)?;

        let date = generated_on.format("%Y-%m-%d").to_string();
        let markdown = self.render(session, reflection, &date);
        let base = format!("{}-{}", session.activity_type().slug(), date);

        tracing::debug!(
            session_id = %session.id(),
            bytes = markdown.len(),
            "Rendered transcript export"
        );

        Ok(ExportedDocument::from_markdown(markdown, &base))
    }
}
