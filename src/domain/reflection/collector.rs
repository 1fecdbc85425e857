//! Captures the student's reflection against a fixed list of prompts.

use serde::{Deserialize, Serialize};

use crate::domain::activity::{check_reflection_text, GuardFailure};

/// A prompt shown above the reflection box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionQuestion {
    /// Catalogue key the text was resolved from.
    pub key: String,
    /// Localized text shown to the student.
    pub text: String,
}

impl ReflectionQuestion {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// Holds the prompts and a single free-text answer buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionCollector {
    questions: Vec<ReflectionQuestion>,
    answer: String,
    min_chars: usize,
}

impl ReflectionCollector {
    pub fn new(questions: Vec<ReflectionQuestion>, min_chars: usize) -> Self {
        Self {
            questions,
            answer: String::new(),
            min_chars: min_chars.max(1),
        }
    }

    pub fn questions(&self) -> &[ReflectionQuestion] {
        &self.questions
    }

    /// Replaces the answer buffer with what the student has typed so far.
    pub fn set_answer(&mut self, text: impl Into<String>) {
        self.answer = text.into();
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Characters still needed before submission is allowed.
    pub fn remaining_chars(&self) -> usize {
        self.min_chars
            .saturating_sub(self.answer.trim().chars().count())
    }

    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    /// Returns the trimmed reflection if it passes validation.
    pub fn submit(&self) -> Result<String, GuardFailure> {
        self.validate()?;
        Ok(self.answer.trim().to_string())
    }

    /// Empties the answer buffer; the questions stay.
    pub fn reset(&mut self) {
        self.answer.clear();
    }

    fn validate(&self) -> Result<(), GuardFailure> {
        check_reflection_text(&self.answer, self.min_chars)
    }
}
