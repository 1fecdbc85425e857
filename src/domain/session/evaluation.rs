//! AI evaluation state and the parser for scored evaluation replies.
//!
//! The evaluation prompt asks the model to emit four marker lines next to
//! its free-text feedback:
//!
//! ```text
//! CONVERSATION_SCORE: 8
//! CONVERSATION_RATIONALE: Asked focused questions.
//! REFLECTION_SCORE: 7
//! REFLECTION_RATIONALE: Honest but brief.
//! ```
//!
//! Markers are optional; whatever is not a marker section is feedback.

use serde::{Deserialize, Serialize};

pub const CONVERSATION_SCORE: &str = "CONVERSATION_SCORE:";
pub const CONVERSATION_RATIONALE: &str = "CONVERSATION_RATIONALE:";
pub const REFLECTION_SCORE: &str = "REFLECTION_SCORE:";
pub const REFLECTION_RATIONALE: &str = "REFLECTION_RATIONALE:";

const MARKERS: [&str; 4] = [
    CONVERSATION_SCORE,
    CONVERSATION_RATIONALE,
    REFLECTION_SCORE,
    REFLECTION_RATIONALE,
];

/// Structured result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Text shown to the student and written to the export.
    pub text: String,
    pub conversation_score: Option<u32>,
    pub conversation_rationale: Option<String>,
    pub reflection_score: Option<u32>,
    pub reflection_rationale: Option<String>,
}

impl EvaluationReport {
    /// Splits a raw model reply into scores, rationales and feedback text.
    ///
    /// `text` is empty when the reply held nothing but markers; callers
    /// then compose a summary from the scores.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_ascii_uppercase();
        let mut found: Vec<(usize, &'static str)> = Vec::new();
        for marker in MARKERS {
            let mut from = 0;
            while let Some(pos) = upper[from..].find(marker) {
                found.push((from + pos, marker));
                from += pos + marker.len();
            }
        }
        found.sort_by_key(|(pos, _)| *pos);

        let mut report = EvaluationReport::default();
        let mut feedback = String::new();
        let first = found.first().map(|(pos, _)| *pos).unwrap_or(raw.len());
        feedback.push_str(&raw[..first]);

        for (i, (pos, marker)) in found.iter().enumerate() {
            let start = pos + marker.len();
            let end = found.get(i + 1).map(|(p, _)| *p).unwrap_or(raw.len());
            let section = &raw[start..end];

            match *marker {
                CONVERSATION_SCORE | REFLECTION_SCORE => {
                    let (score, rest) = split_score(section);
                    let slot = if *marker == CONVERSATION_SCORE {
                        &mut report.conversation_score
                    } else {
                        &mut report.reflection_score
                    };
                    if slot.is_none() {
                        *slot = score;
                    }
                    feedback.push('\n');
                    feedback.push_str(rest);
                }
                _ => {
                    let slot = if *marker == CONVERSATION_RATIONALE {
                        &mut report.conversation_rationale
                    } else {
                        &mut report.reflection_rationale
                    };
                    // A rationale runs to the end of its line.
                    let section = section.trim_start_matches(|c: char| c == ' ' || c == '\t');
                    let (line, rest) = section.split_once('\n').unwrap_or((section, ""));
                    let text = line.trim();
                    if slot.is_none() && !text.is_empty() {
                        *slot = Some(text.to_string());
                    }
                    feedback.push('\n');
                    feedback.push_str(rest);
                }
            }
        }

        let cleaned = collapse_newlines(feedback.trim());
        report.text = if cleaned.chars().all(|c| c.is_ascii_digit()) {
            String::new()
        } else {
            cleaned
        };
        report
    }

    pub fn has_feedback(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Where the evaluation of a session stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EvaluationState {
    #[default]
    NotRequested,
    Pending,
    Ready(EvaluationReport),
    /// The service failed; `text` is the deterministic substitute.
    Fallback { text: String, cause: String },
}

impl EvaluationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Fallback { .. })
    }

    /// The text to display, once resolved.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Ready(report) => Some(&report.text),
            Self::Fallback { text, .. } => Some(text),
            Self::NotRequested | Self::Pending => None,
        }
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        match self {
            Self::Ready(report) => Some(report),
            _ => None,
        }
    }
}

/// Leading integer of a score section and the text that follows it.
fn split_score(section: &str) -> (Option<u32>, &str) {
    let trimmed = section.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let score = trimmed[..digits].parse().ok();
    (score, &trimmed[digits..])
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_newline = false;
    for c in text.chars() {
        if c == '\n' {
            if !previous_newline {
                out.push(c);
            }
            previous_newline = true;
        } else {
            previous_newline = false;
            out.push(c);
        }
    }
    out
}
