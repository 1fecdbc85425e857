//! Catalogue of the role-play activities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::policy::{ActivityPolicy, EndChatPolicy};
use crate::domain::foundation::ValidationError;

/// One of the guided role-play mini-games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    /// Guess a hidden historical figure by asking questions.
    MysteryCharacter,
    /// Try to change the mind of a character holding a firm position.
    ConvinceMe,
    /// Interview two characters side by side.
    DoubleInterview,
    /// The AI plays the student; the student answers as the character.
    ImpersonateMe,
    /// Interview a character grounded in an encyclopedia article.
    WikiInterview,
    /// Question an article-backed chatbot.
    WikiChatbot,
    /// Moderate a debate between two characters.
    YouModerate,
    /// Socratic inquiry about a topic.
    InquiryDialogue,
    /// Work out whether the other side is a human or an AI.
    AiIdentity,
}

impl ActivityType {
    /// Returns all activities in menu order.
    pub fn all() -> &'static [ActivityType] {
        &[
            ActivityType::MysteryCharacter,
            ActivityType::ConvinceMe,
            ActivityType::DoubleInterview,
            ActivityType::ImpersonateMe,
            ActivityType::WikiInterview,
            ActivityType::WikiChatbot,
            ActivityType::YouModerate,
            ActivityType::InquiryDialogue,
            ActivityType::AiIdentity,
        ]
    }

    /// Lowercase, hyphenated name used in export filenames.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::MysteryCharacter => "mystery-character",
            Self::ConvinceMe => "convince-me",
            Self::DoubleInterview => "double-interview",
            Self::ImpersonateMe => "impersonate-me",
            Self::WikiInterview => "wiki-interview",
            Self::WikiChatbot => "wiki-chatbot",
            Self::YouModerate => "you-moderate",
            Self::InquiryDialogue => "inquiry-dialogue",
            Self::AiIdentity => "ai-identity",
        }
    }

    /// Namespace for this activity's strings in the locale catalogues.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            Self::MysteryCharacter => "mysteryCharacter",
            Self::ConvinceMe => "convinceMe",
            Self::DoubleInterview => "doubleInterview",
            Self::ImpersonateMe => "impersonateMe",
            Self::WikiInterview => "wikiInterview",
            Self::WikiChatbot => "wikiChatbot",
            Self::YouModerate => "youModerate",
            Self::InquiryDialogue => "inquiryDialogue",
            Self::AiIdentity => "aiIdentity",
        }
    }

    /// Localization key of the display title.
    pub fn title_key(&self) -> String {
        format!("activities.{}.title", self.catalog_key())
    }

    /// Number of reflection questions the activity asks.
    pub fn reflection_question_count(&self) -> usize {
        match self {
            Self::ConvinceMe => 5,
            Self::DoubleInterview | Self::YouModerate => 4,
            _ => 3,
        }
    }

    /// Localization keys of the reflection questions, in display order.
    pub fn reflection_question_keys(&self) -> Vec<String> {
        (1..=self.reflection_question_count())
            .map(|i| format!("activities.{}.reflection.questions.{}", self.catalog_key(), i))
            .collect()
    }

    /// Activities where two characters answer each turn.
    pub fn is_dialogue(&self) -> bool {
        matches!(self, Self::DoubleInterview | Self::YouModerate)
    }

    /// Default gating policy for the activity.
    pub fn default_policy(&self) -> ActivityPolicy {
        let end_chat = match self {
            Self::ImpersonateMe | Self::DoubleInterview | Self::AiIdentity => {
                EndChatPolicy::user_messages(2)
            }
            Self::YouModerate => EndChatPolicy::all_messages(3),
            _ => EndChatPolicy::default(),
        };
        ActivityPolicy::new(end_chat)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for ActivityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::all()
            .iter()
            .copied()
            .find(|a| a.slug() == wanted || a.catalog_key().to_lowercase() == wanted)
            .ok_or_else(|| {
                ValidationError::invalid_format("activity", format!("unknown activity '{}'", s))
            })
    }
}
