//! A single role-tagged utterance in a transcript.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    Critic,
}

impl TurnRole {
    /// Capitalized label used when rendering history
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::Critic => "Critic",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Critic => write!(f, "critic"),
        }
    }
}

/// A turn as stored in a transcript. Only [`super::Transcript`] creates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based position in the transcript; 0 until numbered when absent on disk
    #[serde(default)]
    pub index: u32,
    pub role: TurnRole,
    pub content: String,
    pub reasoning: Option<String>,
    /// Producing model; `None` for the user turn
    pub model: Option<String>,
    /// Controller iteration that produced a critic turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique_iteration: Option<u32>,
}

impl Turn {
    /// Reasoning text, if present and non-empty
    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref().filter(|r| !r.is_empty())
    }
}

/// A turn waiting to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: TurnRole,
    pub content: String,
    pub reasoning: Option<String>,
    pub model: Option<String>,
    pub critique_iteration: Option<u32>,
}

impl NewTurn {
    pub fn assistant(content: impl Into<String>, reasoning: Option<String>, model: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            reasoning: reasoning.filter(|r| !r.is_empty()),
            model: Some(model.into()),
            critique_iteration: None,
        }
    }

    pub fn critic(
        iteration: u32,
        content: impl Into<String>,
        reasoning: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            role: TurnRole::Critic,
            content: content.into(),
            reasoning: reasoning.filter(|r| !r.is_empty()),
            model: Some(model.into()),
            critique_iteration: Some(iteration),
        }
    }
}
