//! Wire types for chat-completion requests and responses
//!
//! Outbound requests are plain serializable structs. Inbound bodies are only
//! decoded into [`ChatCompletion`] after the client has ruled out embedded
//! errors, so nothing past the client boundary sees raw JSON.

use serde::{Deserialize, Serialize};

/// Role of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A single role/content pair sent to the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for the chat-completion endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub include_reasoning: bool,
}

impl ChatRequest {
    /// Create a request for `model`, asking for reasoning by default
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            include_reasoning: true,
        }
    }

    /// Toggle whether the provider should return reasoning text
    pub fn with_reasoning(mut self, include_reasoning: bool) -> Self {
        self.include_reasoning = include_reasoning;
        self
    }
}

/// Raw HTTP reply handed back by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 OK with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Content produced by one successful completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub reasoning: Option<String>,
}

/// Successful completion body: `choices[0].message.{content, reasoning}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChoiceMessage {
    pub content: String,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ChatCompletion {
    /// Take the first choice, dropping empty reasoning
    pub fn into_completion(self) -> Option<Completion> {
        let message = self.choices.into_iter().next()?.message;
        Some(Completion {
            content: message.content,
            reasoning: message.reasoning.filter(|r| !r.is_empty()),
        })
    }
}
