//! Transport trait and per-attempt outcome classification

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use super::types::{ChatCompletion, ChatRequest, Completion, HttpReply};

/// Marker some providers embed in `error.metadata.raw` when quota is exhausted
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Longest raw body kept in a failure detail
const MAX_DETAIL_CHARS: usize = 500;

/// Sends one chat request and returns the raw HTTP reply.
///
/// Implementations do no retrying and no interpretation of the body; a
/// non-2xx status is still `Ok`.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<HttpReply, TransportError>;
}

/// Connection-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Result of a single attempt, decoded at the client boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success(Completion),
    RateLimited { message: String },
    ApiError { message: String },
    MalformedResponse { raw: String },
    TransportFailure { error: String },
}

/// Kind of a failed attempt, for logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimited,
    ApiError,
    MalformedResponse,
    TransportFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::ApiError => write!(f, "api error"),
            Self::MalformedResponse => write!(f, "malformed response"),
            Self::TransportFailure => write!(f, "transport failure"),
        }
    }
}

impl RequestOutcome {
    /// `None` for success
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::RateLimited { .. } => Some(FailureKind::RateLimited),
            Self::ApiError { .. } => Some(FailureKind::ApiError),
            Self::MalformedResponse { .. } => Some(FailureKind::MalformedResponse),
            Self::TransportFailure { .. } => Some(FailureKind::TransportFailure),
        }
    }

    /// Human-readable failure detail; empty for success
    pub fn detail(&self) -> &str {
        match self {
            Self::Success(_) => "",
            Self::RateLimited { message } | Self::ApiError { message } => message,
            Self::MalformedResponse { raw } => raw,
            Self::TransportFailure { error } => error,
        }
    }
}

impl From<TransportError> for RequestOutcome {
    fn from(err: TransportError) -> Self {
        Self::TransportFailure { error: err.to_string() }
    }
}

/// Decode a raw reply into a [`RequestOutcome`].
///
/// Order matters: an embedded `error` object wins over the status code, and
/// a body is only a success if `choices[0].message.content` is a string.
pub fn classify_reply(reply: &HttpReply) -> RequestOutcome {
    let body: Value = match serde_json::from_str(&reply.body) {
        Ok(body) => body,
        Err(_) if reply.status == 429 => {
            return RequestOutcome::RateLimited {
                message: format!("HTTP 429: {}", truncate(&reply.body)),
            };
        }
        Err(_) if !reply.is_success() => {
            return RequestOutcome::ApiError {
                message: format!("HTTP {}: {}", reply.status, truncate(&reply.body)),
            };
        }
        Err(_) => {
            return RequestOutcome::MalformedResponse {
                raw: truncate(&reply.body),
            };
        }
    };

    if let Some(error) = body.get("error") {
        return classify_error(reply.status, error);
    }

    if reply.status == 429 {
        return RequestOutcome::RateLimited {
            message: format!("HTTP 429: {}", truncate(&reply.body)),
        };
    }

    if !reply.is_success() {
        return RequestOutcome::ApiError {
            message: format!("HTTP {}: {}", reply.status, truncate(&reply.body)),
        };
    }

    match serde_json::from_value::<ChatCompletion>(body)
        .ok()
        .and_then(ChatCompletion::into_completion)
    {
        Some(completion) => RequestOutcome::Success(completion),
        None => RequestOutcome::MalformedResponse {
            raw: truncate(&reply.body),
        },
    }
}

fn classify_error(status: u16, error: &Value) -> RequestOutcome {
    let code = error.get("code").and_then(|c| {
        c.as_u64()
            .or_else(|| c.as_str().and_then(|s| s.parse::<u64>().ok()))
    });

    let raw_metadata = match error.get("metadata").and_then(|m| m.get("raw")) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate(&error.to_string()));

    if status == 429 || code == Some(429) || raw_metadata.contains(RESOURCE_EXHAUSTED) {
        RequestOutcome::RateLimited { message }
    } else {
        match code {
            Some(code) => RequestOutcome::ApiError {
                message: format!("{} (code {})", message, code),
            },
            None => RequestOutcome::ApiError { message },
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{}...", head)
    }
}
