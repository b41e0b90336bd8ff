//! LLM Client Layer - chat-completion requests with bounded retry
//!
//! This module provides:
//! - Wire types for chat-completion requests and responses
//! - ChatTransport trait for API abstraction
//! - OpenRouterClient implementation
//! - Outcome classification and the retrying BackoffClient

pub mod backoff;
pub mod client;
pub mod mock;
pub mod openrouter;
pub mod types;

pub use backoff::{BackoffClient, DEFAULT_DELAYS_SECS, DEFAULT_MAX_ATTEMPTS, RequestFailure, RetryPolicy};
pub use client::{ChatTransport, FailureKind, RequestOutcome, TransportError, classify_reply};
pub use mock::MockTransport;
pub use openrouter::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_REFERER, OpenRouterClient, OpenRouterConfig};
pub use types::{ChatRequest, Completion, HttpReply, Message, Role};
