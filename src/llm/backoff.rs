//! Bounded retry with a fixed, attempt-indexed delay schedule.
//!
//! One call to [`BackoffClient::complete`] is one logical request: it keeps
//! calling the transport until a well-formed completion comes back or the
//! policy's attempts run out. Rate limits, other API errors, malformed bodies
//! and transport failures are all retried the same way; they differ only in
//! how they are logged and reported.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use super::client::{ChatTransport, FailureKind, RequestOutcome, classify_reply};
use super::types::{ChatRequest, Completion};
use crate::error::{CritiqueError, Result};
use crate::events::{EventSender, RunEvent, emit};

/// Default number of attempts per logical request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay schedule in seconds, indexed by attempt
pub const DEFAULT_DELAYS_SECS: [u64; 5] = [1, 3, 5, 7, 10];

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after attempt `n` is `delays[n - 1]`; the last entry is reused
    /// when the schedule is shorter than the attempt count.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_MAX_ATTEMPTS, &DEFAULT_DELAYS_SECS)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self { max_attempts, delays }
    }

    pub fn from_secs(max_attempts: u32, delays_secs: &[u64]) -> Self {
        Self::new(max_attempts, delays_secs.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    /// Delay to sleep after a failed `attempt` (1-based), or `None` after the last one
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let index = (attempt - 1) as usize;
        Some(
            self.delays
                .get(index)
                .or_else(|| self.delays.last())
                .copied()
                .unwrap_or_default(),
        )
    }

    /// Sum of every delay a fully exhausted request sleeps through
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).filter_map(|a| self.delay_after(a)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CritiqueError::Configuration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > 1 && self.delays.is_empty() {
            return Err(CritiqueError::Configuration(
                "retry delays must not be empty when retries are enabled".to_string(),
            ));
        }
        if self.delays.windows(2).any(|w| w[0] > w[1]) {
            return Err(CritiqueError::Configuration(format!(
                "retry delays must be ascending, got {:?}",
                self.delays
            )));
        }
        Ok(())
    }
}

/// Why a logical request produced no completion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestFailure {
    #[error("gave up after {attempts} attempts: {kind}: {detail}")]
    Exhausted {
        attempts: u32,
        kind: FailureKind,
        detail: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cancelled")]
    Cancelled,
}

/// Wraps a [`ChatTransport`] with the retry policy
pub struct BackoffClient<T: ChatTransport> {
    transport: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
    events: Option<EventSender>,
}

impl<T: ChatTransport> BackoffClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Honor `cancel` before each attempt and during each backoff sleep
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Obtain one completion for `request`, retrying per the policy
    pub async fn complete(&self, request: &ChatRequest) -> std::result::Result<Completion, RequestFailure> {
        if request.messages.is_empty() {
            return Err(RequestFailure::InvalidRequest("message list is empty".to_string()));
        }
        if request.model.trim().is_empty() {
            return Err(RequestFailure::InvalidRequest("model identifier is empty".to_string()));
        }

        let max_attempts = self.policy.max_attempts;
        let model = request.model.as_str();
        let mut last_failure: Option<(FailureKind, String)> = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(RequestFailure::Cancelled);
            }

            debug!("Requesting completion from {} (attempt {}/{})", model, attempt, max_attempts);

            let outcome = match self.transport.send(request).await {
                Ok(reply) => classify_reply(&reply),
                Err(err) => RequestOutcome::from(err),
            };

            let (kind, detail) = match outcome {
                RequestOutcome::Success(completion) => {
                    info!("Completion received from {} on attempt {}", model, attempt);
                    return Ok(completion);
                }
                RequestOutcome::RateLimited { message } => (FailureKind::RateLimited, message),
                RequestOutcome::ApiError { message } => (FailureKind::ApiError, message),
                RequestOutcome::MalformedResponse { raw } => (FailureKind::MalformedResponse, raw),
                RequestOutcome::TransportFailure { error } => (FailureKind::TransportFailure, error),
            };

            match kind {
                FailureKind::RateLimited => warn!(
                    "Rate limited by {} (attempt {}/{}): {}",
                    model, attempt, max_attempts, detail
                ),
                FailureKind::ApiError => error!(
                    "API error from {} (attempt {}/{}): {}",
                    model, attempt, max_attempts, detail
                ),
                FailureKind::MalformedResponse => warn!(
                    "Unexpected response format from {} (attempt {}/{}): {}",
                    model, attempt, max_attempts, detail
                ),
                FailureKind::TransportFailure => warn!(
                    "Request to {} failed (attempt {}/{}): {}",
                    model, attempt, max_attempts, detail
                ),
            }

            let retry_in = self.policy.delay_after(attempt);
            emit(
                self.events.as_ref(),
                RunEvent::AttemptFailed {
                    model: model.to_string(),
                    attempt,
                    max_attempts,
                    kind,
                    detail: detail.clone(),
                    retry_in,
                },
            );
            last_failure = Some((kind, detail));

            if let Some(delay) = retry_in {
                info!("Retrying {} in {:?}", model, delay);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(RequestFailure::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        error!("Max attempts reached for {}; request failed", model);
        match last_failure {
            Some((kind, detail)) => Err(RequestFailure::Exhausted {
                attempts: max_attempts,
                kind,
                detail,
            }),
            None => Err(RequestFailure::InvalidRequest(
                "retry policy allows no attempts".to_string(),
            )),
        }
    }
}
