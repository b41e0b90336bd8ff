//! Progress events emitted while a run executes.
//!
//! The library never prints. Callers that want live progress hand the
//! controller an [`EventSender`] and drain the receiving end themselves.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::llm::FailureKind;
use crate::transcript::Turn;

pub type EventSender = mpsc::UnboundedSender<RunEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

/// Create a connected sender/receiver pair
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    /// An iteration is about to call `model`
    IterationStarted { iteration: u32, model: String },

    /// One attempt failed; `retry_in` is `None` after the last attempt
    AttemptFailed {
        model: String,
        attempt: u32,
        max_attempts: u32,
        kind: FailureKind,
        detail: String,
        retry_in: Option<Duration>,
    },

    /// A turn was appended to the transcript
    TurnAppended { iteration: u32, turn: Turn },

    /// A critique iteration produced nothing and was skipped
    IterationSkipped {
        iteration: u32,
        model: String,
        kind: FailureKind,
        detail: String,
    },

    /// A snapshot was written; `records` is the store size afterwards
    RecordPersisted { iteration: u32, records: usize },

    /// A snapshot could not be written; the run carries on
    PersistFailed { iteration: u32, error: String },
}

/// Send without caring whether anyone is listening
pub(crate) fn emit(events: Option<&EventSender>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
