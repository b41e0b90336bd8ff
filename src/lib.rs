//! Critiquer - iterative generate-then-critique orchestration
//!
//! A primary model answers a prompt, then alternating critic models review
//! the growing conversation. Every completed iteration is snapshotted to an
//! append-only JSON store.

pub mod critique;
pub mod error;
pub mod events;
pub mod llm;
pub mod prompt;
pub mod storage;
pub mod transcript;

pub use critique::{CritiqueController, IterationState, RunConfig, RunReport, SkippedIteration, select_critic};
pub use error::{CritiqueError, Result};
pub use events::{EventReceiver, EventSender, RunEvent, event_channel};
