//! Error types for critiquer
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::FailureKind;

/// All error types that can occur in critiquer
#[derive(Debug, Error)]
pub enum CritiqueError {
    /// Missing or invalid configuration, raised before any turn executes
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A turn produced no content after exhausting every attempt
    #[error("Iteration {iteration} failed after {attempts} attempts with model {model}: {kind}: {detail}")]
    TurnFailed {
        iteration: u32,
        model: String,
        attempts: u32,
        kind: FailureKind,
        detail: String,
    },

    /// The persisted store exists but cannot be parsed
    #[error("Corrupt store at {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// A turn violates the transcript's role sequence
    #[error("Invalid turn: {0}")]
    InvalidTurn(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// The run was cancelled by its caller
    #[error("Run cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for critiquer operations
pub type Result<T> = std::result::Result<T, CritiqueError>;
