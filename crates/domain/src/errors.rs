//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Hourmark
///
/// Maps one-to-one onto the core error taxonomy; the hosting layer is
/// responsible for translating these into transport status codes.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum HourmarkError {
    /// Invalid rule query; surfaced to the user with the offending position.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Entity does not exist or is not accessible by this user.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent modification, duplicate short code, or similar collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal invariant broken; aborts the operation, never the process.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Calendar provider failure. Transient errors trigger backoff;
    /// permanent ones suspend the calendar.
    #[error("provider error: {message}")]
    Provider { transient: bool, message: String },

    /// Attempt to modify an invoiced time entry.
    #[error("time entry is locked by invoice: {0}")]
    Locked(String),

    /// Caller requested cancellation of a long-running operation.
    #[error("operation cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HourmarkError {
    /// Whether a retry with backoff is appropriate for this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { transient: true, .. })
    }

    /// Convenience constructor for transient provider failures.
    pub fn provider_transient(message: impl Into<String>) -> Self {
        Self::Provider { transient: true, message: message.into() }
    }

    /// Convenience constructor for permanent provider failures.
    pub fn provider_permanent(message: impl Into<String>) -> Self {
        Self::Provider { transient: false, message: message.into() }
    }
}

/// Result type alias for Hourmark operations
pub type Result<T> = std::result::Result<T, HourmarkError>;
