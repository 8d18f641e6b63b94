//! Error types for tutor-core.

use thiserror::Error;

/// Result type alias using tutor-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching a tutoring request.
///
/// Classification, thinking gating, model selection and prompt assembly are
/// total functions and never produce an error; everything here originates in
/// I/O, caller input or configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Network, HTTP or provider-side failure
    #[error("Transport error in {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Invalid caller input, raised before any network call
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Every attempt of a retried operation failed
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// A retry loop was aborted through its cancellation token
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    /// Request deadline elapsed
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a transport error.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Whether this error was caused by invalid caller input.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// The final underlying error of an exhausted retry loop, or `self`.
    pub fn root(&self) -> &Error {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}
