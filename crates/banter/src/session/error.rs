//! Session store error types.

use thiserror::Error;

/// Result type for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No session with the given id.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Message index outside the current history.
    #[error("message index {index} out of range (history has {len} messages)")]
    IndexOutOfRange { index: usize, len: usize },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Session document could not be parsed or written.
    #[error("session document error: {0}")]
    Document(#[from] serde_json::Error),
}
