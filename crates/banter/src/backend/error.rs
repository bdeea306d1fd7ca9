//! Backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors produced by the LLM backend adapters.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend cannot be constructed from the given configuration.
    #[error("backend configuration error: {0}")]
    Config(String),

    /// Network failure or non-success HTTP status from the upstream.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Upstream answered, but the payload was malformed or carried an
    /// explicit error object.
    #[error("upstream protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::config("unsupported backend kind: carrier-pigeon");
        assert_eq!(
            err.to_string(),
            "backend configuration error: unsupported backend kind: carrier-pigeon"
        );
    }
}
