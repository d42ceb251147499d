//! Engine error types

use thiserror::Error;

/// Engine error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    #[must_use]
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Network, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unsupported, message)
    }

    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::ServerError, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Cancelled, message)
    }

    #[must_use]
    pub fn unloaded(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unloaded, message)
    }

    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Connection failures while fetching weights or talking to the runtime
    Network,
    /// Model id unknown to the runtime
    NotFound,
    /// Hardware, memory or credentials prevent running the model
    Unsupported,
    /// Runtime-side fault (5xx)
    ServerError,
    /// Request rejected as malformed (400)
    InvalidRequest,
    /// Deadline elapsed
    Timeout,
    /// Caller cancelled the operation
    Cancelled,
    /// Handle was already released
    Unloaded,
    /// Unknown error
    Unknown,
}

impl EngineErrorKind {
    /// Whether the user retrying the same operation might succeed.
    /// Nothing in this crate retries automatically.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::ServerError | Self::Timeout)
    }
}
