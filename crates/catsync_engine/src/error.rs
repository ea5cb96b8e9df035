//! Error types for catalog reconciliation.

use std::fmt;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// A mutation issued by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Delete a remote entry.
    Delete,
    /// Create a remote entry.
    Create,
    /// Update a remote entry.
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Delete => "delete",
            Operation::Create => "create",
            Operation::Update => "update",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while reconciling a catalog type.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The catalog service answered with a non-2xx status.
    #[error("remote error: status {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// A request or response could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A mutation phase stopped at its first failure.
    #[error("reconciliation aborted: {operation} of entry {entry} failed: {source}")]
    Aborted {
        /// The failing mutation.
        operation: Operation,
        /// External ID, or service ID for unowned entries.
        entry: String,
        /// The underlying failure.
        #[source]
        source: Box<ReconcileError>,
    },

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReconcileError {
    /// Creates a remote error from a status and raw body.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a failure of one executor operation.
    pub fn aborted(operation: Operation, entry: impl Into<String>, source: ReconcileError) -> Self {
        Self::Aborted {
            operation,
            entry: entry.into(),
            source: Box::new(source),
        }
    }

    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReconcileError::Remote { status, .. } => Some(*status),
            ReconcileError::Aborted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true if the service reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if the HTTP layer may retry the request.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Transport { retryable, .. } => *retryable,
            ReconcileError::Remote { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

impl From<catsync_protocol::ProtocolError> for ReconcileError {
    fn from(err: catsync_protocol::ProtocolError) -> Self {
        ReconcileError::Protocol(err.to_string())
    }
}

/// Statuses the HTTP layer retries.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ReconcileError::transport_retryable("connection reset").is_retryable());
        assert!(!ReconcileError::transport_fatal("invalid certificate").is_retryable());
        assert!(ReconcileError::remote(429, "slow down").is_retryable());
        assert!(ReconcileError::remote(503, "").is_retryable());
        assert!(!ReconcileError::remote(422, "bad name").is_retryable());
        assert!(!ReconcileError::Protocol("garbage".into()).is_retryable());
    }

    #[test]
    fn aborted_carries_context() {
        let err = ReconcileError::aborted(
            Operation::Delete,
            "ext-3",
            ReconcileError::remote(404, r#"{"type":"not_found"}"#),
        );
        let msg = err.to_string();
        assert!(msg.contains("delete"));
        assert!(msg.contains("ext-3"));
        assert!(msg.contains("404"));
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn operation_display() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Update.to_string(), "update");
    }
}
