//! Error types for the catalog server.

use catsync_protocol::{ErrorResponse, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the catalog server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong API key.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Unknown catalog type or entry.
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of resource.
        what: &'static str,
        /// Requested ID.
        id: String,
    },

    /// No route for the method and path.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Well-formed request rejected by validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Failure injected by a test.
    #[error("injected failure with status {0}")]
    Injected(u16),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates a not-found error.
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotFound { .. } => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::Validation(_) => 422,
            ServerError::Injected(status) => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Builds the JSON error body for this error.
    pub fn to_response(&self) -> ErrorResponse {
        let code = match self {
            ServerError::InvalidRequest(_) => "bad_request",
            ServerError::AuthenticationFailed(_) => "unauthenticated",
            ServerError::NotFound { .. } => "not_found",
            ServerError::MethodNotAllowed { .. } => "method_not_allowed",
            ServerError::Validation(_) => "invalid_value",
            ServerError::Injected(_) => "injected",
            ServerError::Internal(_) => "internal",
        };
        ErrorResponse::new(self.status(), code, self.to_string())
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidStructure { .. } => ServerError::Validation(err.to_string()),
            ProtocolError::Decode { .. } => ServerError::InvalidRequest(err.to_string()),
            ProtocolError::Encode { .. } => ServerError::Internal(err.to_string()),
        }
    }
}
