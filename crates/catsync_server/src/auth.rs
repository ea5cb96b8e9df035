//! Bearer API key authentication.

use crate::error::{ServerError, ServerResult};

/// Checks the `Authorization` header of incoming requests.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyValidator {
    api_key: Option<String>,
}

impl ApiKeyValidator {
    /// Creates a validator. With no key every request is accepted.
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    /// Returns true if requests must carry a key.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validates an `Authorization` header value.
    pub fn validate(&self, authorization: Option<&str>) -> ServerResult<()> {
        let Some(expected) = self.api_key.as_deref() else {
            return Ok(());
        };
        let header = authorization
            .ok_or_else(|| ServerError::AuthenticationFailed("missing API key".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::AuthenticationFailed("expected a bearer token".into()))?;

        if constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(ServerError::AuthenticationFailed("invalid API key".into()))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
