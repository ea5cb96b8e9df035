//! Error types for the catalog sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding catalog messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message could not be serialized.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Message being encoded.
        what: &'static str,
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// The message could not be parsed.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Message being decoded.
        what: &'static str,
        /// Underlying parser error.
        source: serde_json::Error,
    },

    /// The message parsed but is structurally invalid.
    #[error("invalid {what}: {reason}")]
    InvalidStructure {
        /// Message being validated.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates a structural validation error.
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            what,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_structure_display() {
        let err = ProtocolError::invalid("attribute value", "both value and array_value set");
        assert_eq!(
            err.to_string(),
            "invalid attribute value: both value and array_value set"
        );
    }
}
