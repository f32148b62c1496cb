//! Error types for protocol operations
//!
//! Provides error types for serialization, deserialization, and envelope validation.

use std::fmt;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// JSON serialization/deserialization error
    SerializationError(String),

    /// Envelope is valid JSON but not a JSON-RPC 2.0 message
    InvalidMessage(String),

    /// Missing required field
    MissingField(String),

    /// Wrong `jsonrpc` version marker
    VersionMismatch {
        /// The version marker this crate speaks.
        expected: String,
        /// The marker that was actually received.
        got: String,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Self::MissingField(field) => write!(f, "Missing required field: {}", field),
            Self::VersionMismatch { expected, got } => {
                write!(f, "Version mismatch: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ProtocolError::MissingField("id".to_string()).to_string(),
            "Missing required field: id"
        );
        let mismatch = ProtocolError::VersionMismatch {
            expected: "2.0".to_string(),
            got: "1.0".to_string(),
        };
        assert_eq!(mismatch.to_string(), "Version mismatch: expected 2.0, got 1.0");
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: ProtocolError = err.into();
        assert!(matches!(converted, ProtocolError::SerializationError(_)));
    }
}
