//! Error types for the reference MCP runtime

use mcpfactory_protocol::{JsonRpcError, ProtocolError};
use mcpfactory_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by the in-process server and client
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// An operation did not finish within its time bound
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being waited for
        operation: &'static str,
        /// The bound that elapsed
        timeout: Duration,
    },

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// The client was closed or the server hung up
    #[error("MCP client closed or disconnected")]
    ClientClosed,

    /// A service was requested that was never registered
    #[error("Service not registered: {0}")]
    ServiceNotFound(&'static str),

    /// A hosted background service failed to start or stop
    #[error("Hosted service '{name}' failed: {message}")]
    HostedService {
        /// Service name
        name: String,
        /// Failure detail
        message: String,
    },

    /// The server could not be started
    #[error("Server startup failed: {0}")]
    Startup(String),

    /// The peer answered with a JSON-RPC error
    #[error("Server returned error: {0}")]
    JsonRpc(JsonRpcError),

    /// A message violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying transport failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RuntimeError {
    /// Create a hosted service error
    pub fn hosted_service(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HostedService {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
