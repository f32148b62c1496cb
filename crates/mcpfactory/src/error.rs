//! Error types for the harness

use mcpfactory_runtime::RuntimeError;
use mcpfactory_transport::TransportError;
use thiserror::Error;

/// Result type for harness operations
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Errors surfaced by [`McpServerFactory`](crate::McpServerFactory)
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FactoryError {
    /// The factory was torn down; it cannot connect again
    #[error("McpServerFactory has been disposed")]
    Disposed,

    /// Services are only available while connected
    #[error("Services are not available until a client has connected")]
    NotInitialized,

    /// The caller's cancellation token fired during connect
    #[error("Connect was cancelled")]
    Cancelled,

    /// A tool result carried no text block
    #[error("Tool '{tool}' did not return a text content block")]
    MissingContent {
        /// Tool that was called
        tool: String,
    },

    /// The server could not be configured or started
    #[error("Server startup failed: {0}")]
    Startup(String),

    /// Error from the hosted runtime
    #[error(transparent)]
    Runtime(RuntimeError),

    /// Error from the in-memory transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FactoryError {
    /// Create a startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is the disposed-state error
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl From<RuntimeError> for FactoryError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Cancelled => Self::Cancelled,
            other => Self::Runtime(other),
        }
    }
}
