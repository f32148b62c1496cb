//! Harness options
//!
//! Options are an immutable value record once handed to the factory. Build
//! them with the `with_*` setters:
//!
//! ```
//! use mcpfactory::FactoryOptions;
//! use std::time::Duration;
//!
//! let options = FactoryOptions::default()
//!     .with_server_instructions("Use terse responses.")
//!     .with_initialization_timeout(Duration::from_secs(30));
//!
//! assert_eq!(options.server_info.name, "TestMcpServer");
//! assert_eq!(options.initialization_timeout, Duration::from_secs(30));
//! ```

use mcpfactory_protocol::Implementation;
use mcpfactory_runtime::LoggingBuilder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default server name reported by the harness
pub const DEFAULT_SERVER_NAME: &str = "TestMcpServer";

/// Default server version reported by the harness
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";

/// Default bound on the client handshake
pub const DEFAULT_INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on stopping the server during teardown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback adjusting the server's log output
pub type ConfigureLogging = Arc<dyn Fn(&mut LoggingBuilder) + Send + Sync>;

/// Configuration for [`McpServerFactory`](crate::McpServerFactory)
#[derive(Clone)]
pub struct FactoryOptions {
    /// Identity the simulated server reports
    pub server_info: Implementation,

    /// Instructions the simulated server reports
    pub server_instructions: Option<String>,

    /// Bound on the client handshake
    pub initialization_timeout: Duration,

    /// Bound on stopping the server during teardown
    pub shutdown_timeout: Duration,

    /// Silence the server's log output
    pub suppress_host_logging: bool,

    /// Runs after suppression is applied, so it can re-enable output
    pub configure_logging: Option<ConfigureLogging>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            server_info: Implementation::new(DEFAULT_SERVER_NAME, DEFAULT_SERVER_VERSION),
            server_instructions: None,
            initialization_timeout: DEFAULT_INITIALIZATION_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            suppress_host_logging: true,
            configure_logging: None,
        }
    }
}

impl FactoryOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server identity
    pub fn with_server_info(mut self, info: Implementation) -> Self {
        self.server_info = info;
        self
    }

    /// Set the server instructions
    pub fn with_server_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.server_instructions = Some(instructions.into());
        self
    }

    /// Set the handshake bound
    pub fn with_initialization_timeout(mut self, timeout: Duration) -> Self {
        self.initialization_timeout = timeout;
        self
    }

    /// Set the teardown stop bound
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Enable or disable log suppression
    pub fn with_suppress_host_logging(mut self, suppress: bool) -> Self {
        self.suppress_host_logging = suppress;
        self
    }

    /// Set the logging callback
    pub fn with_configure_logging<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut LoggingBuilder) + Send + Sync + 'static,
    {
        self.configure_logging = Some(Arc::new(configure));
        self
    }
}

impl fmt::Debug for FactoryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("server_info", &self.server_info)
            .field("server_instructions", &self.server_instructions)
            .field("initialization_timeout", &self.initialization_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("suppress_host_logging", &self.suppress_host_logging)
            .field("configure_logging", &self.configure_logging.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FactoryOptions::default();
        assert_eq!(options.server_info.name, "TestMcpServer");
        assert_eq!(options.server_info.version, "1.0.0");
        assert_eq!(options.initialization_timeout, Duration::from_secs(10));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
        assert!(options.server_instructions.is_none());
        assert!(options.suppress_host_logging);
        assert!(options.configure_logging.is_none());
    }

    #[test]
    fn test_setters_override() {
        let options = FactoryOptions::new()
            .with_server_info(Implementation::new("custom", "9.9.9"))
            .with_server_instructions("Use terse responses.")
            .with_initialization_timeout(Duration::from_secs(30))
            .with_shutdown_timeout(Duration::from_millis(250))
            .with_suppress_host_logging(false)
            .with_configure_logging(|logging| {
                logging.set_max_level(tracing::Level::DEBUG);
            });

        assert_eq!(options.server_info.name, "custom");
        assert_eq!(
            options.server_instructions.as_deref(),
            Some("Use terse responses.")
        );
        assert_eq!(options.initialization_timeout, Duration::from_secs(30));
        assert_eq!(options.shutdown_timeout, Duration::from_millis(250));
        assert!(!options.suppress_host_logging);

        let mut logging = LoggingBuilder::new();
        (options.configure_logging.as_ref().unwrap())(&mut logging);
        assert_eq!(logging.max_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_debug_hides_callback() {
        let options = FactoryOptions::default().with_configure_logging(|_| {});
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("configure_logging: true"));
    }
}
