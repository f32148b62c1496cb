//! Log output configuration for the hosted server
//!
//! The server's protocol loop runs under its own `tracing` dispatch so a
//! test can silence the harness without touching the global subscriber.

use tracing::{Dispatch, Level};

/// Builder for the server's log dispatch
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    enabled: bool,
    max_level: Level,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            max_level: Level::INFO,
            with_target: true,
        }
    }
}

impl LoggingBuilder {
    /// Create a builder that logs at INFO and above
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all output
    pub fn clear_providers(&mut self) -> &mut Self {
        self.enabled = false;
        self
    }

    /// Re-enable output after [`clear_providers`](Self::clear_providers)
    pub fn enable(&mut self) -> &mut Self {
        self.enabled = true;
        self
    }

    /// Most verbose level that is emitted
    pub fn set_max_level(&mut self, level: Level) -> &mut Self {
        self.max_level = level;
        self
    }

    /// Whether event targets are printed
    pub fn with_target(&mut self, display: bool) -> &mut Self {
        self.with_target = display;
        self
    }

    /// Whether output is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Configured maximum level
    pub fn max_level(&self) -> Level {
        self.max_level
    }

    /// Build the dispatch the server loop runs under
    ///
    /// Disabled builders yield [`Dispatch::none`]. Otherwise events go through
    /// a `fmt` subscriber that writes via the test harness's captured output.
    pub fn build_dispatch(&self) -> Dispatch {
        if !self.enabled {
            return Dispatch::none();
        }

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.max_level)
            .with_target(self.with_target)
            .with_test_writer()
            .finish();
        Dispatch::new(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = LoggingBuilder::new();
        assert!(builder.is_enabled());
        assert_eq!(builder.max_level(), Level::INFO);
    }

    #[test]
    fn test_cleared_builder_is_silent() {
        let mut builder = LoggingBuilder::new();
        builder.clear_providers();
        assert!(!builder.is_enabled());

        let dispatch = builder.build_dispatch();
        let enabled = tracing::dispatcher::with_default(&dispatch, || {
            tracing::enabled!(Level::ERROR)
        });
        assert!(!enabled);
    }

    #[test]
    fn test_dispatch_honors_max_level() {
        let dispatch = LoggingBuilder::new().build_dispatch();
        let (info, debug) = tracing::dispatcher::with_default(&dispatch, || {
            (tracing::enabled!(Level::INFO), tracing::enabled!(Level::DEBUG))
        });
        assert!(info);
        assert!(!debug);
    }

    #[test]
    fn test_enable_after_clear() {
        let mut builder = LoggingBuilder::new();
        builder.clear_providers().enable().set_max_level(Level::DEBUG);
        assert!(builder.is_enabled());
        assert_eq!(builder.max_level(), Level::DEBUG);
    }
}
