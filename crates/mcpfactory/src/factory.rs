//! Lifecycle orchestrator
//!
//! [`McpServerFactory`] builds transport, server and client exactly once,
//! hands every caller the same client, rolls a failed build back in reverse
//! creation order and tears everything down on [`dispose`].
//!
//! [`dispose`]: McpServerFactory::dispose

use crate::error::{FactoryError, FactoryResult};
use crate::lifecycle::{BuildGuard, LifecyclePhase, PhaseCell};
use crate::mcp_runtime::McpRuntime;
use crate::options::FactoryOptions;
use crate::runtime::{HarnessRuntime, ManagedClient, ManagedServer};
use mcpfactory_runtime::{ClientOptions, McpServerBuilder, ServiceCollection};
use mcpfactory_transport::DuplexTransport;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Factory over the default MCP runtime
pub type McpServerIntegrationFactory = McpServerFactory<McpRuntime>;

/// Services exposed by a runtime's server
pub type ServicesOf<R> = <<R as HarnessRuntime>::Server as ManagedServer>::Services;

/// Resources held while connected, in creation order
struct Connection<R: HarnessRuntime> {
    transport: DuplexTransport,
    server: R::Server,
    client: Arc<R::Client>,
}

enum FactoryState<R: HarnessRuntime> {
    Uninitialized,
    Ready(Connection<R>),
    Disposed,
}

/// In-process server/client harness
///
/// ```no_run
/// use mcpfactory::{FactoryOptions, McpServerFactory};
///
/// # async fn run() -> Result<(), mcpfactory::FactoryError> {
/// let factory = McpServerFactory::builder()
///     .configure_server(|server| {
///         server.tool("echo", "Echo the message", |input: serde_json::Value| async move {
///             Ok::<_, mcpfactory::SdkToolError>(input["message"].clone())
///         });
///     })
///     .options(FactoryOptions::default())
///     .build();
///
/// let client = factory.connect().await?;
/// let tools = client.list_tools().await?;
/// assert_eq!(tools[0].name, "echo");
///
/// factory.dispose().await?;
/// # Ok(())
/// # }
/// ```
pub struct McpServerFactory<R: HarnessRuntime = McpRuntime> {
    runtime: R,
    options: FactoryOptions,
    state: Mutex<FactoryState<R>>,
    phase: PhaseCell,
}

impl McpServerFactory<McpRuntime> {
    /// Factory over a runtime with no tools or services
    pub fn new(options: FactoryOptions) -> Self {
        Self::with_runtime(McpRuntime::new(), options)
    }

    /// Start a builder over the default runtime
    pub fn builder() -> McpServerFactoryBuilder {
        McpServerFactoryBuilder::default()
    }
}

impl<R: HarnessRuntime> McpServerFactory<R> {
    /// Factory over any runtime
    pub fn with_runtime(runtime: R, options: FactoryOptions) -> Self {
        Self {
            runtime,
            options,
            state: Mutex::new(FactoryState::Uninitialized),
            phase: PhaseCell::new(),
        }
    }

    /// Connect without a cancellation token
    pub async fn connect(&self) -> FactoryResult<Arc<R::Client>> {
        self.create_client(&CancellationToken::new()).await
    }

    /// Build once and return the shared client
    ///
    /// Concurrent callers wait for the one in-flight build and receive the
    /// same client. A failed or cancelled build is rolled back and the
    /// factory stays retryable.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::Disposed`] after [`dispose`](Self::dispose)
    /// - [`FactoryError::Cancelled`] if `cancel` fires before the build completes
    /// - The build error itself, unwrapped
    pub async fn create_client(
        &self,
        cancel: &CancellationToken,
    ) -> FactoryResult<Arc<R::Client>> {
        if self.phase.get().is_terminal() {
            return Err(FactoryError::Disposed);
        }
        if cancel.is_cancelled() {
            return Err(FactoryError::Cancelled);
        }

        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FactoryError::Cancelled),
            state = self.state.lock() => state,
        };

        match &*state {
            FactoryState::Ready(connection) => return Ok(Arc::clone(&connection.client)),
            FactoryState::Disposed => return Err(FactoryError::Disposed),
            FactoryState::Uninitialized => {}
        }

        let guard = BuildGuard::begin(&self.phase);
        info!(server = %self.options.server_info.name, "Connecting in-process MCP harness");

        let connection = self.build(cancel).await?;
        let client = Arc::clone(&connection.client);
        *state = FactoryState::Ready(connection);
        guard.complete();

        info!(server = %self.options.server_info.name, "Harness ready");
        Ok(client)
    }

    async fn build(&self, cancel: &CancellationToken) -> FactoryResult<Connection<R>> {
        let transport = self.runtime.open_transport();
        debug!("Opened duplex transport");

        let server = match self
            .runtime
            .build_server(transport.server_endpoint(), &self.options)
        {
            Ok(server) => server,
            Err(err) => {
                warn!(error = %err, "Server configuration failed, rolling back");
                self.rollback(None, &transport).await;
                return Err(err);
            }
        };

        if let Err(err) = until_cancelled(cancel, server.start(cancel)).await {
            warn!(error = %err, "Server start failed, rolling back");
            self.rollback(Some(&server), &transport).await;
            return Err(err);
        }
        debug!("Server started");

        let client_options = self.runtime.client_options(&self.options);
        let connect = self
            .runtime
            .connect_client(transport.client_endpoint(), client_options, cancel);
        match until_cancelled(cancel, connect).await {
            Ok(client) => Ok(Connection {
                transport,
                server,
                client: Arc::new(client),
            }),
            Err(err) => {
                warn!(error = %err, "Client connect failed, rolling back");
                self.rollback(Some(&server), &transport).await;
                Err(err)
            }
        }
    }

    /// Best-effort reverse-order cleanup after a failed build
    async fn rollback(&self, server: Option<&R::Server>, transport: &DuplexTransport) {
        if let Some(server) = server {
            match tokio::time::timeout(self.options.shutdown_timeout, server.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Ignoring server stop failure during rollback"),
                Err(_) => warn!(
                    timeout = ?self.options.shutdown_timeout,
                    "Server stop timed out during rollback"
                ),
            }
            if let Err(err) = server.dispose().await {
                warn!(error = %err, "Ignoring server dispose failure during rollback");
            }
        }
        if let Err(err) = self.runtime.close_transport(transport).await {
            warn!(error = %err, "Ignoring transport close failure during rollback");
        }
        debug!("Rollback complete");
    }

    /// Tear everything down
    ///
    /// Disposes the client, stops the server within
    /// [`FactoryOptions::shutdown_timeout`], disposes the server whether or
    /// not the stop finished, then closes the transport. Every step runs; the
    /// first failure is returned. Later calls do nothing.
    pub async fn dispose(&self) -> FactoryResult<()> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, FactoryState::Disposed);
        self.phase.set(LifecyclePhase::Disposed);

        let Connection {
            transport,
            server,
            client,
        } = match previous {
            FactoryState::Ready(connection) => connection,
            FactoryState::Uninitialized => {
                debug!("Disposed before connecting");
                return Ok(());
            }
            FactoryState::Disposed => return Ok(()),
        };

        info!(server = %self.options.server_info.name, "Disposing harness");
        let mut first_error = None;

        record(&mut first_error, "client dispose", client.dispose().await);

        match tokio::time::timeout(self.options.shutdown_timeout, server.stop()).await {
            Ok(outcome) => record(&mut first_error, "server stop", outcome),
            Err(_) => warn!(
                timeout = ?self.options.shutdown_timeout,
                "Server stop timed out, forcing disposal"
            ),
        }
        record(&mut first_error, "server dispose", server.dispose().await);
        record(
            &mut first_error,
            "transport close",
            self.runtime.close_transport(&transport).await,
        );

        drop(state);
        first_error.map_or(Ok(()), Err)
    }

    /// The server's service context
    ///
    /// # Errors
    ///
    /// [`FactoryError::NotInitialized`] unless connected.
    pub async fn services(&self) -> FactoryResult<Arc<ServicesOf<R>>> {
        match &*self.state.lock().await {
            FactoryState::Ready(connection) => Ok(connection.server.services()),
            _ => Err(FactoryError::NotInitialized),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> LifecyclePhase {
        self.phase.get()
    }

    /// Options this factory was built with
    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    /// The hosted runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}

impl<R: HarnessRuntime> fmt::Debug for McpServerFactory<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerFactory")
            .field("options", &self.options)
            .field("phase", &self.phase.get())
            .finish()
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = FactoryResult<T>>,
) -> FactoryResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FactoryError::Cancelled),
        outcome = operation => outcome,
    }
}

fn record(first_error: &mut Option<FactoryError>, step: &'static str, outcome: FactoryResult<()>) {
    if let Err(err) = outcome {
        warn!(step, error = %err, "Teardown step failed");
        first_error.get_or_insert(err);
    }
}

/// Builder for a factory over the default runtime
#[derive(Debug, Default)]
pub struct McpServerFactoryBuilder {
    runtime: McpRuntime,
    options: FactoryOptions,
}

impl McpServerFactoryBuilder {
    /// Register services
    pub fn configure_services<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut ServiceCollection) + Send + Sync + 'static,
    {
        self.runtime = self.runtime.configure_services(configure);
        self
    }

    /// Configure the server (tools, identity, logging)
    pub fn configure_server<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut McpServerBuilder) + Send + Sync + 'static,
    {
        self.runtime = self.runtime.configure_server(configure);
        self
    }

    /// Adjust client handshake options
    pub fn configure_client_options<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut ClientOptions) + Send + Sync + 'static,
    {
        self.runtime = self.runtime.configure_client_options(configure);
        self
    }

    /// Set the options
    pub fn options(mut self, options: FactoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the factory
    pub fn build(self) -> McpServerFactory {
        McpServerFactory::with_runtime(self.runtime, self.options)
    }
}
