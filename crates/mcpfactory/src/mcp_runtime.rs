//! Default runtime: the reference MCP server and client
//!
//! Configuration callbacks run on every connect attempt, after the
//! factory's own defaults, so a callback can override anything the factory
//! sets. Callbacks of one kind run in registration order.

use crate::error::{FactoryError, FactoryResult};
use crate::options::FactoryOptions;
use crate::runtime::{HarnessRuntime, ManagedClient, ManagedServer};
use async_trait::async_trait;
use mcpfactory_runtime::{
    ClientOptions, McpClient, McpServer, McpServerBuilder, ServiceCollection, ServiceProvider,
};
use mcpfactory_transport::{ClientEndpoint, ServerEndpoint};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Callback registering services
pub type ConfigureServices = Arc<dyn Fn(&mut ServiceCollection) + Send + Sync>;

/// Callback configuring the server (tools, identity, logging)
pub type ConfigureServer = Arc<dyn Fn(&mut McpServerBuilder) + Send + Sync>;

/// Callback adjusting client handshake options
pub type ConfigureClientOptions = Arc<dyn Fn(&mut ClientOptions) + Send + Sync>;

/// Hosts [`McpServer`] and [`McpClient`]
#[derive(Clone, Default)]
pub struct McpRuntime {
    configure_services: Vec<ConfigureServices>,
    configure_server: Vec<ConfigureServer>,
    configure_client_options: Vec<ConfigureClientOptions>,
}

impl McpRuntime {
    /// Create a runtime with no callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service registration callback
    pub fn configure_services<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut ServiceCollection) + Send + Sync + 'static,
    {
        self.configure_services.push(Arc::new(configure));
        self
    }

    /// Add a server configuration callback
    pub fn configure_server<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut McpServerBuilder) + Send + Sync + 'static,
    {
        self.configure_server.push(Arc::new(configure));
        self
    }

    /// Add a client options callback
    pub fn configure_client_options<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut ClientOptions) + Send + Sync + 'static,
    {
        self.configure_client_options.push(Arc::new(configure));
        self
    }
}

impl fmt::Debug for McpRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpRuntime")
            .field("configure_services", &self.configure_services.len())
            .field("configure_server", &self.configure_server.len())
            .field("configure_client_options", &self.configure_client_options.len())
            .finish()
    }
}

#[async_trait]
impl HarnessRuntime for McpRuntime {
    type Server = McpServer;
    type Client = McpClient;

    fn build_server(
        &self,
        endpoint: ServerEndpoint,
        options: &FactoryOptions,
    ) -> FactoryResult<McpServer> {
        let mut builder = McpServer::builder();
        builder
            .server_info(options.server_info.clone())
            .instructions(options.server_instructions.clone())
            .initialization_timeout(options.initialization_timeout);

        if options.suppress_host_logging {
            builder.logging_mut().clear_providers();
        }
        if let Some(configure) = &options.configure_logging {
            configure(builder.logging_mut());
        }

        for configure in &self.configure_services {
            configure(builder.services_mut());
        }
        for configure in &self.configure_server {
            configure(&mut builder);
        }

        debug!(tools = builder.tools().len(), "Configured MCP server");
        Ok(builder.build(endpoint))
    }

    fn client_options(&self, options: &FactoryOptions) -> ClientOptions {
        let mut client_options =
            ClientOptions::default().with_initialization_timeout(options.initialization_timeout);
        for configure in &self.configure_client_options {
            configure(&mut client_options);
        }
        client_options
    }

    async fn connect_client(
        &self,
        endpoint: ClientEndpoint,
        options: ClientOptions,
        cancel: &CancellationToken,
    ) -> FactoryResult<McpClient> {
        Ok(McpClient::connect(endpoint, options, cancel).await?)
    }
}

#[async_trait]
impl ManagedServer for McpServer {
    type Services = ServiceProvider;

    async fn start(&self, cancel: &CancellationToken) -> FactoryResult<()> {
        McpServer::start(self, cancel).await.map_err(FactoryError::from)
    }

    async fn stop(&self) -> FactoryResult<()> {
        McpServer::stop(self).await.map_err(FactoryError::from)
    }

    async fn dispose(&self) -> FactoryResult<()> {
        McpServer::dispose(self);
        Ok(())
    }

    fn services(&self) -> Arc<ServiceProvider> {
        Arc::clone(McpServer::services(self))
    }
}

#[async_trait]
impl ManagedClient for McpClient {
    async fn dispose(&self) -> FactoryResult<()> {
        self.close().await;
        Ok(())
    }
}
