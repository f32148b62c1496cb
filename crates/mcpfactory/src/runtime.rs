//! Seams between the harness and the protocol runtime it hosts
//!
//! The factory never speaks MCP itself. It asks a [`HarnessRuntime`] to
//! build a server on one endpoint and connect a client on the other, then
//! drives the resulting [`ManagedServer`] and [`ManagedClient`] through
//! their lifecycle.

use crate::error::FactoryResult;
use crate::options::FactoryOptions;
use async_trait::async_trait;
use mcpfactory_runtime::ClientOptions;
use mcpfactory_transport::{ClientEndpoint, DuplexTransport, ServerEndpoint};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A started background server bound to the server endpoint
#[async_trait]
pub trait ManagedServer: Send + Sync + 'static {
    /// Server-side service context exposed by the factory
    type Services: Send + Sync + 'static;

    /// Start serving
    async fn start(&self, cancel: &CancellationToken) -> FactoryResult<()>;

    /// Stop serving
    ///
    /// The factory bounds this by the shutdown timeout and disposes the
    /// server whether or not it returns in time.
    async fn stop(&self) -> FactoryResult<()>;

    /// Release everything the server holds
    async fn dispose(&self) -> FactoryResult<()>;

    /// The server's service context
    fn services(&self) -> Arc<Self::Services>;
}

/// A connected client bound to the client endpoint
#[async_trait]
pub trait ManagedClient: Send + Sync + 'static {
    /// Close the connection
    async fn dispose(&self) -> FactoryResult<()>;
}

/// Builds the server and client the factory manages
#[async_trait]
pub trait HarnessRuntime: Send + Sync + 'static {
    /// Server handle type
    type Server: ManagedServer;

    /// Client handle type
    type Client: ManagedClient;

    /// Allocate the duplex transport for one connect attempt
    fn open_transport(&self) -> DuplexTransport {
        DuplexTransport::open()
    }

    /// Build (but do not start) a server bound to `endpoint`
    fn build_server(
        &self,
        endpoint: ServerEndpoint,
        options: &FactoryOptions,
    ) -> FactoryResult<Self::Server>;

    /// Handshake options for the client
    fn client_options(&self, options: &FactoryOptions) -> ClientOptions;

    /// Connect a client over `endpoint` and complete the handshake
    async fn connect_client(
        &self,
        endpoint: ClientEndpoint,
        options: ClientOptions,
        cancel: &CancellationToken,
    ) -> FactoryResult<Self::Client>;

    /// Complete every half of the transport
    async fn close_transport(&self, transport: &DuplexTransport) -> FactoryResult<()> {
        transport.close();
        Ok(())
    }
}
