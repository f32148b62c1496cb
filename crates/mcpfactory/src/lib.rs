//! # mcpfactory
//!
//! In-process MCP test harness. A factory stands up a server and a connected
//! client over an in-memory duplex transport, so integration tests exercise
//! real protocol traffic without sockets, processes or disk.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcpfactory::{FactoryOptions, McpServerFactory, McpTestClient, SdkToolError};
//! use serde_json::{Value, json};
//!
//! # async fn run() -> Result<(), mcpfactory::FactoryError> {
//! let factory = McpServerFactory::builder()
//!     .configure_server(|server| {
//!         server.tool("echo", "Echo the message", |input: Value| async move {
//!             Ok::<_, SdkToolError>(input["message"].clone())
//!         });
//!     })
//!     .options(FactoryOptions::default().with_server_instructions("Echo only."))
//!     .build();
//!
//! let client = McpTestClient::connect(&factory).await?;
//! let text = client.call_tool_for_text("echo", json!({"message": "hello"})).await?;
//! assert_eq!(text, "hello");
//!
//! factory.dispose().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! - The first connect builds transport, server and client; every later or
//!   concurrent connect gets the same client.
//! - A failed or cancelled build is undone in reverse order and can be
//!   retried.
//! - [`McpServerFactory::dispose`] is idempotent and bounded by
//!   [`FactoryOptions::shutdown_timeout`]; after it, connect fails with
//!   [`FactoryError::Disposed`].
//!
//! Any protocol runtime can be hosted by implementing [`HarnessRuntime`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod mcp_runtime;
pub mod options;
pub mod runtime;
pub mod test_client;

pub use error::{FactoryError, FactoryResult};
pub use factory::{
    McpServerFactory, McpServerFactoryBuilder, McpServerIntegrationFactory, ServicesOf,
};
pub use lifecycle::LifecyclePhase;
pub use mcp_runtime::{ConfigureClientOptions, ConfigureServer, ConfigureServices, McpRuntime};
pub use options::{ConfigureLogging, FactoryOptions};
pub use runtime::{HarnessRuntime, ManagedClient, ManagedServer};
pub use test_client::McpTestClient;

pub use mcpfactory_protocol::{CallToolResult, ContentBlock, Implementation, Tool};
pub use mcpfactory_runtime::{
    ClientOptions, HostedService, LoggingBuilder, McpClient, McpServer, McpServerBuilder,
    RuntimeError, SdkTool, SdkToolError, ServiceCollection, ServiceProvider, ToolContext,
};
pub use mcpfactory_transport::{ClientEndpoint, DuplexTransport, ServerEndpoint, TransportError};
pub use tokio_util::sync::CancellationToken;
