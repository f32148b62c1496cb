//! Reference in-process MCP runtime for mcpfactory
//!
//! A small newline-delimited JSON-RPC 2.0 MCP server and client that talk
//! over the in-memory transport. The harness hosts this runtime by default,
//! but reaches it only through its own traits, so any other runtime can
//! take its place.
//!
//! # Architecture
//!
//! - **Tools**: [`tool`] - `SdkTool` trait plus closure-based wrappers
//! - **Services**: [`services`] - typed singleton container and hosted services
//! - **Server**: [`server`] - builder, lifecycle and the JSON-RPC loop

#![deny(unsafe_code)]
#![warn(missing_docs)]
//! - **Client**: [`client`] - handshake, request correlation, tool calls
//! - **Logging**: [`logging`] - per-server `tracing` dispatch
//!
//! # Usage
//!
//! ```
//! use mcpfactory_runtime::{ClientOptions, McpClient, McpServer, SdkToolError};
//! use mcpfactory_transport::DuplexTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> mcpfactory_runtime::Result<()> {
//! let transport = DuplexTransport::open();
//!
//! let mut builder = McpServer::builder();
//! builder.tool("shout", "Upper-case the input", |text: String| async move {
//!     Ok::<_, SdkToolError>(text.to_uppercase())
//! });
//! let server = builder.build(transport.server_endpoint());
//! server.start(&CancellationToken::new()).await?;
//!
//! let client = McpClient::connect(
//!     transport.client_endpoint(),
//!     ClientOptions::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! let tools = client.list_tools().await?;
//! assert_eq!(tools[0].name, "shout");
//!
//! client.close().await;
//! server.stop().await?;
//! transport.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod logging;
pub mod server;
pub mod services;
pub mod tool;

pub use client::{ClientOptions, McpClient};
pub use error::{Result, RuntimeError};
pub use logging::LoggingBuilder;
pub use server::{McpServer, McpServerBuilder};
pub use services::{HostedService, ServiceCollection, ServiceProvider};
pub use tool::{
    ContextFunctionTool, FunctionTool, SdkTool, SdkToolError, ToolContext, ToolRegistry,
};
