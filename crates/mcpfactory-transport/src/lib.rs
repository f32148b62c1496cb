//! In-memory transport layer for mcpfactory
//!
//! Provides the byte plumbing the harness wires between an in-process server
//! and its client. Nothing here touches sockets or the filesystem.
//!
//! # Architecture
//!
//! - **Pipe**: one unidirectional in-memory byte stream with explicit completion
//! - **Duplex transport**: two pipes exposed as a client endpoint and a server endpoint
//! - **Framing**: newline-delimited JSON over any async reader/writer
//! - **Error handling**: Unified error type for the transport layer
//!
//! # Usage
//!
//! ```
//! use mcpfactory_transport::DuplexTransport;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn example() -> std::io::Result<()> {
//! let transport = DuplexTransport::open();
//! let mut client = transport.client_endpoint();
//! let mut server = transport.server_endpoint();
//!
//! client.write_all(b"ping").await?;
//! let mut buf = [0u8; 4];
//! server.read_exact(&mut buf).await?;
//! assert_eq!(&buf, b"ping");
//!
//! transport.close();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod duplex;
pub mod error;
pub mod framing;
pub mod pipe;

// Re-export commonly used types
pub use duplex::{ClientEndpoint, ClientSide, DuplexTransport, Endpoint, ServerEndpoint, ServerSide};
pub use error::{Result, TransportError};
pub use framing::{JsonLineReader, JsonLineWriter};
pub use pipe::{Pipe, PipeOptions, PipeReader, PipeWriter};
