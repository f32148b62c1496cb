//! JSON-RPC 2.0 envelope and MCP message types for mcpfactory
//!
//! This crate holds the wire vocabulary spoken between the in-process MCP
//! server and client that the harness wires together. Everything here is
//! plain data: no I/O, no async.
//!
//! # Type Organization
//!
//! - **JSON-RPC envelope**: [`jsonrpc`] - requests, notifications, responses, errors
//! - **MCP types**: [`types`] - implementation info, initialize, tools
//! - **Content**: [`content`] - content blocks returned by tool calls
//! - **Errors**: [`error`] - protocol (de)serialization errors

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```
//! use mcpfactory_protocol::{JsonRpcMessage, JsonRpcRequest, RequestId, methods};
//!
//! let request = JsonRpcRequest::new(RequestId::Number(1), methods::PING, None);
//! let line = JsonRpcMessage::Request(request).to_json().unwrap();
//! let parsed = JsonRpcMessage::from_json(&line).unwrap();
//! assert_eq!(parsed.method(), Some("ping"));
//! ```

pub mod content;
pub mod error;
pub mod jsonrpc;
pub mod types;

pub use content::ContentBlock;
pub use error::{ProtocolError, Result};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, error_codes,
};
pub use types::{
    CallToolParams, CallToolResult, ClientCapabilities, Implementation, InitializeParams,
    InitializeResult, LATEST_PROTOCOL_VERSION, ListToolsResult, ServerCapabilities, Tool,
    ToolsCapability, methods,
};
