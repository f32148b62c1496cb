//! In-process tools served over `tools/list` and `tools/call`
//!
//! Implement [`SdkTool`] directly for full control, or wrap an async closure
//! with [`FunctionTool`] (typed input only) or [`ContextFunctionTool`]
//! (typed input plus access to the server's services).
//!
//! ```
//! use mcpfactory_runtime::tool::{FunctionTool, SdkTool, ToolContext};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct EchoArgs { message: String }
//!
//! # async fn example() -> Result<(), mcpfactory_runtime::tool::SdkToolError> {
//! let echo = FunctionTool::new("echo", "Echo the input", |args: EchoArgs| async move {
//!     Ok(args.message)
//! });
//!
//! let output = echo
//!     .execute(&ToolContext::default(), serde_json::json!({"message": "hello"}))
//!     .await?;
//! assert_eq!(output, "hello");
//! # Ok(())
//! # }
//! ```

use crate::error::RuntimeError;
use crate::services::ServiceProvider;
use async_trait::async_trait;
use mcpfactory_protocol::{CallToolResult, Tool};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during tool execution
#[derive(Debug, Error)]
pub enum SdkToolError {
    /// Input JSON doesn't match the expected shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tool execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A service the tool depends on could not be resolved
    #[error("Service error: {0}")]
    Service(#[from] RuntimeError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a tool can see of the server hosting it
#[derive(Clone, Default)]
pub struct ToolContext {
    services: Arc<ServiceProvider>,
}

impl ToolContext {
    /// Create a context over the given services
    pub fn new(services: Arc<ServiceProvider>) -> Self {
        Self { services }
    }

    /// The server's services
    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("services", &self.services)
            .finish()
    }
}

/// An in-process MCP tool
#[async_trait]
pub trait SdkTool: Send + Sync {
    /// Unique identifier for this tool.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the expected arguments object.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value, SdkToolError>;

    /// Descriptor advertised by `tools/list`.
    fn descriptor(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

fn permissive_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "additionalProperties": true
    })
}

fn decode_input<I: DeserializeOwned>(input: Value) -> Result<I, SdkToolError> {
    // Missing arguments arrive as null; treat them as an empty object.
    let input = if input.is_null() {
        Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input)
        .map_err(|e| SdkToolError::InvalidInput(format!("Failed to deserialize input: {}", e)))
}

/// Type-safe wrapper for closure-based tools.
///
/// Deserializes the arguments into `I`, runs the handler, and serializes
/// the `O` it returns.
pub struct FunctionTool<F, Fut, I, O> {
    name: String,
    description: String,
    schema: Value,
    handler: F,
    _phantom: PhantomData<fn(I) -> (Fut, O)>,
}

impl<F, Fut, I, O> FunctionTool<F, Fut, I, O> {
    /// Create a new function-based tool.
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: permissive_schema(),
            handler,
            _phantom: PhantomData,
        }
    }

    /// Replace the advertised input schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl<F, Fut, I, O> SdkTool for FunctionTool<F, Fut, I, O>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, SdkToolError>> + Send,
    I: DeserializeOwned + Send,
    O: Serialize + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, SdkToolError> {
        let typed_input: I = decode_input(input)?;
        let output = (self.handler)(typed_input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Closure-based tool that also receives the [`ToolContext`].
pub struct ContextFunctionTool<F, Fut, I, O> {
    name: String,
    description: String,
    schema: Value,
    handler: F,
    _phantom: PhantomData<fn(I) -> (Fut, O)>,
}

impl<F, Fut, I, O> ContextFunctionTool<F, Fut, I, O> {
    /// Create a new context-aware tool.
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: permissive_schema(),
            handler,
            _phantom: PhantomData,
        }
    }

    /// Replace the advertised input schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl<F, Fut, I, O> SdkTool for ContextFunctionTool<F, Fut, I, O>
where
    F: Fn(ToolContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, SdkToolError>> + Send,
    I: DeserializeOwned + Send,
    O: Serialize + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value, SdkToolError> {
        let typed_input: I = decode_input(input)?;
        let output = (self.handler)(ctx.clone(), typed_input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Map a tool outcome onto the `tools/call` result shape
///
/// A JSON string becomes a text block holding exactly that string; any
/// other value becomes a text block with its compact serialization; an error
/// becomes a text block flagged with `is_error`.
pub fn to_call_result(outcome: Result<Value, SdkToolError>) -> CallToolResult {
    match outcome {
        Ok(Value::String(text)) => CallToolResult::text(text),
        Ok(value) => CallToolResult::text(value.to_string()),
        Err(err) => CallToolResult::error(err.to_string()),
    }
}

/// Ordered set of tools keyed by name
///
/// Registering a name twice replaces the first tool but keeps its position.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn SdkTool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tool
    pub fn register(&mut self, tool: Arc<dyn SdkTool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SdkTool>> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    /// Whether a tool with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors of all tools in registration order
    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.descriptor()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
