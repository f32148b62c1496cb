//! In-process MCP server
//!
//! [`McpServerBuilder`] collects identity, tools, services and log settings;
//! [`McpServer`] binds them to a server endpoint and runs the JSON-RPC loop
//! on a background task once started.
//!
//! Lifecycle: `start` brings hosted services up in registration order and
//! spawns the loop. `stop` cancels the loop, waits for it, then stops hosted
//! services in reverse order. `dispose` aborts whatever is still running.
//! All three are idempotent.

use crate::error::{Result, RuntimeError};
use crate::logging::LoggingBuilder;
use crate::services::{HostedService, ServiceCollection, ServiceProvider};
use crate::tool::{
    ContextFunctionTool, FunctionTool, SdkTool, SdkToolError, ToolContext, ToolRegistry,
    to_call_result,
};
use mcpfactory_protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcErrorResponse, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    LATEST_PROTOCOL_VERSION, ListToolsResult, RequestId, ServerCapabilities, ToolsCapability,
    error_codes, methods,
};
use mcpfactory_transport::{JsonLineReader, JsonLineWriter, ServerEndpoint, TransportError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, info, warn};

/// Default time a client gets to send `initialize`
pub const DEFAULT_INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`McpServer`]
pub struct McpServerBuilder {
    server_info: Implementation,
    instructions: Option<String>,
    initialization_timeout: Duration,
    tools: ToolRegistry,
    services: ServiceCollection,
    logging: LoggingBuilder,
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self {
            server_info: Implementation::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            instructions: None,
            initialization_timeout: DEFAULT_INITIALIZATION_TIMEOUT,
            tools: ToolRegistry::new(),
            services: ServiceCollection::new(),
            logging: LoggingBuilder::new(),
        }
    }
}

impl McpServerBuilder {
    /// Create a builder with no tools and no services
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity reported in the `initialize` result
    pub fn server_info(&mut self, info: Implementation) -> &mut Self {
        self.server_info = info;
        self
    }

    /// Instructions reported in the `initialize` result
    pub fn instructions(&mut self, instructions: Option<String>) -> &mut Self {
        self.instructions = instructions;
        self
    }

    /// Time the client gets to complete the handshake
    ///
    /// Exceeding it is logged; the connection stays open.
    pub fn initialization_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.initialization_timeout = timeout;
        self
    }

    /// Register a closure-based tool with typed input and output.
    pub fn tool<F, Fut, I, O>(&mut self, name: &str, description: &str, handler: F) -> &mut Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, SdkToolError>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.add_tool(Arc::new(FunctionTool::new(name, description, handler)))
    }

    /// Register a closure-based tool that can resolve services.
    pub fn tool_with_context<F, Fut, I, O>(
        &mut self,
        name: &str,
        description: &str,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(ToolContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, SdkToolError>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.add_tool(Arc::new(ContextFunctionTool::new(name, description, handler)))
    }

    /// Register a custom tool implementation.
    pub fn add_tool(&mut self, tool: Arc<dyn SdkTool>) -> &mut Self {
        self.tools.register(tool);
        self
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Service registrations
    pub fn services_mut(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }

    /// Log settings for the server loop
    pub fn logging_mut(&mut self) -> &mut LoggingBuilder {
        &mut self.logging
    }

    /// Bind the configuration to a server endpoint
    pub fn build(self, endpoint: ServerEndpoint) -> McpServer {
        let shared = Arc::new(ServerShared {
            server_info: self.server_info,
            instructions: self.instructions,
            initialization_timeout: self.initialization_timeout,
            tools: self.tools,
            services: Arc::new(self.services.build()),
            dispatch: self.logging.build_dispatch(),
        });

        McpServer {
            shared,
            endpoint: Mutex::new(Some(endpoint)),
            loop_task: tokio::sync::Mutex::new(None),
            abort: Mutex::new(None),
            hosted: tokio::sync::Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for McpServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServerBuilder")
            .field("server_info", &self.server_info)
            .field("tools", &self.tools)
            .field("services", &self.services)
            .finish()
    }
}

struct ServerShared {
    server_info: Implementation,
    instructions: Option<String>,
    initialization_timeout: Duration,
    tools: ToolRegistry,
    services: Arc<ServiceProvider>,
    dispatch: Dispatch,
}

/// A configured MCP server bound to one endpoint
pub struct McpServer {
    shared: Arc<ServerShared>,
    endpoint: Mutex<Option<ServerEndpoint>>,
    loop_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    abort: Mutex<Option<AbortHandle>>,
    hosted: tokio::sync::Mutex<Vec<Arc<dyn HostedService>>>,
    shutdown: CancellationToken,
    // Set by the first start attempt, successful or not.
    started: AtomicBool,
    // Set once the loop has been spawned.
    running: AtomicBool,
    stopped: AtomicBool,
}

impl McpServer {
    /// Start a builder
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// Start hosted services and spawn the protocol loop
    ///
    /// `cancel` bounds the start itself; once started, the loop runs until
    /// [`stop`](Self::stop) or [`dispose`](Self::dispose).
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let dispatch = self.shared.dispatch.clone();
        self.start_inner(cancel).with_subscriber(dispatch).await
    }

    async fn start_inner(&self, cancel: &CancellationToken) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let endpoint = lock(&self.endpoint)
            .take()
            .ok_or_else(|| RuntimeError::startup("server endpoint already released"))?;

        // Each service is recorded as soon as it is up, so a stop issued after
        // this future is dropped mid-start still reaches it.
        for service in self.shared.services.hosted_services() {
            debug!(service = service.name(), "Starting hosted service");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
                outcome = service.start(cancel) => outcome,
            };

            if let Err(err) = outcome {
                warn!(service = service.name(), error = %err, "Hosted service failed to start");
                let started = std::mem::take(&mut *self.hosted.lock().await);
                if let Err(stop_err) = stop_services(&started).await {
                    debug!(error = %stop_err, "Ignoring stop failure during start rollback");
                }
                return Err(err);
            }
            self.hosted.lock().await.push(Arc::clone(service));
        }

        let task = tokio::spawn(
            serve(Arc::clone(&self.shared), endpoint, self.shutdown.clone())
                .with_subscriber(self.shared.dispatch.clone()),
        );
        *lock(&self.abort) = Some(task.abort_handle());
        *self.loop_task.lock().await = Some(task);
        self.running.store(true, Ordering::Release);

        info!(
            server = %self.shared.server_info.name,
            version = %self.shared.server_info.version,
            tools = self.shared.tools.len(),
            "MCP server started"
        );
        Ok(())
    }

    /// Stop the loop, then hosted services in reverse order
    ///
    /// Every hosted service is asked to stop even if an earlier one fails; the
    /// first failure is returned.
    pub async fn stop(&self) -> Result<()> {
        let dispatch = self.shared.dispatch.clone();
        self.stop_inner().with_subscriber(dispatch).await
    }

    async fn stop_inner(&self) -> Result<()> {
        if !self.started.load(Ordering::Acquire) || self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!("Stopping MCP server");
        self.shutdown.cancel();

        let task = self.loop_task.lock().await.take();
        if let Some(task) = task
            && let Err(err) = task.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "Server loop ended abnormally");
        }

        let hosted = std::mem::take(&mut *self.hosted.lock().await);
        let outcome = stop_services(&hosted).await;
        info!("MCP server stopped");
        outcome
    }

    /// Release everything without waiting
    pub fn dispose(&self) {
        self.shutdown.cancel();
        if let Some(abort) = lock(&self.abort).take() {
            abort.abort();
        }
        lock(&self.endpoint).take();
    }

    /// Services resolved by tools
    pub fn services(&self) -> &Arc<ServiceProvider> {
        &self.shared.services
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.shared.tools
    }

    /// Identity reported in the handshake
    pub fn server_info(&self) -> &Implementation {
        &self.shared.server_info
    }

    /// Whether the protocol loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && !self.stopped.load(Ordering::Acquire)
            && !self.shutdown.is_cancelled()
    }
}

impl Drop for McpServer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("server_info", &self.shared.server_info)
            .field("tools", &self.shared.tools)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn stop_services(services: &[Arc<dyn HostedService>]) -> Result<()> {
    let mut first_error = None;
    for service in services.iter().rev() {
        debug!(service = service.name(), "Stopping hosted service");
        if let Err(err) = service.stop().await {
            warn!(service = service.name(), error = %err, "Hosted service failed to stop");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

async fn serve(shared: Arc<ServerShared>, endpoint: ServerEndpoint, shutdown: CancellationToken) {
    let (read, write) = endpoint.into_split();
    let mut reader = JsonLineReader::new(read);
    let mut writer = JsonLineWriter::new(write);

    let handshake_deadline = tokio::time::sleep(shared.initialization_timeout);
    tokio::pin!(handshake_deadline);
    let mut awaiting_initialize = true;

    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Server loop cancelled");
                break;
            }
            _ = &mut handshake_deadline, if awaiting_initialize => {
                warn!(
                    timeout = ?shared.initialization_timeout,
                    "Client did not initialize within the timeout"
                );
                awaiting_initialize = false;
                continue;
            }
            received = reader.recv() => received,
        };

        let reply = match received {
            Ok(Some(value)) => {
                if is_initialize(&value) {
                    awaiting_initialize = false;
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    reply = shared.handle(value) => reply,
                }
            }
            Ok(None) => {
                debug!("Client closed the connection");
                break;
            }
            Err(TransportError::Serialization(msg)) => {
                warn!(error = %msg, "Received unparseable message");
                Some(error_reply(
                    None,
                    JsonRpcError::new(error_codes::PARSE_ERROR, "Parse error"),
                ))
            }
            Err(err) => {
                warn!(error = %err, "Server read failed");
                break;
            }
        };

        if let Some(reply) = reply
            && let Err(err) = writer.send(&reply).await
        {
            warn!(error = %err, "Failed to send reply");
            break;
        }
    }

    if let Err(err) = writer.shutdown().await {
        debug!(error = %err, "Server writer shutdown failed");
    }
}

fn is_initialize(value: &Value) -> bool {
    value.get("method").and_then(Value::as_str) == Some(methods::INITIALIZE)
}

fn error_reply(id: Option<RequestId>, error: JsonRpcError) -> JsonRpcMessage {
    JsonRpcErrorResponse::new(id, error).into()
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn encode_result<T: Serialize>(result: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(result)
        .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
}

impl ServerShared {
    async fn handle(&self, value: Value) -> Option<JsonRpcMessage> {
        let fallback_id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        let message = match JsonRpcMessage::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Received invalid request");
                return Some(error_reply(
                    fallback_id,
                    JsonRpcError::new(error_codes::INVALID_REQUEST, err.to_string()),
                ));
            }
        };

        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                if notification.method == methods::INITIALIZED {
                    debug!("Client completed initialization");
                } else {
                    debug!(method = %notification.method, "Ignoring notification");
                }
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                debug!("Ignoring unsolicited response");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!(id = %request.id, method = %request.method, "Handling request");

        let outcome = match request.method.as_str() {
            methods::INITIALIZE => self.initialize(request.params),
            methods::PING => Ok(Value::Object(Default::default())),
            methods::TOOLS_LIST => encode_result(&ListToolsResult {
                tools: self.tools.descriptors(),
                next_cursor: None,
            }),
            methods::TOOLS_CALL => self.call_tool(request.params).await,
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::new(request.id, result).into(),
            Err(error) => error_reply(Some(request.id), error),
        }
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: InitializeParams = decode_params(params)?;
        info!(
            client = %params.client_info.name,
            version = %params.client_info.version,
            protocol = %params.protocol_version,
            "Client connected"
        );

        encode_result(&InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = decode_params(params)?;
        let tool = self.tools.get(&params.name).ok_or_else(|| {
            JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            )
        })?;

        let arguments = params.arguments.map(Value::Object).unwrap_or(Value::Null);
        let ctx = ToolContext::new(Arc::clone(&self.services));
        let outcome = tool.execute(&ctx, arguments).await;
        if let Err(err) = &outcome {
            debug!(tool = %params.name, error = %err, "Tool reported failure");
        }

        encode_result(&to_call_result(outcome))
    }
}
