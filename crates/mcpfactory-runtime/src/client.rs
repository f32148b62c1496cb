//! In-process MCP client
//!
//! Owns the client endpoint of a duplex transport. A background reader task
//! routes responses to the request that is waiting for them; requests are
//! correlated by numeric id.

use crate::error::{Result, RuntimeError};
use mcpfactory_protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, Implementation, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListToolsResult, RequestId,
    ServerCapabilities, Tool, error_codes, methods,
};
use mcpfactory_transport::{
    ClientEndpoint, JsonLineReader, JsonLineWriter, PipeReader, PipeWriter, TransportError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bound on the `initialize` exchange
pub const DEFAULT_CLIENT_INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection options for [`McpClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Identity sent in `initialize`
    pub client_info: Implementation,

    /// Bound on the `initialize` exchange
    pub initialization_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_info: Implementation::new("McpServerFactoryClient", "1.0.0"),
            initialization_timeout: DEFAULT_CLIENT_INITIALIZATION_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client identity
    pub fn with_client_info(mut self, info: Implementation) -> Self {
        self.client_info = info;
        self
    }

    /// Set the handshake bound
    pub fn with_initialization_timeout(mut self, timeout: Duration) -> Self {
        self.initialization_timeout = timeout;
        self
    }
}

type Waiter = oneshot::Sender<std::result::Result<Value, JsonRpcError>>;
type PendingMap = Arc<Mutex<HashMap<i64, Waiter>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Request/response plumbing shared by the client and its reader task
struct Channel {
    writer: Arc<tokio::sync::Mutex<JsonLineWriter<PipeWriter>>>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    next_id: AtomicI64,
    shutdown: CancellationToken,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    fn open(endpoint: ClientEndpoint) -> Self {
        let (read, write) = endpoint.into_split();
        let writer = Arc::new(tokio::sync::Mutex::new(JsonLineWriter::new(write)));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let reader_task = tokio::spawn(read_loop(
            JsonLineReader::new(read),
            Arc::clone(&writer),
            Arc::clone(&pending),
            Arc::clone(&closed),
            shutdown.clone(),
        ));

        Self {
            writer,
            pending,
            closed,
            next_id: AtomicI64::new(1),
            shutdown,
            reader_task: Mutex::new(Some(reader_task)),
        }
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            // Checked under the lock so a concurrent close cannot strand the waiter.
            let mut pending = lock(&self.pending);
            if self.closed.load(Ordering::Acquire) {
                return Err(RuntimeError::ClientClosed);
            }
            pending.insert(id, tx);
        }

        let request = JsonRpcRequest::new(RequestId::Number(id), method, params);
        if let Err(err) = self.writer.lock().await.send(&request).await {
            lock(&self.pending).remove(&id);
            return Err(err.into());
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(RuntimeError::JsonRpc(error)),
            Err(_) => Err(RuntimeError::ClientClosed),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RuntimeError::ClientClosed);
        }
        let notification = JsonRpcNotification::new(method, params);
        self.writer.lock().await.send(&notification).await?;
        Ok(())
    }

    async fn close(&self) {
        mark_closed(&self.pending, &self.closed);
        self.shutdown.cancel();

        if let Err(err) = self.writer.lock().await.shutdown().await {
            debug!(error = %err, "Client writer shutdown failed");
        }

        let task = lock(&self.reader_task).take();
        if let Some(task) = task
            && let Err(err) = task.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "Client reader ended abnormally");
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn mark_closed(pending: &PendingMap, closed: &AtomicBool) {
    let mut pending = lock(pending);
    closed.store(true, Ordering::Release);
    // Dropping the senders fails every waiter with ClientClosed.
    pending.clear();
}

async fn read_loop(
    mut reader: JsonLineReader<PipeReader>,
    writer: Arc<tokio::sync::Mutex<JsonLineWriter<PipeWriter>>>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = reader.recv() => received,
        };

        let value = match received {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("Server closed the connection");
                break;
            }
            Err(TransportError::Serialization(msg)) => {
                warn!(error = %msg, "Discarding unparseable server message");
                continue;
            }
            Err(err) => {
                warn!(error = %err, "Client read failed");
                break;
            }
        };

        match JsonRpcMessage::from_value(value) {
            Ok(JsonRpcMessage::Response(response)) => complete(&pending, response.id, Ok(response.result)),
            Ok(JsonRpcMessage::Error(JsonRpcErrorResponse { id: Some(id), error, .. })) => {
                complete(&pending, id, Err(error))
            }
            Ok(JsonRpcMessage::Error(response)) => {
                warn!(error = %response.error, "Server reported an uncorrelated error");
            }
            Ok(JsonRpcMessage::Request(request)) => {
                let reply: JsonRpcMessage = if request.method == methods::PING {
                    JsonRpcResponse::new(request.id, Value::Object(Default::default())).into()
                } else {
                    JsonRpcErrorResponse::new(
                        Some(request.id),
                        JsonRpcError::new(
                            error_codes::METHOD_NOT_FOUND,
                            format!("Method not found: {}", request.method),
                        ),
                    )
                    .into()
                };
                if let Err(err) = writer.lock().await.send(&reply).await {
                    debug!(error = %err, "Failed to answer server request");
                }
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Ignoring server notification");
            }
            Err(err) => warn!(error = %err, "Discarding invalid server message"),
        }
    }

    mark_closed(&pending, &closed);
}

fn complete(
    pending: &PendingMap,
    id: RequestId,
    outcome: std::result::Result<Value, JsonRpcError>,
) {
    let waiter = match id {
        RequestId::Number(n) => lock(pending).remove(&n),
        RequestId::String(_) => None,
    };

    match waiter {
        // The caller may have given up; nothing to do then.
        Some(waiter) => {
            let _ = waiter.send(outcome);
        }
        None => debug!(%id, "Response for unknown request"),
    }
}

/// A connected MCP client
pub struct McpClient {
    channel: Channel,
    initialize: InitializeResult,
    options: ClientOptions,
}

impl McpClient {
    /// Connect over `endpoint` and complete the handshake
    ///
    /// Sends `initialize`, waits for its result within
    /// [`ClientOptions::initialization_timeout`], then sends
    /// `notifications/initialized`. On any failure the connection is closed
    /// before the error is returned.
    pub async fn connect(
        endpoint: ClientEndpoint,
        options: ClientOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let channel = Channel::open(endpoint);
        match Self::handshake(&channel, &options, cancel).await {
            Ok(initialize) => {
                info!(
                    server = %initialize.server_info.name,
                    version = %initialize.server_info.version,
                    "MCP client connected"
                );
                Ok(Self {
                    channel,
                    initialize,
                    options,
                })
            }
            Err(err) => {
                debug!(error = %err, "Handshake failed, closing client");
                channel.close().await;
                Err(err)
            }
        }
    }

    async fn handshake(
        channel: &Channel,
        options: &ClientOptions,
        cancel: &CancellationToken,
    ) -> Result<InitializeResult> {
        let params = serde_json::to_value(InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: options.client_info.clone(),
        })?;

        let exchange = async {
            let result = channel.request(methods::INITIALIZE, Some(params)).await?;
            let initialize: InitializeResult = serde_json::from_value(result)?;
            channel.notify(methods::INITIALIZED, None).await?;
            Ok::<_, RuntimeError>(initialize)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
            outcome = tokio::time::timeout(options.initialization_timeout, exchange) => {
                outcome.unwrap_or(Err(RuntimeError::Timeout {
                    operation: "initialize",
                    timeout: options.initialization_timeout,
                }))
            }
        }
    }

    /// List the server's tools
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.channel.request(methods::TOOLS_LIST, None).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    /// Invoke a tool
    ///
    /// `arguments` must be a JSON object or `null`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(RuntimeError::Serialization(format!(
                    "tool arguments must be a JSON object, got {}",
                    other
                )));
            }
        };

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.channel.request(methods::TOOLS_CALL, Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Round-trip a `ping`
    pub async fn ping(&self) -> Result<()> {
        self.channel.request(methods::PING, None).await?;
        Ok(())
    }

    /// Identity the server reported
    pub fn server_info(&self) -> &Implementation {
        &self.initialize.server_info
    }

    /// Instructions the server reported
    pub fn instructions(&self) -> Option<&str> {
        self.initialize.instructions.as_deref()
    }

    /// Capabilities the server reported
    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.initialize.capabilities
    }

    /// Protocol revision the server agreed to
    pub fn protocol_version(&self) -> &str {
        &self.initialize.protocol_version
    }

    /// Options this client connected with
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Whether the connection is still usable
    pub fn is_connected(&self) -> bool {
        !self.channel.closed.load(Ordering::Acquire)
    }

    /// Close the connection
    ///
    /// Pending requests fail with [`RuntimeError::ClientClosed`]. Idempotent.
    pub async fn close(&self) {
        self.channel.close().await;
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server_info", self.server_info())
            .field("connected", &self.is_connected())
            .finish()
    }
}
