//! Teardown and rollback ordering, traced through a wrapping runtime

use async_trait::async_trait;
use mcpfactory::{
    CancellationToken, ClientEndpoint, ClientOptions, DuplexTransport, FactoryError,
    FactoryOptions, FactoryResult, HarnessRuntime, LifecyclePhase, ManagedClient, ManagedServer,
    McpClient, McpRuntime, McpServer, McpServerFactory, RuntimeError, SdkToolError,
    ServerEndpoint, ServiceProvider, TransportError,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default, Debug)]
struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, step: &'static str) {
        self.0.lock().unwrap().push(step);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

struct TracedServer {
    inner: McpServer,
    log: CallLog,
    hang_on_stop: bool,
    // Never brings the loop up, so nothing answers the client.
    silent: bool,
}

#[async_trait]
impl ManagedServer for TracedServer {
    type Services = ServiceProvider;

    async fn start(&self, cancel: &CancellationToken) -> FactoryResult<()> {
        self.log.push("server.start");
        if self.silent {
            return Ok(());
        }
        ManagedServer::start(&self.inner, cancel).await
    }

    async fn stop(&self) -> FactoryResult<()> {
        self.log.push("server.stop");
        if self.hang_on_stop {
            std::future::pending::<()>().await;
        }
        ManagedServer::stop(&self.inner).await
    }

    async fn dispose(&self) -> FactoryResult<()> {
        self.log.push("server.dispose");
        ManagedServer::dispose(&self.inner).await
    }

    fn services(&self) -> Arc<ServiceProvider> {
        ManagedServer::services(&self.inner)
    }
}

#[derive(Debug)]
struct TracedClient {
    inner: McpClient,
    log: CallLog,
}

#[async_trait]
impl ManagedClient for TracedClient {
    async fn dispose(&self) -> FactoryResult<()> {
        self.log.push("client.dispose");
        self.inner.close().await;
        Ok(())
    }
}

#[derive(Default)]
struct TracedRuntime {
    inner: McpRuntime,
    log: CallLog,
    fail_next_connect: AtomicBool,
    fail_close_transport: bool,
    hang_on_stop: bool,
    silent_server: bool,
}

impl TracedRuntime {
    fn new() -> Self {
        Self {
            inner: McpRuntime::new().configure_server(|server| {
                server.tool("ping", "Reply with pong", |_: Value| async move {
                    Ok::<_, SdkToolError>("pong")
                });
            }),
            ..Self::default()
        }
    }
}

#[async_trait]
impl HarnessRuntime for TracedRuntime {
    type Server = TracedServer;
    type Client = TracedClient;

    fn open_transport(&self) -> DuplexTransport {
        self.log.push("transport.open");
        DuplexTransport::open()
    }

    fn build_server(
        &self,
        endpoint: ServerEndpoint,
        options: &FactoryOptions,
    ) -> FactoryResult<TracedServer> {
        self.log.push("server.build");
        Ok(TracedServer {
            inner: self.inner.build_server(endpoint, options)?,
            log: self.log.clone(),
            hang_on_stop: self.hang_on_stop,
            silent: self.silent_server,
        })
    }

    fn client_options(&self, options: &FactoryOptions) -> ClientOptions {
        self.inner.client_options(options)
    }

    async fn connect_client(
        &self,
        endpoint: ClientEndpoint,
        options: ClientOptions,
        cancel: &CancellationToken,
    ) -> FactoryResult<TracedClient> {
        self.log.push("client.connect");
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(FactoryError::startup("injected connect failure"));
        }
        Ok(TracedClient {
            inner: self.inner.connect_client(endpoint, options, cancel).await?,
            log: self.log.clone(),
        })
    }

    async fn close_transport(&self, transport: &DuplexTransport) -> FactoryResult<()> {
        self.log.push("transport.close");
        transport.close();
        if self.fail_close_transport {
            return Err(TransportError::Other("injected close failure".to_string()).into());
        }
        Ok(())
    }
}

const BUILD_STEPS: [&str; 4] = [
    "transport.open",
    "server.build",
    "server.start",
    "client.connect",
];

#[tokio::test]
async fn test_teardown_disposes_client_and_server_before_transport_failure() {
    let runtime = TracedRuntime {
        fail_close_transport: true,
        ..TracedRuntime::new()
    };
    let log = runtime.log.clone();
    let factory = McpServerFactory::with_runtime(runtime, FactoryOptions::default());

    factory.connect().await.unwrap();
    let err = factory.dispose().await.unwrap_err();

    assert!(matches!(
        err,
        FactoryError::Transport(TransportError::Other(ref msg)) if msg == "injected close failure"
    ));
    let mut expected = BUILD_STEPS.to_vec();
    expected.extend([
        "client.dispose",
        "server.stop",
        "server.dispose",
        "transport.close",
    ]);
    assert_eq!(log.entries(), expected);
    assert_eq!(factory.phase(), LifecyclePhase::Disposed);
}

#[tokio::test]
async fn test_second_dispose_does_no_work() {
    let runtime = TracedRuntime::new();
    let log = runtime.log.clone();
    let factory = McpServerFactory::with_runtime(runtime, FactoryOptions::default());

    factory.connect().await.unwrap();
    factory.dispose().await.unwrap();
    let after_first = log.entries();

    factory.dispose().await.unwrap();
    assert_eq!(log.entries(), after_first);
}

#[tokio::test]
async fn test_hanging_stop_is_bounded_and_server_still_disposed() {
    let runtime = TracedRuntime {
        hang_on_stop: true,
        ..TracedRuntime::new()
    };
    let log = runtime.log.clone();
    let options = FactoryOptions::default().with_shutdown_timeout(Duration::from_millis(50));
    let factory = McpServerFactory::with_runtime(runtime, options);

    factory.connect().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), factory.dispose())
        .await
        .expect("dispose should finish within the shutdown bound")
        .unwrap();

    let entries = log.entries();
    assert_eq!(
        &entries[BUILD_STEPS.len()..],
        ["client.dispose", "server.stop", "server.dispose", "transport.close"]
    );
}

#[tokio::test]
async fn test_connect_failure_rolls_back_in_reverse_order_then_retries() {
    let runtime = TracedRuntime::new();
    runtime.fail_next_connect.store(true, Ordering::SeqCst);
    let log = runtime.log.clone();
    let factory = McpServerFactory::with_runtime(runtime, FactoryOptions::default());

    let err = factory.connect().await.unwrap_err();
    assert_eq!(err.to_string(), "Server startup failed: injected connect failure");
    assert_eq!(factory.phase(), LifecyclePhase::Uninitialized);

    let mut expected = BUILD_STEPS.to_vec();
    expected.extend(["server.stop", "server.dispose", "transport.close"]);
    assert_eq!(log.entries(), expected);

    let client = factory.connect().await.unwrap();
    let result = client.inner.call_tool("ping", Value::Null).await.unwrap();
    assert_eq!(result.first_text(), Some("pong"));

    factory.dispose().await.unwrap();
}

#[tokio::test]
async fn test_unanswered_handshake_times_out_and_rolls_back() {
    let runtime = TracedRuntime {
        silent_server: true,
        ..TracedRuntime::new()
    };
    let log = runtime.log.clone();
    let options = FactoryOptions::default().with_initialization_timeout(Duration::from_millis(50));
    let factory = McpServerFactory::with_runtime(runtime, options);

    let err = tokio::time::timeout(Duration::from_secs(5), factory.connect())
        .await
        .expect("handshake should give up within its timeout")
        .unwrap_err();

    assert!(matches!(
        err,
        FactoryError::Runtime(RuntimeError::Timeout {
            operation: "initialize",
            timeout,
        }) if timeout == Duration::from_millis(50)
    ));
    assert_eq!(factory.phase(), LifecyclePhase::Uninitialized);
    assert!(matches!(
        factory.services().await,
        Err(FactoryError::NotInitialized)
    ));

    let mut expected = BUILD_STEPS.to_vec();
    expected.extend(["server.stop", "server.dispose", "transport.close"]);
    assert_eq!(log.entries(), expected);
}

#[tokio::test]
async fn test_rollback_swallows_cleanup_failure() {
    let runtime = TracedRuntime {
        fail_close_transport: true,
        ..TracedRuntime::new()
    };
    runtime.fail_next_connect.store(true, Ordering::SeqCst);
    let factory = McpServerFactory::with_runtime(runtime, FactoryOptions::default());

    // The original failure wins over the transport close failure.
    let err = factory.connect().await.unwrap_err();
    assert!(matches!(err, FactoryError::Startup(_)));
    assert_eq!(factory.phase(), LifecyclePhase::Uninitialized);
}

#[tokio::test]
async fn test_services_follow_the_wrapped_server() {
    let factory = McpServerFactory::with_runtime(TracedRuntime::new(), FactoryOptions::default());
    assert!(factory.services().await.is_err());

    factory.connect().await.unwrap();
    let services = factory.services().await.unwrap();
    assert!(services.hosted_services().is_empty());

    factory.dispose().await.unwrap();
}
