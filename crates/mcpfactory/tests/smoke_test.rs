//! End-to-end tool calls through the harness

use mcpfactory::{
    FactoryError, FactoryOptions, Implementation, McpServerFactory, McpTestClient, SdkToolError,
    ToolContext,
};
use rstest::rstest;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Deserialize)]
struct EchoArgs {
    message: String,
}

trait MessageProvider: Send + Sync {
    fn message(&self) -> String;
}

struct FixedMessageProvider(String);

impl MessageProvider for FixedMessageProvider {
    fn message(&self) -> String {
        self.0.clone()
    }
}

struct DefaultMessageProvider;

impl MessageProvider for DefaultMessageProvider {
    fn message(&self) -> String {
        "hello from the default provider".to_string()
    }
}

fn echo_factory(options: FactoryOptions) -> McpServerFactory {
    McpServerFactory::builder()
        .configure_server(|server| {
            server.tool("echo", "Echo the message", |args: EchoArgs| async move {
                Ok::<_, SdkToolError>(args.message)
            });
        })
        .options(options)
        .build()
}

#[tokio::test]
async fn test_registered_tool_can_be_listed_and_invoked() {
    let factory = echo_factory(FactoryOptions::default());
    let client = factory.connect().await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert!(tools.iter().any(|tool| tool.name == "echo"));

    let result = client
        .call_tool("echo", json!({"message": "hello"}))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("hello"));

    factory.dispose().await.unwrap();
}

#[tokio::test]
async fn test_dependency_override_is_used_by_tools() {
    let provider: Arc<dyn MessageProvider> =
        Arc::new(FixedMessageProvider("from-test-service".to_string()));
    let registered = Arc::clone(&provider);

    let factory = McpServerFactory::builder()
        .configure_services(|services| {
            services.add_singleton::<Arc<dyn MessageProvider>>(Arc::new(DefaultMessageProvider));
        })
        .configure_services(move |services| {
            services.add_singleton(Arc::clone(&registered));
        })
        .configure_server(|server| {
            server.tool_with_context("greet", "Greet via a service", |ctx: ToolContext, _: Value| async move {
                let provider = ctx.services().require::<Arc<dyn MessageProvider>>()?;
                Ok::<_, SdkToolError>(provider.message())
            });
        })
        .build();

    let client = McpTestClient::connect(&factory).await.unwrap();
    let text = client.call_tool_for_text("greet", Value::Null).await.unwrap();
    assert_eq!(text, "from-test-service");

    let services = factory.services().await.unwrap();
    let resolved = services.get::<Arc<dyn MessageProvider>>().unwrap();
    assert!(Arc::ptr_eq(resolved, &provider));

    factory.dispose().await.unwrap();
}

#[tokio::test]
async fn test_services_before_connect_are_unavailable() {
    let factory = echo_factory(FactoryOptions::default());

    assert!(matches!(
        factory.services().await,
        Err(FactoryError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_identity_and_instructions_reach_client() {
    let options = FactoryOptions::default()
        .with_server_info(Implementation::new("smoke-server", "3.1.4"))
        .with_server_instructions("Use terse responses.");
    let factory = echo_factory(options);

    let client = factory.connect().await.unwrap();
    assert_eq!(client.server_info(), &Implementation::new("smoke-server", "3.1.4"));
    assert_eq!(client.instructions(), Some("Use terse responses."));

    factory.dispose().await.unwrap();
}

#[rstest]
#[case::plain(json!({"message": "hello"}), "hello")]
#[case::unicode(json!({"message": "héllo wörld"}), "héllo wörld")]
#[case::empty(json!({"message": ""}), "")]
#[tokio::test]
async fn test_echo_returns_its_input(#[case] arguments: Value, #[case] expected: &str) {
    let factory = echo_factory(FactoryOptions::default());
    let client = McpTestClient::connect(&factory).await.unwrap();

    let text = client.call_tool_for_text("echo", arguments).await.unwrap();
    assert_eq!(text, expected);

    factory.dispose().await.unwrap();
}

#[tokio::test]
async fn test_bad_arguments_surface_as_tool_error() {
    let factory = echo_factory(FactoryOptions::default());
    let client = McpTestClient::connect(&factory).await.unwrap();

    let result = client
        .inner()
        .call_tool("echo", json!({"msg": "hello"}))
        .await
        .unwrap();
    assert!(result.is_error());

    factory.dispose().await.unwrap();
}

#[tokio::test]
async fn test_logging_can_be_reenabled() {
    let options = FactoryOptions::default().with_configure_logging(|logging| {
        logging.enable().set_max_level(tracing::Level::DEBUG);
    });
    let factory = echo_factory(options);

    let client = McpTestClient::connect(&factory).await.unwrap();
    assert_eq!(client.tool_names().await.unwrap(), vec!["echo"]);

    factory.dispose().await.unwrap();
}
