//! Convenience wrapper for assertions against a connected client

use crate::error::{FactoryError, FactoryResult};
use crate::factory::McpServerFactory;
use mcpfactory_runtime::McpClient;
use serde_json::Value;
use std::sync::Arc;

/// Shortcuts over [`McpClient`] for tests
#[derive(Debug, Clone)]
pub struct McpTestClient {
    client: Arc<McpClient>,
}

impl McpTestClient {
    /// Wrap a connected client
    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }

    /// Connect through `factory` and wrap the shared client
    pub async fn connect(factory: &McpServerFactory) -> FactoryResult<Self> {
        Ok(Self::new(factory.connect().await?))
    }

    /// Names of every registered tool, in registration order
    pub async fn tool_names(&self) -> FactoryResult<Vec<String>> {
        let tools = self.client.list_tools().await?;
        Ok(tools.into_iter().map(|tool| tool.name).collect())
    }

    /// Call `name` and return the first text block of its result
    ///
    /// Error results are returned as text too; use [`inner`](Self::inner)
    /// to inspect `is_error`.
    ///
    /// # Errors
    ///
    /// [`FactoryError::MissingContent`] if the result has no text block.
    pub async fn call_tool_for_text(&self, name: &str, arguments: Value) -> FactoryResult<String> {
        let result = self.client.call_tool(name, arguments).await?;
        result
            .first_text()
            .map(str::to_owned)
            .ok_or_else(|| FactoryError::MissingContent {
                tool: name.to_string(),
            })
    }

    /// The wrapped client
    pub fn inner(&self) -> &Arc<McpClient> {
        &self.client
    }

    /// Close the wrapped client
    ///
    /// The client is shared with the factory, so this closes it for every
    /// holder.
    pub async fn dispose(&self) {
        self.client.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FactoryOptions;
    use async_trait::async_trait;
    use mcpfactory_protocol::LATEST_PROTOCOL_VERSION;
    use mcpfactory_runtime::{ClientOptions, SdkTool, SdkToolError, ToolContext};
    use mcpfactory_transport::{DuplexTransport, JsonLineReader, JsonLineWriter, ServerEndpoint};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct EmptyTool;

    #[async_trait]
    impl SdkTool for EmptyTool {
        fn name(&self) -> &str {
            "empty"
        }

        fn description(&self) -> &str {
            "Returns an empty array"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<Value, SdkToolError> {
            Ok(json!([]))
        }
    }

    fn factory() -> McpServerFactory {
        McpServerFactory::builder()
            .configure_server(|server| {
                server
                    .tool("echo", "Echo the message", |input: Value| async move {
                        Ok::<_, SdkToolError>(input["message"].clone())
                    })
                    .add_tool(Arc::new(EmptyTool));
            })
            .options(FactoryOptions::default())
            .build()
    }

    #[tokio::test]
    async fn test_tool_names_in_registration_order() {
        let factory = factory();
        let client = McpTestClient::connect(&factory).await.unwrap();
        assert_eq!(client.tool_names().await.unwrap(), vec!["echo", "empty"]);
        factory.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_call_tool_for_text() {
        let factory = factory();
        let client = McpTestClient::connect(&factory).await.unwrap();
        let text = client
            .call_tool_for_text("echo", json!({"message": "hello"}))
            .await
            .unwrap();
        assert_eq!(text, "hello");
        factory.dispose().await.unwrap();
    }

    /// Answers the handshake, then returns image-only content for every call
    async fn image_only_server(endpoint: ServerEndpoint) {
        let (reader, writer) = endpoint.into_split();
        let mut reader = JsonLineReader::new(reader);
        let mut writer = JsonLineWriter::new(writer);

        while let Ok(Some(message)) = reader.recv().await {
            let Some(id) = message.get("id").cloned() else {
                continue;
            };
            let result = match message["method"].as_str() {
                Some("initialize") => json!({
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "images", "version": "0.0.1"}
                }),
                _ => json!({
                    "content": [{"type": "image", "data": "AA==", "mimeType": "image/png"}]
                }),
            };
            let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
            if writer.send(&response).await.is_err() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_missing_content() {
        let transport = DuplexTransport::open();
        tokio::spawn(image_only_server(transport.server_endpoint()));

        let client = McpClient::connect(
            transport.client_endpoint(),
            ClientOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let client = McpTestClient::new(Arc::new(client));

        let err = client
            .call_tool_for_text("snapshot", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, FactoryError::MissingContent { tool } if tool == "snapshot"));

        client.dispose().await;
        transport.close();
    }
}
