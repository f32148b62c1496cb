//! Minimal smoke run: host an echo tool in-process and call it once
//!
//! ```bash
//! RUST_LOG=debug cargo run -p mcpfactory --example minimal_smoke
//! ```

use anyhow::Context;
use mcpfactory::{McpServerFactory, McpServerIntegrationFactory, SdkToolError};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct EchoArgs {
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let factory: McpServerIntegrationFactory = McpServerFactory::builder()
        .configure_server(|server| {
            server.tool("echo", "Echo the message back", |args: EchoArgs| async move {
                Ok::<_, SdkToolError>(args.message)
            });
        })
        .build();

    let client = factory.connect().await?;
    let result = client
        .call_tool("echo", json!({"message": "hello from minimal_smoke"}))
        .await?;

    let text = result.first_text().context("echo returned no text content")?;
    println!("Tool response: {}", text);

    factory.dispose().await?;
    Ok(())
}
