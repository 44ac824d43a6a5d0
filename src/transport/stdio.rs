//! Stdio transport
//!
//! Newline-delimited JSON-RPC over stdin/stdout for local MCP clients. All
//! logging goes to stderr so stdout stays a clean protocol channel.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{JsonRpcMessage, McpMessage, MessageHandler, RpcError, Transport};

pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    async fn write_message(
        stdout: &mut tokio::io::Stdout,
        message: &McpMessage,
    ) -> Result<()> {
        let line = serde_json::to_string(&message.to_jsonrpc())?;
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()> {
        info!("Starting stdio transport");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received message: {}", line);

            let parsed: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    error!("Failed to parse JSON-RPC message: {}", e);
                    continue;
                }
            };

            let message = match McpMessage::from_jsonrpc(parsed) {
                Ok(message) => message,
                Err((id, rpc_error)) => {
                    let response = McpMessage::Response {
                        id,
                        result: None,
                        error: Some(rpc_error),
                    };
                    Self::write_message(&mut stdout, &response).await?;
                    continue;
                }
            };

            match handler.handle_message(message).await {
                Ok(Some(response)) => Self::write_message(&mut stdout, &response).await?,
                Ok(None) => {}
                Err(e) => {
                    error!("Handler error: {}", e);
                    let response = McpMessage::Response {
                        id: serde_json::Value::Null,
                        result: None,
                        error: Some(RpcError::internal(e.to_string())),
                    };
                    Self::write_message(&mut stdout, &response).await?;
                }
            }
        }

        info!("Stdin closed, stdio transport exiting");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
