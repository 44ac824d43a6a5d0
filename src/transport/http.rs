//! HTTP transport
//!
//! JSON-RPC 2.0 over HTTP POST. Both `/mcp` and `/mcp-v2` resolve to the same
//! dispatcher so older clients configured against the legacy path keep
//! working. Handler failures map to HTTP 500 with a -32603 body carrying the
//! request id; every other outcome, including tool-level errors, is HTTP 200.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use super::{JsonRpcMessage, McpMessage, MessageHandler, RpcError, Transport};
use crate::VERSION;

#[derive(Clone)]
struct AppState {
    handler: Arc<dyn MessageHandler + Send + Sync>,
}

pub struct HttpTransport {
    host: String,
    port: u16,
    shutdown: Arc<Notify>,
}

impl HttpTransport {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()> {
        let state = AppState {
            handler: Arc::from(handler),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/", get(service_info))
            .route("/health", get(health))
            .route("/mcp", get(service_info).post(mcp_endpoint))
            .route("/mcp-v2", post(mcp_endpoint))
            .layer(cors)
            .with_state(state);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP transport listening on {}", addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;

        info!("HTTP transport stopped");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown.notify_waiters();
        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": VERSION }))
}

async fn service_info() -> impl IntoResponse {
    Json(json!({
        "name": "etabeb-mcp",
        "version": VERSION,
        "protocol": "mcp",
        "transport": "http",
        "endpoints": { "mcp": "/mcp", "legacy": "/mcp-v2", "health": "/health" },
    }))
}

fn rpc_response(status: StatusCode, body: &JsonRpcMessage) -> Response {
    (
        status,
        [(header::CACHE_CONTROL, "no-store")],
        Json(serde_json::to_value(body).unwrap_or(Value::Null)),
    )
        .into_response()
}

fn error_body(id: Value, error: RpcError) -> JsonRpcMessage {
    McpMessage::Response {
        id,
        result: None,
        error: Some(error),
    }
    .to_jsonrpc()
}

async fn mcp_endpoint(State(state): State<AppState>, body: String) -> Response {
    let parsed: JsonRpcMessage = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            return rpc_response(
                StatusCode::OK,
                &error_body(Value::Null, RpcError::parse_error(format!("Parse error: {e}"))),
            );
        }
    };

    let message = match McpMessage::from_jsonrpc(parsed) {
        Ok(message) => message,
        Err((id, rpc_error)) => {
            return rpc_response(StatusCode::OK, &error_body(id, rpc_error));
        }
    };

    let request_id = match &message {
        McpMessage::Initialize { id, .. }
        | McpMessage::Initialized { id }
        | McpMessage::ToolsList { id }
        | McpMessage::ToolsCall { id, .. }
        | McpMessage::ResourcesList { id }
        | McpMessage::ResourcesRead { id, .. }
        | McpMessage::Unknown { id, .. }
        | McpMessage::Response { id, .. } => id.clone(),
    };

    match state.handler.handle_message(message).await {
        Ok(Some(response)) => rpc_response(StatusCode::OK, &response.to_jsonrpc()),
        Ok(None) => rpc_response(
            StatusCode::OK,
            &McpMessage::Response {
                id: request_id,
                result: Some(json!({})),
                error: None,
            }
            .to_jsonrpc(),
        ),
        Err(e) => {
            error!("Request handling failed: {:#}", e);
            rpc_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &error_body(request_id, RpcError::internal("Internal error")),
            )
        }
    }
}
