//! Transport layer for the MCP protocol
//!
//! Supports two transport methods:
//! - http: JSON-RPC 2.0 over HTTP POST, the primary integration path
//! - stdio: newline-delimited JSON-RPC for local MCP client integration

pub mod http;
pub mod stdio;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// JSON-RPC 2.0 message wrapper for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request {
        jsonrpc: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Response {
        jsonrpc: String,
        id: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<RpcError>,
    },
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: Self::METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: Self::PARSE_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

/// Initialize parameters. Every field is optional because clients vary; the
/// protocol version defaults to the baseline revision and is echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Tool call parameters. `_meta` carries caller context such as the
/// conversational session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Resource read parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadParams {
    pub uri: String,
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Internal MCP message representation routed to the dispatcher.
#[derive(Debug, Clone)]
pub enum McpMessage {
    Initialize { id: Value, params: InitializeParams },
    Initialized { id: Value },
    ToolsList { id: Value },
    ToolsCall { id: Value, params: ToolsCallParams },
    ResourcesList { id: Value },
    ResourcesRead { id: Value, params: ResourcesReadParams },
    /// Recognized envelope with an unrecognized method; answered with -32601.
    Unknown { id: Value, method: String },
    Response { id: Value, result: Option<Value>, error: Option<RpcError> },
}

impl McpMessage {
    /// Convert to a JSON-RPC message for serialization.
    pub fn to_jsonrpc(&self) -> JsonRpcMessage {
        match self {
            McpMessage::Response { id, result, error } => JsonRpcMessage::Response {
                jsonrpc: "2.0".to_string(),
                id: id.clone(),
                result: result.clone(),
                error: error.clone(),
            },
            McpMessage::Initialize { id, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "initialize".to_string(),
                params: serde_json::to_value(params).ok(),
            },
            McpMessage::Initialized { id } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "notifications/initialized".to_string(),
                params: None,
            },
            McpMessage::ToolsList { id } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "tools/list".to_string(),
                params: None,
            },
            McpMessage::ToolsCall { id, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "tools/call".to_string(),
                params: serde_json::to_value(params).ok(),
            },
            McpMessage::ResourcesList { id } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "resources/list".to_string(),
                params: None,
            },
            McpMessage::ResourcesRead { id, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: "resources/read".to_string(),
                params: serde_json::to_value(params).ok(),
            },
            McpMessage::Unknown { id, method } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(id.clone()),
                method: method.clone(),
                params: None,
            },
        }
    }

    /// Convert an incoming JSON-RPC message to the internal representation.
    ///
    /// Malformed params surface as an error carrying the request id so the
    /// caller can answer with -32602 instead of dropping the request.
    pub fn from_jsonrpc(message: JsonRpcMessage) -> Result<Self, (Value, RpcError)> {
        match message {
            JsonRpcMessage::Request { id, method, params, .. } => {
                let id = id.unwrap_or(Value::Null);
                let parse = |params: Option<Value>, id: &Value| -> Result<Value, (Value, RpcError)> {
                    params.ok_or_else(|| (id.clone(), RpcError::invalid_params("Missing params")))
                };

                match method.as_str() {
                    "initialize" => {
                        let params = match params {
                            Some(p) => serde_json::from_value(p).map_err(|e| {
                                (id.clone(), RpcError::invalid_params(format!("Invalid initialize params: {e}")))
                            })?,
                            None => InitializeParams {
                                protocol_version: None,
                                client_info: None,
                                capabilities: None,
                            },
                        };
                        Ok(McpMessage::Initialize { id, params })
                    }
                    "notifications/initialized" => Ok(McpMessage::Initialized { id }),
                    "tools/list" => Ok(McpMessage::ToolsList { id }),
                    "tools/call" => {
                        let raw = parse(params, &id)?;
                        let params = serde_json::from_value(raw).map_err(|e| {
                            (id.clone(), RpcError::invalid_params(format!("Invalid tool call params: {e}")))
                        })?;
                        Ok(McpMessage::ToolsCall { id, params })
                    }
                    "resources/list" => Ok(McpMessage::ResourcesList { id }),
                    "resources/read" => {
                        let raw = parse(params, &id)?;
                        let params = serde_json::from_value(raw).map_err(|e| {
                            (id.clone(), RpcError::invalid_params(format!("Invalid resource read params: {e}")))
                        })?;
                        Ok(McpMessage::ResourcesRead { id, params })
                    }
                    _ => Ok(McpMessage::Unknown { id, method }),
                }
            }
            JsonRpcMessage::Response { id, result, error, .. } => {
                Ok(McpMessage::Response { id, result, error })
            }
        }
    }
}

/// Message handler trait for processing incoming MCP messages.
#[async_trait]
pub trait MessageHandler {
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>>;
}

/// Trait for all transport implementations.
#[async_trait]
pub trait Transport {
    /// Start the transport and begin handling connections.
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()>;

    /// Stop the transport gracefully.
    async fn shutdown(&self) -> Result<()>;
}
