// crates/mongodb-mcp/src/jsonrpc.rs
// ============================================================================
// Module: JSON-RPC Dispatcher
// Description: MCP JSON-RPC 2.0 envelopes and method dispatch.
// Purpose: Transport-independent handling of initialize, tools, prompts, and resources.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`McpDispatcher`] answers one decoded [`JsonRpcRequest`] at a time. Requests
//! without an `id` are notifications and produce no response. Tool failures
//! that happen after argument decoding are reported inside the tool result
//! (`isError`), never as JSON-RPC errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use crate::guides;
use crate::guides::GuideError;
use crate::tools::ToolError;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol version returned when the client does not propose one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";
/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "mongodb-mcp";
/// Server version reported by `initialize`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Invalid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Not a JSON-RPC request object.
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Unknown tool, prompt, or resource, or undecodable params.
pub const INVALID_PARAMS: i64 = -32602;
/// Server-side failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// HTTP method other than POST on the MCP endpoint.
pub const METHOD_NOT_ALLOWED: i64 = -32000;
/// Request body above the configured limit.
pub const BODY_TOO_LARGE: i64 = -32070;

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Incoming JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier; absent or null for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Returns true when no response is expected.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier (null when the request could not be read).
    pub id: Value,
    /// Successful result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

impl JsonRpcError {
    /// Builds an error with `code` and `message`.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ToolError> for JsonRpcError {
    fn from(error: ToolError) -> Self {
        Self::new(INVALID_PARAMS, error.to_string())
    }
}

impl From<GuideError> for JsonRpcError {
    fn from(error: GuideError) -> Self {
        match error {
            GuideError::UnknownResource(_)
            | GuideError::UnknownPrompt(_)
            | GuideError::NoSearchableResources => Self::new(INVALID_PARAMS, error.to_string()),
            GuideError::Store(_) => Self::new(INTERNAL_ERROR, error.to_string()),
        }
    }
}

/// Decodes raw bytes into a request, or the error response to send instead.
///
/// # Errors
///
/// Returns a `-32700` response for invalid JSON and `-32600` for JSON that
/// is not a request object.
pub fn parse_request(bytes: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| {
        JsonRpcResponse::failure(Value::Null, JsonRpcError::new(PARSE_ERROR, "parse error"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|_| {
        JsonRpcResponse::failure(id, JsonRpcError::new(INVALID_REQUEST, "invalid json-rpc request"))
    })
}

// ============================================================================
// SECTION: Params
// ============================================================================

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct PromptGetParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    protocol_version: Option<String>,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Transport-independent MCP method dispatcher.
#[derive(Clone)]
pub struct McpDispatcher {
    /// Tool router (owns the access mediator).
    router: ToolRouter,
}

impl McpDispatcher {
    /// Creates a dispatcher over `router`.
    #[must_use]
    pub const fn new(router: ToolRouter) -> Self {
        Self {
            router,
        }
    }

    /// Handles one request; returns `None` for notifications.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, "invalid json-rpc version"),
            ));
        }
        tracing::debug!(method = %request.method, "dispatching request");
        Some(match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let mediator = self.router.mediator();
        match method {
            "initialize" => {
                let params: InitializeParams = match params {
                    Some(params) => decode_params(params)?,
                    None => InitializeParams::default(),
                };
                Ok(initialize_result(params.protocol_version.as_deref()))
            }
            "ping" => Ok(json!({})),
            "tools/list" => to_value(&json!({ "tools": self.router.list_tools() })),
            "tools/call" => {
                let call: ToolCallParams = decode_params(params.unwrap_or(Value::Null))?;
                let outcome = self.router.handle_tool_call(&call.name, call.arguments).await?;
                to_value(&outcome)
            }
            "prompts/list" => to_value(&json!({ "prompts": guides::list_prompts() })),
            "prompts/get" => {
                let get: PromptGetParams = decode_params(params.unwrap_or(Value::Null))?;
                let prompt =
                    guides::get_prompt(&get.name, mediator.store().as_ref(), mediator.policy())
                        .await?;
                to_value(&prompt)
            }
            "resources/list" => to_value(&json!({ "resources": guides::list_resources() })),
            "resources/read" => {
                let read: ResourceReadParams = decode_params(params.unwrap_or(Value::Null))?;
                let content =
                    guides::read_resource(&read.uri, mediator.store().as_ref(), mediator.policy())
                        .await?;
                to_value(&json!({ "contents": [content] }))
            }
            _ => Err(JsonRpcError::new(METHOD_NOT_FOUND, format!("method not found: {method}"))),
        }
    }
}

/// Result payload of `initialize`.
fn initialize_result(requested: Option<&str>) -> Value {
    json!({
        "protocolVersion": requested.unwrap_or(DEFAULT_PROTOCOL_VERSION),
        "capabilities": {
            "tools": { "listChanged": false },
            "prompts": { "listChanged": false },
            "resources": { "listChanged": false, "subscribe": false }
        },
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION }
    })
}

fn decode_params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|err| JsonRpcError::new(INVALID_PARAMS, format!("invalid params: {err}")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|_| JsonRpcError::new(INTERNAL_ERROR, "serialization failed"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
