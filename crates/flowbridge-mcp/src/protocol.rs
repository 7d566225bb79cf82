//! JSON-RPC 2.0 protocol types for MCP.
//!
//! Outbound messages have a fixed shape. Inbound lines carry no enforced
//! schema, so [`InboundMessage::classify`] infers a variant from whichever
//! fields are present.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version sent in the optional initialize handshake.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names used by the tool API.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Tool names exposed by the bridged server.
pub mod tools {
    pub const UPLOAD_FILE: &str = "upload_file";
    pub const ANALYZE_FILES: &str = "analyze_files";
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Base Types
// ─────────────────────────────────────────────────────────────────────────────

/// An outbound JSON-RPC request.
///
/// `params` is always present and always an object; an empty call sends `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Session-unique request id.
    pub id: u64,
    /// Method name to call.
    pub method: String,
    /// Method parameters.
    pub params: Map<String, Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Identifier carried by inbound messages. Servers may echo numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl RequestId {
    /// The numeric id, if this is one of ours.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// One parsed inbound line, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `id` plus `result` (or neither `result` nor `error`).
    Response { id: RequestId, result: Value },
    /// `id` plus `error`.
    Error { id: RequestId, error: JsonRpcError },
    /// `method` without `id`.
    Notification { method: String, params: Option<Value> },
    /// `method` with `id`: the server calling back into the client.
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    /// Valid JSON that is none of the above.
    Other(Value),
}

impl InboundMessage {
    /// Infer the message variant from the fields present on `value`.
    pub fn classify(value: Value) -> Self {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => return Self::Other(other),
        };

        let id = obj.get("id").and_then(RequestId::from_value);
        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (id, method) {
            (Some(id), Some(method)) => Self::Request {
                id,
                method,
                params: obj.remove("params"),
            },
            (None, Some(method)) => Self::Notification {
                method,
                params: obj.remove("params"),
            },
            (Some(id), None) => {
                if let Some(error) = obj.get("error") {
                    if let Ok(error) = serde_json::from_value::<JsonRpcError>(error.clone()) {
                        return Self::Error { id, error };
                    }
                }
                if obj.contains_key("error") {
                    return Self::Other(Value::Object(obj));
                }
                Self::Response {
                    id,
                    result: obj.remove("result").unwrap_or(Value::Null),
                }
            }
            (None, None) => Self::Other(Value::Object(obj)),
        }
    }

    /// The id, for responses and errors.
    pub fn response_id(&self) -> Option<&RequestId> {
        match self {
            Self::Response { id, .. } | Self::Error { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
            Self::Notification { .. } => "notification",
            Self::Request { .. } => "request",
            Self::Other(_) => "other",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP Protocol Types
// ─────────────────────────────────────────────────────────────────────────────

/// Client info sent during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "flowbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version.
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: Value,
    /// Client info.
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: Value::Object(Map::new()),
            client_info: ClientInfo::default(),
        }
    }
}

/// A tool definition from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Result of the tools/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// List of available tools.
    pub tools: Vec<ToolInfo>,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Value,
}

/// Arguments of the `upload_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileArgs {
    pub file_name: String,
    pub file_content: String,
}

/// Arguments of the `analyze_files` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeFilesArgs {
    pub file_paths: Vec<String>,
}

/// Content item in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Image content (base64 encoded).
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource reference.
    Resource {
        /// Resource payload as sent by the server.
        resource: Value,
    },
}

/// Result of the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool.
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Text items of the result joined by newlines, or `None` if there are none.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Check if the tool call was an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Serialize `value` into a params object.
pub(crate) fn to_params<T: Serialize>(value: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}
