//! Error types for MCP session operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::RequestId;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
///
/// Malformed inbound lines and process exit are not errors; they surface
/// through [`SessionObserver`](crate::SessionObserver) hooks and session state.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be spawned.
    #[error("failed to launch MCP server: {0}")]
    Launch(String),

    /// Readiness was not observed within the connect window.
    #[error("MCP server not ready after {}ms", .0.as_millis())]
    ConnectionTimeout(Duration),

    /// A send was attempted while the session is not connected.
    #[error("not connected to MCP server")]
    NotConnected,

    /// Upload requested for a path that does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Writing to the server's stdin failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A correlated response had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered a correlated request with an error object.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// No response arrived for a correlated request in time.
    #[error("request {id} timed out after {}ms", .timeout.as_millis())]
    RequestTimeout {
        /// Id of the request that timed out.
        id: RequestId,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The server went away while a correlated request was pending.
    #[error("connection closed")]
    ConnectionClosed,
}

impl McpError {
    /// Create a launch error.
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error object.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Whether reconnecting is enough to recover from this error.
    pub fn is_recoverable_by_reconnect(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionTimeout(_) | Self::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::launch("npx: not found");
        assert!(err.to_string().contains("launch"));
        assert!(err.to_string().contains("npx: not found"));

        let err = McpError::ConnectionTimeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "MCP server not ready after 3000ms");

        let err = McpError::FileNotFound(PathBuf::from("/tmp/missing.cbl"));
        assert!(err.to_string().contains("/tmp/missing.cbl"));

        let err = McpError::server_error(-32601, "Method not found", None);
        assert!(err.to_string().contains("-32601"));
        assert!(err.to_string().contains("Method not found"));
    }

    #[test]
    fn test_recoverable_by_reconnect() {
        assert!(McpError::NotConnected.is_recoverable_by_reconnect());
        assert!(McpError::ConnectionClosed.is_recoverable_by_reconnect());
        assert!(!McpError::FileNotFound(PathBuf::from("x")).is_recoverable_by_reconnect());
        assert!(!McpError::launch("boom").is_recoverable_by_reconnect());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let mcp_err: McpError = json_err.into();
        assert!(matches!(mcp_err, McpError::Json(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let mcp_err: McpError = io_err.into();
        assert!(matches!(mcp_err, McpError::Io(_)));
    }
}
