//! Observability hooks for a session.
//!
//! Every hook defaults to a `tracing` event, so implementors override only
//! what they need. Hooks run on the session's reader tasks and must not block.

use crate::protocol::{InboundMessage, JsonRpcRequest};

/// Receives everything a session sees on the wire and from the process.
pub trait SessionObserver: Send + Sync {
    /// A line parsed as JSON. This is the session's message handler.
    fn on_message(&self, message: &InboundMessage) {
        tracing::debug!(kind = message.kind(), message = ?message, "received MCP message");
    }

    /// A stdout line that was not JSON.
    fn on_unparsed_line(&self, line: &str) {
        tracing::info!(line = %line, "unparsed MCP output");
    }

    /// A chunk read from the server's stderr.
    fn on_stderr(&self, chunk: &str) {
        tracing::warn!(stderr = %chunk.trim_end(), "MCP server stderr");
    }

    /// A request about to be written to the server.
    fn on_outbound(&self, request: &JsonRpcRequest) {
        tracing::debug!(id = request.id, method = %request.method, "sending MCP message");
    }

    /// The server process exited. `None` means it was terminated by a signal.
    fn on_exit(&self, code: Option<i32>) {
        tracing::info!(code = ?code, "MCP process exited");
    }
}

/// Observer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {}
