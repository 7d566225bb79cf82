//! MCP client for tool servers reached through a stdio bridge.
//!
//! The server is not linked in-process: a bridge executable (by default
//! `npx -y supergateway --sse <endpoint>`) is spawned and spoken to over its
//! stdin/stdout with newline-delimited JSON-RPC 2.0.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient                                                  │
//! │  - tools/list, tools/call, upload_file, analyze_files       │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Session                                                    │
//! │  - connection state, request ids, readiness                 │
//! │  - LineFramer: stdout bytes → JSON lines → SessionObserver  │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ProcessSupervisor                                          │
//! │  - spawn, drain stdout/stderr, report exit, kill            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use flowbridge_mcp::{McpClient, SessionConfig};
//!
//! let mut client = McpClient::new(SessionConfig::default());
//! client.connect().await?;
//!
//! // Fire-and-forget; the reply is delivered to the session observer.
//! client.list_tools().await?;
//!
//! // Or wait for the reply carrying the same id.
//! for tool in client.fetch_tools().await? {
//!     println!("{}", tool.name);
//! }
//!
//! client.upload_file("test.cobol").await?;
//! client.analyze_files(&["test.cobol"]).await?;
//! client.disconnect().await;
//! ```
//!
//! # Wire format
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}\n
//! ```
//!
//! Inbound lines that are not JSON (bridge log output) are reported to the
//! observer and otherwise ignored.

pub mod client;
pub mod error;
pub mod files;
pub mod framing;
pub mod observer;
pub mod process;
pub mod protocol;
pub mod session;

// Re-export main types
pub use client::McpClient;
pub use error::{McpError, Result};
pub use files::{FileSource, LocalFiles};
pub use framing::{Frame, LineFramer, Utf8Chunks};
pub use observer::{SessionObserver, TracingObserver};
pub use process::{DEFAULT_SSE_ENDPOINT, LaunchSpec, ProcessStatus, ProcessSupervisor};
pub use protocol::{
    CallToolResult, InboundMessage, JsonRpcError, JsonRpcRequest, RequestId, ToolContent,
    ToolInfo,
};
pub use session::{
    ConnectionState, DEFAULT_READY_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, Session, SessionConfig,
};
