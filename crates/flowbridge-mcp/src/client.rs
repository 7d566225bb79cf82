//! Tool-level API over a [`Session`].
//!
//! Each fire-and-forget call returns the id of the request it wrote; replies
//! arrive through the session's observer. The `invoke_*`/`fetch_*` variants
//! additionally wait for the correlated reply.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{McpError, Result};
use crate::files::{FileSource, LocalFiles};
use crate::observer::SessionObserver;
use crate::protocol::{
    AnalyzeFilesArgs, CallToolParams, CallToolResult, ListToolsResult, ToolInfo, UploadFileArgs,
    methods, to_params, tools,
};
use crate::session::{ConnectionState, Session, SessionConfig};

/// An MCP client bound to one server session.
pub struct McpClient {
    session: Session,
    files: Arc<dyn FileSource>,
}

impl McpClient {
    /// Create a disconnected client using the local filesystem.
    pub fn new(config: SessionConfig) -> Self {
        Self::from_session(Session::new(config))
    }

    /// Create a disconnected client reporting to `observer`.
    pub fn with_observer(config: SessionConfig, observer: Arc<dyn SessionObserver>) -> Self {
        Self::from_session(Session::with_observer(config, observer))
    }

    /// Wrap an existing session.
    pub fn from_session(session: Session) -> Self {
        Self {
            session,
            files: Arc::new(LocalFiles),
        }
    }

    /// Replace the filesystem used by uploads.
    pub fn with_files(mut self, files: Arc<dyn FileSource>) -> Self {
        self.files = files;
        self
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the underlying session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Spawn the server and wait for readiness.
    pub async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    /// Kill the server. Idempotent.
    pub async fn disconnect(&mut self) {
        self.session.stop().await
    }

    // ── fire-and-forget ─────────────────────────────────────────────────────

    /// Send `tools/list`.
    pub async fn list_tools(&mut self) -> Result<u64> {
        self.session.send(methods::TOOLS_LIST, Map::new()).await
    }

    /// Send `tools/call` for `name` with `arguments`.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<u64> {
        let params = call_params(name, arguments)?;
        self.session.send(methods::TOOLS_CALL, params).await
    }

    /// Read `path` and send it whole to the `upload_file` tool.
    ///
    /// Fails with [`McpError::FileNotFound`] before touching the transport if
    /// the path is not an existing file.
    pub async fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<u64> {
        let arguments = self.upload_args(path.as_ref()).await?;
        self.call_tool(tools::UPLOAD_FILE, arguments).await
    }

    /// Send `analyze_files` for `paths`, passed through verbatim.
    pub async fn analyze_files<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<u64> {
        tracing::info!(count = paths.len(), "analyzing files");
        self.call_tool(tools::ANALYZE_FILES, analyze_args(paths)?)
            .await
    }

    // ── correlated ──────────────────────────────────────────────────────────

    /// Send `tools/list` and wait for the tool list.
    pub async fn fetch_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let timeout = self.session.config().request_timeout;
        let result = self
            .session
            .request(methods::TOOLS_LIST, Map::new(), timeout)
            .await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        tracing::debug!(tool_count = list.tools.len(), "listed MCP tools");
        Ok(list.tools)
    }

    /// Call a tool and wait for its result.
    pub async fn invoke_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let timeout = self.session.config().request_timeout;
        let params = call_params(name, arguments)?;
        let result = self
            .session
            .request(methods::TOOLS_CALL, params, timeout)
            .await?;
        let result: CallToolResult = serde_json::from_value(result)?;

        if result.is_error() {
            tracing::warn!(tool = %name, "tool call returned error");
        } else {
            tracing::debug!(tool = %name, "tool call succeeded");
        }
        Ok(result)
    }

    /// [`upload_file`](Self::upload_file), waiting for the tool result.
    pub async fn invoke_upload_file(&mut self, path: impl AsRef<Path>) -> Result<CallToolResult> {
        let arguments = self.upload_args(path.as_ref()).await?;
        self.invoke_tool(tools::UPLOAD_FILE, arguments).await
    }

    /// [`analyze_files`](Self::analyze_files), waiting for the tool result.
    pub async fn invoke_analyze_files<S: AsRef<str>>(
        &mut self,
        paths: &[S],
    ) -> Result<CallToolResult> {
        self.invoke_tool(tools::ANALYZE_FILES, analyze_args(paths)?)
            .await
    }

    async fn upload_args(&self, path: &Path) -> Result<Value> {
        if !self.files.exists(path).await {
            return Err(McpError::FileNotFound(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| McpError::FileNotFound(path.to_path_buf()))?;
        let file_content = self.files.read_text(path).await?;

        tracing::info!(file = %file_name, bytes = file_content.len(), "uploading file");

        Ok(serde_json::to_value(UploadFileArgs {
            file_name,
            file_content,
        })?)
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("session", &self.session)
            .finish()
    }
}

fn call_params(name: &str, arguments: Value) -> Result<Map<String, Value>> {
    Ok(to_params(&CallToolParams {
        name: name.to_string(),
        arguments,
    })?)
}

fn analyze_args<S: AsRef<str>>(paths: &[S]) -> Result<Value> {
    Ok(serde_json::to_value(AnalyzeFilesArgs {
        file_paths: paths.iter().map(|p| p.as_ref().to_string()).collect(),
    })?)
}
