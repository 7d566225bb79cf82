//! A session with one spawned MCP server.
//!
//! The session owns the process, the id counter and the framing state. All
//! public operations take `&mut self`, so a single owner drives it; callers
//! that need sharing put it behind an async mutex.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ready──▶ Connected
//!      ▲                          │                     │
//!      │                   exit / no pid                │ stop() / process exit
//!      │                          ▼                     │
//!      └────────stop()──────── Failed ◀─────────────────┘ (to Disconnected)
//! ```
//!
//! Readiness is the first stdout line that parses as JSON. If none arrives
//! within `ready_timeout`, a still-running process is taken as ready.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{Notify, oneshot};

use crate::error::{McpError, Result};
use crate::framing::{Frame, LineFramer};
use crate::observer::{SessionObserver, TracingObserver};
use crate::process::{LaunchSpec, ProcessSink, ProcessSupervisor};
use crate::protocol::{
    InboundMessage, InitializeParams, JsonRpcNotification, JsonRpcRequest, methods, to_params,
};

/// Default upper bound on the readiness wait.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout for correlated requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How to start the server.
    pub launch: LaunchSpec,
    /// Upper bound on the readiness wait in `connect`.
    pub ready_timeout: Duration,
    /// Default timeout for correlated requests.
    pub request_timeout: Duration,
    /// Send the MCP `initialize` handshake while connecting.
    pub initialize: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            launch: LaunchSpec::default(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            initialize: false,
        }
    }
}

impl SessionConfig {
    /// Config launching `launch` with default timings.
    pub fn new(launch: LaunchSpec) -> Self {
        Self {
            launch,
            ..Default::default()
        }
    }

    /// Set the readiness upper bound.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the correlated request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable the initialize handshake.
    pub fn with_initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }
}

type PendingMap = HashMap<u64, oneshot::Sender<InboundMessage>>;

/// Inbound side of one process run: framing, readiness and dispatch.
struct Link {
    framer: Mutex<LineFramer>,
    ready: Notify,
    state: Arc<Mutex<ConnectionState>>,
    pending: Arc<Mutex<PendingMap>>,
    observer: Arc<dyn SessionObserver>,
}

impl Link {
    fn dispatch(&self, message: InboundMessage) {
        self.ready.notify_one();
        self.observer.on_message(&message);

        let waiter = message
            .response_id()
            .and_then(|id| id.as_number())
            .and_then(|id| self.pending.lock().remove(&id));
        if let Some(waiter) = waiter {
            let _ = waiter.send(message);
        }
    }
}

impl ProcessSink for Link {
    fn on_stdout(&self, chunk: &[u8]) {
        let frames = self.framer.lock().push(chunk);
        for frame in frames {
            match frame {
                Frame::Message(value) => self.dispatch(InboundMessage::classify(value)),
                Frame::Unparsed(line) => self.observer.on_unparsed_line(&line),
            }
        }
    }

    fn on_stderr(&self, chunk: &str) {
        self.observer.on_stderr(chunk);
    }

    fn on_exit(&self, code: Option<i32>) {
        {
            let mut state = self.state.lock();
            if matches!(
                *state,
                ConnectionState::Connected | ConnectionState::Connecting
            ) {
                *state = ConnectionState::Disconnected;
            }
        }
        // Dropping the senders wakes pending requests with ConnectionClosed.
        self.pending.lock().clear();
        self.observer.on_exit(code);
    }
}

/// One logical connection to a stdio MCP server.
pub struct Session {
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    state: Arc<Mutex<ConnectionState>>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: u64,
    process: Option<ProcessSupervisor>,
}

impl Session {
    /// Create a disconnected session that logs through `tracing`.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a disconnected session reporting to `observer`.
    pub fn with_observer(config: SessionConfig, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            config,
            observer,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: 1,
            process: None,
        }
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether sends are currently allowed.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.process.is_some()
    }

    /// Pid of the server process, while one is attached.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Number of correlated requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Spawn the server and wait for readiness.
    ///
    /// Fails with [`McpError::Launch`] (state stays `Disconnected`) if the
    /// process cannot be spawned, or [`McpError::ConnectionTimeout`] (state
    /// becomes `Failed`) if it dies before becoming ready. Calling this while
    /// connected is a no-op.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.stop().await;
        self.set_state(ConnectionState::Connecting);

        let link = Arc::new(Link {
            framer: Mutex::new(LineFramer::new()),
            ready: Notify::new(),
            state: Arc::clone(&self.state),
            pending: Arc::clone(&self.pending),
            observer: Arc::clone(&self.observer),
        });

        let process = match ProcessSupervisor::start(&self.config.launch, link.clone()) {
            Ok(process) => process,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(error = %e, "failed to launch MCP server");
                return Err(e);
            }
        };
        self.process = Some(process);

        if self.config.initialize {
            let params = to_params(&InitializeParams::default())?;
            let request = JsonRpcRequest::new(self.take_id(), methods::INITIALIZE, params);
            if let Err(e) = self.write_request(&request).await {
                tracing::warn!(error = %e, "failed to send initialize request");
            }
        }

        let ready = match self.await_ready(&link).await {
            Ok(()) if self.config.initialize => self.write_initialized().await,
            other => other,
        }
        .and_then(|()| self.promote_to_connected());

        match ready {
            Ok(()) => {
                tracing::info!(pid = ?self.pid(), "connected to MCP server");
                Ok(())
            }
            Err(e) => {
                if let Some(mut process) = self.process.take() {
                    process.kill().await;
                }
                self.pending.lock().clear();
                self.set_state(ConnectionState::Failed);
                tracing::error!(error = %e, "MCP server did not become ready");
                Err(e)
            }
        }
    }

    async fn write_initialized(&mut self) -> Result<()> {
        self.write_notification(&JsonRpcNotification::new(methods::INITIALIZED, None))
            .await
    }

    /// `Connecting` becomes `Connected`; any other state means the process
    /// exited while the connect was finishing.
    fn promote_to_connected(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != ConnectionState::Connecting {
            return Err(McpError::ConnectionClosed);
        }
        *state = ConnectionState::Connected;
        tracing::debug!(
            from = %ConnectionState::Connecting,
            to = %ConnectionState::Connected,
            "MCP session state changed"
        );
        Ok(())
    }

    async fn await_ready(&self, link: &Link) -> Result<()> {
        let timeout = self.config.ready_timeout;
        let Some(process) = self.process.as_ref() else {
            return Err(McpError::ConnectionTimeout(timeout));
        };
        let mut status = process.subscribe();

        let signalled = tokio::select! {
            biased;
            _ = link.ready.notified() => true,
            _ = async { let _ = status.wait_for(|s| s.is_exited()).await; } => false,
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "no handshake seen, checking process");
                true
            }
        };

        if signalled && process.is_running() {
            Ok(())
        } else {
            Err(McpError::ConnectionTimeout(timeout))
        }
    }

    /// Kill the server and return to `Disconnected`.
    ///
    /// Pending correlated requests fail with [`McpError::ConnectionClosed`].
    /// Idempotent.
    pub async fn stop(&mut self) {
        if let Some(mut process) = self.process.take() {
            tracing::info!(pid = ?process.pid(), "stopping MCP server");
            process.kill().await;
        }
        self.pending.lock().clear();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Write a request for `method` and return its id without waiting.
    ///
    /// Fails with [`McpError::NotConnected`] unless connected; nothing is
    /// written in that case.
    pub async fn send(&mut self, method: &str, params: Map<String, Value>) -> Result<u64> {
        self.ensure_connected()?;
        let request = JsonRpcRequest::new(self.take_id(), method, params);
        self.write_request(&request).await?;
        Ok(request.id)
    }

    /// Write a request and wait for the response carrying the same id.
    pub async fn request(
        &mut self,
        method: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.ensure_connected()?;
        let request = JsonRpcRequest::new(self.take_id(), method, params);
        let id = request.id;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.write_request(&request).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(InboundMessage::Response { result, .. })) => Ok(result),
            Ok(Ok(InboundMessage::Error { error, .. })) => {
                Err(McpError::server_error(error.code, error.message, error.data))
            }
            Ok(Ok(other)) => Err(McpError::protocol(format!(
                "unexpected {} for request {}",
                other.kind(),
                id
            ))),
            Ok(Err(_)) => Err(McpError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(McpError::RequestTimeout {
                    id: id.into(),
                    timeout,
                })
            }
        }
    }

    /// Write a notification (no id, no response).
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.ensure_connected()?;
        self.write_notification(&JsonRpcNotification::new(method, params))
            .await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(McpError::NotConnected)
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn write_request(&mut self, request: &JsonRpcRequest) -> Result<()> {
        self.observer.on_outbound(request);
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.write_line(&line).await
    }

    async fn write_notification(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        let mut line = serde_json::to_vec(notification)?;
        line.push(b'\n');
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let process = self.process.as_mut().ok_or(McpError::NotConnected)?;
        process.write_all(line).await
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "MCP session state changed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("next_id", &self.next_id)
            .field("process", &self.process)
            .finish()
    }
}
