//! Process supervision for a stdio MCP server.
//!
//! [`ProcessSupervisor`] owns the child and its stdin. Stdout and stderr are
//! drained by background tasks that forward raw chunks to a [`ProcessSink`];
//! a third task waits for exit. Nothing here knows about JSON.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{McpError, Result};
use crate::framing::Utf8Chunks;

/// Bridge executable launched by default.
pub const BRIDGE_COMMAND: &str = "npx";

/// Arguments placed before the transport flag by default.
pub const BRIDGE_ARGS: &[&str] = &["-y", "supergateway"];

/// Transport mode flag understood by the bridge.
pub const SSE_FLAG: &str = "--sse";

/// Remote SSE endpoint of the Langflow project the bridge connects to.
pub const DEFAULT_SSE_ENDPOINT: &str =
    "http://localhost:7868/api/v1/mcp/project/78d3460a-050a-4220-9c52-0922b1603a02/sse";

const READ_BUF_SIZE: usize = 8192;

/// How long to let stdout drain after the process exits on its own.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Command line used to start the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to spawn.
    pub command: String,
    /// Arguments to pass.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Launch `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// `npx -y supergateway --sse <endpoint>`.
    pub fn supergateway(endpoint: impl Into<String>) -> Self {
        Self::new(BRIDGE_COMMAND)
            .with_args(BRIDGE_ARGS.iter().map(|a| a.to_string()))
            .with_arg(SSE_FLAG)
            .with_arg(endpoint)
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as one display string.
    pub fn display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self::supergateway(DEFAULT_SSE_ENDPOINT)
    }
}

/// Whether the supervised process is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exited with this code; `None` when killed by a signal.
    Exited(Option<i32>),
}

impl ProcessStatus {
    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }
}

/// Receives the raw output of a supervised process.
pub trait ProcessSink: Send + Sync + 'static {
    /// Bytes read from stdout, in order.
    fn on_stdout(&self, chunk: &[u8]);

    /// Text read from stderr.
    fn on_stderr(&self, chunk: &str);

    /// Called once, after stdout has been drained, when the process is gone.
    fn on_exit(&self, code: Option<i32>);
}

/// Owns a spawned server process.
pub struct ProcessSupervisor {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    status: watch::Receiver<ProcessStatus>,
    kill_tx: Option<oneshot::Sender<()>>,
    waiter: Option<JoinHandle<()>>,
}

impl ProcessSupervisor {
    /// Spawn the process described by `spec` and start draining its output.
    ///
    /// Fails with [`McpError::Launch`] if the executable cannot be spawned.
    /// Must be called within a tokio runtime.
    pub fn start(spec: &LaunchSpec, sink: Arc<dyn ProcessSink>) -> Result<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            McpError::launch(format!("failed to spawn '{}': {}", spec.command, e))
        })?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::launch("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::launch("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::launch("failed to capture stderr"))?;

        tracing::info!(pid = ?pid, command = %spec.display(), "spawned MCP server process");

        let stdout_task = {
            let sink = Arc::clone(&sink);
            tokio::spawn(pump(stdout, move |chunk| sink.on_stdout(chunk)))
        };
        let stderr_task = {
            let sink = Arc::clone(&sink);
            let mut decoder = Utf8Chunks::new();
            tokio::spawn(pump(stderr, move |chunk| {
                let text = decoder.push(chunk);
                if !text.is_empty() {
                    sink.on_stderr(&text);
                }
            }))
        };

        let (status_tx, status) = watch::channel(ProcessStatus::Running);
        let (kill_tx, kill_rx) = oneshot::channel();
        let waiter = tokio::spawn(wait_for_exit(
            child,
            kill_rx,
            stdout_task,
            stderr_task,
            status_tx,
            sink,
        ));

        Ok(Self {
            pid,
            stdin: Some(stdin),
            status,
            kill_tx: Some(kill_tx),
            waiter: Some(waiter),
        })
    }

    /// OS process id, if the process had one at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current process status.
    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    /// Whether the process has a pid and has not exited.
    pub fn is_running(&self) -> bool {
        self.pid.is_some() && !self.status().is_exited()
    }

    /// Watch channel that flips to [`ProcessStatus::Exited`] on exit.
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.clone()
    }

    /// Write `bytes` to stdin in one call and flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(McpError::NotConnected)?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| McpError::transport(format!("failed to write to server stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::transport(format!("failed to flush server stdin: {}", e)))
    }

    /// Kill the process and wait until its exit has been reported.
    ///
    /// Calling this again, or after the process exited on its own, is a no-op.
    pub async fn kill(&mut self) {
        self.stdin = None;
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        if let Some(waiter) = self.waiter.take() {
            if let Err(e) = waiter.await {
                tracing::warn!(error = %e, "MCP process waiter task failed");
            }
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("pid", &self.pid)
            .field("status", &self.status())
            .finish()
    }
}

async fn pump<R, F>(mut reader: R, mut on_chunk: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]),
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => on_chunk(&buf[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "MCP output stream closed with error");
                break;
            }
        }
    }
}

async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    mut stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
    status_tx: watch::Sender<ProcessStatus>,
    sink: Arc<dyn ProcessSink>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };

    let status = match exited {
        Some(status) => {
            // Output written just before exit may still be in the pipe.
            if tokio::time::timeout(DRAIN_GRACE, &mut stdout_task).await.is_err() {
                stdout_task.abort();
            }
            status
        }
        None => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "kill on MCP process failed");
            }
            stdout_task.abort();
            child.wait().await
        }
    };
    stderr_task.abort();

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to reap MCP process");
            None
        }
    };

    let _ = status_tx.send(ProcessStatus::Exited(code));
    sink.on_exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        stdout: Mutex<Vec<u8>>,
        stderr: Mutex<String>,
        exits: Mutex<Vec<Option<i32>>>,
    }

    impl ProcessSink for Recorder {
        fn on_stdout(&self, chunk: &[u8]) {
            self.stdout.lock().extend_from_slice(chunk);
        }

        fn on_stderr(&self, chunk: &str) {
            self.stderr.lock().push_str(chunk);
        }

        fn on_exit(&self, code: Option<i32>) {
            self.exits.lock().push(code);
        }
    }

    #[test]
    fn test_default_launch_spec() {
        let spec = LaunchSpec::default();
        assert_eq!(spec.command, "npx");
        assert_eq!(
            spec.args,
            vec!["-y", "supergateway", "--sse", DEFAULT_SSE_ENDPOINT]
        );
        assert!(spec.display().starts_with("npx -y supergateway --sse http://localhost:7868/"));
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_command() {
        let sink = Arc::new(Recorder::default());
        let result = ProcessSupervisor::start(&LaunchSpec::new("nonexistent-mcp-bridge-12345"), sink);
        match result {
            Ok(_) => panic!("expected spawn to fail"),
            Err(err) => assert!(matches!(err, McpError::Launch(_))),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_and_exit_reported() {
        let sink = Arc::new(Recorder::default());
        let spec = LaunchSpec::new("sh")
            .with_arg("-c")
            .with_arg("echo out; echo err 1>&2; exit 3");
        let mut process = ProcessSupervisor::start(&spec, sink.clone()).unwrap();
        assert!(process.pid().is_some());

        let mut status = process.subscribe();
        status.wait_for(|s| s.is_exited()).await.unwrap();
        process.kill().await;

        assert_eq!(process.status(), ProcessStatus::Exited(Some(3)));
        assert!(!process.is_running());
        assert_eq!(&*sink.stdout.lock(), b"out\n");
        assert_eq!(*sink.exits.lock(), vec![Some(3)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_is_idempotent() {
        let sink = Arc::new(Recorder::default());
        let mut process = ProcessSupervisor::start(&LaunchSpec::new("cat"), sink.clone()).unwrap();
        assert!(process.is_running());

        process.write_all(b"hello\n").await.unwrap();
        process.kill().await;
        process.kill().await;

        assert!(process.status().is_exited());
        assert_eq!(sink.exits.lock().len(), 1);
        assert!(matches!(
            process.write_all(b"late\n").await,
            Err(McpError::NotConnected)
        ));
    }
}
