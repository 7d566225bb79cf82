//! CLI command handlers.

pub mod analyze;
pub mod call;
pub mod config;
pub mod tools;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use flowbridge_config::{FlowbridgeConfig, LoadedConfig};
use flowbridge_mcp::{
    CallToolResult, DEFAULT_SSE_ENDPOINT, InboundMessage, LaunchSpec, McpClient, McpError,
    SessionConfig, SessionObserver, process,
};

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Effective session settings (config files + CLI flags).
    pub session: SessionConfig,
    /// The loaded config layers.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// How long to linger for server messages after a call.
    pub wait: Duration,
}

/// Values given on the command line, applied over the config files.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub bridge: Option<String>,
    pub ready_timeout_ms: Option<u64>,
    pub initialize: bool,
}

/// Build session settings from the merged config plus CLI overrides.
pub fn session_config(config: &FlowbridgeConfig, overrides: &Overrides) -> Result<SessionConfig> {
    let mut server = config.server.clone();
    if overrides.endpoint.is_some() {
        server.endpoint = overrides.endpoint.clone();
    }
    if overrides.bridge.is_some() {
        server.command = overrides.bridge.clone();
    }
    if overrides.ready_timeout_ms.is_some() {
        server.ready_timeout_ms = overrides.ready_timeout_ms;
    }
    if overrides.initialize {
        server.initialize = Some(true);
    }
    server.validate().context("invalid server configuration")?;

    let args = server.args.clone().unwrap_or_else(|| {
        process::BRIDGE_ARGS
            .iter()
            .map(|a| a.to_string())
            .collect()
    });
    let launch = LaunchSpec::new(
        server
            .command
            .clone()
            .unwrap_or_else(|| process::BRIDGE_COMMAND.to_string()),
    )
    .with_args(args)
    .with_arg(server.transport.unwrap_or_default().flag())
    .with_arg(
        server
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_SSE_ENDPOINT.to_string()),
    );
    let launch = server
        .env_pairs()
        .into_iter()
        .fold(launch, |launch, (k, v)| launch.with_env_var(k, v));

    let mut session = SessionConfig::new(launch);
    if let Some(ms) = server.ready_timeout_ms {
        session = session.with_ready_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = server.request_timeout_ms {
        session = session.with_request_timeout(Duration::from_millis(ms));
    }
    Ok(session.with_initialize(server.initialize.unwrap_or(false)))
}

impl Context {
    /// Spawn the bridge and wait until it is ready.
    pub async fn connect(&self) -> Result<McpClient> {
        let observer = Arc::new(ConsoleObserver {
            json: self.json_output,
        });
        let mut client = McpClient::with_observer(self.session.clone(), observer);

        if self.verbose {
            eprintln!("Connecting: {}", self.session.launch.display());
        }
        client
            .connect()
            .await
            .with_context(|| format!("could not start '{}'", self.session.launch.command))?;
        Ok(client)
    }

    /// Linger for `--wait`, then stop the bridge.
    pub async fn finish(&self, client: &mut McpClient) {
        if !self.wait.is_zero() {
            tokio::time::sleep(self.wait).await;
        }
        client.disconnect().await;
    }
}

/// Prints server-initiated messages; replies are printed by the commands.
struct ConsoleObserver {
    json: bool,
}

impl SessionObserver for ConsoleObserver {
    fn on_message(&self, message: &InboundMessage) {
        tracing::debug!(kind = message.kind(), "received MCP message");
        let shown = match message {
            InboundMessage::Notification { method, params } => {
                serde_json::json!({"method": method, "params": params})
            }
            InboundMessage::Request { id, method, params } => {
                serde_json::json!({"id": id, "method": method, "params": params})
            }
            InboundMessage::Other(value) => value.clone(),
            InboundMessage::Response { .. } | InboundMessage::Error { .. } => return,
        };
        if self.json {
            println!("{}", shown);
        } else {
            println!(
                "<< {}",
                serde_json::to_string_pretty(&shown).unwrap_or_default()
            );
        }
    }
}

/// Convert a failed call, hinting at a rerun when the bridge went away.
pub fn call_error(err: McpError) -> anyhow::Error {
    if err.is_recoverable_by_reconnect() {
        anyhow::Error::new(err)
            .context("the bridge process went away; rerun the command to reconnect")
    } else {
        err.into()
    }
}

/// Print a tool result; a result flagged as an error becomes a failure.
pub fn print_tool_result(result: &CallToolResult, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        match result.text() {
            Some(text) => println!("{}", text),
            None => println!("(no text content)"),
        }
    }

    if result.is_error() {
        anyhow::bail!("tool reported an error");
    }
    Ok(())
}
