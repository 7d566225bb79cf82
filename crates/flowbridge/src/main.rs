//! flowbridge - call tools on a Langflow MCP server through a stdio bridge
//!
//! Main entry point for the flowbridge CLI.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{analyze, call, config, tools, upload};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// flowbridge - call tools on a Langflow MCP server through a stdio bridge
#[derive(Parser)]
#[command(name = "flowbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Remote MCP endpoint the bridge connects to
    #[arg(long, global = true, env = "FLOWBRIDGE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bridge executable to spawn (default: npx)
    #[arg(long, global = true, env = "FLOWBRIDGE_BRIDGE")]
    pub bridge: Option<String>,

    /// Upper bound on the readiness wait, in milliseconds
    #[arg(long, global = true)]
    pub ready_timeout: Option<u64>,

    /// Send the MCP initialize handshake on connect
    #[arg(long, global = true)]
    pub initialize: bool,

    /// Keep the session open this many milliseconds after the call to show
    /// further server messages
    #[arg(long, global = true, default_value = "0")]
    pub wait: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the tools the server exposes
    Tools(tools::ToolsArgs),

    /// Call a tool with JSON arguments
    Call(call::CallArgs),

    /// Upload a file through the upload_file tool
    Upload(upload::UploadArgs),

    /// Analyze files through the analyze_files tool
    Analyze(analyze::AnalyzeArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "flowbridge=debug,flowbridge_mcp=debug,flowbridge_config=debug,info"
    } else {
        "flowbridge=info,flowbridge_mcp=warn,warn"
    };

    let log_dir = flowbridge_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "flowbridge.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "flowbridge=trace,flowbridge_mcp=trace,flowbridge_config=trace,info",
                )),
        )
        .init();

    let loaded = flowbridge_config::load_config(None)?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let overrides = commands::Overrides {
        endpoint: cli.endpoint,
        bridge: cli.bridge,
        ready_timeout_ms: cli.ready_timeout,
        initialize: cli.initialize,
    };
    let session = commands::session_config(&loaded.config, &overrides)?;

    // Create context for commands
    let ctx = commands::Context {
        session,
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
        wait: Duration::from_millis(cli.wait),
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Call(args) => call::run(args, &ctx).await,
        Commands::Upload(args) => upload::run(args, &ctx).await,
        Commands::Analyze(args) => analyze::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
