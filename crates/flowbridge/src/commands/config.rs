//! `flowbridge config` - show the effective configuration.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::Context;

/// Arguments for `flowbridge config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also print the merged config file contents as TOML
    #[arg(long)]
    pub raw: bool,
}

/// Run `flowbridge config`.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let session = &ctx.session;
    let loaded = &ctx.loaded;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| json!({"path": s.path.display().to_string(), "loaded": s.loaded}))
            .collect();
        let output = json!({
            "command": session.launch.command,
            "args": session.launch.args,
            "ready_timeout_ms": session.ready_timeout.as_millis() as u64,
            "request_timeout_ms": session.request_timeout.as_millis() as u64,
            "initialize": session.initialize,
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Launch:          {}", session.launch.display());
    for (key, _) in &session.launch.env {
        println!("  env:           {}", key);
    }
    println!("Ready timeout:   {}ms", session.ready_timeout.as_millis());
    println!("Request timeout: {}ms", session.request_timeout.as_millis());
    println!("Initialize:      {}", session.initialize);
    println!();
    println!("Config sources (lowest precedence first):");
    for source in &loaded.sources {
        let mark = if source.loaded { "loaded" } else { "absent" };
        println!("  [{}] {}", mark, source.path.display());
    }

    if args.raw {
        println!();
        print!("{}", loaded.config.to_toml()?);
    }

    Ok(())
}
