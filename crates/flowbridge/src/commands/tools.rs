//! `flowbridge tools` - list the tools the server exposes.

use anyhow::Result;
use clap::Args;

use super::{Context, call_error};

/// Arguments for `flowbridge tools`.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Show full input schemas
    #[arg(long)]
    pub full: bool,
}

/// Run `flowbridge tools`.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let mut client = ctx.connect().await?;
    let result = client.fetch_tools().await;
    ctx.finish(&mut client).await;
    let tools = result.map_err(call_error)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if tools.is_empty() {
        println!("Server exposes no tools.");
        return Ok(());
    }

    println!("{:<24} DESCRIPTION", "NAME");
    println!("{}", "-".repeat(72));
    for tool in &tools {
        println!(
            "{:<24} {}",
            tool.name,
            tool.description.as_deref().unwrap_or("")
        );
        if args.full
            && let Some(schema) = &tool.input_schema
        {
            println!("{}", serde_json::to_string_pretty(schema)?);
            println!();
        }
    }

    Ok(())
}
