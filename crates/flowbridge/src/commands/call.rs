//! `flowbridge call` - call a tool with JSON arguments.

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::Value;

use super::{Context, call_error, print_tool_result};

/// Arguments for `flowbridge call`.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Name of the tool to call
    pub name: String,

    /// Tool arguments as a JSON object
    #[arg(long, default_value = "{}")]
    pub args: String,
}

/// Run `flowbridge call`.
pub async fn run(args: CallArgs, ctx: &Context) -> Result<()> {
    let arguments: Value = serde_json::from_str(&args.args)
        .with_context(|| format!("--args is not valid JSON: {}", args.args))?;
    anyhow::ensure!(arguments.is_object(), "--args must be a JSON object");

    let mut client = ctx.connect().await?;
    let result = client.invoke_tool(&args.name, arguments).await;
    ctx.finish(&mut client).await;

    print_tool_result(&result.map_err(call_error)?, ctx)
}
