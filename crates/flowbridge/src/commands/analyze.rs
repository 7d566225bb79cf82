//! `flowbridge analyze` - run the analyze_files tool.

use anyhow::Result;
use clap::Args;

use super::{Context, call_error, print_tool_result};

/// Arguments for `flowbridge analyze`.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// File paths to analyze, as the server knows them
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Run `flowbridge analyze`.
pub async fn run(args: AnalyzeArgs, ctx: &Context) -> Result<()> {
    if !ctx.json_output {
        eprintln!("Analyzing {} file(s)...", args.paths.len());
    }

    let mut client = ctx.connect().await?;
    let result = client.invoke_analyze_files(&args.paths).await;
    ctx.finish(&mut client).await;

    print_tool_result(&result.map_err(call_error)?, ctx)
}
