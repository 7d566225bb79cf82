//! `flowbridge upload` - send a file to the upload_file tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{Context, call_error, print_tool_result};

/// Arguments for `flowbridge upload`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to upload (read whole, as text)
    pub path: PathBuf,
}

/// Run `flowbridge upload`.
pub async fn run(args: UploadArgs, ctx: &Context) -> Result<()> {
    // Fail before spawning the bridge.
    anyhow::ensure!(
        args.path.is_file(),
        "file not found: {}",
        args.path.display()
    );

    let mut client = ctx.connect().await?;
    let result = client.invoke_upload_file(&args.path).await;
    ctx.finish(&mut client).await;

    print_tool_result(&result.map_err(call_error)?, ctx)
}
