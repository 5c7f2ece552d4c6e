use crate::cli::CliContext;
use anyhow::{Context, Result};

pub fn run_reload(ctx: &CliContext) -> Result<()> {
    ctx.coordinator
        .reload_service()
        .context("restart VPN daemon")?;
    println!("Service restarted.");
    Ok(())
}
