//! CLI command implementations

pub mod config;
pub mod export;
pub mod import;
pub mod init;
pub mod logs;
pub mod rule;
pub mod show;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerline_core::adapters::duckdb::DuckDbSheet;
use ledgerline_core::LedgerlineContext;

/// Get the ledgerline directory from environment or default
pub fn get_ledgerline_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGERLINE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".ledgerline"))
}

/// Get or create ledgerline context
pub fn get_context() -> Result<LedgerlineContext> {
    let ledgerline_dir = get_ledgerline_dir()?;
    LedgerlineContext::new(&ledgerline_dir).context("Failed to initialize ledgerline context")
}

/// Open the configured sheet, pointing at `lline init` when it is missing
pub fn open_sheet(ctx: &LedgerlineContext) -> Result<DuckDbSheet> {
    ctx.open_sheet()
        .with_context(|| format!("Run `lline init` to create the '{}' sheet", ctx.config.sheet_name))
}
