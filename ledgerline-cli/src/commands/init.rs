//! Init command - create the sheet

use anyhow::{bail, Result};
use colored::Colorize;
use ledgerline_core::config::parse_zone;
use ledgerline_core::Value;

use super::get_context;
use crate::output;

const DEFAULT_HEADER: &[&str] = &[
    "Date",
    "Description",
    "Amount",
    "Category",
    "Month",
    "Week",
    "Full Description",
    "Transaction ID",
    "Date Added",
];

pub fn run(header: Option<Vec<String>>, time_zone: Option<String>, rows: usize) -> Result<()> {
    let mut ctx = get_context()?;

    let names: Vec<String> = match header {
        Some(names) => names.into_iter().map(|n| n.trim().to_string()).collect(),
        None => DEFAULT_HEADER.iter().map(|n| n.to_string()).collect(),
    };
    if !names.iter().any(|n| n == "Transaction ID") {
        bail!("The header needs a 'Transaction ID' column");
    }

    if let Some(name) = time_zone {
        ctx.config.store_zone = parse_zone(&name)?;
        ctx.config.save(&ctx.data_dir)?;
    }

    let mut cells = vec![Value::Empty];
    cells.extend(names.iter().map(|n| Value::text(n.as_str())));
    let sheet = ctx.create_sheet(&cells, rows)?;

    output::success(&format!("Created sheet '{}'", ctx.config.sheet_name));
    println!("  {} {}", "Columns:".dimmed(), names.join(", "));
    println!("  {} {}", "Time zone:".dimmed(), ctx.config.store_zone.name());
    println!("  {} {}", "Database:".dimmed(), sheet.db_path().display());
    Ok(())
}
