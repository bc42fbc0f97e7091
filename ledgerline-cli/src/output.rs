//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use ledgerline_core::Rect;
use serde::Serialize;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print a value as pretty JSON
pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// A1 notation of a written range, `-` when nothing was written
pub fn range(rect: Option<Rect>) -> String {
    rect.map(|r| r.a1()).unwrap_or_else(|| "-".to_string())
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
