//! Logs command - view and manage the import event log

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days (all logs when 0)
        #[arg(long, default_value = "30")]
        older_than_days: i64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn count(value: Option<i64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

pub fn run(command: LogsCommands) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.logging_service;

    match command {
        LogsCommands::List { limit, errors, json } => {
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                return output::json(&entries);
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Event", "Sheet", "Total", "Added", "Modified", "Error"]);
            for entry in &entries {
                let error_indicator = if entry.error_message.is_some() {
                    "!".red().to_string()
                } else {
                    String::new()
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.event.clone(),
                    entry.sheet.clone().unwrap_or_default(),
                    count(entry.rows_total),
                    count(entry.rows_added),
                    count(entry.rows_modified),
                    error_indicator,
                ]);
            }
            println!("{}", table);

            let failed: Vec<_> = entries.iter().filter(|e| e.error_message.is_some()).collect();
            if !failed.is_empty() && !errors {
                println!();
                println!("{}", "Recent Errors:".red().bold());
                for err in failed.iter().take(3) {
                    println!(
                        "  {} [{}]: {}",
                        format_timestamp(err.timestamp).dimmed(),
                        err.event,
                        err.error_message.as_deref().unwrap_or("Unknown error")
                    );
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force && !json {
                let prompt = if older_than_days <= 0 {
                    "Delete all log entries?".to_string()
                } else {
                    format!("Delete logs older than {} days?", older_than_days)
                };
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = if older_than_days <= 0 {
                service.clear()?
            } else {
                let cutoff = Utc::now() - Duration::days(older_than_days);
                service.delete_before(cutoff.timestamp_millis())?
            };

            if json {
                return output::json(&serde_json::json!({ "deleted": deleted }));
            }
            println!("Deleted {} log entries", deleted);
        }
        LogsCommands::Stats { json } => {
            let total = service.count()?;
            let stats = service.stats()?;
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                return output::json(&serde_json::json!({
                    "total_entries": total,
                    "events": stats,
                    "database_path": db_path.to_string_lossy(),
                    "database_size_bytes": size_bytes
                }));
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Database: {}", db_path.display());
            println!("  Size: {}", output::format_size(size_bytes));
            if !stats.is_empty() {
                let mut table = output::create_table();
                table.set_header(vec!["Event", "Count", "Rows added", "Rows modified"]);
                for s in stats {
                    table.add_row(vec![
                        s.event,
                        s.count.to_string(),
                        s.rows_added.to_string(),
                        s.rows_modified.to_string(),
                    ]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
