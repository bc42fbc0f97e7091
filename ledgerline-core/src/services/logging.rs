//! Logging service - structured event logging to DuckDB
//!
//! Records what imports did in logs.duckdb: row counts, the command that
//! ran and error messages. Transaction content (dates, amounts,
//! descriptions, identifiers) is never logged.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Event names written by the import pipeline
pub mod events {
    pub const IMPORT_PREVIEWED: &str = "import_previewed";
    pub const IMPORT_COMMITTED: &str = "import_committed";
    pub const IMPORT_FAILED: &str = "import_failed";
}

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;
    // Lower 16 bits hold the counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_added: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_modified: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    /// Set the command context (for CLI events)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Set the row counts of an import
    pub fn with_counts(mut self, total: usize, added: usize, modified: usize) -> Self {
        self.rows_total = Some(total as u64);
        self.rows_added = Some(added as u64);
        self.rows_modified = Some(modified as u64);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub sheet: Option<String>,
    pub rows_total: Option<i64>,
    pub rows_added: Option<i64>,
    pub rows_modified: Option<i64>,
    pub error_message: Option<String>,
}

/// Per-event totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStats {
    pub event: String,
    pub count: u64,
    pub rows_added: i64,
    pub rows_modified: i64,
}

const ENTRY_COLUMNS: &str = "id, timestamp, app_version, platform, event, command, sheet, \
                             rows_total, rows_added, rows_modified, error_message";

fn entry_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        platform: row.get(3)?,
        event: row.get(4)?,
        command: row.get(5)?,
        sheet: row.get(6)?,
        rows_total: row.get(7)?,
        rows_added: row.get(8)?,
        rows_modified: row.get(9)?,
        error_message: row.get(10)?,
    })
}

/// Service for structured event logging
///
/// Owns the logs.duckdb connection. Shared by the CLI commands.
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in the data directory and run any
    /// pending migrations
    pub fn new(data_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    /// Log an event. Version and platform come from the service.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                id, timestamp, app_version, platform, event, command, sheet,
                rows_total, rows_added, rows_modified, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.sheet,
                event.rows_total.map(|n| n as i64),
                event.rows_added.map(|n| n as i64),
                event.rows_modified.map(|n| n as i64),
                &event.error_message,
            ],
        )?;

        Ok(())
    }

    /// Log an error
    pub fn log_error(&self, event: &str, message: &str) -> Result<()> {
        self.log(LogEvent::new(event).with_error(message))
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    /// Most recent entries carrying an error message
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs WHERE error_message IS NOT NULL \
             ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    /// Count and row totals per event name
    pub fn stats(&self) -> Result<Vec<EventStats>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare(
            r#"
            SELECT event, COUNT(*),
                   CAST(COALESCE(SUM(rows_added), 0) AS BIGINT),
                   CAST(COALESCE(SUM(rows_modified), 0) AS BIGINT)
            FROM sys_logs
            GROUP BY event
            ORDER BY event
            "#,
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(EventStats {
                    event: row.get(0)?,
                    count: row.get(1)?,
                    rows_added: row.get(2)?,
                    rows_modified: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(stats)
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Delete every entry
    pub fn clear(&self) -> Result<u64> {
        self.delete_before(i64::MAX)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
