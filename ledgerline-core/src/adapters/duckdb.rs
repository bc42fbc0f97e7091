//! DuckDB sheet implementation
//!
//! Cells live in `sheet_cells` (blank cells have no row), rules in
//! `sheet_validations`. Each `SheetStore` call runs in its own transaction,
//! so a single call is atomic but nothing spans calls.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use duckdb::{params, Connection};

use crate::adapters::memory::MemorySheet;
use crate::domain::result::{Error, Result};
use crate::domain::{Rect, ValidationRule, Value, HEADER_ROWS};
use crate::migrations::MIGRATIONS;
use crate::ports::{RuleGrid, SheetStore};
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

/// Open a DuckDB file, retrying with exponential backoff while it is locked
pub(crate) fn open_connection(db_path: &Path) -> Result<Connection> {
    let mut attempt = 0;
    loop {
        let opened = duckdb::Config::default()
            .enable_autoload_extension(false)
            .and_then(|config| Connection::open_with_flags(db_path, config));
        match opened {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                let err_msg = e.to_string();
                if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        "Database busy, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt + 1,
                        MAX_RETRIES,
                        err_msg
                    );
                    thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                return Err(e.into());
            }
        }
    }
}

/// A sheet persisted in a DuckDB file
pub struct DuckDbSheet {
    conn: Connection,
    db_path: PathBuf,
    name: String,
    time_zone: Tz,
}

impl DuckDbSheet {
    /// Open an existing sheet
    pub fn open(db_path: &Path, name: &str) -> Result<Self> {
        let conn = open_connection(db_path)?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()?;

        let zone: String = match conn.query_row(
            "SELECT time_zone FROM sys_sheets WHERE name = ?",
            [name],
            |row| row.get(0),
        ) {
            Ok(zone) => zone,
            Err(duckdb::Error::QueryReturnedNoRows) => {
                return Err(Error::not_found(format!("{} sheet not found", name)));
            }
            Err(e) => return Err(e.into()),
        };
        let time_zone = Tz::from_str(&zone)
            .map_err(|_| Error::config(format!("Sheet '{}' has an invalid time zone '{}'", name, zone)))?;

        Ok(Self {
            conn,
            db_path: db_path.to_path_buf(),
            name: name.to_string(),
            time_zone,
        })
    }

    /// Create a sheet with a header row and capacity (header included)
    pub fn create(
        db_path: &Path,
        name: &str,
        time_zone: Tz,
        header: &[Value],
        max_rows: usize,
    ) -> Result<Self> {
        let conn = open_connection(db_path)?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()?;

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_sheets WHERE name = ?",
            [name],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::validation(format!("Sheet '{}' already exists", name)));
        }

        conn.execute(
            "INSERT INTO sys_sheets (name, time_zone, max_rows, max_columns) VALUES (?, ?, ?, ?)",
            params![
                name,
                time_zone.name(),
                max_rows.max(HEADER_ROWS) as i64,
                header.len() as i64
            ],
        )?;

        let mut sheet = Self {
            conn,
            db_path: db_path.to_path_buf(),
            name: name.to_string(),
            time_zone,
        };
        if !header.is_empty() {
            sheet.set_values(Rect::new(0, 0, 1, header.len()), &[header.to_vec()])?;
        }
        tracing::info!(sheet = name, zone = time_zone.name(), "created sheet");
        Ok(sheet)
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Change the zone the sheet renders dates in. Stored instants are kept.
    pub fn set_time_zone(&mut self, time_zone: Tz) -> Result<()> {
        self.conn.execute(
            "UPDATE sys_sheets SET time_zone = ? WHERE name = ?",
            params![time_zone.name(), self.name],
        )?;
        self.time_zone = time_zone;
        Ok(())
    }

    /// Apply a rule to every data row of a column (or clear it with `None`)
    pub fn set_column_rule(&mut self, column: usize, rule: Option<&ValidationRule>) -> Result<()> {
        let max_rows = self.max_rows()?;
        if max_rows <= HEADER_ROWS {
            return Ok(());
        }
        let rect = Rect::new(HEADER_ROWS, column, max_rows - HEADER_ROWS, 1);
        let grid = vec![vec![rule.cloned()]; rect.height];
        self.set_validations(rect, &grid)
    }

    /// Every column rule, as (column, rule) pairs of the first data row
    pub fn column_rules(&self) -> Result<Vec<(usize, ValidationRule)>> {
        let mut stmt = self.conn.prepare(
            "SELECT col_index, rule FROM sheet_validations
             WHERE sheet = ? AND row_index = ?
             ORDER BY col_index",
        )?;
        let rows = stmt.query_map(params![self.name, HEADER_ROWS as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (col, json) = row?;
            rules.push((col as usize, serde_json::from_str(&json)?));
        }
        Ok(rules)
    }

    /// Load the whole sheet into memory
    pub fn snapshot(&self) -> Result<MemorySheet> {
        let max_rows = self.max_rows()?;
        let width = self.max_columns()?;
        let header = if width == 0 {
            Vec::new()
        } else {
            self.get_values(Rect::new(0, 0, 1, width))?.remove(0)
        };
        let mut sheet = MemorySheet::new(self.name.clone(), self.time_zone, header, max_rows);
        if max_rows > HEADER_ROWS && width > 0 {
            let rect = Rect::new(HEADER_ROWS, 0, max_rows - HEADER_ROWS, width);
            sheet.set_values(rect, &self.get_values(rect)?)?;
            sheet.set_validations(rect, &self.get_validations(rect)?)?;
        }
        Ok(sheet)
    }

    fn capacity(&self) -> Result<(usize, usize)> {
        let (rows, cols): (i64, i64) = self.conn.query_row(
            "SELECT max_rows, max_columns FROM sys_sheets WHERE name = ?",
            [&self.name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((rows as usize, cols as usize))
    }

    fn check_bounds(&self, rect: Rect) -> Result<()> {
        let (max_rows, max_columns) = self.capacity()?;
        if rect.row + rect.height > max_rows || rect.col + rect.width > max_columns {
            return Err(Error::validation(format!(
                "Range {} is out of bounds for sheet '{}' ({} rows x {} columns)",
                rect, self.name, max_rows, max_columns
            )));
        }
        Ok(())
    }

    fn check_shape<T>(rect: Rect, grid: &[Vec<T>]) -> Result<()> {
        if grid.len() != rect.height || grid.iter().any(|row| row.len() != rect.width) {
            return Err(Error::validation(format!(
                "Data does not match range {} ({} rows x {} columns)",
                rect, rect.height, rect.width
            )));
        }
        Ok(())
    }

    fn rect_params(&self, rect: Rect) -> (String, i64, i64, i64, i64) {
        (
            self.name.clone(),
            rect.row as i64,
            (rect.row + rect.height) as i64,
            rect.col as i64,
            (rect.col + rect.width) as i64,
        )
    }
}

/// Column values for one cell: (kind, text, number, timestamp_ms)
fn encode(value: &Value) -> Option<(&'static str, Option<String>, Option<f64>, Option<i64>)> {
    match value {
        Value::Empty => None,
        Value::Text(s) if s.is_empty() => None,
        Value::Text(s) => Some(("text", Some(s.clone()), None, None)),
        Value::Number(n) => Some(("number", None, Some(*n), None)),
        Value::Timestamp(ts) => Some(("timestamp", None, None, Some(ts.timestamp_millis()))),
    }
}

fn decode(kind: &str, text: Option<String>, number: Option<f64>, millis: Option<i64>) -> Value {
    match kind {
        "text" => text.map(Value::Text).unwrap_or_default(),
        "number" => number.map(Value::Number).unwrap_or_default(),
        "timestamp" => millis
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(Value::Timestamp)
            .unwrap_or_default(),
        _ => Value::Empty,
    }
}

impl SheetStore for DuckDbSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_zone(&self) -> Tz {
        self.time_zone
    }

    fn last_row(&self) -> Result<usize> {
        let last: Option<i64> = self.conn.query_row(
            "SELECT MAX(row_index) FROM sheet_cells WHERE sheet = ?",
            [&self.name],
            |row| row.get(0),
        )?;
        Ok(last.map_or(0, |r| r as usize + 1))
    }

    fn last_column(&self) -> Result<usize> {
        let last: Option<i64> = self.conn.query_row(
            "SELECT MAX(col_index) FROM sheet_cells WHERE sheet = ?",
            [&self.name],
            |row| row.get(0),
        )?;
        Ok(last.map_or(0, |c| c as usize + 1))
    }

    fn max_rows(&self) -> Result<usize> {
        Ok(self.capacity()?.0)
    }

    fn max_columns(&self) -> Result<usize> {
        Ok(self.capacity()?.1)
    }

    fn get_values(&self, rect: Rect) -> Result<Vec<Vec<Value>>> {
        self.check_bounds(rect)?;
        let mut grid = vec![vec![Value::Empty; rect.width]; rect.height];

        let (sheet, row_lo, row_hi, col_lo, col_hi) = self.rect_params(rect);
        let mut stmt = self.conn.prepare(
            "SELECT row_index, col_index, kind, text_value, number_value, timestamp_ms
             FROM sheet_cells
             WHERE sheet = ? AND row_index >= ? AND row_index < ? AND col_index >= ? AND col_index < ?",
        )?;
        let cells = stmt.query_map(params![sheet, row_lo, row_hi, col_lo, col_hi], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<i64>>(5)?,
            ))
        })?;

        for cell in cells {
            let (r, c, kind, text, number, millis) = cell?;
            grid[r as usize - rect.row][c as usize - rect.col] = decode(&kind, text, number, millis);
        }
        Ok(grid)
    }

    fn set_values(&mut self, rect: Rect, values: &[Vec<Value>]) -> Result<()> {
        self.check_bounds(rect)?;
        Self::check_shape(rect, values)?;

        let rules = self.get_validations(rect)?;
        for (i, row) in values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                if let Some(rule) = &rules[i][j] {
                    if !rule.accepts(value) {
                        let at = Rect::new(rect.row + i, rect.col + j, 1, 1);
                        return Err(Error::validation(format!(
                            "Input '{}' at {} violates the data validation rule {}",
                            value, at, rule
                        )));
                    }
                }
            }
        }

        let (sheet, row_lo, row_hi, col_lo, col_hi) = self.rect_params(rect);
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM sheet_cells
             WHERE sheet = ? AND row_index >= ? AND row_index < ? AND col_index >= ? AND col_index < ?",
            params![sheet, row_lo, row_hi, col_lo, col_hi],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO sheet_cells (sheet, row_index, col_index, kind, text_value, number_value, timestamp_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (i, row) in values.iter().enumerate() {
                for (j, value) in row.iter().enumerate() {
                    if let Some((kind, text, number, millis)) = encode(value) {
                        insert.execute(params![
                            sheet,
                            (rect.row + i) as i64,
                            (rect.col + j) as i64,
                            kind,
                            text,
                            number,
                            millis
                        ])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_validations(&self, rect: Rect) -> Result<RuleGrid> {
        self.check_bounds(rect)?;
        let mut grid = vec![vec![None; rect.width]; rect.height];

        let (sheet, row_lo, row_hi, col_lo, col_hi) = self.rect_params(rect);
        let mut stmt = self.conn.prepare(
            "SELECT row_index, col_index, rule FROM sheet_validations
             WHERE sheet = ? AND row_index >= ? AND row_index < ? AND col_index >= ? AND col_index < ?",
        )?;
        let rules = stmt.query_map(params![sheet, row_lo, row_hi, col_lo, col_hi], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        for rule in rules {
            let (r, c, json) = rule?;
            let rule: ValidationRule = serde_json::from_str(&json)?;
            grid[r as usize - rect.row][c as usize - rect.col] = Some(rule);
        }
        Ok(grid)
    }

    fn set_validations(&mut self, rect: Rect, rules: &[Vec<Option<ValidationRule>>]) -> Result<()> {
        self.check_bounds(rect)?;
        Self::check_shape(rect, rules)?;

        let (sheet, row_lo, row_hi, col_lo, col_hi) = self.rect_params(rect);
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM sheet_validations
             WHERE sheet = ? AND row_index >= ? AND row_index < ? AND col_index >= ? AND col_index < ?",
            params![sheet, row_lo, row_hi, col_lo, col_hi],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO sheet_validations (sheet, row_index, col_index, rule) VALUES (?, ?, ?, ?)",
            )?;
            for (i, row) in rules.iter().enumerate() {
                for (j, rule) in row.iter().enumerate() {
                    if let Some(rule) = rule {
                        insert.execute(params![
                            sheet,
                            (rect.row + i) as i64,
                            (rect.col + j) as i64,
                            serde_json::to_string(rule)?
                        ])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_validations(&mut self, rect: Rect) -> Result<()> {
        self.check_bounds(rect)?;
        let (sheet, row_lo, row_hi, col_lo, col_hi) = self.rect_params(rect);
        self.conn.execute(
            "DELETE FROM sheet_validations
             WHERE sheet = ? AND row_index >= ? AND row_index < ? AND col_index >= ? AND col_index < ?",
            params![sheet, row_lo, row_hi, col_lo, col_hi],
        )?;
        Ok(())
    }

    fn insert_rows(&mut self, at: usize, count: usize) -> Result<()> {
        let max_rows = self.max_rows()?;
        if at > max_rows {
            return Err(Error::validation(format!(
                "Cannot insert rows at {} in a sheet of {} rows",
                at, max_rows
            )));
        }

        let tx = self.conn.transaction()?;
        for table in ["sheet_cells", "sheet_validations"] {
            tx.execute(
                &format!(
                    "UPDATE {} SET row_index = row_index + ? WHERE sheet = ? AND row_index >= ?",
                    table
                ),
                params![count as i64, self.name, at as i64],
            )?;
        }
        tx.execute(
            "UPDATE sys_sheets SET max_rows = max_rows + ? WHERE name = ?",
            params![count as i64, self.name],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn sort(&mut self, column: usize, ascending: bool) -> Result<()> {
        let max_rows = self.max_rows()?;
        let width = self.max_columns()?;
        if column >= width {
            return Err(Error::validation(format!("Sort column {} is out of bounds", column)));
        }
        if max_rows <= HEADER_ROWS {
            return Ok(());
        }

        let mut working = self.snapshot()?;
        working.sort(column, ascending)?;

        let rect = Rect::new(HEADER_ROWS, 0, max_rows - HEADER_ROWS, width);
        let values = working.get_values(rect)?;
        let rules = working.get_validations(rect)?;

        // Rules are moved with their rows; clear them so the rewrite is not
        // checked against the pre-sort layout.
        self.clear_validations(rect)?;
        self.set_values(rect, &values)?;
        self.set_validations(rect, &rules)
    }
}
