//! Ledgerline Core - reconciling transaction CSV imports with a sheet
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: values, schemas, batches, rectangles, validation rules
//! - **ports**: the `SheetStore` trait the engine reads and writes through
//! - **services**: the import engine (normalize, identify, match, diff, write)
//!   plus migrations, the event log and the import lock
//! - **adapters**: DuckDB and in-memory sheets, CSV reading and writing

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbSheet;
use config::Config;
use services::{ImportService, LoggingService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{Batch, ImportContext, Rect, ValidationRule, Value};
pub use ports::SheetStore;
pub use services::{ImportPreview, ImportSummary};

/// File holding the sheet inside the data directory
pub const SHEET_DB_FILE: &str = "ledgerline.duckdb";

/// Main context for Ledgerline operations
///
/// Holds the configuration and the services shared by every command.
pub struct LedgerlineContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub logging_service: Arc<LoggingService>,
    pub import_service: ImportService,
}

impl LedgerlineContext {
    /// Create a context over a data directory, creating it when missing
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let config = Config::load(data_dir)?;
        let logging_service = Arc::new(LoggingService::new(
            data_dir,
            env!("CARGO_PKG_VERSION"),
        )?);
        let import_service =
            ImportService::new(config.runtime_zone).with_logging(Arc::clone(&logging_service));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            logging_service,
            import_service,
        })
    }

    pub fn sheet_path(&self) -> PathBuf {
        self.data_dir.join(SHEET_DB_FILE)
    }

    /// Open the configured sheet
    pub fn open_sheet(&self) -> domain::result::Result<DuckDbSheet> {
        DuckDbSheet::open(&self.sheet_path(), &self.config.sheet_name)
    }

    /// Create the configured sheet in the configured store zone
    pub fn create_sheet(&self, header: &[Value], max_rows: usize) -> domain::result::Result<DuckDbSheet> {
        DuckDbSheet::create(
            &self.sheet_path(),
            &self.config.sheet_name,
            self.config.store_zone,
            header,
            max_rows,
        )
    }
}
