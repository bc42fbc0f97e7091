//! Export command - write the sheet as CSV

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use ledgerline_core::adapters::csv::write_sheet;

use super::{get_context, open_sheet};
use crate::output;

pub fn run(output_path: Option<&Path>) -> Result<()> {
    let ctx = get_context()?;
    let sheet = open_sheet(&ctx)?;

    match output_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let rows = write_sheet(&sheet, file)?;
            output::success(&format!("Exported {} rows to {}", rows, path.display()));
        }
        None => {
            write_sheet(&sheet, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
