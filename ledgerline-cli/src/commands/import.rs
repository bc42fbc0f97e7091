//! Import command - reconcile a CSV into the sheet

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use ledgerline_core::adapters::csv::read_batch_from_path;
use ledgerline_core::services::ImportLock;
use ledgerline_core::{ImportPreview, ImportSummary, OperationResult};

use super::{get_context, open_sheet};
use crate::output;

fn print_preview(preview: &ImportPreview) {
    let mut table = output::create_table();
    table.set_header(vec!["Field", "In sheet"]);
    for (name, known) in &preview.fields {
        let mark = if *known { "yes".green() } else { "no - ignored".yellow() };
        table.add_row(vec![name.clone(), mark.to_string()]);
    }
    println!("{}", table);
    println!();
    println!(
        "  {} to add, {} to modify, {} unchanged ({} in file)",
        preview.to_add.to_string().green(),
        preview.to_modify.to_string().cyan(),
        preview.total.saturating_sub(preview.to_add + preview.to_modify),
        preview.total
    );
}

fn print_summary(summary: &ImportSummary) {
    output::success(&format!(
        "Imported {} transactions: {} added, {} modified",
        summary.total, summary.rows_added, summary.rows_modified
    ));
    if summary.rows_added > 0 {
        println!("  {} {}", "Added:".dimmed(), output::range(summary.added));
    }
    if summary.rows_modified > 0 {
        println!(
            "  {} {} ({} cells)",
            "Modified:".dimmed(),
            output::range(summary.modified),
            summary.cells_modified
        );
    }
}

/// JSON mode: one `OperationResult` on stdout, success or not
fn run_json(file: &Path, preview: bool) -> Result<()> {
    let outcome = (|| -> Result<serde_json::Value> {
        let ctx = get_context()?;
        let _lock = ImportLock::acquire(&ctx.data_dir)?;
        let mut sheet = open_sheet(&ctx)?;
        let batch = read_batch_from_path(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        if preview {
            Ok(serde_json::to_value(ctx.import_service.preview(&sheet, batch)?)?)
        } else {
            Ok(serde_json::to_value(ctx.import_service.commit(&mut sheet, batch)?)?)
        }
    })();

    let (result, failed) = match outcome {
        Ok(data) => (OperationResult::ok(data), None),
        Err(e) => {
            let message = format!("{:#}", e);
            (OperationResult::fail(message.clone()), Some(message))
        }
    };
    output::json(&result.with_context("file", serde_json::json!(file.display().to_string())))?;

    match failed {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

pub fn run(file: &Path, preview: bool, yes: bool, json: bool) -> Result<()> {
    if json {
        return run_json(file, preview);
    }

    let ctx = get_context()?;
    let _lock = ImportLock::acquire(&ctx.data_dir)?;
    let mut sheet = open_sheet(&ctx)?;

    let batch = read_batch_from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let result = ctx.import_service.preview(&sheet, batch.clone())?;

    if preview {
        println!("{}", "PREVIEW MODE - No changes applied".yellow());
        println!();
        print_preview(&result);
        return Ok(());
    }

    print_preview(&result);
    println!();
    if result.to_add == 0 && result.to_modify == 0 {
        output::info("Nothing to import");
        return Ok(());
    }
    if !yes
        && !Confirm::new()
            .with_prompt("Import these transactions?")
            .default(true)
            .interact()?
    {
        println!("{}", "Cancelled".dimmed());
        return Ok(());
    }

    let summary = ctx.import_service.commit(&mut sheet, batch)?;
    print_summary(&summary);
    Ok(())
}
