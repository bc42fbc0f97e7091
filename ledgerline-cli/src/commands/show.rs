//! Show command - print the sheet's newest rows

use anyhow::Result;
use ledgerline_core::adapters::csv::render_value;
use ledgerline_core::{Rect, SheetStore};
use serde_json::{Map, Value as JsonValue};

use super::{get_context, open_sheet};
use crate::output;

pub fn run(limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let sheet = open_sheet(&ctx)?;
    let zone = sheet.time_zone();

    let header = sheet.header()?;
    let last_row = sheet.last_row()?;
    let count = last_row.saturating_sub(1).min(limit);
    let rows = if count == 0 || header.is_empty() {
        Vec::new()
    } else {
        sheet.get_values(Rect::new(1, 0, count, header.len()))?
    };

    let names: Vec<String> = header.iter().map(|h| h.to_string()).collect();

    if json {
        let objects: Vec<JsonValue> = rows
            .iter()
            .map(|row| {
                let object: Map<String, JsonValue> = names
                    .iter()
                    .zip(row)
                    .filter(|(name, value)| !name.is_empty() && !value.is_empty())
                    .map(|(name, value)| (name.clone(), JsonValue::String(render_value(value, zone))))
                    .collect();
                JsonValue::Object(object)
            })
            .collect();
        return output::json(&objects);
    }

    if rows.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(names.clone());
    for row in &rows {
        table.add_row(row.iter().map(|v| render_value(v, zone)).collect::<Vec<_>>());
    }
    println!("{}", table);

    let total = last_row - 1;
    if total > count {
        output::info(&format!("Showing {} of {} rows", count, total));
    }
    Ok(())
}
