//! Rule command - manage column validation rules

use anyhow::{Context, Result};
use clap::Subcommand;
use ledgerline_core::domain::StoreSchema;
use ledgerline_core::{SheetStore, ValidationRule};

use super::{get_context, open_sheet};
use crate::output;

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Set the rule of a column, e.g. `one-of:Food|Rent`, `between:-500:500`,
    /// `date`, `max-length:40`
    Set {
        /// Column name
        column: String,
        /// Rule
        rule: String,
    },
    /// Remove the rule of a column
    Clear {
        /// Column name
        column: String,
    },
    /// List column rules
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: RuleCommands) -> Result<()> {
    let ctx = get_context()?;
    let mut sheet = open_sheet(&ctx)?;
    let header = sheet.header()?;
    let schema = StoreSchema::from_header(&header);
    let column_of = |name: &str| {
        schema
            .column(name)
            .with_context(|| format!("Sheet has no '{}' column", name))
    };

    match command {
        RuleCommands::Set { column, rule } => {
            let index = column_of(&column)?;
            let rule: ValidationRule = rule.parse()?;
            sheet.set_column_rule(index, Some(&rule))?;
            output::success(&format!("'{}' now requires {}", column, rule));
        }
        RuleCommands::Clear { column } => {
            let index = column_of(&column)?;
            sheet.set_column_rule(index, None)?;
            output::success(&format!("Cleared the rule of '{}'", column));
        }
        RuleCommands::List { json } => {
            let rules: Vec<(String, ValidationRule)> = sheet
                .column_rules()?
                .into_iter()
                .map(|(index, rule)| {
                    let name = header
                        .get(index)
                        .map(|h| h.to_string())
                        .unwrap_or_else(|| index.to_string());
                    (name, rule)
                })
                .collect();

            if json {
                let map: serde_json::Map<String, serde_json::Value> = rules
                    .iter()
                    .map(|(name, rule)| (name.clone(), serde_json::Value::String(rule.to_string())))
                    .collect();
                return output::json(&map);
            }

            if rules.is_empty() {
                println!("No validation rules.");
                return Ok(());
            }
            let mut table = output::create_table();
            table.set_header(vec!["Column", "Rule"]);
            for (name, rule) in rules {
                table.add_row(vec![name, rule.to_string()]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
