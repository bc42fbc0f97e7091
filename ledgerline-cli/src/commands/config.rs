//! Config command - show and change settings

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use ledgerline_core::config::parse_zone;
use ledgerline_core::{Error, SheetStore};

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the sheet's time zone, or the zone CSV dates are read in
    SetZone {
        /// IANA zone name, e.g. America/New_York
        zone: String,
        /// Set the zone zone-less CSV dates are read in instead
        #[arg(long)]
        runtime: bool,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let mut ctx = get_context()?;

    match command {
        ConfigCommands::Show { json } => {
            let sheet_zone = match ctx.open_sheet() {
                Ok(sheet) => Some(sheet.time_zone()),
                Err(Error::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            };

            if json {
                return output::json(&serde_json::json!({
                    "data_dir": ctx.data_dir.to_string_lossy(),
                    "sheet_name": ctx.config.sheet_name,
                    "store_time_zone": ctx.config.store_zone.name(),
                    "runtime_time_zone": ctx.config.runtime_zone.name(),
                    "sheet_time_zone": sheet_zone.map(|z| z.name()),
                }));
            }

            println!("{}", "Settings".bold());
            println!("  Data directory: {}", ctx.data_dir.display());
            println!("  Sheet: {}", ctx.config.sheet_name);
            println!("  Store time zone: {}", ctx.config.store_zone.name());
            println!("  Runtime time zone: {}", ctx.config.runtime_zone.name());
            match sheet_zone {
                Some(zone) => println!("  Sheet time zone: {}", zone.name()),
                None => println!("  Sheet time zone: {}", "(no sheet yet)".dimmed()),
            }
        }
        ConfigCommands::SetZone { zone, runtime } => {
            let tz = parse_zone(&zone)?;
            if runtime {
                ctx.config.runtime_zone = tz;
                ctx.config.save(&ctx.data_dir)?;
                output::success(&format!("CSV dates without a zone are now read in {}", tz.name()));
                return Ok(());
            }

            ctx.config.store_zone = tz;
            ctx.config.save(&ctx.data_dir)?;
            match ctx.open_sheet() {
                Ok(mut sheet) => {
                    sheet.set_time_zone(tz)?;
                    output::success(&format!("Sheet time zone set to {}", tz.name()));
                    output::warning("Stored dates keep their instants; they now display in the new zone.");
                }
                Err(Error::NotFound(_)) => {
                    output::success(&format!("New sheets will use {}", tz.name()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
