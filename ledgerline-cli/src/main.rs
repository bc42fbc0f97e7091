//! Ledgerline CLI - reconcile transaction CSVs into a sheet

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{config, export, import, init, logs, rule, show};

/// Ledgerline - import prepared transaction CSVs into a sheet, once
#[derive(Parser)]
#[command(name = "lline", version, about, long_about = None)]
struct Cli {
    /// Print engine progress, including every range read and written
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the sheet
    Init {
        /// Column names, comma-separated (the first cell stays a blank marker)
        #[arg(long, value_delimiter = ',')]
        header: Option<Vec<String>>,
        /// Time zone of the sheet (IANA name, defaults to the configured one)
        #[arg(long)]
        time_zone: Option<String>,
        /// Rows to allocate, header included
        #[arg(long, default_value = "1000")]
        rows: usize,
    },

    /// Import transactions from CSV
    Import {
        /// Path to CSV file
        file: PathBuf,
        /// Preview without importing
        #[arg(long)]
        preview: bool,
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the sheet's rows
    Show {
        /// Number of rows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the sheet as CSV
    Export {
        /// Output file (stdout when omitted)
        output: Option<PathBuf>,
    },

    /// Manage column validation rules
    Rule {
        #[command(subcommand)]
        command: rule::RuleCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the import event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("ledgerline_core=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { header, time_zone, rows } => init::run(header, time_zone, rows),
        Commands::Import { file, preview, yes, json } => import::run(&file, preview, yes, json),
        Commands::Show { limit, json } => show::run(limit, json),
        Commands::Export { output } => export::run(output.as_deref()),
        Commands::Rule { command } => rule::run(command),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
