//! TCM clinic command-line front end.

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tcm_clinic_core::{ClinicConfig, TcmClinic};
use tracing::debug;

mod cli;
mod commands;
mod logging;

use crate::cli::{Cli, Command, LogFormatArg};
use crate::logging::{init_logging, LogConfig, LogFormat};

fn main() {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = ClinicConfig::from_env().context("invalid configuration")?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db).context("invalid --db")?;
    }
    debug!(db = %config.db_path().display(), "opening clinic database");

    let clinic = TcmClinic::open(config).context("failed to open clinic database")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let ok = match cli.command {
        Command::ImportHerbs { file } => commands::import_herbs(&clinic, &file, &mut out)?,
        Command::ImportFormulas { file } => commands::import_formulas(&clinic, &file, &mut out)?,
        Command::Formula { key } => commands::show_formula(&clinic, &key, &mut out)?,
        Command::Search { query, limit } => commands::search(&clinic, &query, limit, &mut out)?,
        Command::Audit => commands::audit(&clinic, &mut out)?,
        Command::Prescription { id, format } => {
            commands::prescription(&clinic, &id, format, &mut out)?
        }
    };
    out.flush()?;
    Ok(ok)
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    LogConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_format(format)
        .with_ansi(io::stderr().is_terminal())
}
