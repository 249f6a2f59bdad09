#![allow(clippy::print_stderr, clippy::print_stdout)]

pub mod handlers;
pub mod models;

use crate::handlers::{dump, run, schema, validate};
use crate::models::args::{Cli, Command, LogArgs};

use anyhow::{Context, Result};
use clap::Parser;
use pinrig_logger::{LogFormat, LogSettings, Logger};
use std::process::ExitCode;

#[pinrig_runtime::main(realtime)]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _logger = init_logging(&cli.log)?;

    match cli.command {
        Command::Validate { config } => return validate::validate(&config),
        Command::Dump { config, section } => dump::dump(&config, section.as_deref())?,
        Command::Schema { section } => schema::schema(section.as_deref())?,
        Command::Run { config, duration_ms, balls_known } => {
            run::run(&config, duration_ms, balls_known).await?;
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(args: &LogArgs) -> Result<Logger> {
    let settings = LogSettings {
        level: args.log_level.clone(),
        format: if args.json_logs { LogFormat::Json } else { LogFormat::Compact },
        directory: args.log_dir.clone(),
        json_files: args.json_logs,
        ..LogSettings::default()
    };
    Logger::from_settings(env!("CARGO_BIN_NAME"), &settings).context("Failed to initialize logging")
}
