//! # CLI Argument Definitions
//!
//! Command-line structure of the `pinrig` binary: global logging flags and one
//! subcommand per task.

use clap::{Args, Parser, Subcommand};
use pinrig::domain::ValidationPasses;
use std::path::PathBuf;

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "pinrig")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Validate, inspect and run pinball machine configs")]
pub struct Cli {
    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Logging flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct LogArgs {
    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Also write rolling log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Where the machine config comes from.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Machine config files, later files override earlier ones
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Don't merge the built-in machine defaults
    #[arg(long)]
    pub no_defaults: bool,

    /// Validation passes to skip (types, required, unknown_fields, references, device_rules)
    #[arg(long, value_parser = parse_pass)]
    pub skip: Vec<ValidationPasses>,
}

impl ConfigArgs {
    /// Every pass except the skipped ones.
    #[must_use]
    pub fn passes(&self) -> ValidationPasses {
        self.skip.iter().fold(ValidationPasses::ALL, |passes, skip| passes - *skip)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate machine configs and report every issue
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the validated config as JSON
    Dump {
        #[command(flatten)]
        config: ConfigArgs,

        /// Only print this section
        #[arg(short, long)]
        section: Option<String>,
    },
    /// List schema sections, or the fields of one section
    Schema {
        /// Section to describe
        section: Option<String>,
    },
    /// Boot a machine on the virtual platform and print its events
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Stop after this many milliseconds of machine time (runs until Ctrl-C otherwise)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Balls known to the machine, instead of the sum of the initial device counts
        #[arg(long)]
        balls_known: Option<u32>,
    },
}

fn parse_pass(name: &str) -> Result<ValidationPasses, String> {
    pinrig::pass_from_name(name)
        .ok_or_else(|| format!("unknown pass '{name}', expected one of: {}", pinrig::PASS_NAMES.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_passes_are_removed() {
        let cli = Cli::parse_from([
            "pinrig",
            "validate",
            "machine.yaml",
            "--skip",
            "references",
            "--skip",
            "device_rules",
        ]);
        let Command::Validate { config } = cli.command else {
            panic!("expected validate");
        };
        let passes = config.passes();
        assert!(!passes.contains(ValidationPasses::REFERENCES));
        assert!(!passes.contains(ValidationPasses::DEVICE_RULES));
        assert!(passes.contains(ValidationPasses::TYPES));
    }

    #[test]
    fn unknown_pass_is_rejected() {
        let err = Cli::try_parse_from(["pinrig", "validate", "m.yaml", "--skip", "bogus"]).unwrap_err();
        assert!(err.to_string().contains("unknown pass 'bogus'"));
    }

    #[test]
    fn log_flags_are_global() {
        let cli = Cli::parse_from(["pinrig", "schema", "--log-level", "debug", "--json-logs"]);
        assert_eq!(cli.log.log_level, "debug");
        assert!(cli.log.json_logs);
    }
}
