use super::load;
use crate::models::args::ConfigArgs;
use anyhow::Result;
use pinrig::ConfigError;
use pinrig::domain::Section;
use std::process::ExitCode;

/// Validates the config and prints a summary, or every issue on failure.
///
/// # Errors
/// Returns an error if a file can't be loaded at all (missing, unreadable, no
/// `config_version`). Validation issues are reported and turned into a failing exit code.
pub fn validate(args: &ConfigArgs) -> Result<ExitCode> {
    let config = match load(args) {
        Ok(config) => config,
        Err(ConfigError::Validation { report, .. }) => {
            eprintln!("❌ Invalid machine config, {report}");
            return Ok(ExitCode::FAILURE);
        },
        Err(e) => return Err(e.into()),
    };

    let devices: usize = config
        .section_names()
        .filter_map(|name| match config.section(name) {
            Some(Section::Collection(entries)) => Some(entries.len()),
            _ => None,
        })
        .sum();

    println!(
        "✅ Machine config valid: {} file(s), {} sections, {devices} devices",
        args.files.len(),
        config.len()
    );
    Ok(ExitCode::SUCCESS)
}
