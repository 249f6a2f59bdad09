use super::load;
use crate::models::args::ConfigArgs;
use anyhow::{Context, Result, bail};

/// Prints the validated config, or one section of it, as pretty JSON.
///
/// # Errors
/// Returns an error if loading or validation fails, or the section doesn't exist.
pub fn dump(args: &ConfigArgs, section: Option<&str>) -> Result<()> {
    let config = load(args).context("Failed to load machine config")?;

    let json = match section {
        None => serde_json::to_string_pretty(&config)?,
        Some(name) => {
            let Some(section) = config.section(name) else {
                let known: Vec<&str> = config.section_names().collect();
                bail!("Section '{name}' is not in this config (have: {})", known.join(", "));
            };
            serde_json::to_string_pretty(section)?
        },
    };

    println!("{json}");
    Ok(())
}
