use anyhow::{Result, bail};
use pinrig::Schema;

/// Lists the built-in schema sections, or the field specs of one section.
///
/// # Errors
/// Returns an error if the embedded schema is malformed or the section is unknown.
pub fn schema(section: Option<&str>) -> Result<()> {
    let schema = Schema::builtin()?;

    match section {
        None => print!("{}", schema.summary()),
        Some(name) => {
            let Some(description) = schema.describe(name) else {
                bail!("Unknown section '{name}', run `pinrig schema` to list sections");
            };
            print!("{description}");
        },
    }

    Ok(())
}
