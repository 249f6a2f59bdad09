pub mod dump;
pub mod run;
pub mod schema;
pub mod validate;

use crate::models::args::ConfigArgs;
use pinrig::ConfigError;
use pinrig::domain::MachineConfig;
use pinrig::kernel::config::ConfigLoader;

/// Loads the files named on the command line and validates the merged tree.
///
/// # Errors
/// Any loading error, or [`ConfigError::Validation`] with every issue found.
pub fn load(args: &ConfigArgs) -> Result<MachineConfig, ConfigError> {
    let raw = ConfigLoader::new().defaults(!args.no_defaults).files(&args.files).load()?;
    pinrig::validate_machine(&raw, args.passes())
}
