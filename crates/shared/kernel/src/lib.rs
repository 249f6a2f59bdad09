//! Machine-config loading and validation.
//!
//! Keep this crate free of runtime concerns: it turns YAML files into a validated
//! [`MachineConfig`](pinrig_domain::MachineConfig) and nothing more.
//!
//! ```rust
//! use pinrig_kernel::config::ConfigLoader;
//! use pinrig_kernel::validate::validate_machine;
//! use pinrig_kernel::domain::ValidationPasses;
//!
//! let raw = ConfigLoader::new().env_prefix(None).load()?;
//! let config = validate_machine(&raw, ValidationPasses::ALL)?;
//! assert!(config.contains_device("playfields", "playfield"));
//! # Ok::<(), pinrig_kernel::error::ConfigError>(())
//! ```
pub mod config;
pub mod error;
pub mod schema;
pub mod timing;
pub mod validate;

pub use pinrig_domain as domain;

pub use error::{ConfigError, ConfigErrorExt};
pub use schema::Schema;
pub use validate::{ValidationReport, Validator, validate_machine};

use std::path::Path;

/// Loads `files` (with defaults and environment overrides) and validates the result.
///
/// # Errors
/// Any loading error, or [`ConfigError::Validation`] listing every issue.
pub fn load_and_validate<I, P>(
    files: I,
    passes: domain::ValidationPasses,
) -> Result<domain::MachineConfig, ConfigError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let raw = config::load_machine_config(files)?;
    validate_machine(&raw, passes)
}
