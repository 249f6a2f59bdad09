//! Facade crate for pinrig.
//! Re-exports the domain model, the config kernel, the event bus and the machine runtime.
//! Keep this crate thin: it composes the other crates, it does not implement behavior.
//!
//! ## Usage
//! ```rust
//! let config = pinrig::load_and_validate(Vec::<&str>::new(), pinrig::domain::ValidationPasses::ALL)?;
//! let mut machine = pinrig::machine::Machine::builder().config(&config).build()?;
//! machine.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use pinrig_domain as domain;
pub use pinrig_events as events;
pub use pinrig_kernel as kernel;
pub use pinrig_machine as machine;

pub use pinrig_kernel::{ConfigError, Schema, load_and_validate, validate_machine};
pub use pinrig_machine::{Machine, MachineError};

/// Names of the validation passes accepted by `--skip` and [`domain::ValidationPasses::from`].
pub const PASS_NAMES: &[&str] = &[
    domain::passes::TYPES,
    domain::passes::REQUIRED,
    domain::passes::UNKNOWN_FIELDS,
    domain::passes::REFERENCES,
    domain::passes::DEVICE_RULES,
];

/// Parses a pass name, rejecting unknown ones instead of mapping them to the empty set.
#[must_use]
pub fn pass_from_name(name: &str) -> Option<domain::ValidationPasses> {
    PASS_NAMES
        .contains(&name)
        .then(|| domain::ValidationPasses::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_names_round_trip() {
        for name in PASS_NAMES {
            assert!(pass_from_name(name).is_some_and(|p| !p.is_empty()));
        }
        assert_eq!(pass_from_name("references"), Some(domain::ValidationPasses::REFERENCES));
        assert_eq!(pass_from_name("bogus"), None);
    }
}
