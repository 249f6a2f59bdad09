use crate::validate::ValidationReport;
use std::borrow::Cow;

/// Errors raised while loading or validating a machine configuration.
#[pinrig_derive::pinrig_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("JSON error{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    /// A machine file has no `config_version` marker.
    #[error("Missing config_version marker{}: {file}", format_context(.context))]
    MissingVersion { file: String, context: Option<Cow<'static, str>> },

    #[error(
        "Unsupported config_version{}: {file} declares {version}, expected {}",
        format_context(.context),
        crate::config::CONFIG_VERSION
    )]
    UnsupportedVersion { file: String, version: String, context: Option<Cow<'static, str>> },

    /// A malformed field specification or schema block.
    #[error("Schema error{}: {message}", format_context(.context))]
    Schema { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Every problem found in the config, not just the first.
    #[error("Invalid machine config{}: {report}", format_context(.context))]
    Validation { report: ValidationReport, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ConfigError {
    /// The validation report, when this is a validation failure.
    #[must_use]
    pub const fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation { report, .. } => Some(report),
            _ => None,
        }
    }
}
