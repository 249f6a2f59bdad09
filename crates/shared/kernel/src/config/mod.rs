//! Layered machine-config loading.
//!
//! Sources, lowest precedence first: the embedded `defaults.yaml`, each machine file in
//! order, then `PINRIG__SECTION__KEY` environment variables. Maps merge deeply; lists
//! replace.

use crate::error::{ConfigError, ConfigErrorExt};
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The only machine-config format version this loader understands.
pub const CONFIG_VERSION: &str = "3";

/// Prefix for environment overrides (`PINRIG__TIMING__HZ=60`).
pub const ENV_PREFIX: &str = "PINRIG";

const VERSION_KEY: &str = "config_version";
const DEFAULTS_YAML: &str = include_str!("defaults.yaml");

/// Builds the merged, unvalidated config tree from defaults, files and environment.
///
/// ```rust,no_run
/// use pinrig_kernel::config::ConfigLoader;
///
/// let raw = ConfigLoader::new().file("config/machine.yaml").load()?;
/// assert!(raw.get("playfields").is_some());
/// # Ok::<(), pinrig_kernel::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    defaults: bool,
    files: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_source: Option<config::Map<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            defaults: true,
            files: Vec::new(),
            env_prefix: Some(ENV_PREFIX.to_owned()),
            env_source: None,
        }
    }
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to layer the built-in machine defaults underneath the files.
    #[must_use]
    pub const fn defaults(mut self, enabled: bool) -> Self {
        self.defaults = enabled;
        self
    }

    #[must_use]
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.files.extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Environment prefix; `None` disables environment overrides.
    #[must_use]
    pub fn env_prefix(mut self, prefix: Option<&str>) -> Self {
        self.env_prefix = prefix.map(str::to_owned);
        self
    }

    /// Reads overrides from this map instead of the process environment.
    #[must_use]
    pub fn env_source(mut self, source: config::Map<String, String>) -> Self {
        self.env_source = Some(source);
        self
    }

    /// Loads and merges every source.
    ///
    /// # Errors
    /// Fails when a file can't be read, lacks a supported `config_version` marker, or is
    /// not valid YAML.
    pub fn load(&self) -> Result<Value, ConfigError> {
        let mut builder = Config::builder();
        if self.defaults {
            builder = builder.add_source(File::from_str(DEFAULTS_YAML, FileFormat::Yaml));
        }

        for path in &self.files {
            let shown = path.display().to_string();
            let text = fs::read_to_string(path).context(format!("reading {shown}"))?;
            check_version(&shown, &text)?;
            debug!(file = %shown, "Adding machine config file");
            builder = builder.add_source(File::from_str(&text, FileFormat::Yaml));
        }

        if let Some(prefix) = &self.env_prefix {
            let env = Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(self.env_source.clone());
            builder = builder.add_source(env);
        }

        let mut tree = builder
            .build()
            .context("Failed to build machine config")?
            .try_deserialize::<Value>()
            .context("Failed to read machine config")?;

        if let Value::Object(map) = &mut tree {
            map.remove(VERSION_KEY);
        } else {
            tree = Value::Object(serde_json::Map::new());
        }

        info!(files = self.files.len(), defaults = self.defaults, "Machine config loaded");
        Ok(tree)
    }
}

/// Checks a file's `config_version`, either as a first-line `#config_version=3` comment or
/// as a top-level `config_version: 3` key.
///
/// # Errors
/// [`ConfigError::MissingVersion`] without a marker, [`ConfigError::UnsupportedVersion`]
/// for any version other than [`CONFIG_VERSION`].
pub fn check_version(file: &str, text: &str) -> Result<(), ConfigError> {
    let marker = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.trim().strip_prefix('#'))
        .and_then(|comment| comment.trim().strip_prefix(VERSION_KEY))
        .and_then(|rest| rest.trim_start().strip_prefix('='))
        .or_else(|| {
            text.lines()
                .find_map(|line| line.strip_prefix(VERSION_KEY)?.trim_start().strip_prefix(':'))
        });

    let Some(version) = marker else {
        return Err(ConfigError::MissingVersion { file: file.to_owned(), context: None });
    };

    let version = version.split('#').next().unwrap_or_default().trim().trim_matches(['"', '\'']);
    if version == CONFIG_VERSION {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedVersion {
            file: file.to_owned(),
            version: version.to_owned(),
            context: None,
        })
    }
}

/// Loads machine files with defaults and environment overrides.
///
/// # Errors
/// See [`ConfigLoader::load`].
pub fn load_machine_config<I, P>(files: I) -> Result<Value, ConfigError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    ConfigLoader::new().files(files).load()
}

/// Loads a single settings file (format from its extension) with `PINRIG__` environment
/// overrides and deserializes it into `T`.
///
/// Used for the tool's own settings, which carry no `config_version` marker.
///
/// # Errors
/// Fails when the file is missing or its content doesn't match `T`.
///
/// # Example
/// ```rust
/// use pinrig_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct ToolSettings {
///     level: Option<String>,
/// }
///
/// let settings: ToolSettings = load_config("pinrig.yaml").unwrap_or_default();
/// ```
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    info!("Loading settings from {}", path.display());

    Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"))
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_marker() {
        assert!(check_version("a.yaml", "#config_version=3\nswitches:\n").is_ok());
        assert!(check_version("a.yaml", "\n# config_version = 3\n").is_ok());
    }

    #[test]
    fn key_marker() {
        assert!(check_version("a.yaml", "switches: {}\nconfig_version: 3\n").is_ok());
        assert!(check_version("a.yaml", "config_version: '3'  # current\n").is_ok());
    }

    #[test]
    fn nested_key_is_not_a_marker() {
        let err = check_version("a.yaml", "hardware:\n  config_version: 3\n").unwrap_err();
        assert_eq!(err.kind(), "missing_version");
    }

    #[test]
    fn unsupported() {
        let err = check_version("old.yaml", "#config_version=2\n").unwrap_err();
        assert_eq!(err.kind(), "unsupported_version");
        assert!(err.to_string().contains("old.yaml declares 2"));
    }

    #[test]
    fn defaults_only() {
        let tree = ConfigLoader::new().env_prefix(None).load().unwrap();
        assert_eq!(tree["timing"]["hz"], 30);
        assert_eq!(tree["hardware"]["platform"], "virtual");
        assert!(tree["playfields"]["playfield"].is_object());
        assert!(tree.get(VERSION_KEY).is_none());
    }
}
