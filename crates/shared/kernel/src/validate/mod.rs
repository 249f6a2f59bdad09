//! Schema-driven validation of a merged config tree.
//!
//! Validation never stops at the first problem: every issue from every enabled pass is
//! collected into one [`ValidationReport`].

mod coerce;
mod issue;
mod rules;

pub use coerce::json_to_value;
pub use issue::{Issue, IssueKind, ValidationReport};

use crate::error::ConfigError;
use crate::schema::{EXTENSION_KEY, Schema, SectionKind, SectionSpec};
use crate::timing::DEFAULT_HZ;
use coerce::{Coercer, Failure};
use fxhash::{FxHashMap, FxHashSet};
use pinrig_domain::{ConfigValue, MachineConfig, Section, Settings, ValidationPasses};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub struct Validator<'a> {
    schema: &'a Schema,
    passes: ValidationPasses,
}

impl std::fmt::Debug for Validator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("sections", &self.schema.section_names().count())
            .field("passes", &self.passes)
            .finish()
    }
}

/// Issues tagged with the pass that produced them.
type Found = Vec<(ValidationPasses, Issue)>;

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema, passes: ValidationPasses::ALL }
    }

    #[must_use]
    pub const fn passes(mut self, passes: ValidationPasses) -> Self {
        self.passes = passes;
        self
    }

    /// Validates `raw` into a typed [`MachineConfig`].
    ///
    /// # Errors
    /// [`ConfigError::Validation`] carrying every issue found by the enabled passes.
    pub fn validate(&self, raw: &Value) -> Result<MachineConfig, ConfigError> {
        let mut found = Found::new();
        let empty = Map::new();
        let root = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                found.push((
                    ValidationPasses::TYPES,
                    Issue::new("(root)", IssueKind::InvalidShape { expected: "mapping".into() }),
                ));
                &empty
            },
        };

        let coercer = Coercer::new(hz(root));
        let mut sections = BTreeMap::new();
        for (name, value) in root {
            if name == EXTENSION_KEY {
                continue;
            }
            let section = match self.schema.section(name) {
                Some(spec) => Self::section(coercer, name, spec, value, &mut found),
                None => {
                    warn!(section = %name, "Section not described by the schema, kept as loaded");
                    Section::Passthrough(json_to_value(value))
                },
            };
            sections.insert(name.clone(), section);
        }

        for issue in rules::apply(&mut sections) {
            found.push((ValidationPasses::DEVICE_RULES, issue));
        }
        for issue in self.resolve_references(&mut sections) {
            found.push((ValidationPasses::REFERENCES, issue));
        }

        let issues: Vec<Issue> =
            found.into_iter().filter(|(pass, _)| self.passes.contains(*pass)).map(|(_, issue)| issue).collect();
        if !issues.is_empty() {
            let report = ValidationReport::new(issues);
            debug!(issues = report.len(), "Machine config rejected");
            return Err(ConfigError::Validation { report, context: None });
        }

        let mut config = MachineConfig::new();
        for (name, section) in sections {
            config.insert(name, section);
        }
        info!(sections = config.len(), "Machine config validated");
        Ok(config)
    }

    fn section(
        coercer: Coercer,
        name: &str,
        spec: &SectionSpec,
        value: &Value,
        found: &mut Found,
    ) -> Section {
        let empty = Map::new();
        let block = match value {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                found.push((
                    ValidationPasses::TYPES,
                    Issue::new(name, IssueKind::InvalidShape { expected: "mapping".into() }),
                ));
                &empty
            },
        };

        match spec.kind {
            SectionKind::Singleton => Section::Singleton(Self::entry(coercer, name, None, spec, block, found)),
            SectionKind::Collection => {
                let mut entries = BTreeMap::new();
                for (device, body) in block {
                    let path = format!("{name}.{device}");
                    let body = match body {
                        Value::Object(map) => map,
                        Value::Null => &empty,
                        _ => {
                            found.push((
                                ValidationPasses::TYPES,
                                Issue::new(&path, IssueKind::InvalidShape { expected: "mapping".into() }),
                            ));
                            continue;
                        },
                    };
                    let settings = Self::entry(coercer, &path, Some(device), spec, body, found);
                    entries.insert(device.clone(), settings);
                }
                debug!(section = %name, devices = entries.len(), "Validated collection");
                Section::Collection(entries)
            },
        }
    }

    fn entry(
        coercer: Coercer,
        path: &str,
        device: Option<&str>,
        spec: &SectionSpec,
        body: &Map<String, Value>,
        found: &mut Found,
    ) -> Settings {
        let mut settings = Settings::new();

        for (field, field_spec) in &spec.fields {
            let field_path = format!("{path}.{field}");
            let value = match coercer.field(field_spec, body.get(field), device) {
                Ok(value) => value,
                Err(failures) => {
                    for (index, failure) in failures {
                        let at = index.map_or_else(|| field_path.clone(), |i| format!("{field_path}[{i}]"));
                        let (pass, kind) = match failure {
                            Failure::Missing => (ValidationPasses::REQUIRED, IssueKind::MissingRequired),
                            Failure::Mismatch { expected, found: actual } => {
                                (ValidationPasses::TYPES, IssueKind::TypeMismatch { expected, found: actual })
                            },
                            Failure::Shape { expected } => (ValidationPasses::TYPES, IssueKind::InvalidShape { expected }),
                        };
                        found.push((pass, Issue::new(at, kind)));
                    }
                    coercer.default(field_spec, device).unwrap_or(ConfigValue::Null)
                },
            };
            settings.insert(field.clone(), value);
        }

        for (key, value) in body {
            if !spec.fields.contains_key(key) {
                found.push((ValidationPasses::UNKNOWN_FIELDS, Issue::new(format!("{path}.{key}"), IssueKind::UnknownField)));
                settings.insert(key.clone(), json_to_value(value));
            }
        }

        settings
    }

    /// Points every reference at the collection that holds its name, reporting the rest.
    fn resolve_references(&self, sections: &mut BTreeMap<String, Section>) -> Vec<Issue> {
        let index: FxHashMap<String, FxHashSet<String>> = sections
            .iter()
            .filter_map(|(name, section)| match section {
                Section::Collection(entries) => Some((name.clone(), entries.keys().cloned().collect())),
                _ => None,
            })
            .collect();

        let mut issues = Vec::new();
        for (name, section) in sections.iter_mut() {
            let Some(spec) = self.schema.section(name) else { continue };
            match section {
                Section::Singleton(settings) => resolve_settings(name, spec, settings, &index, &mut issues),
                Section::Collection(entries) => {
                    for (device, settings) in entries.iter_mut() {
                        resolve_settings(&format!("{name}.{device}"), spec, settings, &index, &mut issues);
                    }
                },
                Section::Passthrough(_) => {},
            }
        }
        issues
    }
}

fn resolve_settings(
    path: &str,
    spec: &SectionSpec,
    settings: &mut Settings,
    index: &FxHashMap<String, FxHashSet<String>>,
    issues: &mut Vec<Issue>,
) {
    for (field, field_spec) in &spec.fields {
        let targets = field_spec.value_type.targets();
        if targets.is_empty() {
            continue;
        }
        let Some(value) = settings.get_mut(field) else { continue };
        let field_path = format!("{path}.{field}");
        match value {
            ConfigValue::List(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    resolve(&format!("{field_path}[{i}]"), item, targets, index, issues);
                }
            },
            single => resolve(&field_path, single, targets, index, issues),
        }
    }
}

fn resolve(
    path: &str,
    value: &mut ConfigValue,
    targets: &[String],
    index: &FxHashMap<String, FxHashSet<String>>,
    issues: &mut Vec<Issue>,
) {
    let ConfigValue::Ref { collection, name } = value else { return };
    match targets.iter().find(|t| index.get(*t).is_some_and(|names| names.contains(name.as_str()))) {
        Some(target) => collection.clone_from(target),
        None => issues.push(Issue::new(
            path,
            IssueKind::MissingReference { name: name.clone(), searched: targets.to_vec() },
        )),
    }
}

fn hz(root: &Map<String, Value>) -> u64 {
    root.get("timing")
        .and_then(|t| t.get("hz"))
        .and_then(|hz| hz.as_u64().or_else(|| hz.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|hz| *hz > 0)
        .unwrap_or(DEFAULT_HZ)
}

/// Validates `raw` against the built-in schema, extended by its `config_validator` block.
///
/// # Errors
/// [`ConfigError::Schema`] for a bad extension, [`ConfigError::Validation`] otherwise.
pub fn validate_machine(raw: &Value, passes: ValidationPasses) -> Result<MachineConfig, ConfigError> {
    let schema = schema_for(raw)?;
    Validator::new(&schema).passes(passes).validate(raw)
}

/// The built-in schema plus the config's own `config_validator` extension.
///
/// # Errors
/// [`ConfigError::Schema`] for a malformed extension.
pub fn schema_for(raw: &Value) -> Result<Schema, ConfigError> {
    let mut schema = Schema::builtin()?;
    if let Some(extension) = raw.get(EXTENSION_KEY).filter(|v| !v.is_null()) {
        schema.extend(extension)?;
    }
    Ok(schema)
}
