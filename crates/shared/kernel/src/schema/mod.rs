//! Section and field-spec registry.

use crate::error::{ConfigError, ConfigErrorExt};
use config::{Config, File, FileFormat};
use pinrig_domain::{DefaultValue, FieldSpec, Scope, ValueType};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

const BUILTIN_YAML: &str = include_str!("schema.yaml");

/// Top-level key under which a machine config extends the schema.
pub const EXTENSION_KEY: &str = "config_validator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SectionKind {
    /// One settings block.
    Singleton,
    /// Named device entries.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSpec {
    pub kind: SectionKind,
    pub fields: BTreeMap<String, FieldSpec>,
}

impl SectionSpec {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }
}

/// Every section the validator knows how to check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    sections: BTreeMap<String, SectionSpec>,
}

impl Schema {
    /// The embedded schema.
    ///
    /// # Errors
    /// Only if the embedded YAML is malformed.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_YAML).context("built-in schema")
    }

    /// Parses a `sections: { <name>: { kind, fields } }` document.
    ///
    /// # Errors
    /// [`ConfigError::Config`] for invalid YAML, [`ConfigError::Schema`] for a malformed
    /// section or field spec.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let tree = Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Value>()?;

        let mut schema = Self::default();
        match tree.get("sections") {
            Some(sections) => schema.merge_sections(sections, SectionKind::Singleton)?,
            None => return Err(schema_error("schema document has no `sections` key")),
        }
        Ok(schema)
    }

    /// Adds or overrides sections from a machine config's `config_validator` block.
    ///
    /// Each entry is either `{ kind, fields: {...} }` or a bare field map. Fields of an
    /// existing section are added or replaced; new sections default to collections.
    ///
    /// # Errors
    /// [`ConfigError::Schema`] for a malformed block or spec.
    pub fn extend(&mut self, extension: &Value) -> Result<(), ConfigError> {
        self.merge_sections(extension, SectionKind::Collection).context(EXTENSION_KEY)
    }

    fn merge_sections(&mut self, sections: &Value, default_kind: SectionKind) -> Result<(), ConfigError> {
        let Value::Object(sections) = sections else {
            return Err(schema_error("sections must be a mapping"));
        };

        for (name, block) in sections {
            let Value::Object(block) = block else {
                return Err(schema_error(format!("{name}: section must be a mapping")));
            };

            let (kind, fields) = match block.get("fields") {
                Some(Value::Object(fields)) => {
                    let kind = block
                        .get("kind")
                        .and_then(Value::as_str)
                        .map(|k| {
                            SectionKind::from_str(k)
                                .map_err(|_| schema_error(format!("{name}: unknown section kind '{k}'")))
                        })
                        .transpose()?;
                    (kind, fields)
                },
                Some(_) => return Err(schema_error(format!("{name}.fields must be a mapping"))),
                None => (None, block),
            };

            let existing = self.sections.get(name).map(|s| s.kind);
            let kind = kind.or(existing).unwrap_or(default_kind);
            let section = self
                .sections
                .entry(name.clone())
                .or_insert_with(|| SectionSpec { kind, fields: BTreeMap::new() });
            section.kind = kind;

            for (field, spec) in fields {
                let text = match spec {
                    Value::String(s) => s.as_str(),
                    _ => return Err(schema_error(format!("{name}.{field}: spec must be a string"))),
                };
                let parsed = parse_field_spec(text)
                    .map_err(|msg| schema_error(format!("{name}.{field}: {msg}")))?;
                section.fields.insert(field.clone(), parsed);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionSpec> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionSpec)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Human-readable listing of one section's fields, or `None` if unknown.
    #[must_use]
    pub fn describe(&self, name: &str) -> Option<String> {
        let section = self.sections.get(name)?;
        let width = section.fields.keys().map(String::len).max().unwrap_or(0);
        let mut out = format!("{name} ({})\n", section.kind);
        for (field, spec) in &section.fields {
            let _ = writeln!(out, "  {field:<width$}  {spec}");
        }
        Some(out)
    }

    /// One line per section: name, kind and field count.
    #[must_use]
    pub fn summary(&self) -> String {
        let width = self.sections.keys().map(String::len).max().unwrap_or(0);
        let mut out = String::new();
        for (name, section) in &self.sections {
            let _ = writeln!(
                out,
                "{name:<width$}  {:<10}  {} fields",
                section.kind.to_string(),
                section.fields.len()
            );
        }
        out
    }
}

fn schema_error(message: impl Into<std::borrow::Cow<'static, str>>) -> ConfigError {
    ConfigError::Schema { message: message.into(), context: None }
}

/// Parses `scope|type|default`, or `scope|type|validator|default` with the validator
/// segment ignored.
///
/// # Errors
/// A message describing the malformed part.
pub fn parse_field_spec(text: &str) -> Result<FieldSpec, String> {
    let parts: Vec<&str> = text.split('|').map(str::trim).collect();
    let (scope, value_type, default) = match parts.as_slice() {
        [scope, value_type, default] | [scope, value_type, _, default] => (*scope, *value_type, *default),
        _ => return Err(format!("expected scope|type|default, got '{text}'")),
    };

    let scope = match scope {
        "single" => Scope::Single,
        "list" => Scope::List,
        "set" => Scope::Set,
        "dict" => Scope::Dict,
        other => return Err(format!("unknown scope '{other}'")),
    };

    let default = match default {
        "" => DefaultValue::Required,
        "None" => DefaultValue::Null,
        "%" => DefaultValue::DeviceName,
        literal => DefaultValue::Literal(literal.to_owned()),
    };

    Ok(FieldSpec::new(scope, parse_value_type(value_type)?, default))
}

fn parse_value_type(text: &str) -> Result<ValueType, String> {
    Ok(match text {
        "str" => ValueType::Str,
        "lstr" | "lowercase" => ValueType::LowerStr,
        "int" => ValueType::Int,
        "int_from_hex" => ValueType::IntFromHex,
        "float" | "num" => ValueType::Float,
        "bool" | "boolean" => ValueType::Bool,
        "ms" => ValueType::Ms,
        "secs" => ValueType::Secs,
        "ticks" => ValueType::Ticks,
        "ticks_int" => ValueType::TicksInt,
        "dict" => ValueType::Dict,
        other => ValueType::Ref(parse_reference(other)?),
    })
}

fn parse_reference(text: &str) -> Result<Vec<String>, String> {
    let targets = if let Some(rest) = text.strip_prefix("self.machine.") {
        let name = rest.strip_suffix("[%]").unwrap_or(rest);
        vec![name.to_owned()]
    } else if let Some(inner) = text.strip_prefix("machine(").and_then(|t| t.strip_suffix(')')) {
        inner.split(',').map(|t| t.trim().to_owned()).collect()
    } else {
        return Err(format!("unknown type '{text}'"));
    };

    let valid = |t: &String| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if targets.iter().all(valid) { Ok(targets) } else { Err(format!("bad reference '{text}'")) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_and_four_parts() {
        let spec = parse_field_spec("single|int|0").unwrap();
        assert_eq!(spec, FieldSpec::new(Scope::Single, ValueType::Int, DefaultValue::Literal("0".into())));

        let spec = parse_field_spec("list|self.machine.switches[%]|validator|None").unwrap();
        assert_eq!(spec.value_type, ValueType::Ref(vec!["switches".into()]));
        assert_eq!(spec.default, DefaultValue::Null);
    }

    #[test]
    fn references() {
        let spec = parse_field_spec("list|machine(ball_devices, playfields)|playfield").unwrap();
        assert_eq!(spec.value_type.targets(), ["ball_devices", "playfields"]);
        assert!(parse_field_spec("single|machine()|").is_err());
    }

    #[test]
    fn malformed() {
        assert!(parse_field_spec("single|int").unwrap_err().contains("expected scope|type|default"));
        assert!(parse_field_spec("many|int|0").unwrap_err().contains("unknown scope"));
        assert!(parse_field_spec("single|integer|0").unwrap_err().contains("unknown type"));
    }

    #[test]
    fn builtin_sections() {
        let schema = Schema::builtin().unwrap();
        for name in ["hardware", "switches", "coils", "flippers", "ball_devices", "modes", "window", "bcp", "fonts"] {
            assert!(schema.section(name).is_some(), "{name}");
        }
        assert_eq!(schema.section("switches").unwrap().kind, SectionKind::Collection);
        assert_eq!(schema.section("tilt").unwrap().kind, SectionKind::Singleton);
        let main_coil = schema.section("flippers").unwrap().field("main_coil").unwrap();
        assert!(main_coil.is_required());
    }

    #[test]
    fn extension_adds_and_overrides() {
        let mut schema = Schema::builtin().unwrap();
        schema
            .extend(&json!({
                "spinners": { "fields": { "switch": "single|machine(switches)|" } },
                "coils": { "max_hold_ms": "single|ms|None" },
                "timing": { "kind": "singleton", "fields": { "hz": "single|int|60" } }
            }))
            .unwrap();

        assert_eq!(schema.section("spinners").unwrap().kind, SectionKind::Collection);
        assert!(schema.section("coils").unwrap().field("max_hold_ms").is_some());
        assert!(schema.section("coils").unwrap().field("number").is_some());
        assert_eq!(
            schema.section("timing").unwrap().field("hz").unwrap().default,
            DefaultValue::Literal("60".into())
        );
    }

    #[test]
    fn extension_errors_name_the_field() {
        let mut schema = Schema::default();
        let err = schema.extend(&json!({ "spinners": { "switch": "single|bogus|" } })).unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("spinners.switch"));
        assert!(err.to_string().contains(EXTENSION_KEY));
    }

    #[test]
    fn describe_lists_specs() {
        let schema = Schema::builtin().unwrap();
        let text = schema.describe("timing").unwrap();
        assert!(text.starts_with("timing (singleton)"));
        assert!(text.contains("single|int|30"));
        assert!(schema.describe("nope").is_none());
        assert!(schema.summary().contains("ball_devices"));
    }
}
