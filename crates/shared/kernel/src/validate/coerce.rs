//! Per-field coercion of raw YAML values to [`ConfigValue`]s.

use crate::timing::{ms_to_ticks, value_to_ms, value_to_secs};
use pinrig_domain::{ConfigValue, DefaultValue, FieldSpec, Scope, ValueType};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    Missing,
    Mismatch { expected: String, found: String },
    Shape { expected: String },
}

/// A coercion failure, with the list index it applies to.
pub(crate) type ItemFailure = (Option<usize>, Failure);

#[derive(Debug, Clone, Copy)]
pub(crate) struct Coercer {
    hz: u64,
}

impl Coercer {
    pub(crate) const fn new(hz: u64) -> Self {
        Self { hz }
    }

    /// Coerces `raw`, substituting the default when it is missing or null.
    pub(crate) fn field(
        self,
        spec: &FieldSpec,
        raw: Option<&Value>,
        device: Option<&str>,
    ) -> Result<ConfigValue, Vec<ItemFailure>> {
        match raw {
            Some(value) if !value.is_null() => self.scoped(spec, value),
            _ => self.default(spec, device),
        }
    }

    /// The field's default value, coerced like user input.
    pub(crate) fn default(self, spec: &FieldSpec, device: Option<&str>) -> Result<ConfigValue, Vec<ItemFailure>> {
        match &spec.default {
            DefaultValue::Required => Err(vec![(None, Failure::Missing)]),
            DefaultValue::Null => Ok(empty(spec.scope)),
            DefaultValue::DeviceName => match device {
                Some(name) => self.scoped(spec, &Value::String(name.to_owned())),
                None => Ok(empty(spec.scope)),
            },
            DefaultValue::Literal(text) => self.scoped(spec, &Value::String(text.clone())),
        }
    }

    fn scoped(self, spec: &FieldSpec, value: &Value) -> Result<ConfigValue, Vec<ItemFailure>> {
        match spec.scope {
            Scope::Single => self.item(&spec.value_type, value).map_err(|f| vec![(None, f)]),
            Scope::Dict => match value {
                Value::Object(_) => Ok(json_to_value(value)),
                other => Err(vec![(None, Failure::Shape { expected: format!("mapping, found {}", describe(other)) })]),
            },
            Scope::List | Scope::Set => {
                let items = self.list_items(&spec.value_type, value).map_err(|f| vec![(None, f)])?;
                let mut out = Vec::with_capacity(items.len());
                let mut failures = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match self.item(&spec.value_type, item) {
                        Ok(v) if spec.scope == Scope::Set && out.contains(&v) => {},
                        Ok(v) => out.push(v),
                        Err(f) => failures.push((Some(i), f)),
                    }
                }
                if failures.is_empty() { Ok(ConfigValue::List(out)) } else { Err(failures) }
            },
        }
    }

    fn list_items(self, value_type: &ValueType, value: &Value) -> Result<Vec<Value>, Failure> {
        Ok(match value {
            Value::Array(items) => items.clone(),
            Value::String(text) => split_list(text).map(|s| Value::String(s.to_owned())).collect(),
            Value::Object(_) if *value_type == ValueType::Dict => vec![value.clone()],
            Value::Object(_) => return Err(Failure::Shape { expected: "list, found mapping".into() }),
            scalar => vec![scalar.clone()],
        })
    }

    fn item(self, value_type: &ValueType, value: &Value) -> Result<ConfigValue, Failure> {
        let mismatch = || Failure::Mismatch { expected: value_type.to_string(), found: describe(value) };
        let coerced = match value_type {
            ValueType::Str => scalar_text(value).map(ConfigValue::Str),
            ValueType::LowerStr => scalar_text(value).map(|s| ConfigValue::Str(s.to_lowercase())),
            ValueType::Int => to_int(value).map(ConfigValue::Int),
            ValueType::IntFromHex => to_hex_int(value).map(ConfigValue::Int),
            ValueType::Float => to_float(value).map(ConfigValue::Float),
            ValueType::Bool => to_bool(value).map(ConfigValue::Bool),
            ValueType::Ms => value_to_ms(value).map(ConfigValue::Ms),
            ValueType::Secs => value_to_secs(value).map(ConfigValue::Secs),
            ValueType::Ticks => value_to_ms(value).map(|ms| ConfigValue::Ticks(ms_to_ticks(ms, self.hz))),
            ValueType::TicksInt => to_int(value).and_then(|v| u64::try_from(v).ok()).map(ConfigValue::Ticks),
            ValueType::Dict => value.is_object().then(|| json_to_value(value)),
            ValueType::Ref(targets) => scalar_text(value).filter(|s| !s.is_empty()).map(|name| ConfigValue::Ref {
                collection: targets.first().cloned().unwrap_or_default(),
                name,
            }),
        };
        coerced.ok_or_else(mismatch)
    }
}

fn empty(scope: Scope) -> ConfigValue {
    match scope {
        Scope::Single => ConfigValue::Null,
        Scope::List | Scope::Set => ConfigValue::List(Vec::new()),
        Scope::Dict => ConfigValue::Dict(std::collections::BTreeMap::new()),
    }
}

/// Splits `"a, b c"` into `["a", "b", "c"]`.
pub(crate) fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        },
        _ => None,
    }
}

fn to_hex_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
            i64::from_str_radix(digits, 16).ok()
        },
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "y" | "1" => Some(true),
            "false" | "no" | "off" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Array(_) => "list".into(),
        Value::Object(_) => "mapping".into(),
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// Untyped conversion used for passthrough sections and dict fields.
#[must_use]
pub fn json_to_value(value: &Value) -> ConfigValue {
    match value {
        Value::Null => ConfigValue::Null,
        Value::Bool(b) => ConfigValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)), ConfigValue::Int),
        Value::String(s) => ConfigValue::Str(s.clone()),
        Value::Array(items) => ConfigValue::List(items.iter().map(json_to_value).collect()),
        Value::Object(map) => ConfigValue::Dict(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_field_spec;
    use serde_json::json;

    fn coerce(spec: &str, raw: Option<Value>) -> Result<ConfigValue, Vec<ItemFailure>> {
        let spec = parse_field_spec(spec).unwrap();
        Coercer::new(30).field(&spec, raw.as_ref(), Some("trough"))
    }

    #[test]
    fn defaults() {
        assert_eq!(coerce("single|ms|500ms", None).unwrap(), ConfigValue::Ms(500));
        assert_eq!(coerce("list|str|None", None).unwrap(), ConfigValue::List(vec![]));
        assert_eq!(coerce("single|str|None", Some(Value::Null)).unwrap(), ConfigValue::Null);
        assert_eq!(coerce("single|str|%", None).unwrap(), ConfigValue::Str("trough".into()));
        assert_eq!(coerce("single|int|", None).unwrap_err(), vec![(None, Failure::Missing)]);
        assert_eq!(
            coerce("list|str|ball_ending, slam_tilt", None).unwrap(),
            ConfigValue::List(vec!["ball_ending".into(), "slam_tilt".into()])
        );
    }

    #[test]
    fn scalars() {
        assert_eq!(coerce("single|int|0", Some(json!("12"))).unwrap(), ConfigValue::Int(12));
        assert_eq!(coerce("single|int|0", Some(json!(3.9))).unwrap(), ConfigValue::Int(3));
        assert_eq!(coerce("single|int_from_hex|0", Some(json!("0x1F"))).unwrap(), ConfigValue::Int(31));
        assert_eq!(coerce("single|bool|False", Some(json!("Yes"))).unwrap(), ConfigValue::Bool(true));
        assert_eq!(coerce("single|lstr|target", Some(json!("Switch"))).unwrap(), ConfigValue::Str("switch".into()));
        assert_eq!(coerce("single|ticks|0", Some(json!("1s"))).unwrap(), ConfigValue::Ticks(30));
        assert_eq!(coerce("single|secs|0", Some(json!("1500ms"))).unwrap(), ConfigValue::Secs(1.5));
        assert_eq!(coerce("single|str|", Some(json!(7))).unwrap(), ConfigValue::Str("7".into()));
    }

    #[test]
    fn mismatches() {
        let err = coerce("single|int|0", Some(json!("many"))).unwrap_err();
        assert_eq!(err, vec![(None, Failure::Mismatch { expected: "int".into(), found: "'many'".into() })]);
        assert!(coerce("single|bool|False", Some(json!("maybe"))).is_err());
        assert!(coerce("single|ms|0", Some(json!("-3s"))).is_err());
        assert!(coerce("dict|str|None", Some(json!([1]))).is_err());
    }

    #[test]
    fn lists_and_sets() {
        assert_eq!(
            coerce("list|int|None", Some(json!("1, 2 3"))).unwrap(),
            ConfigValue::List(vec![ConfigValue::Int(1), ConfigValue::Int(2), ConfigValue::Int(3)])
        );
        assert_eq!(coerce("set|str|None", Some(json!(["a", "b", "a"]))).unwrap().as_list().unwrap().len(), 2);
        let err = coerce("list|ms|None", Some(json!(["1s", "soon", "2s", "never"]))).unwrap_err();
        assert_eq!(err.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![Some(1), Some(3)]);
    }

    #[test]
    fn references_keep_first_target() {
        let value = coerce("list|machine(ball_devices,playfields)|playfield", None).unwrap();
        assert_eq!(
            value,
            ConfigValue::List(vec![ConfigValue::Ref { collection: "ball_devices".into(), name: "playfield".into() }])
        );
    }
}
