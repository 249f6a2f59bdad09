//! Field specifications: `scope|type|default`.

use serde::Serialize;
use std::fmt;

/// Collection shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Single,
    List,
    /// A list with duplicates removed, first occurrence kept.
    Set,
    /// A mapping passed through unchanged.
    Dict,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::List => "list",
            Self::Set => "set",
            Self::Dict => "dict",
        }
    }
}

/// Element type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Str,
    LowerStr,
    Int,
    IntFromHex,
    Float,
    Bool,
    Ms,
    Secs,
    Ticks,
    TicksInt,
    Dict,
    /// A name that must exist in one of these collections.
    Ref(Vec<String>),
}

impl ValueType {
    #[must_use]
    pub fn targets(&self) -> &[String] {
        match self {
            Self::Ref(targets) => targets,
            _ => &[],
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Str => "str",
            Self::LowerStr => "lstr",
            Self::Int => "int",
            Self::IntFromHex => "int_from_hex",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Ms => "ms",
            Self::Secs => "secs",
            Self::Ticks => "ticks",
            Self::TicksInt => "ticks_int",
            Self::Dict => "dict",
            Self::Ref(targets) => return write!(f, "machine({})", targets.join(",")),
        };
        f.write_str(name)
    }
}

/// What a missing field becomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// No default: the field must be given.
    Required,
    /// `None`.
    Null,
    /// `%`: the name of the device being validated.
    DeviceName,
    /// Coerced like user input.
    Literal(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => Ok(()),
            Self::Null => f.write_str("None"),
            Self::DeviceName => f.write_str("%"),
            Self::Literal(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub scope: Scope,
    pub value_type: ValueType,
    pub default: DefaultValue,
}

impl FieldSpec {
    #[must_use]
    pub const fn new(scope: Scope, value_type: ValueType, default: DefaultValue) -> Self {
        Self { scope, value_type, default }
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self.default, DefaultValue::Required)
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.scope.as_str(), self.value_type, self.default)
    }
}
