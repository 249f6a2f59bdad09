use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const TYPES: &str = "types";
pub const REQUIRED: &str = "required";
pub const UNKNOWN_FIELDS: &str = "unknown_fields";
pub const REFERENCES: &str = "references";
pub const DEVICE_RULES: &str = "device_rules";

bitflags! {
    /// Validation passes to run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ValidationPasses: u32 {
        /// Report values that can't be coerced to their field type.
        const TYPES = 1 << 0;
        /// Report missing fields that have no default.
        const REQUIRED = 1 << 1;
        /// Report keys the schema doesn't declare.
        const UNKNOWN_FIELDS = 1 << 2;
        /// Report names that don't resolve to a configured device.
        const REFERENCES = 1 << 3;
        /// Device-specific consistency rules.
        const DEVICE_RULES = 1 << 4;

        const ALL = Self::TYPES.bits()
            | Self::REQUIRED.bits()
            | Self::UNKNOWN_FIELDS.bits()
            | Self::REFERENCES.bits()
            | Self::DEVICE_RULES.bits();
    }
}

impl Default for ValidationPasses {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<&str> for ValidationPasses {
    fn from(s: &str) -> Self {
        match s {
            TYPES => Self::TYPES,
            REQUIRED => Self::REQUIRED,
            UNKNOWN_FIELDS => Self::UNKNOWN_FIELDS,
            REFERENCES => Self::REFERENCES,
            DEVICE_RULES => Self::DEVICE_RULES,
            "all" | "*" => Self::ALL,
            _ => Self::empty(),
        }
    }
}

impl From<u32> for ValidationPasses {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for ValidationPasses {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for ValidationPasses {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}
