use crate::value::ConfigValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Validated fields of one device, or of one singleton section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, ConfigValue>);

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.0.get_mut(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String or reference name; `None` for null or other types.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Same as [`Settings::str`]; reads better for cross-reference fields.
    #[must_use]
    pub fn reference(&self, key: &str) -> Option<&str> {
        self.str(key)
    }

    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_int)
    }

    #[must_use]
    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ConfigValue::as_float)
    }

    /// Missing or null reads as `false`.
    #[must_use]
    pub fn bool(&self, key: &str) -> bool {
        self.get(key).and_then(ConfigValue::as_bool).unwrap_or(false)
    }

    #[must_use]
    pub fn ms(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(ConfigValue::as_ms)
    }

    /// Items of a list field; empty when missing or null.
    #[must_use]
    pub fn list(&self, key: &str) -> &[ConfigValue] {
        self.get(key).and_then(ConfigValue::as_list).unwrap_or(&[])
    }

    /// Names held by a list (or a single string) field.
    #[must_use]
    pub fn names(&self, key: &str) -> Vec<&str> {
        match self.get(key) {
            Some(ConfigValue::List(items)) => items.iter().filter_map(ConfigValue::as_str).collect(),
            Some(value) => value.as_str().into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>> FromIterator<(K, ConfigValue)> for Settings {
    fn from_iter<T: IntoIterator<Item = (K, ConfigValue)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One top-level block of a machine config.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section {
    /// A single settings block (`hardware`, `bcp`, `tilt`, ...).
    Singleton(Settings),
    /// Named entries (`switches`, `coils`, `ball_devices`, ...).
    Collection(BTreeMap<String, Settings>),
    /// A block no schema describes, kept as loaded.
    Passthrough(ConfigValue),
}

/// A fully validated machine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MachineConfig {
    sections: BTreeMap<String, Section>,
}

impl MachineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, section: Section) {
        self.sections.insert(name.into(), section);
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    #[must_use]
    pub fn singleton(&self, name: &str) -> Option<&Settings> {
        match self.sections.get(name) {
            Some(Section::Singleton(settings)) => Some(settings),
            _ => None,
        }
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&BTreeMap<String, Settings>> {
        match self.sections.get(name) {
            Some(Section::Collection(entries)) => Some(entries),
            _ => None,
        }
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut BTreeMap<String, Settings>> {
        match self.sections.get_mut(name) {
            Some(Section::Collection(entries)) => Some(entries),
            _ => None,
        }
    }

    /// Entries of a collection; empty when the section is absent.
    pub fn entries(&self, collection: &str) -> impl Iterator<Item = (&String, &Settings)> {
        self.collection(collection).into_iter().flat_map(BTreeMap::iter)
    }

    #[must_use]
    pub fn device(&self, collection: &str, name: &str) -> Option<&Settings> {
        self.collection(collection).and_then(|entries| entries.get(name))
    }

    #[must_use]
    pub fn contains_device(&self, collection: &str, name: &str) -> bool {
        self.device(collection, name).is_some()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }
}
