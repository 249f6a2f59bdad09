use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keyword arguments carried by an event.
///
/// Keys are kept sorted so dumps and taps are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventArgs(BTreeMap<String, Value>);

impl EventArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Non-negative integer argument; negative values read as `None`.
    #[must_use]
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_i64(key).and_then(|v| u32::try_from(v).ok())
    }

    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Overwrites entries with those from `other`.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for EventArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let args = EventArgs::new().with("balls", 2).with("target", "playfield").with("neg", -1);
        assert_eq!(args.get_u32("balls"), Some(2));
        assert_eq!(args.get_str("target"), Some("playfield"));
        assert_eq!(args.get_u32("neg"), None);
        assert_eq!(args.get_i64("neg"), Some(-1));
        assert_eq!(args.get_bool("balls"), None);
    }

    #[test]
    fn merge_overwrites() {
        let mut args = EventArgs::new().with("balls", 2).with("device", "trough");
        args.merge(EventArgs::new().with("balls", 0));
        assert_eq!(args.get_u32("balls"), Some(0));
        assert_eq!(args.get_str("device"), Some("trough"));
    }

    #[test]
    fn serializes_as_plain_map() {
        let args: EventArgs = [("balls", 1)].into_iter().collect();
        assert_eq!(serde_json::to_string(&args).unwrap(), r#"{"balls":1}"#);
    }
}
