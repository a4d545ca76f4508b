use serde::{Deserialize, Serialize};

/// Partition key of a record.
///
/// Keys are always the string form of a payload field (or of a table
/// source key), so two records with equal keys land in the same shard and
/// see the same table and aggregate entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Creates a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A value travelling through the topology together with its current key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyed<V> {
    pub key: RecordKey,
    pub value: V,
}

impl<V> Keyed<V> {
    /// Pairs a value with a key.
    pub fn new(key: impl Into<RecordKey>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Replaces the value, keeping the key.
    pub fn map_value<U>(self, f: impl FnOnce(V) -> U) -> Keyed<U> {
        Keyed {
            key: self.key,
            value: f(self.value),
        }
    }

    /// Replaces the key, keeping the value.
    pub fn with_key(self, key: impl Into<RecordKey>) -> Self {
        Self {
            key: key.into(),
            value: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_display_matches_inner() {
        let key = RecordKey::new("c1");
        assert_eq!(key.to_string(), "c1");
        assert_eq!(key.as_str(), "c1");
    }

    #[test]
    fn record_key_serializes_as_plain_string() {
        let key = RecordKey::from("o1");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"o1\"");
    }

    #[test]
    fn keyed_map_value_keeps_key() {
        let keyed = Keyed::new("o1", 2u32).map_value(|q| q * 10);
        assert_eq!(keyed.key.as_str(), "o1");
        assert_eq!(keyed.value, 20);
    }

    #[test]
    fn keyed_with_key_keeps_value() {
        let keyed = Keyed::new("producer-key", "payload").with_key("c1");
        assert_eq!(keyed.key, RecordKey::from("c1"));
        assert_eq!(keyed.value, "payload");
    }
}
