use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChangelogError, Result};

/// The input topics the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// Customer table source, keyed by customer id.
    Customers,
    /// Product table source, keyed by product id.
    Products,
    /// Order event stream, keyed arbitrarily by the producer.
    Orders,
    /// Order line item event stream, keyed arbitrarily by the producer.
    OrderLineItems,
}

impl Topic {
    /// All topics, in the order they are listed in the logs.
    pub const ALL: [Topic; 4] = [
        Topic::Customers,
        Topic::Products,
        Topic::Orders,
        Topic::OrderLineItems,
    ];

    /// Returns the stored topic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Customers => "customers",
            Topic::Products => "products",
            Topic::Orders => "orders",
            Topic::OrderLineItems => "order-line-items",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ChangelogError;

    fn from_str(s: &str) -> Result<Self> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ChangelogError::UnknownTopic(s.to_string()))
    }
}

/// Position of a record in the changelog.
///
/// Offsets are global across topics, start at 1 for the first record and
/// increase by 1 for every appended record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(i64);

impl Offset {
    /// Creates an offset from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The offset "before the first record" (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// The offset of the first record (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next offset.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw offset value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Offset {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Offset> for i64 {
    fn from(offset: Offset) -> Self {
        offset.0
    }
}

/// A keyed record as stored in the changelog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Assigned by the store on append; `Offset::initial()` before that.
    pub offset: Offset,

    /// The topic this record was produced to.
    pub topic: Topic,

    /// The producer-assigned key, if any.
    pub key: Option<String>,

    /// When the record was produced.
    pub timestamp: DateTime<Utc>,

    /// The record value as JSON.
    pub payload: serde_json::Value,

    /// Free-form producer headers.
    pub headers: HashMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a new record builder for a topic.
    pub fn builder(topic: Topic) -> LogRecordBuilder {
        LogRecordBuilder {
            topic,
            key: None,
            timestamp: None,
            payload: None,
            headers: HashMap::new(),
        }
    }

    /// Deserializes the payload into a concrete record type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Builder for constructing log records.
#[derive(Debug)]
pub struct LogRecordBuilder {
    topic: Topic,
    key: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    headers: HashMap<String, serde_json::Value>,
}

impl LogRecordBuilder {
    /// Sets the record key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a header entry.
    pub fn header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    /// Builds the record. Fails if no payload was set.
    pub fn build(self) -> Result<LogRecord> {
        let payload = self.payload.ok_or_else(|| {
            ChangelogError::InvalidAppend(format!("record for {} has no payload", self.topic))
        })?;

        Ok(LogRecord {
            offset: Offset::initial(),
            topic: self.topic,
            key: self.key,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload,
            headers: self.headers,
        })
    }
}
