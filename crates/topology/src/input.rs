//! Typed view of changelog records.

use changelog::{LogRecord, Topic};
use common::{Keyed, RecordKey};
use domain::{Customer, Order, OrderLineItem, Product};
use serde::de::DeserializeOwned;

use crate::{Result, TopologyError};

/// A changelog record decoded for its topic.
///
/// Table records carry their source key. Stream records carry the
/// producer's key, which is the empty key when the producer set none.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Customer(Keyed<Customer>),
    Product(Keyed<Product>),
    Order(Keyed<Order>),
    LineItem(Keyed<OrderLineItem>),
}

impl InputRecord {
    /// Decodes a changelog record.
    ///
    /// A table record without a key is a [`TopologyError::MalformedKeyField`].
    pub fn decode(record: &LogRecord) -> Result<Self> {
        Ok(match record.topic {
            Topic::Customers => {
                InputRecord::Customer(Keyed::new(table_key(record)?, payload(record)?))
            }
            Topic::Products => {
                InputRecord::Product(Keyed::new(table_key(record)?, payload(record)?))
            }
            Topic::Orders => InputRecord::Order(Keyed::new(stream_key(record), payload(record)?)),
            Topic::OrderLineItems => {
                InputRecord::LineItem(Keyed::new(stream_key(record), payload(record)?))
            }
        })
    }

    /// Builds the changelog record this input is stored as.
    pub fn to_log_record(&self) -> Result<LogRecord> {
        let builder = LogRecord::builder(self.topic());
        let builder = match self.key().as_str() {
            "" => builder,
            key => builder.key(key),
        };
        let builder = match self {
            InputRecord::Customer(r) => builder.payload(&r.value)?,
            InputRecord::Product(r) => builder.payload(&r.value)?,
            InputRecord::Order(r) => builder.payload(&r.value)?,
            InputRecord::LineItem(r) => builder.payload(&r.value)?,
        };
        Ok(builder.build()?)
    }

    pub fn topic(&self) -> Topic {
        match self {
            InputRecord::Customer(_) => Topic::Customers,
            InputRecord::Product(_) => Topic::Products,
            InputRecord::Order(_) => Topic::Orders,
            InputRecord::LineItem(_) => Topic::OrderLineItems,
        }
    }

    /// The key the record arrived with.
    pub fn key(&self) -> &RecordKey {
        match self {
            InputRecord::Customer(r) => &r.key,
            InputRecord::Product(r) => &r.key,
            InputRecord::Order(r) => &r.key,
            InputRecord::LineItem(r) => &r.key,
        }
    }
}

impl From<Customer> for InputRecord {
    fn from(customer: Customer) -> Self {
        InputRecord::Customer(Keyed::new(customer.id.clone(), customer))
    }
}

impl From<Product> for InputRecord {
    fn from(product: Product) -> Self {
        InputRecord::Product(Keyed::new(product.id.clone(), product))
    }
}

fn table_key(record: &LogRecord) -> Result<RecordKey> {
    match record.key.as_deref() {
        Some(key) if !key.is_empty() => Ok(RecordKey::new(key)),
        _ => Err(TopologyError::MalformedKeyField {
            field: "key",
            key: String::new(),
        }),
    }
}

fn stream_key(record: &LogRecord) -> RecordKey {
    RecordKey::new(record.key.clone().unwrap_or_default())
}

fn payload<T: DeserializeOwned>(record: &LogRecord) -> Result<T> {
    Ok(serde_json::from_value(record.payload.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_customer_uses_record_key() {
        let record = LogRecord::builder(Topic::Customers)
            .key("c1")
            .payload_raw(json!({"id": "c1", "name": "Alice"}))
            .build()
            .unwrap();

        let input = InputRecord::decode(&record).unwrap();
        assert_eq!(input, InputRecord::Customer(Keyed::new("c1", Customer::new("c1", "Alice"))));
    }

    #[test]
    fn test_decode_table_record_without_key_fails() {
        let record = LogRecord::builder(Topic::Products)
            .payload_raw(json!({"id": "p1", "name": "Widget"}))
            .build()
            .unwrap();

        assert!(matches!(
            InputRecord::decode(&record),
            Err(TopologyError::MalformedKeyField { field: "key", .. })
        ));
    }

    #[test]
    fn test_decode_stream_record_without_key() {
        let record = LogRecord::builder(Topic::Orders)
            .payload_raw(json!({"id": "o1", "customer_id": "c1"}))
            .build()
            .unwrap();

        let input = InputRecord::decode(&record).unwrap();
        assert_eq!(input.key().as_str(), "");
        assert_eq!(input.topic(), Topic::Orders);
    }

    #[test]
    fn test_decode_bad_payload_is_codec_error() {
        let record = LogRecord::builder(Topic::OrderLineItems)
            .payload_raw(json!({"quantity": "lots"}))
            .build()
            .unwrap();

        let err = InputRecord::decode(&record).unwrap_err();
        assert!(matches!(err, TopologyError::Codec(_)));
        assert!(err.is_record_error());
    }

    #[test]
    fn test_to_log_record_round_trips() {
        let input = InputRecord::LineItem(Keyed::new("k7", OrderLineItem::new("o1", "p1", 2)));
        let record = input.to_log_record().unwrap();

        assert_eq!(record.topic, Topic::OrderLineItems);
        assert_eq!(record.key.as_deref(), Some("k7"));
        assert_eq!(InputRecord::decode(&record).unwrap(), input);
    }

    #[test]
    fn test_from_reference_record_keys_by_id() {
        let input = InputRecord::from(Product::new("p1", "Widget"));
        assert_eq!(input.key().as_str(), "p1");
    }
}
