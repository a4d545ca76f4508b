//! Raw order events as produced upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An order event.
///
/// `customer_id` is optional on the wire; an order without one cannot be
/// re-keyed and is rejected by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates an order for a customer, with no optional fields set.
    pub fn new(id: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            customer_id: Some(customer_id.into()),
            status: None,
            payment_type: None,
            created_at: None,
        }
    }
}

/// One product line within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    pub quantity: u32,
}

impl OrderLineItem {
    /// Creates a line item with both key fields set.
    pub fn new(order_id: impl Into<String>, product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            order_id: Some(order_id.into()),
            product_id: Some(product_id.into()),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_without_customer_deserializes_with_none() {
        let order: Order = serde_json::from_str(r#"{"id":"o1"}"#).unwrap();
        assert_eq!(order.customer_id, None);

        let order: Order = serde_json::from_str(r#"{"id":"o1","customer_id":null}"#).unwrap();
        assert_eq!(order.customer_id, None);
    }

    #[test]
    fn test_order_reads_optional_fields() {
        let order: Order = serde_json::from_str(
            r#"{"id":"o1","customer_id":"c1","status":"OPEN","payment_type":"BITCOIN",
                "created_at":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(order.status.as_deref(), Some("OPEN"));
        assert_eq!(order.payment_type.as_deref(), Some("BITCOIN"));
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_line_item_key_fields_are_optional() {
        let item: OrderLineItem = serde_json::from_str(r#"{"quantity":3}"#).unwrap();
        assert_eq!(item.order_id, None);
        assert_eq!(item.product_id, None);
        assert_eq!(item.quantity, 3);
    }
}
