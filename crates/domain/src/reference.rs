//! Reference records held in tables (latest value per id wins).

use serde::{Deserialize, Serialize};

/// A customer, keyed by `id` in the customer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Customer {
    /// Creates a customer with only the required fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            address: None,
            phone: None,
        }
    }
}

/// A product, keyed by `id` in the product table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
}

impl Product {
    /// Creates a product without a price.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_cents: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_optional_fields_default_to_none() {
        let customer: Customer = serde_json::from_str(r#"{"id":"c1","name":"Alice"}"#).unwrap();
        assert_eq!(customer, Customer::new("c1", "Alice"));
    }

    #[test]
    fn test_customer_skips_absent_fields_when_serialized() {
        let json = serde_json::to_value(Customer::new("c1", "Alice")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "c1", "name": "Alice"}));
    }

    #[test]
    fn test_product_price_is_optional() {
        let product: Product =
            serde_json::from_str(r#"{"id":"p1","name":"Widget","price_cents":1299}"#).unwrap();
        assert_eq!(product.price_cents, Some(1299));

        let product: Product = serde_json::from_str(r#"{"id":"p2","name":"Gadget"}"#).unwrap();
        assert_eq!(product.price_cents, None);
    }
}
