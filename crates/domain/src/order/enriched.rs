//! Records derived by the enrichment topology.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderedSet;

/// The per-order set of enriched line items.
pub type ProductSet = OrderedSet<EnrichedLineItem>;

/// An order with its customer's name and the products seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedOrder {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub products: ProductSet,
}

impl EnrichedOrder {
    /// Replaces the product set.
    pub fn with_products(mut self, products: ProductSet) -> Self {
        self.products = products;
        self
    }
}

/// A line item joined with its product's name, still carrying its order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedLineItemDetail {
    #[serde(default)]
    pub order_id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
}

/// The element type of [`ProductSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrichedLineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
}

impl EnrichedLineItem {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
        }
    }
}
