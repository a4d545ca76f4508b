//! Re-keying: deriving a record's new key from a field of its value.

use common::{Keyed, RecordKey};
use domain::{EnrichedLineItemDetail, EnrichedOrder, Order, OrderLineItem};

use crate::{Result, TopologyError};

/// Names a string field of `V` and how to read it.
pub struct FieldSelector<V> {
    field: &'static str,
    select: fn(&V) -> Option<&str>,
}

impl<V> FieldSelector<V> {
    pub const fn new(field: &'static str, select: fn(&V) -> Option<&str>) -> Self {
        Self { field, select }
    }

    /// The field name reported when the field is missing.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn select<'a>(&self, value: &'a V) -> Option<&'a str> {
        (self.select)(value)
    }
}

fn order_customer_id(order: &Order) -> Option<&str> {
    order.customer_id.as_deref()
}

fn enriched_order_id(order: &EnrichedOrder) -> Option<&str> {
    Some(&order.id)
}

fn line_item_product_id(item: &OrderLineItem) -> Option<&str> {
    item.product_id.as_deref()
}

fn detail_order_id(detail: &EnrichedLineItemDetail) -> Option<&str> {
    detail.order_id.as_deref()
}

/// Orders, keyed for the customer join.
pub const ORDER_BY_CUSTOMER_ID: FieldSelector<Order> =
    FieldSelector::new("customer_id", order_customer_id);

/// Enriched orders, keyed for the product set join.
pub const ENRICHED_ORDER_BY_ID: FieldSelector<EnrichedOrder> =
    FieldSelector::new("id", enriched_order_id);

/// Line items, keyed for the product join.
pub const LINE_ITEM_BY_PRODUCT_ID: FieldSelector<OrderLineItem> =
    FieldSelector::new("product_id", line_item_product_id);

/// Enriched line items, keyed for grouping by order.
pub const DETAIL_BY_ORDER_ID: FieldSelector<EnrichedLineItemDetail> =
    FieldSelector::new("order_id", detail_order_id);

/// Computes the key `record` would be re-keyed to, without consuming it.
///
/// A missing or empty field is a [`TopologyError::MalformedKeyField`].
pub fn key_of<V>(record: &Keyed<V>, selector: &FieldSelector<V>) -> Result<RecordKey> {
    match selector.select(&record.value) {
        Some(key) if !key.is_empty() => Ok(RecordKey::new(key)),
        _ => Err(TopologyError::MalformedKeyField {
            field: selector.field(),
            key: record.key.to_string(),
        }),
    }
}

/// Replaces the key of `record` with the selected field; the value is unchanged.
pub fn rekey<V>(record: Keyed<V>, selector: &FieldSelector<V>) -> Result<Keyed<V>> {
    let key = key_of(&record, selector)?;
    Ok(record.with_key(key))
}
