//! Field projections between related record shapes.
//!
//! Every transformation the pipeline applies to a record's fields lives
//! here. Joiners are pure: the output depends only on the arguments.

use crate::{
    Customer, EnrichedLineItem, EnrichedLineItemDetail, EnrichedOrder, Order, OrderLineItem,
    Product, ProductSet,
};

/// Joins an order with its customer.
///
/// The result carries no products yet. `customer_id` is the order's own
/// field; the customer's id only fills in for an order without one.
pub fn enrich_order(order: Order, customer: &Customer) -> EnrichedOrder {
    EnrichedOrder {
        id: order.id,
        customer_id: order.customer_id.unwrap_or_else(|| customer.id.clone()),
        customer_name: customer.name.clone(),
        status: order.status,
        payment_type: order.payment_type,
        created_at: order.created_at,
        products: ProductSet::new(),
    }
}

/// Joins a line item with its product. `product_id` follows the same rule
/// as `customer_id` in [`enrich_order`].
pub fn enrich_line_item(item: OrderLineItem, product: &Product) -> EnrichedLineItemDetail {
    EnrichedLineItemDetail {
        order_id: item.order_id,
        product_id: item.product_id.unwrap_or_else(|| product.id.clone()),
        product_name: product.name.clone(),
        quantity: item.quantity,
    }
}

/// Drops the order id, keeping the fields that identify a product line.
impl From<EnrichedLineItemDetail> for EnrichedLineItem {
    fn from(detail: EnrichedLineItemDetail) -> Self {
        Self {
            product_id: detail.product_id,
            product_name: detail.product_name,
            quantity: detail.quantity,
        }
    }
}
