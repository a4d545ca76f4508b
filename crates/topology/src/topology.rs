//! The enrichment topology.
//!
//! ```text
//! orders ──rekey(customer_id)──▶ ⋈ customers ──rekey(id)──────────────┐
//!                                                                      ▼
//! line items ──rekey(product_id)──▶ ⋈ products ──rekey(order_id)──▶ group ──▶ ⋈ ──▶ output
//! ```
//!
//! [`ReferenceStage`] holds the two reference tables and runs everything up
//! to the second re-key. [`OrderStage`] holds the per-order product sets and
//! runs the grouping and the final join. Both stages are partitioned by the
//! key their input arrives with, which is what lets the runtime shard them
//! independently.

use common::Keyed;
use domain::{
    Customer, EnrichedLineItem, EnrichedLineItemDetail, EnrichedOrder, Order, OrderLineItem,
    Product, ProductSet, enrich_line_item, enrich_order,
};

use crate::aggregate::{AggregateUpdate, GroupedSetAggregator};
use crate::input::InputRecord;
use crate::join::StreamTableJoin;
use crate::rekey::{self, rekey};
use crate::store::{InMemoryStores, StoreProvider};
use crate::table::Table;
use crate::Result;

const CUSTOMER_JOIN: StreamTableJoin = StreamTableJoin::new("order-customer");
const PRODUCT_JOIN: StreamTableJoin = StreamTableJoin::new("line-item-product");
const PRODUCT_SET_JOIN: StreamTableJoin = StreamTableJoin::new("order-product-set");

/// The per-order product set aggregate.
pub type LineItemAggregator = GroupedSetAggregator<EnrichedLineItemDetail, EnrichedLineItem>;

/// The customer and product tables, and the joins against them.
#[derive(Debug)]
pub struct ReferenceStage {
    customers: Table<Customer>,
    products: Table<Product>,
}

impl ReferenceStage {
    pub fn new(customers: Table<Customer>, products: Table<Product>) -> Self {
        Self {
            customers,
            products,
        }
    }

    /// Creates the stage of `shard` from a store provider.
    pub fn from_provider(provider: &dyn StoreProvider, shard: usize) -> Self {
        Self::new(
            Table::new(provider.customers(shard)),
            Table::new(provider.products(shard)),
        )
    }

    pub fn apply_customer(&mut self, record: Keyed<Customer>) -> Result<()> {
        self.customers.upsert(record)
    }

    pub fn apply_product(&mut self, record: Keyed<Product>) -> Result<()> {
        self.products.upsert(record)
    }

    /// Re-keys an order by customer id, joins it with its customer and
    /// re-keys the result by order id.
    ///
    /// Returns None when the customer is unknown.
    pub fn enrich_order(&self, order: Keyed<Order>) -> Result<Option<Keyed<EnrichedOrder>>> {
        let order = rekey(order, &rekey::ORDER_BY_CUSTOMER_ID)?;
        let joined = CUSTOMER_JOIN.inner(order, &self.customers, |order, customer| {
            enrich_order(order, &customer)
        })?;
        joined
            .map(|enriched| rekey(enriched, &rekey::ENRICHED_ORDER_BY_ID))
            .transpose()
    }

    /// Re-keys a line item by product id, joins it with its product and
    /// re-keys the result by order id.
    ///
    /// Returns None when the product is unknown.
    pub fn enrich_line_item(
        &self,
        item: Keyed<OrderLineItem>,
    ) -> Result<Option<Keyed<EnrichedLineItemDetail>>> {
        let item = rekey(item, &rekey::LINE_ITEM_BY_PRODUCT_ID)?;
        let joined = PRODUCT_JOIN.inner(item, &self.products, |item, product| {
            enrich_line_item(item, &product)
        })?;
        joined
            .map(|detail| rekey(detail, &rekey::DETAIL_BY_ORDER_ID))
            .transpose()
    }
}

/// The product sets per order, and the join that attaches them.
pub struct OrderStage {
    line_items: LineItemAggregator,
}

impl OrderStage {
    pub fn new(line_items: LineItemAggregator) -> Self {
        Self { line_items }
    }

    pub fn from_provider(provider: &dyn StoreProvider, shard: usize) -> Self {
        Self::new(GroupedSetAggregator::new(
            provider.line_items(shard),
            EnrichedLineItem::from,
        ))
    }

    /// Adds an enriched line item, keyed by order id, to its order's set.
    pub fn accumulate(
        &mut self,
        detail: Keyed<EnrichedLineItemDetail>,
    ) -> Result<AggregateUpdate<EnrichedLineItem>> {
        self.line_items.accumulate(detail)
    }

    /// Attaches the current product set to an enriched order keyed by order id.
    ///
    /// An order whose set has not been started yet gets an empty set.
    pub fn attach(&self, order: Keyed<EnrichedOrder>) -> Result<Keyed<EnrichedOrder>> {
        PRODUCT_SET_JOIN.or_default(order, &self.line_items, |order, products: ProductSet| {
            order.with_products(products)
        })
    }

    pub fn products_of(&self, order_id: &str) -> Result<Option<ProductSet>> {
        self.line_items.current(&order_id.into())
    }
}

/// Both stages driven by one thread of control.
pub struct EnrichmentTopology {
    reference: ReferenceStage,
    orders: OrderStage,
}

impl EnrichmentTopology {
    pub fn new(reference: ReferenceStage, orders: OrderStage) -> Self {
        Self { reference, orders }
    }

    pub fn in_memory() -> Self {
        Self::from_provider(&InMemoryStores)
    }

    pub fn from_provider(provider: &dyn StoreProvider) -> Self {
        Self::new(
            ReferenceStage::from_provider(provider, 0),
            OrderStage::from_provider(provider, 0),
        )
    }

    /// Processes one input record.
    ///
    /// Only an order that finds its customer produces output.
    pub fn process(&mut self, input: InputRecord) -> Result<Option<Keyed<EnrichedOrder>>> {
        match input {
            InputRecord::Customer(record) => {
                self.reference.apply_customer(record)?;
                Ok(None)
            }
            InputRecord::Product(record) => {
                self.reference.apply_product(record)?;
                Ok(None)
            }
            InputRecord::Order(record) => match self.reference.enrich_order(record)? {
                Some(enriched) => Ok(Some(self.orders.attach(enriched)?)),
                None => Ok(None),
            },
            InputRecord::LineItem(record) => {
                if let Some(detail) = self.reference.enrich_line_item(record)? {
                    self.orders.accumulate(detail)?;
                }
                Ok(None)
            }
        }
    }

    /// Processes records in order, collecting the output.
    pub fn process_all(
        &mut self,
        inputs: impl IntoIterator<Item = InputRecord>,
    ) -> Result<Vec<Keyed<EnrichedOrder>>> {
        let mut output = Vec::new();
        for input in inputs {
            output.extend(self.process(input)?);
        }
        Ok(output)
    }

    pub fn reference(&self) -> &ReferenceStage {
        &self.reference
    }

    pub fn orders(&self) -> &OrderStage {
        &self.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopologyError;

    fn order(id: &str, customer_id: &str) -> InputRecord {
        InputRecord::Order(Keyed::new("", Order::new(id, customer_id)))
    }

    fn line_item(order_id: &str, product_id: &str, quantity: u32) -> InputRecord {
        InputRecord::LineItem(Keyed::new("", OrderLineItem::new(order_id, product_id, quantity)))
    }

    #[test]
    fn test_order_after_line_items_carries_products() {
        let mut topology = EnrichmentTopology::in_memory();
        let output = topology
            .process_all([
                Customer::new("c1", "Alice").into(),
                Product::new("p1", "Widget").into(),
                line_item("o1", "p1", 2),
                order("o1", "c1"),
            ])
            .unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].key.as_str(), "o1");
        assert_eq!(output[0].value.customer_name, "Alice");
        assert_eq!(
            output[0].value.products.as_slice(),
            &[EnrichedLineItem::new("p1", "Widget", 2)]
        );
    }

    #[test]
    fn test_order_without_customer_is_dropped() {
        let mut topology = EnrichmentTopology::in_memory();
        assert_eq!(topology.process(order("o1", "c1")).unwrap(), None);
    }

    #[test]
    fn test_table_updates_emit_nothing() {
        let mut topology = EnrichmentTopology::in_memory();
        assert_eq!(topology.process(Customer::new("c1", "Alice").into()).unwrap(), None);
        assert_eq!(topology.process(Product::new("p1", "Widget").into()).unwrap(), None);
    }

    #[test]
    fn test_line_item_for_unknown_product_is_not_accumulated() {
        let mut topology = EnrichmentTopology::in_memory();
        topology.process(line_item("o1", "p9", 1)).unwrap();
        assert_eq!(topology.orders().products_of("o1").unwrap(), None);
    }

    #[test]
    fn test_malformed_order_is_rejected() {
        let mut topology = EnrichmentTopology::in_memory();
        let mut bad = Order::new("o1", "c1");
        bad.customer_id = None;

        let err = topology.process(InputRecord::Order(Keyed::new("k", bad))).unwrap_err();
        assert!(matches!(err, TopologyError::MalformedKeyField { field: "customer_id", .. }));
    }

    #[test]
    fn test_line_item_without_order_id_is_rejected_after_join() {
        let mut topology = EnrichmentTopology::in_memory();
        topology.process(Product::new("p1", "Widget").into()).unwrap();

        let item = OrderLineItem {
            order_id: None,
            product_id: Some("p1".to_string()),
            quantity: 1,
        };
        let err = topology.process(InputRecord::LineItem(Keyed::new("", item))).unwrap_err();
        assert!(matches!(err, TopologyError::MalformedKeyField { field: "order_id", .. }));
    }
}
