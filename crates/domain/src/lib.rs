//! Domain records for the order enrichment pipeline.
//!
//! This crate provides:
//! - Reference records ([`Customer`], [`Product`]) consumed as tables
//! - Event records ([`Order`], [`OrderLineItem`]) consumed as streams
//! - Derived records ([`EnrichedOrder`], [`EnrichedLineItemDetail`], [`EnrichedLineItem`])
//! - [`OrderedSet`], the value-deduplicating set aggregated per order
//! - Hand-written projections between related record shapes ([`mapping`])

pub mod mapping;
pub mod order;
pub mod ordered_set;
pub mod reference;

pub use mapping::{enrich_line_item, enrich_order};
pub use order::{
    EnrichedLineItem, EnrichedLineItemDetail, EnrichedOrder, Order, OrderLineItem, ProductSet,
};
pub use ordered_set::OrderedSet;
pub use reference::{Customer, Product};
