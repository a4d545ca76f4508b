//! Order-side records: the raw event streams and their enriched forms.

mod enriched;
mod events;

pub use enriched::{EnrichedLineItem, EnrichedLineItemDetail, EnrichedOrder, ProductSet};
pub use events::{Order, OrderLineItem};
