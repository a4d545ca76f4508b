//! Ingestion endpoints: one per input topic.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use changelog::ChangelogStore;
use common::Keyed;
use domain::{Customer, Order, OrderLineItem, Product};
use serde::{Deserialize, Serialize};
use topology::InputRecord;

use crate::AppState;
use crate::error::ApiError;

/// Optional producer key for stream records.
#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub key: Option<String>,
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub offset: i64,
}

type Accepted = (StatusCode, Json<AcceptedResponse>);

async fn ingest<C: ChangelogStore + 'static>(
    state: &AppState<C>,
    input: InputRecord,
) -> Result<Accepted, ApiError> {
    let topic = input.topic();
    let offset = state.processor.ingest(input).await?;
    metrics::counter!("api_records_accepted_total", "topic" => topic.as_str()).increment(1);
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            offset: offset.as_i64(),
        }),
    ))
}

/// PUT /customers/{id}: upsert a customer, keyed by the path id.
#[tracing::instrument(skip(state, customer))]
pub async fn put_customer<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<String>,
    Json(customer): Json<Customer>,
) -> Result<Accepted, ApiError> {
    ingest(&state, InputRecord::Customer(Keyed::new(id, customer))).await
}

/// PUT /products/{id}: upsert a product, keyed by the path id.
#[tracing::instrument(skip(state, product))]
pub async fn put_product<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<String>,
    Json(product): Json<Product>,
) -> Result<Accepted, ApiError> {
    ingest(&state, InputRecord::Product(Keyed::new(id, product))).await
}

/// POST /orders: publish an order event.
#[tracing::instrument(skip(state, order), fields(order_id = %order.id))]
pub async fn post_order<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Query(params): Query<KeyParams>,
    Json(order): Json<Order>,
) -> Result<Accepted, ApiError> {
    let key = params.key.unwrap_or_default();
    ingest(&state, InputRecord::Order(Keyed::new(key, order))).await
}

/// POST /order-line-items: publish a line item event.
#[tracing::instrument(skip(state, item))]
pub async fn post_line_item<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Query(params): Query<KeyParams>,
    Json(item): Json<OrderLineItem>,
) -> Result<Accepted, ApiError> {
    let key = params.key.unwrap_or_default();
    ingest(&state, InputRecord::LineItem(Keyed::new(key, item))).await
}
