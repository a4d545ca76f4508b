//! Enriched order queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use changelog::ChangelogStore;
use domain::EnrichedOrder;

use crate::AppState;
use crate::error::ApiError;

/// GET /orders/{id}: the latest enriched value of an order.
#[tracing::instrument(skip(state))]
pub async fn get<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<String>,
) -> Result<Json<EnrichedOrder>, ApiError> {
    state
        .view
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}

/// GET /orders: every enriched order emitted so far.
#[tracing::instrument(skip(state))]
pub async fn list<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<Vec<EnrichedOrder>> {
    Json(state.view.all().await)
}
