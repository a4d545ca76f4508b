//! Service status and Prometheus metrics.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use changelog::ChangelogStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Offset of the last record handed to the pipeline.
    pub last_dispatched: i64,
    /// Offset of the order record behind the newest emitted order.
    pub last_emitted: i64,
}

/// GET /health: returns service health and pipeline progress.
pub async fn health<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        last_dispatched: state.processor.last_dispatched().await.as_i64(),
        last_emitted: state.view.last_offset().await.as_i64(),
    })
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
