//! HTTP service for the order enrichment pipeline.
//!
//! Accepts customers, products, orders and line items over REST, runs them
//! through the enrichment topology, and serves the enriched orders, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod view;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use changelog::ChangelogStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use topology::{EnrichmentProcessor, PipelineConfig, RecoveryReport, TopologyError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use view::EnrichedOrdersView;

/// Shared application state accessible from all handlers.
pub struct AppState<C: ChangelogStore> {
    pub processor: EnrichmentProcessor<C>,
    pub view: EnrichedOrdersView,
}

/// A started pipeline with its view being fed.
pub struct Pipeline<C: ChangelogStore> {
    pub state: Arc<AppState<C>>,
    /// Completes once the processor has shut down and the view has caught up.
    pub output_task: JoinHandle<()>,
    pub recovery: RecoveryReport,
}

/// Starts the processor over `changelog`, attaches the view and recovers
/// state from the changelog.
pub async fn start_pipeline<C: ChangelogStore + 'static>(
    changelog: C,
    config: &PipelineConfig,
) -> Result<Pipeline<C>, TopologyError> {
    let (processor, outputs) = EnrichmentProcessor::new(changelog, config);
    let view = EnrichedOrdersView::new();
    let output_task = view.spawn(outputs);

    let recovery = processor.recover().await?;

    Ok(Pipeline {
        state: Arc::new(AppState { processor, view }),
        output_task,
        recovery,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C: ChangelogStore + 'static>(
    state: Arc<AppState<C>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::status::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::status::health::<C>))
        .route("/customers/{id}", put(routes::ingest::put_customer::<C>))
        .route("/products/{id}", put(routes::ingest::put_product::<C>))
        .route("/orders", post(routes::ingest::post_order::<C>))
        .route("/orders", get(routes::orders::list::<C>))
        .route("/orders/{id}", get(routes::orders::get::<C>))
        .route("/order-line-items", post(routes::ingest::post_line_item::<C>))
        .route("/dead-letters", get(routes::dead_letters::list::<C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
