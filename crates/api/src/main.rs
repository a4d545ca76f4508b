//! API server entry point.

use api::config::Config;
use changelog::{ChangelogStore, InMemoryChangelog, PostgresChangelog};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Serves until a shutdown signal, then drains the pipeline and commits a checkpoint.
async fn run<C: ChangelogStore + 'static>(
    config: &Config,
    changelog: C,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let pipeline = api::start_pipeline(changelog, &config.pipeline).await?;
    tracing::info!(
        replayed = pipeline.recovery.replayed,
        restored = pipeline.recovery.restored,
        skipped = pipeline.recovery.skipped,
        shards = config.pipeline.shard_count,
        "pipeline recovered"
    );

    let app = api::create_app(pipeline.state.clone(), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let offset = pipeline.state.processor.shutdown().await?;
    pipeline.output_task.await?;
    tracing::info!(%offset, "server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the changelog backend and serve
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url).await?;
            let changelog = PostgresChangelog::new(pool);
            changelog.run_migrations().await?;
            tracing::info!("using PostgreSQL changelog");
            run(&config, changelog, metrics_handle).await
        }
        None => {
            tracing::info!("using in-memory changelog");
            run(&config, InMemoryChangelog::new(), metrics_handle).await
        }
    }
}
