//! API Aggregator: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, the aggregator runtime and metrics.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use api_aggregator::api::{self, AppState};
use api_aggregator::telemetry::{init_tracing, Metrics};
use api_aggregator::{AggregatorRuntime, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading aggregator config")?;
    let runtime = AggregatorRuntime::from_config(&cfg)?;

    let mut app = api::router(AppState::new(runtime.aggregator.clone()));
    match Metrics::init(cfg.executor.pool_size) {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics disabled"),
    }

    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(bind = %cfg.server.bind, "api aggregator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("http server")?;

    runtime.shutdown().await;
    Ok(())
}
