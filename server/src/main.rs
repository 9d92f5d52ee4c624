//! Turnstile admission queue server.
//!
//! Serves the queue HTTP API and WebSocket updates, and runs the timeout
//! sweeper and idle reaper in the background.
//!
//! # Usage
//!
//! ```bash
//! PORT=8080 QUEUE_PROCESSING_TIMEOUT_SECS=60 cargo run --bin turnstile
//! ```

mod config;
mod lifecycle;

use crate::config::Config;
use crate::lifecycle::Application;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_core::environment::SystemClock;
use turnstile_runtime::metrics::MetricsExporter;
use turnstile_runtime::{IdleReaper, QueueManager, TimeoutSweeper};
use turnstile_web::{AppState, TopicBroadcaster, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        address = %config.server.bind_address(),
        processing_timeout_secs = config.queue.processing_timeout.as_secs(),
        sweep_interval_secs = config.queue.sweep_interval.as_secs(),
        idle_window_secs = config.queue.idle_window.as_secs(),
        metrics_enabled = config.server.metrics_enabled,
        "Configuration loaded"
    );

    let metrics = if config.server.metrics_enabled {
        let mut exporter = MetricsExporter::new()
            .with_gauge_idle_timeout(config.queue.reap_interval.saturating_mul(2));
        exporter.install()?;
        exporter.handle().cloned()
    } else {
        None
    };

    let broadcaster = TopicBroadcaster::new();
    let manager = Arc::new(QueueManager::new(
        config.queue.clone(),
        Arc::new(SystemClock),
        Arc::new(broadcaster.clone()),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = TimeoutSweeper::new(Arc::clone(&manager), shutdown_tx.subscribe());
    let reaper = IdleReaper::new(Arc::clone(&manager), shutdown_tx.subscribe());

    let state = AppState::new(manager, broadcaster).with_metrics(metrics);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening");

    Application::new(listener, app, sweeper, reaper, shutdown_tx, config)
        .run()
        .await
}
