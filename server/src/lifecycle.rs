//! Application lifecycle management and graceful shutdown.
//!
//! 1. **Startup**: Spawn the timeout sweeper and idle reaper
//! 2. **Runtime**: Serve HTTP and WebSocket traffic
//! 3. **Shutdown**: Stop accepting connections, signal the background tasks,
//!    and wait up to `SHUTDOWN_TIMEOUT` seconds for each of them

use crate::config::Config;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use turnstile_runtime::{IdleReaper, TimeoutSweeper};

/// Running application with its background tasks.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    app: axum::Router,

    /// Reclaims abandoned processing slots
    sweeper: TimeoutSweeper,

    /// Drops state of idle resources
    reaper: IdleReaper,

    /// Shutdown signal broadcaster; the tasks hold the receivers
    shutdown_tx: broadcast::Sender<()>,

    /// Application configuration
    config: Config,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub const fn new(
        listener: tokio::net::TcpListener,
        app: axum::Router,
        sweeper: TimeoutSweeper,
        reaper: IdleReaper,
        shutdown_tx: broadcast::Sender<()>,
        config: Config,
    ) -> Self {
        Self {
            listener,
            app,
            sweeper,
            reaper,
            shutdown_tx,
            config,
        }
    }

    /// Run the application until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(address = %self.config.server.bind_address(), "Starting HTTP server");

        let handles = vec![
            ("timeout_sweeper", self.sweeper.spawn()),
            ("idle_reaper", self.reaper.spawn()),
        ];

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, initiating graceful shutdown...");

        // Err only means every task already exited
        let _ = self.shutdown_tx.send(());

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout);
        Self::await_shutdown(handles, timeout).await;

        info!("Graceful shutdown complete");
        Ok(())
    }

    async fn await_shutdown(handles: Vec<(&'static str, JoinHandle<()>)>, timeout: Duration) {
        for (task, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => info!(task, "Background task stopped gracefully"),
                Ok(Err(e)) => warn!(task, error = %e, "Background task failed"),
                Err(_) => warn!(task, "Background task shutdown timed out"),
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed is logged and never fires, so the
/// other signal still works.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_await_shutdown_reports_finished_tasks() {
        let finished = tokio::spawn(async {});
        let (tx, mut rx) = broadcast::channel::<()>(1);
        let waiting = tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        tx.send(()).unwrap();
        Application::await_shutdown(
            vec![("finished", finished), ("waiting", waiting)],
            Duration::from_secs(1),
        )
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_shutdown_times_out_on_stuck_task() {
        let stuck = tokio::spawn(std::future::pending::<()>());

        Application::await_shutdown(vec![("stuck", stuck)], Duration::from_secs(5)).await;
    }
}
