//! App orchestration: wires the telemetry listener, the periodic rate
//! recomputation loop, and the query surface over shared state, and
//! coordinates shutdown across all of them.

mod service;
mod state;

pub use state::{AppState, RateTables};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::telemetry::TelemetryServer;
use crate::upstream::{HttpProvider, ReferenceProvider};

/// Main application struct.
pub struct App;

impl App {
    /// Run the service against the configured upstream until interrupted.
    pub async fn run(config: Config) -> Result<()> {
        let provider = Arc::new(HttpProvider::new(config.upstream.api_url.clone()));
        Self::run_with(config, provider).await
    }

    /// Run with an injected provider (tests swap in a static one).
    ///
    /// Spawns the telemetry listener and the recompute loop, then waits for
    /// ctrl-c. On shutdown every task sees the signal at its next blocking
    /// boundary, so exit latency is bounded by one poll interval.
    pub async fn run_with(config: Config, provider: Arc<dyn ReferenceProvider>) -> Result<()> {
        let state = Arc::new(AppState::new(config.clone(), provider));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = TelemetryServer::new(config.telemetry.bind_addr.clone(), state.live_store());
        let mut server_handle = tokio::spawn(server.run(shutdown_rx.clone()));
        let recompute_handle = tokio::spawn(recompute_loop(Arc::clone(&state), shutdown_rx));

        let server_result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                None
            }
            result = &mut server_handle => Some(result),
        };

        let _ = shutdown_tx.send(true);
        let _ = recompute_handle.await;

        match server_result {
            // Listener died on its own; surface why.
            Some(Ok(Err(e))) => {
                error!(error = %e, "telemetry listener failed");
                Err(e)
            }
            Some(_) => Ok(()),
            // Clean shutdown: wait for the listener to drain.
            None => match server_handle.await {
                Ok(result) => result,
                Err(_) => Ok(()),
            },
        }
    }
}

/// Periodic rate recomputation with an interruptible wait, so shutdown
/// never waits out a full sleep interval.
async fn recompute_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(state.config().upstream.recompute_interval_secs);

    loop {
        state.recompute_rates().await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("recompute loop stopping");
                return;
            }
        }
    }
}
