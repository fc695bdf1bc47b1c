//! Shared application state and its locking discipline.
//!
//! Three independently locked pieces: the live-reading store (fast,
//! lock-per-frame), the recomputed rate tables (slow to build, swapped
//! whole), and the TTL'd reference cache. Separate locks keep live-data
//! reads from contending with recomputation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::audit::TransportTicket;
use crate::domain::{daily_drain_rates, daily_rates, DailyRate, Reading, ReferenceData};
use crate::telemetry::{LiveReading, LiveReadingStore};
use crate::upstream::ReferenceProvider;

/// Rate tables recomputed in the background. `None` until the first cycle
/// completes; consumers treat that as "not yet available", never a crash.
#[derive(Debug, Clone)]
pub struct RateTables {
    pub fill: Vec<DailyRate>,
    pub drain: Vec<DailyRate>,
    pub computed_at: DateTime<Utc>,
}

struct CachedReference {
    data: ReferenceData,
    fetched_at: Instant,
}

/// Process-wide state, constructed at startup and injected into tasks.
pub struct AppState {
    config: Config,
    provider: Arc<dyn ReferenceProvider>,
    live: Arc<LiveReadingStore>,
    rates: RwLock<Option<RateTables>>,
    // tokio Mutex: held across the refresh await on expiry, by design —
    // readers briefly block rather than seeing stale-past-TTL data.
    reference: tokio::sync::Mutex<Option<CachedReference>>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn ReferenceProvider>) -> Self {
        Self {
            config,
            provider,
            live: Arc::new(LiveReadingStore::new()),
            rates: RwLock::new(None),
            reference: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn live_store(&self) -> Arc<LiveReadingStore> {
        Arc::clone(&self.live)
    }

    pub fn live_reading(&self) -> LiveReading {
        self.live.latest()
    }

    /// Reference data, served from cache within the TTL. An expired cache
    /// refreshes synchronously under the lock; upstream failures degrade to
    /// empty data rather than an error.
    pub async fn reference(&self) -> ReferenceData {
        let ttl = Duration::from_secs(self.config.upstream.reference_ttl_secs);
        let mut cached = self.reference.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < ttl {
                return entry.data.clone();
            }
        }

        let data = self.fetch_reference().await;
        *cached = Some(CachedReference {
            data: data.clone(),
            fetched_at: Instant::now(),
        });
        data
    }

    async fn fetch_reference(&self) -> ReferenceData {
        let cauldrons = self.provider.cauldrons().await.unwrap_or_else(|e| {
            warn!(error = %e, "cauldron fetch failed, treating as empty");
            Vec::new()
        });
        let couriers = self.provider.couriers().await.unwrap_or_else(|e| {
            warn!(error = %e, "courier fetch failed, treating as empty");
            Vec::new()
        });
        let market = self.provider.market().await.unwrap_or_else(|e| {
            warn!(error = %e, "market fetch failed, treating as missing");
            None
        });
        let network = self.provider.network().await.unwrap_or_else(|e| {
            warn!(error = %e, "network fetch failed, treating as empty");
            Vec::new()
        });

        ReferenceData {
            cauldrons,
            couriers,
            market,
            network,
        }
    }

    pub async fn history(&self) -> Vec<Reading> {
        self.provider.history().await.unwrap_or_else(|e| {
            warn!(error = %e, "history fetch failed, treating as empty");
            Vec::new()
        })
    }

    pub async fn tickets(&self) -> Vec<TransportTicket> {
        self.provider.tickets().await.unwrap_or_else(|e| {
            warn!(error = %e, "ticket fetch failed, treating as empty");
            Vec::new()
        })
    }

    /// Rebuild the daily rate tables from history and swap them in.
    pub async fn recompute_rates(&self) {
        let history = self.history().await;
        let fill = daily_rates(&history);
        let drain = daily_drain_rates(&history);

        info!(
            readings = history.len(),
            fill_rows = fill.len(),
            drain_rows = drain.len(),
            "rate tables recomputed"
        );

        *self.rates.write() = Some(RateTables {
            fill,
            drain,
            computed_at: Utc::now(),
        });
    }

    /// Snapshot of the current rate tables, if a cycle has completed.
    pub fn rates(&self) -> Option<RateTables> {
        self.rates.read().clone()
    }
}
