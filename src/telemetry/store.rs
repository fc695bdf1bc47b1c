//! Shared live-reading state fed by the telemetry listener.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Most recent hardware report. Only the latest state is held — ordering
/// across connections is neither guaranteed nor needed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveReading {
    pub taken_liters: f64,
    pub reported_liters: f64,
    /// Always `taken - reported`.
    pub discrepancy: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub connected: bool,
}

impl Default for LiveReading {
    fn default() -> Self {
        Self {
            taken_liters: 0.0,
            reported_liters: 0.0,
            discrepancy: 0.0,
            timestamp: None,
            connected: false,
        }
    }
}

/// Thread-safe holder of the latest live reading.
///
/// Reads copy out under a short-lived lock; writes replace under the same
/// lock. The lock is never held across I/O.
#[derive(Debug, Default)]
pub struct LiveReadingStore {
    latest: Mutex<LiveReading>,
}

impl LiveReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a parsed report, computing the discrepancy.
    pub fn publish(&self, taken_liters: f64, reported_liters: f64, at: DateTime<Utc>) -> f64 {
        let discrepancy = taken_liters - reported_liters;
        let mut latest = self.latest.lock();
        *latest = LiveReading {
            taken_liters,
            reported_liters,
            discrepancy,
            timestamp: Some(at),
            connected: true,
        };
        discrepancy
    }

    pub fn set_connected(&self, connected: bool) {
        self.latest.lock().connected = connected;
    }

    /// Snapshot of the latest reading.
    pub fn latest(&self) -> LiveReading {
        self.latest.lock().clone()
    }
}
