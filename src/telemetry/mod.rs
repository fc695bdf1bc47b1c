//! Live telemetry ingestion from field hardware.

mod server;
mod store;

pub use server::TelemetryServer;
pub use store::{LiveReading, LiveReadingStore};
