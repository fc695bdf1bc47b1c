//! brewflow: cauldron overflow forecasting and courier scheduling.
//!
//! The service ingests live fill telemetry over TCP, pulls reference data
//! and level history from the upstream information service, fits per-site
//! brew rates from the history, forecasts time-to-threshold for every
//! cauldron, and plans courier pickup routes over the site network before
//! anything overflows.

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod telemetry;
pub mod upstream;

pub use config::Config;
pub use error::{Error, Result};
