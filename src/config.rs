//! Configuration loading from TOML with per-section structs.

use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub upstream: UpstreamConfig,
    pub forecast: ForecastConfig,
    pub scheduling: SchedulingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the reference/history information service.
    pub api_url: String,
    /// Seconds reference data is served from cache before a refresh.
    pub reference_ttl_secs: u64,
    /// Seconds between background rate recomputations.
    pub recompute_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Hours projected forward when building forecast points.
    pub horizon_hours: u32,
    /// Fraction of max_volume that triggers pickup scheduling.
    pub threshold: f64,
    /// A cauldron is at risk if it fills within this many hours.
    pub at_risk_horizon_hours: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Rolling window (hours) within which a projected threshold crossing
    /// creates a pickup need.
    pub window_hours: f64,
    /// Fixed dwell per stop, minutes.
    pub dwell_minutes: f64,
    /// Daily trip start hour (UTC); trips start now if later.
    pub day_start_hour: u32,
    /// Capacity assumed when the courier feed is empty.
    pub default_courier_capacity: f64,
    /// Average speed assumed for straight-line fallback legs, km/h.
    pub fallback_speed_kmh: f64,
    /// Volume split fractions applied when one pickup exceeds the largest
    /// courier capacity. Tuned policy, not an invariant.
    pub split_fractions: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8888".into(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://hackutd2025.eog.systems/api".into(),
            reference_ttl_secs: 3600,
            recompute_interval_secs: 300,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_hours: 24,
            threshold: 0.8,
            at_risk_horizon_hours: 12.0,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            window_hours: 24.0,
            dwell_minutes: 15.0,
            day_start_hour: 8,
            default_courier_capacity: 1000.0,
            fallback_speed_kmh: 30.0,
            split_fractions: vec![0.7, 0.3],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            upstream: UpstreamConfig::default(),
            forecast: ForecastConfig::default(),
            scheduling: SchedulingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.upstream.api_url.is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" }.into());
        }
        if self.telemetry.bind_addr.is_empty() {
            return Err(ConfigError::MissingField { field: "bind_addr" }.into());
        }
        if !(self.forecast.threshold > 0.0 && self.forecast.threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                reason: format!("must be in (0, 1], got {}", self.forecast.threshold),
            }
            .into());
        }
        if self.scheduling.day_start_hour >= 24 {
            return Err(ConfigError::InvalidValue {
                field: "day_start_hour",
                reason: format!("must be 0-23, got {}", self.scheduling.day_start_hour),
            }
            .into());
        }
        if self.scheduling.fallback_speed_kmh <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "fallback_speed_kmh",
                reason: format!("must be positive, got {}", self.scheduling.fallback_speed_kmh),
            }
            .into());
        }
        if self
            .scheduling
            .split_fractions
            .iter()
            .any(|f| !(*f > 0.0 && *f < 1.0))
        {
            return Err(ConfigError::InvalidValue {
                field: "split_fractions",
                reason: "each fraction must be in (0, 1)".into(),
            }
            .into());
        }
        let sum: f64 = self.scheduling.split_fractions.iter().sum();
        if !self.scheduling.split_fractions.is_empty() && (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::InvalidValue {
                field: "split_fractions",
                reason: format!("fractions must sum to 1.0, got {sum}"),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_threshold_above_one() {
        let mut config = Config::default();
        config.forecast.threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_fractions_not_summing_to_one() {
        let mut config = Config::default();
        config.scheduling.split_fractions = vec![0.5, 0.3];
        assert!(config.validate().is_err());
    }
}
