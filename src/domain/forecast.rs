//! Level projection and time-to-threshold forecasting.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::ids::SiteId;
use super::rate::RATE_EPSILON;
use crate::config::ForecastConfig;

/// One projected point on the forecast curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub level: f64,
    pub percentage: f64,
}

/// Full forecast record for one cauldron. Always complete: options are
/// `None` only where genuinely undefined (zero rate below threshold).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub site: SiteId,
    pub current_level: f64,
    pub max_volume: f64,
    pub current_percentage: f64,
    /// Estimated fill rate, volume/hour, clamped ≥ 0.
    pub brew_rate_lph: f64,
    pub points: Vec<ForecastPoint>,
    pub time_to_threshold: Option<DateTime<Utc>>,
    pub time_to_full: Option<DateTime<Utc>>,
    /// Overflow falls within the configured short horizon.
    pub at_risk: bool,
}

/// Project one site forward from `now`. Inputs are never mutated.
pub fn forecast_site(
    site: SiteId,
    current_level: f64,
    max_volume: f64,
    rate_lph: f64,
    now: DateTime<Utc>,
    cfg: &ForecastConfig,
) -> Forecast {
    let rate = rate_lph.max(0.0);
    let current_percentage = percentage(current_level, max_volume);

    let points = (0..=cfg.horizon_hours)
        .map(|hour| {
            let level = (current_level + rate * f64::from(hour)).min(max_volume);
            ForecastPoint {
                timestamp: now + Duration::hours(i64::from(hour)),
                level,
                percentage: percentage(level, max_volume),
            }
        })
        .collect();

    let time_to_threshold =
        time_to_fraction(current_level, max_volume, rate, cfg.threshold, now);
    let time_to_full = time_to_fraction(current_level, max_volume, rate, 1.0, now);

    let at_risk = time_to_full.is_some_and(|t| {
        (t - now).num_seconds() as f64 / 3600.0 < cfg.at_risk_horizon_hours
    });

    Forecast {
        site,
        current_level,
        max_volume,
        current_percentage,
        brew_rate_lph: rate,
        points,
        time_to_threshold,
        time_to_full,
        at_risk,
    }
}

/// When the level crosses `fraction` of capacity.
///
/// With a positive rate, a remaining amount ≤ 0 means the crossing already
/// happened: the answer is `now`. A zero rate still answers `now` when the
/// level sits at or past the fraction; otherwise there is no crossing.
pub fn time_to_fraction(
    current_level: f64,
    max_volume: f64,
    rate_lph: f64,
    fraction: f64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if max_volume <= 0.0 {
        return None;
    }

    let remaining = fraction * max_volume - current_level;

    if rate_lph > RATE_EPSILON {
        if remaining <= 0.0 {
            Some(now)
        } else {
            let hours = remaining / rate_lph;
            Some(now + Duration::milliseconds((hours * 3_600_000.0) as i64))
        }
    } else if remaining <= 0.0 {
        Some(now)
    } else {
        None
    }
}

fn percentage(level: f64, max_volume: f64) -> f64 {
    if max_volume > 0.0 {
        level / max_volume * 100.0
    } else {
        0.0
    }
}
