//! Level readings from the field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SiteId;

/// A single level measurement for one site. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub site: SiteId,
    pub timestamp: DateTime<Utc>,
    pub level: f64,
}

impl Reading {
    pub fn new(site: SiteId, timestamp: DateTime<Utc>, level: f64) -> Self {
        Self {
            site,
            timestamp,
            level,
        }
    }
}

/// Extract one site's readings in timestamp order.
///
/// Every consumer of a series (segmentation, regression, start/end-of-day
/// levels) requires this ordering, so it lives here rather than being
/// re-sorted piecemeal.
pub fn site_series(readings: &[Reading], site: &SiteId) -> Vec<Reading> {
    let mut series: Vec<Reading> = readings.iter().filter(|r| &r.site == site).cloned().collect();
    series.sort_by_key(|r| r.timestamp);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn site_series_filters_and_sorts() {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 11, 1, 11, 0, 0).unwrap();
        let readings = vec![
            Reading::new(SiteId::cauldron("a"), t1, 20.0),
            Reading::new(SiteId::cauldron("b"), t0, 5.0),
            Reading::new(SiteId::cauldron("a"), t0, 10.0),
        ];

        let series = site_series(&readings, &SiteId::cauldron("a"));
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].level, 10.0);
        assert_eq!(series[1].level, 20.0);
    }
}
