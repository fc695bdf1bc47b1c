//! Collection audit: does the volume couriers reported hauling away account
//! for what each cauldron actually produced?
//!
//! Expected end-of-day level = start level + fitted rate × minutes spent
//! filling − everything collected. The gap between that and the observed
//! end level is the day's discrepancy; consistently non-zero values point
//! at under-reported pickups or a drifting level sensor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::SiteId;
use super::rate::DailyRate;

/// One reported pickup from the transport ticket feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportTicket {
    pub cauldron_id: SiteId,
    pub date: NaiveDate,
    pub amount_collected: f64,
}

/// Audit result for one (site, day).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDiscrepancy {
    pub site: SiteId,
    pub date: NaiveDate,
    pub expected_end_level: f64,
    pub observed_end_level: f64,
    /// Expected minus observed; positive means volume went missing.
    pub discrepancy: f64,
}

/// Expected end level given a day's aggregates and the amounts hauled away.
fn expected_end_level(rate: &DailyRate, collected: f64) -> f64 {
    let generated = rate.avg_slope_per_min * rate.fill_minutes;
    rate.start_level + generated - collected
}

/// Cross-check every (site, day) that has both a rate row and at least one
/// ticket. Days with no tickets or no rate data are skipped, not errors.
pub fn verify_collections(
    daily_rates: &[DailyRate],
    tickets: &[TransportTicket],
) -> Vec<CollectionDiscrepancy> {
    let mut results = Vec::new();

    for rate in daily_rates {
        let collected: f64 = tickets
            .iter()
            .filter(|t| t.cauldron_id == rate.site && t.date == rate.date)
            .map(|t| t.amount_collected)
            .sum();

        let has_tickets = tickets
            .iter()
            .any(|t| t.cauldron_id == rate.site && t.date == rate.date);
        if !has_tickets {
            continue;
        }

        let expected = expected_end_level(rate, collected);
        results.push(CollectionDiscrepancy {
            site: rate.site.clone(),
            date: rate.date,
            expected_end_level: expected,
            observed_end_level: rate.end_level,
            discrepancy: expected - rate.end_level,
        });
    }

    results
}
