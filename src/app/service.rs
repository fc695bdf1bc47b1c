//! Query surface consumed by an external API layer: schedules, forecasts,
//! rate rows, audits, and the live reading. Every call returns a
//! well-formed (possibly empty) value; absence of data is in-band.

use chrono::{NaiveDate, Utc};

use super::state::AppState;
use crate::domain::audit::{verify_collections, CollectionDiscrepancy};
use crate::domain::{
    brew_rate, build_schedule, forecast_site, site_series, DailyRate, Forecast, Reading,
    ReferenceData, SchedulePlan, SiteId,
};

impl AppState {
    /// Forecasts for every known cauldron, freshest data first.
    pub async fn forecasts(&self) -> Vec<Forecast> {
        let reference = self.reference().await;
        let history = self.history().await;
        self.forecasts_from(&reference, &history)
    }

    fn forecasts_from(&self, reference: &ReferenceData, history: &[Reading]) -> Vec<Forecast> {
        let now = Utc::now();
        reference
            .cauldrons
            .iter()
            .map(|cauldron| {
                let site = SiteId::cauldron(&cauldron.id);
                let series = site_series(history, &site);
                let current_level = series.last().map_or(0.0, |r| r.level);
                let rate = brew_rate(&series);
                forecast_site(
                    site,
                    current_level,
                    cauldron.max_volume,
                    rate,
                    now,
                    &self.config().forecast,
                )
            })
            .collect()
    }

    /// The pickup plan for one date. Upstream outages yield an empty plan.
    pub async fn schedule_for(&self, date: NaiveDate) -> SchedulePlan {
        let reference = self.reference().await;
        let history = self.history().await;
        let forecasts = self.forecasts_from(&reference, &history);

        build_schedule(
            date,
            Utc::now(),
            &reference,
            &forecasts,
            &self.config().forecast,
            &self.config().scheduling,
        )
    }

    /// Fill-rate row for one cauldron and date, or `None` when that day has
    /// no fitted runs.
    pub async fn rate_for(&self, cauldron: &str, date: NaiveDate) -> Option<DailyRate> {
        let site = SiteId::cauldron(cauldron);
        self.ensure_rates().await?;
        self.rates()?
            .fill
            .into_iter()
            .find(|row| row.site == site && row.date == date)
    }

    /// Drain-rate row for one cauldron and date.
    pub async fn drain_rate_for(&self, cauldron: &str, date: NaiveDate) -> Option<DailyRate> {
        let site = SiteId::cauldron(cauldron);
        self.ensure_rates().await?;
        self.rates()?
            .drain
            .into_iter()
            .find(|row| row.site == site && row.date == date)
    }

    /// Cross-check transport tickets against estimated generation.
    pub async fn audit(&self) -> Vec<CollectionDiscrepancy> {
        if self.ensure_rates().await.is_none() {
            return Vec::new();
        }
        let Some(rates) = self.rates() else {
            return Vec::new();
        };
        let tickets = self.tickets().await;
        verify_collections(&rates.fill, &tickets)
    }

    /// Compute rate tables on demand when the background loop has not run
    /// yet (one-shot CLI invocations).
    async fn ensure_rates(&self) -> Option<()> {
        if self.rates().is_none() {
            self.recompute_rates().await;
        }
        self.rates().map(|_| ())
    }
}
