//! Brew-rate estimation from noisy level series.
//!
//! A series is segmented into maximal runs where the level never decreases
//! ("filling runs"); each run gets an ordinary least-squares line of level
//! against elapsed seconds, and runs are aggregated per calendar day. The
//! live brew rate used by the forecaster pools filling-run points inside a
//! progressively widened lookback window, because sparse telemetry is the
//! norm, not the exception.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use super::ids::SiteId;
use super::reading::{site_series, Reading};

/// Lookback windows tried, in order, when estimating the live brew rate.
const LOOKBACK_WINDOWS_HOURS: [i64; 5] = [24, 48, 72, 168, 336];

/// Cap on samples fed to one regression.
const MAX_SAMPLE_COUNT: usize = 1000;

/// Rates below this are treated as zero (no meaningful fill).
pub const RATE_EPSILON: f64 = 1e-10;

/// Per-(site, day) rate aggregates, recomputed from readings, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRate {
    pub site: SiteId,
    pub date: NaiveDate,
    /// Mean fitted slope across the day's runs, volume per minute.
    pub avg_slope_per_min: f64,
    /// Mean coefficient of determination across the day's runs.
    pub avg_r_squared: f64,
    pub run_count: usize,
    /// Summed run duration, minutes. For fill runs this is the total
    /// generation time used by the collection audit.
    pub fill_minutes: f64,
    pub start_level: f64,
    pub end_level: f64,
}

/// Closed-form simple linear regression over (x, y) points.
///
/// Returns (slope per x-unit, R²). Degenerate x-variance yields (0, 0);
/// a perfectly flat y is a perfect fit for the zero-slope line.
pub fn ols_fit(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    if points.len() < 2 {
        return (0.0, 0.0);
    }

    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx <= 0.0 {
        return (0.0, 0.0);
    }

    let slope = sxy / sxx;

    if syy <= 0.0 {
        return (slope, 1.0);
    }

    let ss_res = (syy - slope * sxy).max(0.0);
    let r_squared = (1.0 - ss_res / syy).clamp(0.0, 1.0);

    (slope, r_squared)
}

/// Maximal contiguous runs where the level never decreases. Runs shorter
/// than 2 points cannot fit a trend and are discarded. Input must already be
/// sorted by timestamp.
pub fn fill_runs(series: &[Reading]) -> Vec<&[Reading]> {
    segment_runs(series, |prev, next| next >= prev)
}

/// Maximal contiguous strictly-decreasing runs: the drain/removal side of
/// the same segmentation.
pub fn drain_runs(series: &[Reading]) -> Vec<&[Reading]> {
    segment_runs(series, |prev, next| next < prev)
}

fn segment_runs(series: &[Reading], joins: impl Fn(f64, f64) -> bool) -> Vec<&[Reading]> {
    let mut runs = Vec::new();
    let mut start = 0;

    for i in 1..series.len() {
        if !joins(series[i - 1].level, series[i].level) {
            if i - start >= 2 {
                runs.push(&series[start..i]);
            }
            start = i;
        }
    }
    if !series.is_empty() && series.len() - start >= 2 {
        runs.push(&series[start..]);
    }

    runs
}

/// Fit one run: slope in volume/minute, R², and run duration in minutes.
fn fit_run(run: &[Reading]) -> (f64, f64, f64) {
    let origin = run[0].timestamp;
    let points: Vec<(f64, f64)> = run
        .iter()
        .map(|r| ((r.timestamp - origin).num_seconds() as f64, r.level))
        .collect();

    let (slope_per_sec, r_squared) = ols_fit(&points);
    let minutes = (run[run.len() - 1].timestamp - origin).num_seconds() as f64 / 60.0;

    (slope_per_sec * 60.0, r_squared, minutes)
}

/// One row per (site, day): mean slope and R² over the day's filling runs,
/// run count, summed run minutes, and the day's first/last observed level.
pub fn daily_rates(readings: &[Reading]) -> Vec<DailyRate> {
    daily_rates_by(readings, fill_runs)
}

/// The same aggregation over strictly decreasing runs; slopes come out
/// negative.
pub fn daily_drain_rates(readings: &[Reading]) -> Vec<DailyRate> {
    daily_rates_by(readings, drain_runs)
}

fn daily_rates_by(
    readings: &[Reading],
    runs_of: for<'a> fn(&'a [Reading]) -> Vec<&'a [Reading]>,
) -> Vec<DailyRate> {
    let mut sites: Vec<SiteId> = readings.iter().map(|r| r.site.clone()).collect();
    sites.sort();
    sites.dedup();

    let mut rows = Vec::new();

    for site in sites {
        let series = site_series(readings, &site);

        // (slope/min, r², minutes) keyed by the date of the run's first point.
        let mut sections: Vec<(NaiveDate, f64, f64, f64)> = Vec::new();
        for run in runs_of(&series) {
            let (slope, r_squared, minutes) = fit_run(run);
            sections.push((run[0].timestamp.date_naive(), slope, r_squared, minutes));
        }

        let mut dates: Vec<NaiveDate> = sections.iter().map(|(d, ..)| *d).collect();
        dates.sort();
        dates.dedup();

        for date in dates {
            let day: Vec<_> = sections.iter().filter(|(d, ..)| *d == date).collect();
            let n = day.len() as f64;
            let avg_slope = day.iter().map(|(_, s, ..)| s).sum::<f64>() / n;
            let avg_r2 = day.iter().map(|(_, _, r, _)| r).sum::<f64>() / n;
            let minutes: f64 = day.iter().map(|(.., m)| m).sum();

            let day_readings: Vec<_> = series
                .iter()
                .filter(|r| r.timestamp.date_naive() == date)
                .collect();
            let start_level = day_readings.first().map_or(0.0, |r| r.level);
            let end_level = day_readings.last().map_or(0.0, |r| r.level);

            rows.push(DailyRate {
                site: site.clone(),
                date,
                avg_slope_per_min: avg_slope,
                avg_r_squared: avg_r2,
                run_count: day.len(),
                fill_minutes: minutes,
                start_level,
                end_level,
            });
        }
    }

    rows
}

/// Live brew rate in volume/hour, clamped non-negative.
///
/// Pools the points of all filling runs (length ≥ 2) inside the lookback
/// window and fits one line through them. Windows widen 24h → 48h → 72h →
/// 1 week → 2 weeks before giving up; a window with too few points falls
/// back to the most recent `MAX_SAMPLE_COUNT` readings. Exhausting every
/// window yields 0 with a log line naming what was tried.
pub fn brew_rate(series: &[Reading]) -> f64 {
    let Some(last) = series.last() else {
        return 0.0;
    };
    let site = &last.site;

    if series.len() < 2 {
        debug!(site = %site, points = series.len(), "insufficient readings for brew rate");
        return 0.0;
    }

    let last_ts = last.timestamp;

    for window_hours in LOOKBACK_WINDOWS_HOURS {
        let cutoff = last_ts - Duration::hours(window_hours);
        let mut recent: Vec<&Reading> = series.iter().filter(|r| r.timestamp >= cutoff).collect();

        if recent.len() < 2 {
            let take = series.len().min(MAX_SAMPLE_COUNT);
            recent = series[series.len() - take..].iter().collect();
        }
        if recent.len() < 2 {
            continue;
        }
        if recent.len() > MAX_SAMPLE_COUNT {
            recent = recent[recent.len() - MAX_SAMPLE_COUNT..].to_vec();
        }

        let origin = recent[0].timestamp;
        let owned: Vec<Reading> = recent.iter().map(|r| (*r).clone()).collect();
        let mut points: Vec<(f64, f64)> = Vec::new();
        for run in fill_runs(&owned) {
            for r in run {
                let hours = (r.timestamp - origin).num_seconds() as f64 / 3600.0;
                points.push((hours, r.level));
            }
        }

        if points.len() < 2 {
            debug!(
                site = %site,
                window_hours,
                filling_points = points.len(),
                "too few filling points, widening window"
            );
            continue;
        }

        let (slope, _) = ols_fit(&points);
        if slope > 0.0 {
            debug!(
                site = %site,
                window_hours,
                filling_points = points.len(),
                rate_lph = slope,
                "brew rate fitted"
            );
            return slope;
        }

        debug!(
            site = %site,
            window_hours,
            rate_lph = slope,
            "non-positive slope, widening window"
        );
    }

    warn!(
        site = %site,
        windows_tried = ?LOOKBACK_WINDOWS_HOURS,
        "no filling trend found in any lookback window"
    );
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series(site: &str, start_hour: u32, levels: &[f64]) -> Vec<Reading> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                Reading::new(
                    SiteId::cauldron(site),
                    Utc.with_ymd_and_hms(2025, 11, 1, start_hour, 0, 0).unwrap()
                        + Duration::minutes(10 * i as i64),
                    *level,
                )
            })
            .collect()
    }

    #[test]
    fn ols_recovers_exact_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0 + 2.5 * i as f64)).collect();
        let (slope, r2) = ols_fit(&points);
        assert!((slope - 2.5).abs() < 1e-12);
        assert!((r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ols_flat_series_is_zero_slope_perfect_fit() {
        let points: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, 7.0)).collect();
        let (slope, r2) = ols_fit(&points);
        assert_eq!(slope, 0.0);
        assert_eq!(r2, 1.0);
    }

    #[test]
    fn monotone_series_is_one_run() {
        let s = series("a", 0, &[1.0, 2.0, 2.0, 3.0, 5.0]);
        let runs = fill_runs(&s);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 5);
    }

    #[test]
    fn single_decrease_splits_into_two_runs() {
        let s = series("a", 0, &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        let runs = fill_runs(&s);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 3);
        assert_eq!(runs[1].len(), 3);
    }

    #[test]
    fn short_runs_are_discarded() {
        // Alternating up/down: every run is a single point.
        let s = series("a", 0, &[1.0, 2.0, 1.0, 2.0]);
        // Runs: [1,2], then [1,2] again; the decreases break them.
        let runs = fill_runs(&s);
        assert_eq!(runs.len(), 2);

        let s = series("a", 0, &[3.0, 2.0, 3.0, 1.0]);
        let runs = fill_runs(&s);
        // [3], [2,3], [1] -> only the middle survives.
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0][0].level, 2.0);
    }

    #[test]
    fn drain_runs_capture_decreases() {
        let s = series("a", 0, &[5.0, 4.0, 3.0, 6.0, 2.0]);
        let runs = drain_runs(&s);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 3);
        assert_eq!(runs[1].len(), 2);
    }

    #[test]
    fn daily_rates_aggregate_per_day() {
        // 10-minute cadence rising 1.0 per step: 0.1 L/min.
        let s = series("a", 0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let rows = daily_rates(&s);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.run_count, 1);
        assert!((row.avg_slope_per_min - 0.1).abs() < 1e-9);
        assert!((row.avg_r_squared - 1.0).abs() < 1e-9);
        assert_eq!(row.fill_minutes, 50.0);
        assert_eq!(row.start_level, 0.0);
        assert_eq!(row.end_level, 5.0);
    }

    #[test]
    fn daily_drain_rates_have_negative_slope() {
        let s = series("a", 0, &[10.0, 8.0, 6.0, 4.0]);
        let rows = daily_drain_rates(&s);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].avg_slope_per_min < 0.0);
    }

    #[test]
    fn brew_rate_from_steady_fill() {
        // 1 L per 10 minutes = 6 L/h.
        let s = series("a", 0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let rate = brew_rate(&s);
        assert!((rate - 6.0).abs() < 1e-6, "got {rate}");
    }

    #[test]
    fn brew_rate_zero_when_never_filling() {
        let s = series("a", 0, &[10.0, 9.0, 8.0, 7.0]);
        assert_eq!(brew_rate(&s), 0.0);
    }

    #[test]
    fn brew_rate_zero_on_single_point() {
        let s = series("a", 0, &[10.0]);
        assert_eq!(brew_rate(&s), 0.0);
    }

    #[test]
    fn brew_rate_ignores_drain_segments() {
        // Fill at 6 L/h, one collection in the middle, fill again.
        let s = series("a", 0, &[0.0, 1.0, 2.0, 3.0, 0.5, 1.5, 2.5, 3.5]);
        let rate = brew_rate(&s);
        assert!(rate > 0.0);
    }
}
