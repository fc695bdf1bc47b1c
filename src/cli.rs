//! Command-line entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};
use tracing::info;

use crate::app::{App, AppState};
use crate::config::Config;
use crate::domain::{Forecast, SchedulePlan};
use crate::error::Error;
use crate::upstream::HttpProvider;

#[derive(Parser)]
#[command(name = "brewflow", version, about = "Cauldron overflow forecasting and courier scheduling")]
pub struct Cli {
    /// Path to the TOML config; defaults apply when the file is absent.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the telemetry listener and background recomputation until interrupted.
    Serve,
    /// Print the pickup schedule for a date (default: today).
    Schedule {
        #[arg(long)]
        date: Option<String>,
    },
    /// Print forecasts for all cauldrons.
    Forecast,
    /// Print the fill-rate row for one cauldron and date.
    Rates { cauldron: String, date: String },
    /// Print the drain-rate row for one cauldron and date.
    Drain { cauldron: String, date: String },
    /// Cross-check transport tickets against estimated generation.
    Audit,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    config.init_logging();

    match cli.command {
        Command::Serve => {
            info!("brewflow starting");
            App::run(config).await?;
            info!("brewflow stopped");
        }
        Command::Schedule { date } => {
            let date = match date {
                Some(raw) => parse_date(&raw)?,
                None => Utc::now().date_naive(),
            };
            let plan = one_shot_state(config).schedule_for(date).await;
            print_schedule(&plan);
        }
        Command::Forecast => {
            let forecasts = one_shot_state(config).forecasts().await;
            print_forecasts(&forecasts);
        }
        Command::Rates { cauldron, date } => {
            let date = parse_date(&date)?;
            match one_shot_state(config).rate_for(&cauldron, date).await {
                Some(row) => println!("{}", Table::new([RateRow::from(&row)])),
                None => println!("No fill-rate data for {cauldron} on {date}"),
            }
        }
        Command::Drain { cauldron, date } => {
            let date = parse_date(&date)?;
            match one_shot_state(config).drain_rate_for(&cauldron, date).await {
                Some(row) => println!("{}", Table::new([RateRow::from(&row)])),
                None => println!("No drain-rate data for {cauldron} on {date}"),
            }
        }
        Command::Audit => {
            let discrepancies = one_shot_state(config).audit().await;
            if discrepancies.is_empty() {
                println!("No auditable (site, day) pairs");
            } else {
                let rows: Vec<AuditRow> = discrepancies.iter().map(AuditRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        Ok(Config::default())
    }
}

fn one_shot_state(config: Config) -> Arc<AppState> {
    let provider = Arc::new(HttpProvider::new(config.upstream.api_url.clone()));
    Arc::new(AppState::new(config, provider))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        Error::InvalidDate {
            input: raw.to_string(),
        }
        .into()
    })
}

#[derive(Tabled)]
struct AssignmentRow {
    #[tabled(rename = "courier")]
    courier: String,
    #[tabled(rename = "stops")]
    stops: String,
    #[tabled(rename = "start")]
    start: String,
    #[tabled(rename = "end")]
    end: String,
    #[tabled(rename = "volume (L)")]
    volume: String,
    #[tabled(rename = "travel (min)")]
    travel: String,
    #[tabled(rename = "distance (km)")]
    distance: String,
}

fn print_schedule(plan: &SchedulePlan) {
    println!(
        "Schedule for {}: {} courier(s), {} unassigned, {:.1} km total",
        plan.date, plan.couriers_needed, plan.unassigned, plan.total_distance_km
    );

    if plan.assignments.is_empty() {
        return;
    }

    let rows: Vec<AssignmentRow> = plan
        .assignments
        .iter()
        .map(|a| AssignmentRow {
            courier: a.courier_name.clone(),
            stops: a
                .sites_visited
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            start: a.start.format("%H:%M").to_string(),
            end: a.end.format("%H:%M").to_string(),
            volume: format!("{:.1}", a.volume_collected),
            travel: format!("{:.0}", a.travel_time_minutes),
            distance: format!("{:.1}", a.distance_km),
        })
        .collect();

    println!("{}", Table::new(rows));
}

#[derive(Tabled)]
struct ForecastRow {
    #[tabled(rename = "cauldron")]
    cauldron: String,
    #[tabled(rename = "level")]
    level: String,
    #[tabled(rename = "rate (L/h)")]
    rate: String,
    #[tabled(rename = "threshold at")]
    threshold_at: String,
    #[tabled(rename = "full at")]
    full_at: String,
    #[tabled(rename = "at risk")]
    at_risk: String,
}

fn print_forecasts(forecasts: &[Forecast]) {
    if forecasts.is_empty() {
        println!("No cauldron data available");
        return;
    }

    let rows: Vec<ForecastRow> = forecasts
        .iter()
        .map(|f| ForecastRow {
            cauldron: f.site.to_string(),
            level: format!(
                "{:.1}/{:.0} ({:.1}%)",
                f.current_level, f.max_volume, f.current_percentage
            ),
            rate: format!("{:.2}", f.brew_rate_lph),
            threshold_at: f
                .time_to_threshold
                .map_or_else(|| "-".into(), |t| t.format("%m-%d %H:%M").to_string()),
            full_at: f
                .time_to_full
                .map_or_else(|| "-".into(), |t| t.format("%m-%d %H:%M").to_string()),
            at_risk: if f.at_risk { "yes" } else { "no" }.into(),
        })
        .collect();

    println!("{}", Table::new(rows));
}

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "slope (L/min)")]
    slope: String,
    #[tabled(rename = "R²")]
    r_squared: String,
    #[tabled(rename = "runs")]
    runs: usize,
    #[tabled(rename = "fill (min)")]
    fill_minutes: String,
    #[tabled(rename = "start level")]
    start: String,
    #[tabled(rename = "end level")]
    end: String,
}

impl From<&crate::domain::DailyRate> for RateRow {
    fn from(row: &crate::domain::DailyRate) -> Self {
        Self {
            date: row.date.to_string(),
            slope: format!("{:.4}", row.avg_slope_per_min),
            r_squared: format!("{:.3}", row.avg_r_squared),
            runs: row.run_count,
            fill_minutes: format!("{:.0}", row.fill_minutes),
            start: format!("{:.1}", row.start_level),
            end: format!("{:.1}", row.end_level),
        }
    }
}

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "cauldron")]
    cauldron: String,
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "expected end")]
    expected: String,
    #[tabled(rename = "observed end")]
    observed: String,
    #[tabled(rename = "discrepancy")]
    discrepancy: String,
}

impl From<&crate::domain::audit::CollectionDiscrepancy> for AuditRow {
    fn from(d: &crate::domain::audit::CollectionDiscrepancy) -> Self {
        Self {
            cauldron: d.site.to_string(),
            date: d.date.to_string(),
            expected: format!("{:.1}", d.expected_end_level),
            observed: format!("{:.1}", d.observed_end_level),
            discrepancy: format!("{:+.1}", d.discrepancy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(
            parse_date("2025-11-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
        );
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2025-13-40").is_err());
    }
}
