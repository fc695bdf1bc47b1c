//! Daily pickup scheduling: classify cauldrons by urgency, pack them into
//! capacity-bounded courier trips, and report what could not be assigned.
//!
//! The packing is intentionally greedy first-fit in urgency order, not
//! optimal. The observable contract is that unfit needs are reported as
//! unassigned, never silently dropped.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::forecast::Forecast;
use super::graph::SiteGraph;
use super::ids::SiteId;
use super::rate::RATE_EPSILON;
use super::route::{optimize_route, plan_courier_route};
use super::site::{Courier, ReferenceData};
use crate::config::{ForecastConfig, SchedulingConfig};

/// A scheduling-time record stating one site requires a visit. Ephemeral,
/// rebuilt on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupNeed {
    pub site: SiteId,
    /// Hours until the threshold crossing; negative when already past.
    pub urgency_hours: f64,
    pub volume_to_collect: f64,
    pub deadline: DateTime<Utc>,
    pub current_level: f64,
    pub max_volume: f64,
}

/// One courier's planned trip for the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub courier_id: String,
    pub courier_name: String,
    /// Full stop sequence, market to market.
    pub route: Vec<SiteId>,
    pub sites_visited: Vec<SiteId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub travel_time_minutes: f64,
    /// Travel plus fixed per-stop dwell.
    pub total_time_minutes: f64,
    pub volume_collected: f64,
    pub distance_km: f64,
}

/// The externally visible output of a scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulePlan {
    pub date: NaiveDate,
    pub couriers_needed: usize,
    pub assignments: Vec<Assignment>,
    pub unassigned: usize,
    pub total_distance_km: f64,
}

impl SchedulePlan {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            couriers_needed: 0,
            assignments: Vec::new(),
            unassigned: 0,
            total_distance_km: 0.0,
        }
    }
}

/// Which cauldrons need a pickup inside the scheduling window, sorted most
/// urgent first.
///
/// A cauldron qualifies when its level already sits at the threshold or its
/// projected crossing falls within the window. Volume to collect is capped
/// at the threshold fraction of capacity.
pub fn identify_pickup_needs(
    forecasts: &[Forecast],
    now: DateTime<Utc>,
    threshold: f64,
    window_hours: f64,
) -> Vec<PickupNeed> {
    let cutoff = now + hours(window_hours);
    let mut needs = Vec::new();

    for forecast in forecasts {
        if forecast.max_volume <= 0.0 {
            continue;
        }

        let threshold_volume = threshold * forecast.max_volume;
        let at_threshold = forecast.current_level >= threshold_volume;
        let crossing_in_window = forecast
            .time_to_threshold
            .is_some_and(|t| t <= cutoff);

        if !at_threshold && !crossing_in_window {
            continue;
        }

        let urgency_hours = if forecast.brew_rate_lph > RATE_EPSILON {
            (threshold_volume - forecast.current_level) / forecast.brew_rate_lph
        } else {
            0.0
        };

        let deadline = now + hours(urgency_hours.max(0.0));
        let projected = forecast.current_level + forecast.brew_rate_lph * urgency_hours.max(0.0);
        let volume_to_collect = projected.min(threshold_volume);

        needs.push(PickupNeed {
            site: forecast.site.clone(),
            urgency_hours,
            volume_to_collect,
            deadline,
            current_level: forecast.current_level,
            max_volume: forecast.max_volume,
        });
    }

    needs.sort_by(|a, b| a.urgency_hours.total_cmp(&b.urgency_hours));
    needs
}

/// Split any need too large for the biggest courier into fractional needs
/// sharing the deadline. The fractions are tuned policy, configured rather
/// than hard-coded.
fn split_oversized(needs: Vec<PickupNeed>, max_capacity: f64, fractions: &[f64]) -> Vec<PickupNeed> {
    if fractions.is_empty() {
        return needs;
    }

    let mut out = Vec::with_capacity(needs.len());
    for need in needs {
        if need.volume_to_collect > max_capacity {
            debug!(
                site = %need.site,
                volume = need.volume_to_collect,
                max_capacity,
                "splitting oversized pickup"
            );
            for fraction in fractions {
                let mut part = need.clone();
                part.volume_to_collect = need.volume_to_collect * fraction;
                out.push(part);
            }
        } else {
            out.push(need);
        }
    }
    out.sort_by(|a, b| a.urgency_hours.total_cmp(&b.urgency_hours));
    out
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0) as i64)
}

fn trip_start(date: NaiveDate, now: DateTime<Utc>, day_start_hour: u32) -> DateTime<Utc> {
    let scheduled = date
        .and_hms_opt(day_start_hour, 0, 0)
        .expect("validated day_start_hour")
        .and_utc();
    if now > scheduled {
        now
    } else {
        scheduled
    }
}

/// Build the day's plan. Stateless: every invocation recomputes from the
/// reference data and forecasts it is handed.
///
/// Missing cauldron or market reference data degrades to an explicitly
/// empty plan; an upstream outage must never crash the caller.
pub fn build_schedule(
    date: NaiveDate,
    now: DateTime<Utc>,
    reference: &ReferenceData,
    forecasts: &[Forecast],
    forecast_cfg: &ForecastConfig,
    cfg: &SchedulingConfig,
) -> SchedulePlan {
    let Some(market) = reference.market.as_ref() else {
        warn!("no market reference data, returning empty plan");
        return SchedulePlan::empty(date);
    };
    if reference.cauldrons.is_empty() {
        warn!("no cauldron reference data, returning empty plan");
        return SchedulePlan::empty(date);
    }

    let graph = SiteGraph::build(&reference.network, &reference.cauldrons, market);

    let needs = identify_pickup_needs(forecasts, now, forecast_cfg.threshold, cfg.window_hours);
    if needs.is_empty() {
        return SchedulePlan::empty(date);
    }

    let mut couriers: Vec<Courier> = reference.couriers.clone();
    if couriers.is_empty() {
        // Courier feed absent: assume a fleet of default-capacity couriers,
        // one per need at most.
        info!(
            capacity = cfg.default_courier_capacity,
            "courier feed empty, assuming default-capacity fleet"
        );
        couriers = (1..=needs.len())
            .map(|i| Courier {
                id: format!("courier-{i}"),
                name: String::new(),
                capacity: cfg.default_courier_capacity,
            })
            .collect();
    }
    couriers.sort_by(|a, b| b.capacity.total_cmp(&a.capacity));

    let max_capacity = couriers[0].capacity;
    let mut remaining = split_oversized(needs, max_capacity, &cfg.split_fractions);

    let mut trips: Vec<(Assignment, f64)> = Vec::new();

    for courier in &couriers {
        if remaining.is_empty() {
            break;
        }

        // Needs taken in urgency order until one would overflow capacity;
        // no reordering for tighter packing. A split site may appear in
        // several needs but never twice on one trip.
        let mut selected_idx = Vec::new();
        let mut total_volume = 0.0;
        for (i, need) in remaining.iter().enumerate() {
            let already = selected_idx
                .iter()
                .any(|&j: &usize| remaining[j].site == need.site);
            if already {
                continue;
            }
            if total_volume + need.volume_to_collect > courier.capacity {
                break;
            }
            selected_idx.push(i);
            total_volume += need.volume_to_collect;
        }

        if selected_idx.is_empty() {
            continue;
        }

        let candidates: Vec<SiteId> = selected_idx
            .iter()
            .map(|&i| remaining[i].site.clone())
            .collect();
        let volumes: HashMap<SiteId, f64> = selected_idx
            .iter()
            .map(|&i| (remaining[i].site.clone(), remaining[i].volume_to_collect))
            .collect();

        let (route, accepted, collected) = plan_courier_route(
            &graph,
            &candidates,
            courier.capacity,
            &volumes,
            cfg.fallback_speed_kmh,
        );

        let dwell = accepted.len() as f64 * cfg.dwell_minutes;
        let total_minutes = route.travel_minutes + dwell;
        let start = trip_start(date, now, cfg.day_start_hour);
        let end = start + Duration::milliseconds((total_minutes * 60_000.0) as i64);

        debug!(
            courier = %courier.id,
            stops = accepted.len(),
            volume = collected,
            travel_minutes = route.travel_minutes,
            "trip packed"
        );

        trips.push((
            Assignment {
                courier_id: courier.id.clone(),
                courier_name: courier.display_name().to_string(),
                route: route.stops,
                sites_visited: accepted.clone(),
                start,
                end,
                travel_time_minutes: route.travel_minutes,
                total_time_minutes: total_minutes,
                volume_collected: collected,
                distance_km: route.distance_km,
            },
            courier.capacity,
        ));

        // Remove exactly the packed need instances, highest index first.
        let mut packed: Vec<usize> = selected_idx
            .into_iter()
            .filter(|&i| accepted.contains(&remaining[i].site))
            .collect();
        packed.sort_unstable_by(|a, b| b.cmp(a));
        for i in packed {
            remaining.remove(i);
        }
    }

    piggyback_remaining(&mut trips, &mut remaining, &graph, cfg);

    let assignments: Vec<Assignment> = trips.into_iter().map(|(a, _)| a).collect();
    let total_distance_km = assignments.iter().map(|a| a.distance_km).sum();

    SchedulePlan {
        date,
        couriers_needed: assignments.len(),
        assignments,
        unassigned: remaining.len(),
        total_distance_km,
    }
}

/// Second pass: fold still-unassigned needs into an existing trip with
/// spare capacity instead of leaving them behind, re-optimizing that trip's
/// route on each addition.
fn piggyback_remaining(
    trips: &mut [(Assignment, f64)],
    remaining: &mut Vec<PickupNeed>,
    graph: &SiteGraph,
    cfg: &SchedulingConfig,
) {
    remaining.retain(|need| {
        let slot = trips.iter_mut().find(|(assignment, capacity)| {
            assignment.volume_collected + need.volume_to_collect <= *capacity
                && !assignment.sites_visited.contains(&need.site)
        });

        let Some((assignment, _)) = slot else {
            return true;
        };

        assignment.sites_visited.push(need.site.clone());
        let route = optimize_route(
            graph,
            &assignment.sites_visited,
            &SiteId::Market,
            &SiteId::Market,
            cfg.fallback_speed_kmh,
        );

        let dwell = assignment.sites_visited.len() as f64 * cfg.dwell_minutes;
        assignment.route = route.stops;
        assignment.travel_time_minutes = route.travel_minutes;
        assignment.total_time_minutes = route.travel_minutes + dwell;
        assignment.end = assignment.start
            + Duration::milliseconds((assignment.total_time_minutes * 60_000.0) as i64);
        assignment.volume_collected += need.volume_to_collect;
        assignment.distance_km = route.distance_km;

        info!(
            site = %need.site,
            courier = %assignment.courier_id,
            "piggybacked unassigned pickup onto existing trip"
        );
        false
    });
}
