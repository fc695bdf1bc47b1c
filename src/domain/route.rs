//! Route optimization: nearest-neighbor ordering over Dijkstra legs, with a
//! capacity-aware wrapper for courier trips.

use std::collections::HashMap;

use tracing::warn;

use super::graph::SiteGraph;
use super::ids::SiteId;

/// An ordered route with its accumulated cost. Cost covers traversed and
/// estimated legs only; stranded sites are appended uncosted.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub stops: Vec<SiteId>,
    pub travel_minutes: f64,
    pub distance_km: f64,
    /// Legs costed by the straight-line fallback rather than a graph path.
    pub estimated_legs: usize,
    /// Sites with neither a path nor coordinates; visited order is
    /// undefined and their legs carry no cost.
    pub stranded: Vec<SiteId>,
}

impl Route {
    fn single(stop: SiteId) -> Self {
        Self {
            stops: vec![stop],
            travel_minutes: 0.0,
            distance_km: 0.0,
            estimated_legs: 0,
            stranded: Vec::new(),
        }
    }

    /// Splice a leg onto the route, eliding the repeated current node.
    fn extend_with(&mut self, leg: &[SiteId], minutes: f64, km: f64) {
        if leg.len() > 1 {
            self.stops.extend_from_slice(&leg[1..]);
        }
        self.travel_minutes += minutes;
        self.distance_km += km;
    }
}

/// One candidate leg out of the current position.
enum Leg {
    Path(Vec<SiteId>, f64, f64),
    Estimated(f64, f64),
}

fn best_leg(
    graph: &SiteGraph,
    from: &SiteId,
    to: &SiteId,
    fallback_speed_kmh: f64,
) -> Option<(Leg, f64)> {
    let result = graph.shortest_path(from, to);
    if result.is_reachable() {
        let minutes = result.travel_minutes;
        return Some((Leg::Path(result.path, minutes, result.distance_km), minutes));
    }
    graph
        .estimate_leg(from, to, fallback_speed_kmh)
        .map(|(minutes, km)| (Leg::Estimated(minutes, km), minutes))
}

/// Order the must-visit set with the nearest-neighbor heuristic, each leg
/// resolved by shortest path (or the straight-line fallback when the graph
/// has no path).
///
/// The route always begins at `start` and ends at `end` (a single stop when
/// they coincide and nothing is visited). Every requested site appears
/// exactly once, except sites that are permanently unreachable — those are
/// appended without a costed leg and flagged rather than failing the whole
/// optimization.
pub fn optimize_route(
    graph: &SiteGraph,
    must_visit: &[SiteId],
    start: &SiteId,
    end: &SiteId,
    fallback_speed_kmh: f64,
) -> Route {
    if must_visit.is_empty() {
        if start == end {
            return Route::single(start.clone());
        }
        let mut route = Route::single(start.clone());
        match best_leg(graph, start, end, fallback_speed_kmh) {
            Some((Leg::Path(path, minutes, km), _)) => route.extend_with(&path, minutes, km),
            Some((Leg::Estimated(minutes, km), _)) => {
                route.estimated_legs += 1;
                route.extend_with(&[start.clone(), end.clone()], minutes, km);
            }
            None => route.stops.push(end.clone()),
        }
        return route;
    }

    let mut route = Route::single(start.clone());
    let mut unvisited: Vec<SiteId> = must_visit.to_vec();
    let mut current = start.clone();

    while !unvisited.is_empty() {
        let mut nearest: Option<(usize, Leg)> = None;
        let mut nearest_minutes = f64::INFINITY;

        for (i, site) in unvisited.iter().enumerate() {
            if let Some((leg, minutes)) = best_leg(graph, &current, site, fallback_speed_kmh) {
                if minutes < nearest_minutes {
                    nearest_minutes = minutes;
                    nearest = Some((i, leg));
                }
            }
        }

        let Some((index, leg)) = nearest else {
            // Nothing left is reachable or estimable: append the remainder
            // uncosted instead of aborting the optimization.
            warn!(sites = ?unvisited, "unroutable sites appended without cost");
            for site in unvisited.drain(..) {
                route.stops.push(site.clone());
                route.stranded.push(site);
            }
            break;
        };

        let site = unvisited.remove(index);
        match leg {
            Leg::Path(path, minutes, km) => route.extend_with(&path, minutes, km),
            Leg::Estimated(minutes, km) => {
                route.estimated_legs += 1;
                route.extend_with(&[current.clone(), site.clone()], minutes, km);
            }
        }
        current = site;
    }

    if &current != end {
        match best_leg(graph, &current, end, fallback_speed_kmh) {
            Some((Leg::Path(path, minutes, km), _)) => route.extend_with(&path, minutes, km),
            Some((Leg::Estimated(minutes, km), _)) => {
                route.estimated_legs += 1;
                route.extend_with(&[current, end.clone()], minutes, km);
            }
            None => route.stops.push(end.clone()),
        }
    }

    route
}

/// Capacity-aware trip planning for one courier.
///
/// Candidates are accepted greedily in input order while the running volume
/// stays within capacity; the first site that would overflow stops the scan
/// (no reordering for tighter packing). Ordering of the accepted set is then
/// delegated to [`optimize_route`]. Returns the route, the accepted sites,
/// and the volume collected.
pub fn plan_courier_route(
    graph: &SiteGraph,
    candidates: &[SiteId],
    capacity: f64,
    volumes: &HashMap<SiteId, f64>,
    fallback_speed_kmh: f64,
) -> (Route, Vec<SiteId>, f64) {
    let mut accepted = Vec::new();
    let mut collected = 0.0;

    for site in candidates {
        let volume = volumes.get(site).copied().unwrap_or(0.0);
        if collected + volume <= capacity {
            accepted.push(site.clone());
            collected += volume;
        } else {
            break;
        }
    }

    let route = optimize_route(
        graph,
        &accepted,
        &SiteId::Market,
        &SiteId::Market,
        fallback_speed_kmh,
    );

    (route, accepted, collected)
}
