//! Weighted site graph and shortest-path queries.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::ids::SiteId;
use super::site::{Cauldron, Market, NetworkEdge};

/// Mean Earth radius, km.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Node attributes: coordinates, plus the capacity ceiling for cauldrons.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub max_volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeWeight {
    travel_minutes: f64,
    distance_km: f64,
}

/// Result of a shortest-path query. An unreachable pair is a value, not an
/// error: infinite cost and an empty path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub path: Vec<SiteId>,
    pub travel_minutes: f64,
    pub distance_km: f64,
}

impl PathResult {
    pub fn unreachable() -> Self {
        Self {
            path: Vec::new(),
            travel_minutes: f64::INFINITY,
            distance_km: f64::INFINITY,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.travel_minutes.is_finite() && !self.path.is_empty()
    }
}

/// Directed weighted graph over sites, keyed by travel-time minutes with a
/// companion distance in km.
#[derive(Debug, Clone, Default)]
pub struct SiteGraph {
    nodes: HashMap<SiteId, NodeInfo>,
    adjacency: HashMap<SiteId, Vec<(SiteId, EdgeWeight)>>,
}

impl SiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the routing graph from reference data. The feed's edges are
    /// undirected, so both directions are inserted; a missing feed distance
    /// falls back to the haversine distance between the endpoints.
    pub fn build(edges: &[NetworkEdge], cauldrons: &[Cauldron], market: &Market) -> Self {
        let mut graph = Self::new();

        graph.add_node(
            SiteId::Market,
            NodeInfo {
                latitude: market.latitude,
                longitude: market.longitude,
                max_volume: None,
            },
        );

        for cauldron in cauldrons {
            graph.add_node(
                SiteId::cauldron(&cauldron.id),
                NodeInfo {
                    latitude: cauldron.latitude,
                    longitude: cauldron.longitude,
                    max_volume: Some(cauldron.max_volume),
                },
            );
        }

        for edge in edges {
            graph.add_edge(
                edge.from_site.clone(),
                edge.to_site.clone(),
                edge.travel_time_minutes,
                edge.distance_km,
            );
            graph.add_edge(
                edge.to_site.clone(),
                edge.from_site.clone(),
                edge.travel_time_minutes,
                edge.distance_km,
            );
        }

        graph
    }

    pub fn add_node(&mut self, id: SiteId, info: NodeInfo) {
        self.nodes.insert(id, info);
    }

    pub fn add_edge(
        &mut self,
        from: SiteId,
        to: SiteId,
        travel_minutes: f64,
        distance_km: Option<f64>,
    ) {
        let distance_km = distance_km.unwrap_or_else(|| {
            match (self.nodes.get(&from), self.nodes.get(&to)) {
                (Some(a), Some(b)) => {
                    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
                }
                _ => 0.0,
            }
        });

        self.adjacency.entry(from).or_default().push((
            to,
            EdgeWeight {
                travel_minutes,
                distance_km,
            },
        ));
    }

    pub fn contains(&self, id: &SiteId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &SiteId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    /// Dijkstra over non-negative travel-time weights. Missing endpoints or
    /// a disconnected pair yield `PathResult::unreachable()`; equal-cost
    /// ties go to whichever path the heap pops first.
    pub fn shortest_path(&self, from: &SiteId, to: &SiteId) -> PathResult {
        if !self.contains(from) || !self.contains(to) {
            return PathResult::unreachable();
        }
        if from == to {
            return PathResult {
                path: vec![from.clone()],
                travel_minutes: 0.0,
                distance_km: 0.0,
            };
        }

        let mut best: HashMap<SiteId, (f64, f64)> = HashMap::new();
        let mut prev: HashMap<SiteId, SiteId> = HashMap::new();
        let mut heap = BinaryHeap::new();

        best.insert(from.clone(), (0.0, 0.0));
        heap.push(HeapEntry {
            minutes: 0.0,
            distance_km: 0.0,
            node: from.clone(),
        });

        while let Some(entry) = heap.pop() {
            let (known_minutes, _) = best[&entry.node];
            if entry.minutes > known_minutes {
                continue; // stale heap entry
            }
            if &entry.node == to {
                break;
            }

            let Some(neighbors) = self.adjacency.get(&entry.node) else {
                continue;
            };
            for (next, weight) in neighbors {
                let minutes = entry.minutes + weight.travel_minutes;
                let distance = entry.distance_km + weight.distance_km;
                let improved = match best.get(next) {
                    Some((m, _)) => minutes < *m,
                    None => true,
                };
                if improved {
                    best.insert(next.clone(), (minutes, distance));
                    prev.insert(next.clone(), entry.node.clone());
                    heap.push(HeapEntry {
                        minutes,
                        distance_km: distance,
                        node: next.clone(),
                    });
                }
            }
        }

        let Some(&(minutes, distance)) = best.get(to) else {
            return PathResult::unreachable();
        };

        let mut path = vec![to.clone()];
        let mut cursor = to;
        while let Some(p) = prev.get(cursor) {
            path.push(p.clone());
            cursor = p;
        }
        path.reverse();

        if path.first() != Some(from) {
            return PathResult::unreachable();
        }

        PathResult {
            path,
            travel_minutes: minutes,
            distance_km: distance,
        }
    }

    /// Straight-line fallback leg at the given average speed, used when no
    /// graph path exists but both endpoints have coordinates. Keeps route
    /// cost additive over sparse graphs.
    pub fn estimate_leg(
        &self,
        from: &SiteId,
        to: &SiteId,
        speed_kmh: f64,
    ) -> Option<(f64, f64)> {
        let a = self.nodes.get(from)?;
        let b = self.nodes.get(to)?;
        let km = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude);
        let minutes = km / speed_kmh * 60.0;
        Some((minutes, km))
    }
}

#[derive(Debug, Clone)]
struct HeapEntry {
    minutes: f64,
    distance_km: f64,
    node: SiteId,
}

// Min-heap on travel minutes. Travel times are ≥ 0 by domain construction,
// so total_cmp never sees a NaN from edge relaxation.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .minutes
            .total_cmp(&self.minutes)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(lat: f64, lon: f64) -> NodeInfo {
        NodeInfo {
            latitude: lat,
            longitude: lon,
            max_volume: None,
        }
    }

    fn line_graph() -> SiteGraph {
        // market - a - b, plus a slow direct market-b edge.
        let mut g = SiteGraph::new();
        g.add_node(SiteId::Market, node(0.0, 0.0));
        g.add_node(SiteId::cauldron("a"), node(0.0, 0.1));
        g.add_node(SiteId::cauldron("b"), node(0.0, 0.2));
        for (from, to, minutes) in [
            (SiteId::Market, SiteId::cauldron("a"), 10.0),
            (SiteId::cauldron("a"), SiteId::Market, 10.0),
            (SiteId::cauldron("a"), SiteId::cauldron("b"), 10.0),
            (SiteId::cauldron("b"), SiteId::cauldron("a"), 10.0),
            (SiteId::Market, SiteId::cauldron("b"), 50.0),
            (SiteId::cauldron("b"), SiteId::Market, 50.0),
        ] {
            g.add_edge(from, to, minutes, Some(minutes));
        }
        g
    }

    #[test]
    fn shortest_path_prefers_cheap_detour() {
        let g = line_graph();
        let result = g.shortest_path(&SiteId::Market, &SiteId::cauldron("b"));
        assert!(result.is_reachable());
        assert_eq!(result.travel_minutes, 20.0);
        assert_eq!(
            result.path,
            vec![SiteId::Market, SiteId::cauldron("a"), SiteId::cauldron("b")]
        );
    }

    #[test]
    fn shortest_path_is_symmetric_on_bidirectional_graph() {
        let g = line_graph();
        let there = g.shortest_path(&SiteId::Market, &SiteId::cauldron("b"));
        let back = g.shortest_path(&SiteId::cauldron("b"), &SiteId::Market);
        assert_eq!(there.travel_minutes, back.travel_minutes);
        assert_eq!(there.distance_km, back.distance_km);
    }

    #[test]
    fn missing_node_is_unreachable_not_error() {
        let g = line_graph();
        let result = g.shortest_path(&SiteId::Market, &SiteId::cauldron("ghost"));
        assert!(!result.is_reachable());
        assert!(result.travel_minutes.is_infinite());
        assert!(result.path.is_empty());
    }

    #[test]
    fn disconnected_node_is_unreachable() {
        let mut g = line_graph();
        g.add_node(SiteId::cauldron("island"), node(1.0, 1.0));
        let result = g.shortest_path(&SiteId::Market, &SiteId::cauldron("island"));
        assert!(!result.is_reachable());
    }

    #[test]
    fn same_start_and_end_is_trivial_path() {
        let g = line_graph();
        let result = g.shortest_path(&SiteId::Market, &SiteId::Market);
        assert_eq!(result.path, vec![SiteId::Market]);
        assert_eq!(result.travel_minutes, 0.0);
    }

    #[test]
    fn build_inserts_both_directions() {
        let market = Market {
            latitude: 0.0,
            longitude: 0.0,
        };
        let cauldrons = vec![Cauldron {
            id: "c1".into(),
            latitude: 0.0,
            longitude: 0.5,
            max_volume: 100.0,
        }];
        let edges = vec![NetworkEdge {
            from_site: SiteId::Market,
            to_site: SiteId::cauldron("c1"),
            travel_time_minutes: 7.0,
            distance_km: None,
        }];

        let g = SiteGraph::build(&edges, &cauldrons, &market);
        let there = g.shortest_path(&SiteId::Market, &SiteId::cauldron("c1"));
        let back = g.shortest_path(&SiteId::cauldron("c1"), &SiteId::Market);
        assert_eq!(there.travel_minutes, 7.0);
        assert_eq!(back.travel_minutes, 7.0);
        // Distance defaulted from coordinates, ~55.6 km along the equator.
        assert!((there.distance_km - 55.6).abs() < 1.0);
    }

    #[test]
    fn haversine_equator_degree() {
        let km = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((km - 111.19).abs() < 0.5, "got {km}");
    }

    #[test]
    fn estimate_leg_uses_speed() {
        let g = line_graph();
        let (minutes, km) = g
            .estimate_leg(&SiteId::Market, &SiteId::cauldron("a"), 30.0)
            .unwrap();
        assert!((km - 11.12).abs() < 0.1);
        assert!((minutes - km * 2.0).abs() < 1e-9);
    }
}
