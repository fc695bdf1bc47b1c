//! Read-only reference data: cauldrons, couriers, the market depot, and the
//! travel network. Typed at the boundary where upstream JSON is ingested so
//! untyped maps never reach the routing or scheduling logic.

use serde::{Deserialize, Serialize};

use super::ids::SiteId;

/// A monitored collection point with a capacity ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cauldron {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,
}

fn default_max_volume() -> f64 {
    1000.0
}

/// The single depot every route starts and ends at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub latitude: f64,
    pub longitude: f64,
}

/// A capacity-bounded mobile agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Courier {
    #[serde(alias = "courier_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "max_carrying_capacity", default = "default_capacity")]
    pub capacity: f64,
}

fn default_capacity() -> f64 {
    1000.0
}

impl Courier {
    /// Display name, falling back to the id when the feed omits one.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// One directed edge of the upstream travel network. The raw feed is
/// undirected; the graph builder inserts both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    #[serde(rename = "from")]
    pub from_site: SiteId,
    #[serde(rename = "to")]
    pub to_site: SiteId,
    pub travel_time_minutes: f64,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

/// Everything a scheduling run needs from the information service.
///
/// Absence of any piece is represented in-band (empty list, `None` market);
/// the scheduler degrades to an empty plan rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub cauldrons: Vec<Cauldron>,
    pub couriers: Vec<Courier>,
    pub market: Option<Market>,
    pub network: Vec<NetworkEdge>,
}
