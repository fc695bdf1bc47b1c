//! Domain logic: readings, rate estimation, forecasting, routing, and
//! scheduling. Everything here is a plain value computed on demand — shared
//! mutable state lives in the telemetry store and app caches, not in this
//! module.

pub mod audit;
pub mod forecast;
pub mod graph;
mod ids;
pub mod rate;
mod reading;
pub mod route;
pub mod schedule;
mod site;

pub use ids::SiteId;
pub use reading::{site_series, Reading};
pub use site::{Cauldron, Courier, Market, NetworkEdge, ReferenceData};

pub use forecast::{forecast_site, Forecast, ForecastPoint};
pub use graph::{haversine_km, PathResult, SiteGraph};
pub use rate::{brew_rate, daily_drain_rates, daily_rates, DailyRate};
pub use route::{optimize_route, plan_courier_route, Route};
pub use schedule::{build_schedule, identify_pickup_needs, Assignment, PickupNeed, SchedulePlan};
