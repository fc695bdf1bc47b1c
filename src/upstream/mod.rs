//! Read-only upstream data: the information service (cauldrons, couriers,
//! market, network), the historical level series, and transport tickets.

mod http;

pub use http::HttpProvider;

use async_trait::async_trait;

use crate::domain::audit::TransportTicket;
use crate::domain::{Cauldron, Courier, Market, NetworkEdge, Reading};
use crate::error::UpstreamError;

/// Port to the external information service. Everything is a fetch; nothing
/// is ever written back.
#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    async fn cauldrons(&self) -> Result<Vec<Cauldron>, UpstreamError>;
    async fn couriers(&self) -> Result<Vec<Courier>, UpstreamError>;
    async fn market(&self) -> Result<Option<Market>, UpstreamError>;
    async fn network(&self) -> Result<Vec<NetworkEdge>, UpstreamError>;
    /// Time-ordered level readings across all sites.
    async fn history(&self) -> Result<Vec<Reading>, UpstreamError>;
    async fn tickets(&self) -> Result<Vec<TransportTicket>, UpstreamError>;
}

/// Fixed in-memory provider for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    pub cauldrons: Vec<Cauldron>,
    pub couriers: Vec<Courier>,
    pub market: Option<Market>,
    pub network: Vec<NetworkEdge>,
    pub readings: Vec<Reading>,
    pub tickets: Vec<TransportTicket>,
}

#[async_trait]
impl ReferenceProvider for StaticProvider {
    async fn cauldrons(&self) -> Result<Vec<Cauldron>, UpstreamError> {
        Ok(self.cauldrons.clone())
    }

    async fn couriers(&self) -> Result<Vec<Courier>, UpstreamError> {
        Ok(self.couriers.clone())
    }

    async fn market(&self) -> Result<Option<Market>, UpstreamError> {
        Ok(self.market)
    }

    async fn network(&self) -> Result<Vec<NetworkEdge>, UpstreamError> {
        Ok(self.network.clone())
    }

    async fn history(&self) -> Result<Vec<Reading>, UpstreamError> {
        Ok(self.readings.clone())
    }

    async fn tickets(&self) -> Result<Vec<TransportTicket>, UpstreamError> {
        Ok(self.tickets.clone())
    }
}
