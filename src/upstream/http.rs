//! HTTP client for the information service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::ReferenceProvider;
use crate::domain::audit::TransportTicket;
use crate::domain::{Cauldron, Courier, Market, NetworkEdge, Reading, SiteId};
use crate::error::UpstreamError;

/// One history row as the upstream serves it: a timestamp plus the level of
/// every cauldron at that instant.
#[derive(Debug, Deserialize)]
struct HistoryRow {
    timestamp: DateTime<Utc>,
    cauldron_levels: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct NetworkResponse {
    #[serde(default)]
    edges: Vec<NetworkEdge>,
}

#[derive(Debug, Deserialize)]
struct TicketsResponse {
    #[serde(default)]
    transport_tickets: Vec<TransportTicket>,
}

/// Reqwest-backed provider for the information service endpoints.
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

impl HttpProvider {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "fetching upstream data");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| UpstreamError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ReferenceProvider for HttpProvider {
    async fn cauldrons(&self) -> Result<Vec<Cauldron>, UpstreamError> {
        self.get_json("Information/cauldrons").await
    }

    async fn couriers(&self) -> Result<Vec<Courier>, UpstreamError> {
        self.get_json("Information/couriers").await
    }

    async fn market(&self) -> Result<Option<Market>, UpstreamError> {
        let market: Market = self.get_json("Information/market").await?;
        Ok(Some(market))
    }

    async fn network(&self) -> Result<Vec<NetworkEdge>, UpstreamError> {
        let response: NetworkResponse = self.get_json("Information/network").await?;
        Ok(response.edges)
    }

    async fn history(&self) -> Result<Vec<Reading>, UpstreamError> {
        let rows: Vec<HistoryRow> = self.get_json("Data").await?;

        let mut readings = Vec::new();
        for row in rows {
            for (id, level) in row.cauldron_levels {
                readings.push(Reading::new(SiteId::cauldron(id), row.timestamp, level));
            }
        }
        readings.sort_by_key(|r| r.timestamp);

        debug!(count = readings.len(), "history flattened");
        Ok(readings)
    }

    async fn tickets(&self) -> Result<Vec<TransportTicket>, UpstreamError> {
        let response: TicketsResponse = self.get_json("Tickets").await?;
        Ok(response.transport_tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_row_deserializes_upstream_shape() {
        let raw = r#"{
            "timestamp": "2025-11-01T10:00:00Z",
            "cauldron_levels": {"c1": 42.5, "c2": 10.0}
        }"#;
        let row: HistoryRow = serde_json::from_str(raw).unwrap();
        assert_eq!(row.cauldron_levels.len(), 2);
        assert_eq!(row.cauldron_levels["c1"], 42.5);
    }

    #[test]
    fn network_response_defaults_to_no_edges() {
        let response: NetworkResponse = serde_json::from_str("{}").unwrap();
        assert!(response.edges.is_empty());
    }
}
