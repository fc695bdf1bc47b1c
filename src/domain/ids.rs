//! Site identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identity of a node in the routing graph: the single market depot or a
/// cauldron keyed by its upstream id.
///
/// Serialized as a plain string; `"market"` is reserved for the depot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteId {
    Market,
    Cauldron(String),
}

impl SiteId {
    pub fn cauldron(id: impl Into<String>) -> Self {
        Self::Cauldron(id.into())
    }

    pub fn is_market(&self) -> bool {
        matches!(self, Self::Market)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Market => "market",
            Self::Cauldron(id) => id,
        }
    }
}

impl From<&str> for SiteId {
    fn from(raw: &str) -> Self {
        if raw == "market" {
            Self::Market
        } else {
            Self::Cauldron(raw.to_string())
        }
    }
}

impl From<String> for SiteId {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SiteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SiteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_string_round_trips() {
        assert_eq!(SiteId::from("market"), SiteId::Market);
        assert_eq!(SiteId::Market.as_str(), "market");
    }

    #[test]
    fn cauldron_keeps_raw_id() {
        let id = SiteId::from("cauldron-7");
        assert_eq!(id, SiteId::cauldron("cauldron-7"));
        assert_eq!(id.to_string(), "cauldron-7");
    }
}
