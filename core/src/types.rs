//! Domain enums shared by every connector.
//!
//! Backends spell these values as lowercase strings. Keeping one definition
//! per concept means a filter built for one connector parses identically in
//! another.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of entity a financial search can return or be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Company,
    Instrument,
    Index,
    Currency,
    Person,
}

/// Market segment a listing trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Stock,
    Bond,
    Fund,
    Etf,
    Index,
    Forex,
    Crypto,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Company,
        EntityType::Instrument,
        EntityType::Index,
        EntityType::Currency,
        EntityType::Person,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Instrument => "instrument",
            EntityType::Index => "index",
            EntityType::Currency => "currency",
            EntityType::Person => "person",
        }
    }
}

impl MarketType {
    pub const ALL: [MarketType; 7] = [
        MarketType::Stock,
        MarketType::Bond,
        MarketType::Fund,
        MarketType::Etf,
        MarketType::Index,
        MarketType::Forex,
        MarketType::Crypto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketType::Stock => "stock",
            MarketType::Bond => "bond",
            MarketType::Fund => "fund",
            MarketType::Etf => "etf",
            MarketType::Index => "index",
            MarketType::Forex => "forex",
            MarketType::Crypto => "crypto",
        }
    }
}

/// Error returned when a string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub concept: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} {:?}", self.concept, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for EntityType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                concept: "entity type",
                value: s.to_string(),
            })
    }
}

impl FromStr for MarketType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketType::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                concept: "market type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
