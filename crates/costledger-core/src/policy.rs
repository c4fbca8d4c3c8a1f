//! Valuation policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Valuation policy decides which layers a depletion consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationPolicy {
    /// First In, First Out. Oldest layers are consumed first.
    #[default]
    Fifo,
    /// Last In, First Out. Newest layers are consumed first.
    Lifo,
    /// Every layer shrinks by the same fraction at the average cost.
    WeightedAverage,
    /// Specific identification. Not supported; consumes as FIFO.
    SpecificId,
}

impl ValuationPolicy {
    /// The policy actually used to consume layers.
    #[must_use]
    pub const fn effective(self) -> Self {
        match self {
            Self::SpecificId => Self::Fifo,
            other => other,
        }
    }

    /// Order in which layers are visited.
    #[must_use]
    pub const fn layer_order(self) -> LayerOrder {
        match self {
            Self::Lifo => LayerOrder::NewestFirst,
            Self::Fifo | Self::WeightedAverage | Self::SpecificId => LayerOrder::OldestFirst,
        }
    }
}

impl FromStr for ValuationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FIFO" => Ok(Self::Fifo),
            "LIFO" => Ok(Self::Lifo),
            "WEIGHTED_AVERAGE" | "AVERAGE" => Ok(Self::WeightedAverage),
            "SPECIFIC_ID" => Ok(Self::SpecificId),
            _ => Err(format!("unknown valuation policy: {s}")),
        }
    }
}

impl fmt::Display for ValuationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
            Self::Lifo => write!(f, "LIFO"),
            Self::WeightedAverage => write!(f, "WEIGHTED_AVERAGE"),
            Self::SpecificId => write!(f, "SPECIFIC_ID"),
        }
    }
}

/// Layer ordering by acquisition date, ties broken by insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerOrder {
    /// Ascending.
    OldestFirst,
    /// Descending.
    NewestFirst,
}
