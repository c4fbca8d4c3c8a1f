//! Costing events as they appear in an event file.
//!
//! An event file is JSON Lines: one object per line, tagged by `type`.
//! Blank lines and lines starting with `//` are skipped.
//!
//! ```text
//! {"type": "receipt", "product": "WIDGET", "warehouse": "MAIN", "quantity": "10", "unit_cost": "5.00", "acquisition_date": "2024-01-15"}
//! {"type": "depletion", "product": "WIDGET", "warehouse": "MAIN", "quantity": "4", "date": "2024-01-20"}
//! ```

use costledger_core::{
    Adjustment, AllocationMethod, Depletion, LandedCostEvent, LandedCostId, LayerId, Receipt,
    Revaluation, Transfer,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::LoadError;

/// One costing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostEvent {
    /// Goods received into a new layer.
    Receipt(Receipt),
    /// Goods sold.
    Depletion(Depletion),
    /// A landed cost document, recorded pending.
    LandedCost(LandedCostEvent),
    /// Allocate a pending landed cost onto layers.
    AllocateLandedCost {
        /// Landed cost to allocate.
        landed_cost: LandedCostId,
        /// Target layers.
        targets: Vec<LayerId>,
        /// Overrides the landed cost's own method.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<AllocationMethod>,
    },
    /// Withdraw a pending landed cost.
    CancelLandedCost {
        /// Landed cost to cancel.
        landed_cost: LandedCostId,
    },
    /// Signed quantity correction.
    Adjustment(Adjustment),
    /// Movement between warehouses.
    Transfer(Transfer),
    /// Unit cost correction of a layer.
    Revaluation(Revaluation),
}

impl CostEvent {
    /// Short name of the event type, as written in the file.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Receipt(_) => "receipt",
            Self::Depletion(_) => "depletion",
            Self::LandedCost(_) => "landed_cost",
            Self::AllocateLandedCost { .. } => "allocate_landed_cost",
            Self::CancelLandedCost { .. } => "cancel_landed_cost",
            Self::Adjustment(_) => "adjustment",
            Self::Transfer(_) => "transfer",
            Self::Revaluation(_) => "revaluation",
        }
    }
}

/// An event with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// 1-based line number.
    pub line: usize,
    /// The event.
    pub event: CostEvent,
}

/// Parse event file contents. `path` is only used in error messages.
pub fn parse_events(source: &str, path: &Path) -> Result<Vec<EventRecord>, LoadError> {
    source
        .lines()
        .enumerate()
        .filter(|(_, text)| {
            let text = text.trim();
            !text.is_empty() && !text.starts_with("//")
        })
        .map(|(i, text)| {
            serde_json::from_str(text)
                .map(|event| EventRecord { line: i + 1, event })
                .map_err(|e| LoadError::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    message: e.to_string(),
                })
        })
        .collect()
}
