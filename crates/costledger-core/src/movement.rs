//! Adjustments, transfers and revaluations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConsumptionResult, CostLayer, LayerId, ProductId, WarehouseId};

/// A signed correction to on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Product adjusted.
    pub product: ProductId,
    /// Warehouse adjusted.
    pub warehouse: WarehouseId,
    /// Positive adds stock, negative removes it.
    pub quantity_change: Decimal,
    /// Base-currency unit cost for added stock. Defaults to the current
    /// weighted-average cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    /// Adjustment date.
    pub date: NaiveDate,
    /// Free-text reason, kept as the source reference.
    #[serde(default)]
    pub reason: String,
}

/// What an adjustment did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum AdjustmentOutcome {
    /// Stock was added as a new layer.
    Increase {
        /// The adjustment layer.
        layer: CostLayer,
    },
    /// Stock was consumed from existing layers.
    Decrease {
        /// The consumption.
        consumption: ConsumptionResult,
    },
}

/// Movement of stock between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Product moved.
    pub product: ProductId,
    /// Source warehouse.
    pub from_warehouse: WarehouseId,
    /// Destination warehouse.
    pub to_warehouse: WarehouseId,
    /// Quantity moved.
    pub quantity: Decimal,
    /// Transfer date.
    pub date: NaiveDate,
    /// Transfer document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

/// What a transfer did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Consumption at the source.
    pub consumption: ConsumptionResult,
    /// Layer created at the destination, carrying the consumed value.
    pub layer: CostLayer,
}

/// Explicit correction of a layer's unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revaluation {
    /// Layer corrected.
    pub layer: LayerId,
    /// New base-currency unit cost for the remaining units.
    pub new_unit_cost: Decimal,
    /// Effective date.
    pub date: NaiveDate,
    /// Reason for the correction.
    #[serde(default)]
    pub reason: String,
}

/// What a revaluation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevaluationOutcome {
    /// Layer corrected.
    pub layer: LayerId,
    /// Product of the layer.
    pub product: ProductId,
    /// Warehouse of the layer.
    pub warehouse: WarehouseId,
    /// Base unit cost before.
    pub old_unit_cost: Decimal,
    /// Base unit cost after.
    pub new_unit_cost: Decimal,
    /// Units the correction applied to.
    pub quantity_remaining: Decimal,
    /// Change in carried value; negative for a write-down.
    pub value_change: Decimal,
    /// Effective date.
    pub date: NaiveDate,
    /// Reason for the correction.
    pub reason: String,
}
