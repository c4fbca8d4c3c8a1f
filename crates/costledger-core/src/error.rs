//! Costing error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{LandedCostId, LandedCostStatus, LayerId, ProductId, WarehouseId};

/// Errors raised by the cost layer store, the consumption engine and the
/// landed cost allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostingError {
    /// A quantity was zero, negative, or finer than the quantity scale.
    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: Decimal,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A cost or exchange rate was unusable.
    #[error("invalid cost {value}: {reason}")]
    InvalidCost {
        /// The rejected value.
        value: Decimal,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// Not enough remaining quantity to satisfy a depletion.
    #[error(
        "insufficient inventory of {product} in {warehouse}: requested {requested}, available {available}, short {shortage}"
    )]
    InsufficientInventory {
        /// Product being depleted.
        product: ProductId,
        /// Warehouse being depleted.
        warehouse: WarehouseId,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity available as of the depletion date.
        available: Decimal,
        /// `requested - available`.
        shortage: Decimal,
    },

    /// A decrement exceeded a layer's remaining quantity.
    #[error("over-consumption of layer {layer}: requested {requested}, remaining {remaining}")]
    OverConsumption {
        /// The layer.
        layer: LayerId,
        /// Quantity requested from the layer.
        requested: Decimal,
        /// Quantity the layer had left.
        remaining: Decimal,
    },

    /// The landed cost is no longer pending.
    #[error("landed cost {landed_cost} is {status}, not pending")]
    AlreadyAllocated {
        /// The landed cost.
        landed_cost: LandedCostId,
        /// Its current status.
        status: LandedCostStatus,
    },

    /// A landed cost allocation named no target layers.
    #[error("landed cost {landed_cost} has no target layers")]
    NoTargets {
        /// The landed cost.
        landed_cost: LandedCostId,
    },

    /// A target layer was named more than once.
    #[error("layer {layer} appears more than once in the allocation targets")]
    DuplicateTarget {
        /// The repeated layer.
        layer: LayerId,
    },

    /// Every target layer has a zero allocation base.
    #[error("allocation base for landed cost {landed_cost} sums to zero")]
    ZeroAllocationBase {
        /// The landed cost.
        landed_cost: LandedCostId,
    },

    /// No layer with this id exists for the tenant.
    #[error("unknown cost layer {0}")]
    UnknownLayer(LayerId),

    /// No landed cost with this id exists for the tenant.
    #[error("unknown landed cost {0}")]
    UnknownLandedCost(LandedCostId),

    /// The layer has no remaining quantity to act on.
    #[error("cost layer {0} is fully consumed")]
    LayerConsumed(LayerId),

    /// Source and destination of a transfer are the same warehouse.
    #[error("cannot transfer {product} from {warehouse} to itself")]
    InvalidTransfer {
        /// Product being transferred.
        product: ProductId,
        /// The warehouse named on both sides.
        warehouse: WarehouseId,
    },
}

impl CostingError {
    /// Whether this error signals a broken ledger invariant rather than bad
    /// input or a business rule.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::OverConsumption { .. })
    }

    pub(crate) const fn invalid_quantity(quantity: Decimal, reason: &'static str) -> Self {
        Self::InvalidQuantity { quantity, reason }
    }

    pub(crate) const fn invalid_cost(value: Decimal, reason: &'static str) -> Self {
        Self::InvalidCost { value, reason }
    }
}
