//! Depletions, consumption plans and the records they leave behind.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ConsumptionId, LayerId, ProductId, TenantId, ValuationPolicy, WarehouseId};

/// An outbound movement of stock (a sale, a shipment, a write-off).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depletion {
    /// Product depleted.
    pub product: ProductId,
    /// Warehouse depleted.
    pub warehouse: WarehouseId,
    /// Quantity removed; must be positive.
    pub quantity: Decimal,
    /// Date of the movement. Only layers acquired on or before it are used.
    pub date: NaiveDate,
    /// Depleting document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

impl Depletion {
    /// A depletion without a source document.
    pub fn new(
        product: impl Into<ProductId>,
        warehouse: impl Into<WarehouseId>,
        quantity: Decimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            product: product.into(),
            warehouse: warehouse.into(),
            quantity,
            date,
            source_ref: None,
        }
    }

    /// Set the depleting document.
    pub fn with_source(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

/// Why stock left a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepletionKind {
    /// Sale or shipment; expensed to COGS.
    #[default]
    Sale,
    /// Negative inventory adjustment.
    Adjustment,
    /// Outbound side of a warehouse transfer.
    TransferOut,
}

impl fmt::Display for DepletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sale => write!(f, "sale"),
            Self::Adjustment => write!(f, "adjustment"),
            Self::TransferOut => write!(f, "transfer_out"),
        }
    }
}

/// One line of a consumption plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLine {
    /// Layer consumed from.
    pub layer: LayerId,
    /// Quantity taken from the layer.
    pub quantity: Decimal,
    /// Unit cost charged, rounded to the unit cost scale.
    pub unit_cost: Decimal,
    /// Cost charged for this line.
    pub line_cost: Decimal,
}

/// The layers a depletion will consume and at what cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionPlan {
    /// Product depleted.
    pub product: ProductId,
    /// Warehouse depleted.
    pub warehouse: WarehouseId,
    /// Total quantity.
    pub quantity: Decimal,
    /// Policy the caller asked for.
    pub requested_policy: ValuationPolicy,
    /// Policy actually applied.
    pub applied_policy: ValuationPolicy,
    /// Lines in processing order.
    pub lines: Vec<PlanLine>,
}

impl ConsumptionPlan {
    /// Sum of line costs.
    #[must_use]
    pub fn total_cost(&self) -> Decimal {
        self.lines.iter().map(|l| l.line_cost).sum()
    }

    /// Ids of the layers touched.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.lines.iter().map(|l| l.layer).collect()
    }
}

/// Immutable record of one consumption against one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Record id.
    pub id: ConsumptionId,
    /// Layer consumed from.
    pub layer: LayerId,
    /// Tenant.
    pub tenant: TenantId,
    /// Product.
    pub product: ProductId,
    /// Warehouse.
    pub warehouse: WarehouseId,
    /// Quantity consumed.
    pub quantity: Decimal,
    /// Unit cost at consumption time.
    pub unit_cost: Decimal,
    /// Cost charged.
    pub total_cost: Decimal,
    /// Consumption date.
    pub date: NaiveDate,
    /// Depleting document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Why the stock left.
    pub kind: DepletionKind,
}

/// Outcome of a committed depletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionResult {
    /// Total cost of the depletion.
    pub total_cost: Decimal,
    /// `total_cost / quantity`, rounded to the unit cost scale.
    pub average_unit_cost: Decimal,
    /// The plan that was committed.
    pub plan: ConsumptionPlan,
    /// Records written, one per plan line.
    pub records: Vec<ConsumptionRecord>,
    /// Depletion date.
    pub date: NaiveDate,
    /// Depleting document, if any.
    pub source_ref: Option<String>,
    /// Why the stock left.
    pub kind: DepletionKind,
}

/// Answer to an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Quantity asked for.
    pub requested: Decimal,
    /// Quantity on hand as of the date.
    pub available: Decimal,
    /// How much is missing; zero when sufficient.
    pub shortage: Decimal,
}

impl Availability {
    /// Build from requested and available quantities.
    #[must_use]
    pub fn new(requested: Decimal, available: Decimal) -> Self {
        Self {
            requested,
            available,
            shortage: (requested - available).max(Decimal::ZERO),
        }
    }

    /// Whether the request can be met.
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        self.shortage.is_zero()
    }
}
