//! Ledger integrity checks and general-ledger reconciliation.
//!
//! | Code | Description |
//! |------|-------------|
//! | I1001 | Negative remaining quantity |
//! | I1002 | Remaining quantity exceeds the original quantity |
//! | I1003 | Fully-consumed flag disagrees with the remaining quantity |
//! | I1004 | Consumed quantity does not match the consumption records |
//! | I1005 | Consumed value does not match the consumption records |
//! | I1006 | Negative remaining value |
//! | I1007 | Value left on a layer with no remaining quantity |
//! | I2001 | Consumption record against an unknown layer |
//! | I3001 | Allocated landed cost does not sum to its total |
//! | I3002 | Layer landed cost total disagrees with its allocation rows |
//! | I3003 | Allocation row against an unknown layer |

use chrono::NaiveDate;
use costledger_core::{
    CostLayer, CostingContext, LandedCostId, LandedCostStatus, LayerId, TenantId,
};
use costledger_store::LedgerState;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::valuate_inventory;

/// Kinds of integrity violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntegrityCode {
    /// I1001
    NegativeRemaining,
    /// I1002
    ExcessRemaining,
    /// I1003
    ConsumedFlagMismatch,
    /// I1004
    QuantityNotConserved,
    /// I1005
    ValueNotConserved,
    /// I1006
    NegativeValue,
    /// I1007
    StrandedValue,
    /// I2001
    OrphanConsumption,
    /// I3001
    AllocationTotalMismatch,
    /// I3002
    LandedAccumulatorMismatch,
    /// I3003
    OrphanAllocation,
}

impl IntegrityCode {
    /// The code string (e.g. "I1001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NegativeRemaining => "I1001",
            Self::ExcessRemaining => "I1002",
            Self::ConsumedFlagMismatch => "I1003",
            Self::QuantityNotConserved => "I1004",
            Self::ValueNotConserved => "I1005",
            Self::NegativeValue => "I1006",
            Self::StrandedValue => "I1007",
            Self::OrphanConsumption => "I2001",
            Self::AllocationTotalMismatch => "I3001",
            Self::LandedAccumulatorMismatch => "I3002",
            Self::OrphanAllocation => "I3003",
        }
    }
}

impl fmt::Display for IntegrityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    /// What is wrong.
    pub code: IntegrityCode,
    /// Human-readable detail.
    pub message: String,
    /// Layer involved, if any.
    pub layer: Option<LayerId>,
    /// Landed cost involved, if any.
    pub landed_cost: Option<LandedCostId>,
}

impl IntegrityIssue {
    fn layer(code: IntegrityCode, layer: LayerId, message: String) -> Self {
        Self {
            code,
            message,
            layer: Some(layer),
            landed_cost: None,
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Result of [`validate_integrity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Layers scanned.
    pub layers_checked: usize,
    /// Consumption records scanned.
    pub consumptions_checked: usize,
    /// Landed costs scanned.
    pub landed_costs_checked: usize,
    /// Violations found, per-layer ones first in layer order.
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether no violation was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Default)]
struct Consumed {
    quantity: Decimal,
    value: Decimal,
}

/// Scan the tenant's layers, consumption records and landed costs for
/// invariant violations.
#[must_use]
pub fn validate_integrity(state: &LedgerState, ctx: &CostingContext) -> IntegrityReport {
    let tenant = &ctx.tenant;
    let layers: Vec<&CostLayer> = state.tenant_layers(tenant).collect();

    let mut consumed: HashMap<LayerId, Consumed> = HashMap::new();
    let mut issues = Vec::new();
    let mut consumptions_checked = 0;
    for record in state.consumptions().iter().filter(|c| &c.tenant == tenant) {
        consumptions_checked += 1;
        if state.tenant_layer(tenant, record.layer).is_none() {
            issues.push(IntegrityIssue::layer(
                IntegrityCode::OrphanConsumption,
                record.layer,
                format!("consumption {} references unknown layer {}", record.id, record.layer),
            ));
            continue;
        }
        let entry = consumed.entry(record.layer).or_default();
        entry.quantity += record.quantity;
        entry.value += record.total_cost;
    }

    let mut allocated: HashMap<LayerId, Decimal> = HashMap::new();
    let landed_costs: Vec<_> = state
        .landed_costs()
        .iter()
        .filter(|lc| &lc.tenant == tenant)
        .collect();
    for landed in &landed_costs {
        let mut total = Decimal::ZERO;
        for allocation in state.allocations_for(landed.id) {
            total += allocation.amount;
            if state.tenant_layer(tenant, allocation.layer).is_none() {
                issues.push(IntegrityIssue {
                    code: IntegrityCode::OrphanAllocation,
                    message: format!(
                        "landed cost {} allocated to unknown layer {}",
                        landed.id, allocation.layer
                    ),
                    layer: Some(allocation.layer),
                    landed_cost: Some(landed.id),
                });
            } else {
                *allocated.entry(allocation.layer).or_default() += allocation.amount;
            }
        }
        let expected = match landed.status {
            LandedCostStatus::Allocated => landed.total_amount,
            LandedCostStatus::Pending | LandedCostStatus::Cancelled => Decimal::ZERO,
        };
        if total != expected {
            issues.push(IntegrityIssue {
                code: IntegrityCode::AllocationTotalMismatch,
                message: format!(
                    "landed cost {} ({}) has {total} allocated, expected {expected}",
                    landed.id, landed.status
                ),
                layer: None,
                landed_cost: Some(landed.id),
            });
        }
    }

    let mut layer_issues: Vec<IntegrityIssue> = layers
        .par_iter()
        .flat_map_iter(|layer| {
            check_layer(
                layer,
                consumed.get(&layer.id),
                allocated.get(&layer.id).copied().unwrap_or_default(),
            )
        })
        .collect();
    layer_issues.append(&mut issues);

    let report = IntegrityReport {
        layers_checked: layers.len(),
        consumptions_checked,
        landed_costs_checked: landed_costs.len(),
        issues: layer_issues,
    };
    if report.is_clean() {
        debug!(tenant = %tenant, layers = report.layers_checked, "integrity check clean");
    } else {
        warn!(tenant = %tenant, issues = report.issues.len(), "integrity check found issues");
    }
    report
}

fn check_layer(
    layer: &CostLayer,
    consumed: Option<&Consumed>,
    allocated: Decimal,
) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();
    let id = layer.id;
    let remaining = layer.quantity_remaining;

    if remaining < Decimal::ZERO {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::NegativeRemaining,
            id,
            format!("layer {id} has negative remaining quantity {remaining}"),
        ));
    }
    if remaining > layer.quantity {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::ExcessRemaining,
            id,
            format!(
                "layer {id} has {remaining} remaining of {} received",
                layer.quantity
            ),
        ));
    }
    if layer.is_fully_consumed != remaining.is_zero() {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::ConsumedFlagMismatch,
            id,
            format!(
                "layer {id} marked fully consumed = {} with {remaining} remaining",
                layer.is_fully_consumed
            ),
        ));
    }

    let (quantity, value) = consumed.map_or((Decimal::ZERO, Decimal::ZERO), |c| (c.quantity, c.value));
    if quantity != layer.quantity - remaining {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::QuantityNotConserved,
            id,
            format!(
                "layer {id} consumed {} but its records total {quantity}",
                layer.quantity - remaining
            ),
        ));
    }
    if value != layer.consumed_value {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::ValueNotConserved,
            id,
            format!(
                "layer {id} consumed value {} but its records total {value}",
                layer.consumed_value
            ),
        ));
    }
    if layer.remaining_value() < Decimal::ZERO {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::NegativeValue,
            id,
            format!("layer {id} has negative remaining value {}", layer.remaining_value()),
        ));
    }
    if remaining.is_zero() && !layer.remaining_value().is_zero() {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::StrandedValue,
            id,
            format!(
                "layer {id} has no stock left but carries {}",
                layer.remaining_value()
            ),
        ));
    }
    if allocated != layer.allocated_landed_costs {
        issues.push(IntegrityIssue::layer(
            IntegrityCode::LandedAccumulatorMismatch,
            id,
            format!(
                "layer {id} carries {} landed cost but its allocations total {allocated}",
                layer.allocated_landed_costs
            ),
        ));
    }
    issues
}

/// Comparison of the valuation total against the general ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Tenant.
    pub tenant: TenantId,
    /// Date compared.
    pub as_of: NaiveDate,
    /// Total from [`valuate_inventory`].
    pub valuation_total: Decimal,
    /// Inventory account balance from the ledger.
    pub ledger_balance: Decimal,
    /// `valuation_total - ledger_balance`.
    pub difference: Decimal,
    /// Largest acceptable absolute difference.
    pub tolerance: Decimal,
    /// Whether `|difference| <= tolerance`.
    pub reconciled: bool,
}

/// Compare the inventory valuation as of `as_of` with the inventory
/// account balance the general ledger reports.
#[must_use]
pub fn reconcile(
    state: &LedgerState,
    ctx: &CostingContext,
    as_of: NaiveDate,
    ledger_balance: Decimal,
    tolerance: Decimal,
) -> Reconciliation {
    let valuation_total = valuate_inventory(state, ctx, as_of, None).total_value;
    let difference = valuation_total - ledger_balance;
    let reconciled = difference.abs() <= tolerance;
    if !reconciled {
        warn!(%as_of, %valuation_total, %ledger_balance, %difference, "inventory does not reconcile");
    }
    Reconciliation {
        tenant: ctx.tenant.clone(),
        as_of,
        valuation_total,
        ledger_balance,
        difference,
        tolerance,
        reconciled,
    }
}
