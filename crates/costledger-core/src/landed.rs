//! Landed cost documents and their allocations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CostingError, LandedCostId, LayerId, Rounding, TenantId};

/// Indirect cost components making up a landed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostComponents {
    /// Freight.
    #[serde(default)]
    pub freight: Decimal,
    /// Insurance.
    #[serde(default)]
    pub insurance: Decimal,
    /// Customs duty.
    #[serde(default)]
    pub duty: Decimal,
    /// Handling.
    #[serde(default)]
    pub handling: Decimal,
    /// Anything else.
    #[serde(default)]
    pub other: Decimal,
}

impl CostComponents {
    /// Sum of all components.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.freight + self.insurance + self.duty + self.handling + self.other
    }

    const fn amounts(&self) -> [Decimal; 5] {
        [
            self.freight,
            self.insurance,
            self.duty,
            self.handling,
            self.other,
        ]
    }

    fn any_negative(&self) -> bool {
        self.amounts().iter().any(Decimal::is_sign_negative)
    }
}

/// Base on which a landed cost is split across layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationMethod {
    /// Original layer quantity.
    Quantity,
    /// Base-currency layer total.
    #[default]
    Value,
    /// Unit weight times quantity.
    Weight,
    /// Unit volume times quantity.
    Volume,
    /// Equal split.
    Manual,
}

impl FromStr for AllocationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "QUANTITY" => Ok(Self::Quantity),
            "VALUE" => Ok(Self::Value),
            "WEIGHT" => Ok(Self::Weight),
            "VOLUME" => Ok(Self::Volume),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(format!("unknown allocation method: {s}")),
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity => write!(f, "QUANTITY"),
            Self::Value => write!(f, "VALUE"),
            Self::Weight => write!(f, "WEIGHT"),
            Self::Volume => write!(f, "VOLUME"),
            Self::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Lifecycle of a landed cost. Only `Pending` may change, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandedCostStatus {
    /// Recorded, not yet allocated.
    #[default]
    Pending,
    /// Allocated onto layers.
    Allocated,
    /// Withdrawn before allocation.
    Cancelled,
}

impl fmt::Display for LandedCostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Allocated => write!(f, "ALLOCATED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Incoming landed cost document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostEvent {
    /// Source document (freight bill, customs entry, ...).
    pub source_ref: String,
    /// Document date.
    pub date: NaiveDate,
    /// Stated total. When the components are all zero it is booked as
    /// `other`; otherwise it must match their sum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    /// Component breakdown.
    #[serde(default)]
    pub components: CostComponents,
    /// Default allocation method.
    #[serde(default)]
    pub allocation_method: AllocationMethod,
}

impl LandedCostEvent {
    /// Resolve the component breakdown against the stated total.
    ///
    /// Amounts finer than the money scale are rejected, since no allocation
    /// row could carry them.
    pub fn resolved_components(&self, rounding: &Rounding) -> Result<CostComponents, CostingError> {
        if self.components.any_negative() {
            return Err(CostingError::InvalidCost {
                value: self.components.total(),
                reason: "landed cost components cannot be negative",
            });
        }
        let amounts = self.components.amounts();
        if let Some(&value) = amounts
            .iter()
            .chain(self.total_amount.as_ref())
            .find(|&&v| !rounding.is_money_exact(v))
        {
            return Err(CostingError::InvalidCost {
                value,
                reason: "landed cost amount is finer than the money scale",
            });
        }
        let mut components = self.components;
        match self.total_amount {
            Some(total) if total.is_sign_negative() => Err(CostingError::InvalidCost {
                value: total,
                reason: "landed cost total cannot be negative",
            }),
            Some(total) if components.total().is_zero() => {
                components.other = total;
                Ok(components)
            }
            Some(total) if total != components.total() => Err(CostingError::InvalidCost {
                value: total,
                reason: "landed cost total does not match its components",
            }),
            _ => Ok(components),
        }
    }
}

/// A landed cost document as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCost {
    /// Id.
    pub id: LandedCostId,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Source document.
    pub source_ref: String,
    /// Document date.
    pub date: NaiveDate,
    /// Component breakdown.
    pub components: CostComponents,
    /// Sum of the components.
    pub total_amount: Decimal,
    /// Default allocation method.
    pub allocation_method: AllocationMethod,
    /// Lifecycle status.
    pub status: LandedCostStatus,
}

impl LandedCost {
    /// Build a pending landed cost from an event.
    pub fn from_event(
        id: LandedCostId,
        tenant: TenantId,
        event: &LandedCostEvent,
        rounding: &Rounding,
    ) -> Result<Self, CostingError> {
        let components = event.resolved_components(rounding)?;
        Ok(Self {
            id,
            tenant,
            source_ref: event.source_ref.clone(),
            date: event.date,
            components,
            total_amount: components.total(),
            allocation_method: event.allocation_method,
            status: LandedCostStatus::Pending,
        })
    }

    /// Fail unless the landed cost is still pending.
    pub fn ensure_pending(&self) -> Result<(), CostingError> {
        if self.status == LandedCostStatus::Pending {
            Ok(())
        } else {
            Err(CostingError::AlreadyAllocated {
                landed_cost: self.id,
                status: self.status,
            })
        }
    }
}

/// One layer's share of a landed cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostAllocation {
    /// Parent landed cost.
    pub landed_cost: LandedCostId,
    /// Layer receiving the share.
    pub layer: LayerId,
    /// Amount allocated.
    pub amount: Decimal,
    /// Share of the total, as a percentage.
    pub percentage: Decimal,
    /// Allocation base value used for this layer.
    pub base_value: Decimal,
    /// Method actually applied.
    pub method: AllocationMethod,
}
