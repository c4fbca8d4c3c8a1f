//! Posting request types.

use chrono::NaiveDate;
use costledger_core::{LandedCostId, LayerId, ProductId, TenantId, WarehouseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PostingError;

/// General-ledger accounts the adapter posts to, resolved once by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRefs {
    /// Inventory asset.
    pub inventory: String,
    /// Cost of goods sold expense.
    pub cogs: String,
    /// Accounts payable for goods received but not yet invoiced.
    pub payable_in_transit: String,
    /// Clearing account landed cost bills are booked against.
    pub landed_cost_clearing: String,
    /// Offset for adjustments and revaluations.
    pub inventory_adjustment: String,
}

impl Default for AccountRefs {
    fn default() -> Self {
        Self {
            inventory: "Assets:Inventory".to_string(),
            cogs: "Expenses:COGS".to_string(),
            payable_in_transit: "Liabilities:AccountsPayable:InTransit".to_string(),
            landed_cost_clearing: "Liabilities:LandedCostClearing".to_string(),
            inventory_adjustment: "Expenses:InventoryAdjustment".to_string(),
        }
    }
}

/// What produced a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    /// Goods received.
    Receipt,
    /// Goods sold.
    Consumption,
    /// Landed cost allocated.
    LandedCost,
    /// Stock added by adjustment.
    AdjustmentIncrease,
    /// Stock removed by adjustment.
    AdjustmentDecrease,
    /// Layer revalued.
    Revaluation,
    /// Stock moved between warehouses.
    Transfer,
}

impl fmt::Display for PostingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receipt => write!(f, "receipt"),
            Self::Consumption => write!(f, "consumption"),
            Self::LandedCost => write!(f, "landed_cost"),
            Self::AdjustmentIncrease => write!(f, "adjustment_increase"),
            Self::AdjustmentDecrease => write!(f, "adjustment_decrease"),
            Self::Revaluation => write!(f, "revaluation"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// One debit or credit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingLine {
    /// Account posted to.
    pub account: String,
    /// Debit amount (zero on credit lines).
    pub debit: Decimal,
    /// Credit amount (zero on debit lines).
    pub credit: Decimal,
}

impl PostingLine {
    /// A debit line.
    pub fn debit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    /// A credit line.
    pub fn credit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: Decimal::ZERO,
            credit: amount,
        }
    }
}

/// Context attached to every posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingMetadata {
    /// Tenant.
    pub tenant: TenantId,
    /// What produced the posting.
    pub kind: PostingKind,
    /// Product involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductId>,
    /// Warehouse involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<WarehouseId>,
    /// Source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Layers involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layer_ids: Vec<LayerId>,
    /// Landed cost involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landed_cost: Option<LandedCostId>,
    /// Quantity moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// Unit cost used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
}

impl PostingMetadata {
    pub(crate) const fn new(tenant: TenantId, kind: PostingKind) -> Self {
        Self {
            tenant,
            kind,
            product: None,
            warehouse: None,
            source_ref: None,
            layer_ids: Vec::new(),
            landed_cost: None,
            quantity: None,
            unit_cost: None,
        }
    }
}

/// A double-entry posting for the general ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    /// Posting date.
    pub date: NaiveDate,
    /// Narration.
    pub description: String,
    /// Currency of every line (the tenant's base currency).
    pub currency: String,
    /// Debit and credit lines.
    pub lines: Vec<PostingLine>,
    /// Context.
    pub metadata: PostingMetadata,
}

impl PostingRequest {
    /// Sum of debits.
    #[must_use]
    pub fn total_debits(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    /// Sum of credits.
    #[must_use]
    pub fn total_credits(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Whether debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Check the request is postable: two or more lines, no negative
    /// amounts, debits equal to credits.
    pub fn validate(&self) -> Result<(), PostingError> {
        if self.lines.len() < 2 {
            return Err(PostingError::TooFewLines {
                lines: self.lines.len(),
            });
        }
        if let Some(line) = self
            .lines
            .iter()
            .find(|l| l.debit.is_sign_negative() || l.credit.is_sign_negative())
        {
            return Err(PostingError::NegativeAmount {
                account: line.account.clone(),
            });
        }
        if !self.is_balanced() {
            return Err(PostingError::Unbalanced {
                debits: self.total_debits(),
                credits: self.total_credits(),
            });
        }
        Ok(())
    }

    /// Net debit-positive change this request makes to `account`.
    #[must_use]
    pub fn net_change(&self, account: &str) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.account == account)
            .map(|l| l.debit - l.credit)
            .sum()
    }
}
