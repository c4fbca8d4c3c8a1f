//! Explicit per-call costing context.

use serde::{Deserialize, Serialize};

use crate::{Rounding, TenantId, ValuationPolicy};

/// Tenant configuration passed into every costing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostingContext {
    /// Tenant whose layers are read and written.
    pub tenant: TenantId,
    /// Currency all base amounts are expressed in.
    pub base_currency: String,
    /// Active valuation policy.
    pub policy: ValuationPolicy,
    /// Scales and rounding mode.
    pub rounding: Rounding,
}

impl CostingContext {
    /// A FIFO context in USD with default rounding.
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self {
            tenant: tenant.into(),
            base_currency: "USD".to_string(),
            policy: ValuationPolicy::Fifo,
            rounding: Rounding::default(),
        }
    }

    /// Set the valuation policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ValuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the base currency.
    #[must_use]
    pub fn with_base_currency(mut self, currency: impl Into<String>) -> Self {
        self.base_currency = currency.into();
        self
    }

    /// Set the rounding configuration.
    #[must_use]
    pub const fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }
}
