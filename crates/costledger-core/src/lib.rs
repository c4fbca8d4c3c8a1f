//! Core types for costledger
//!
//! This crate provides the fundamental types shared by the costledger crates:
//!
//! - [`Rounding`] and [`apportion`] - Fixed-point money arithmetic
//! - [`CostLayer`] - One acquisition of stock at its own cost
//! - [`ConsumptionRecord`] - Immutable record of stock leaving a layer
//! - [`ValuationPolicy`] - FIFO, LIFO or weighted-average consumption
//! - [`LandedCost`] - Indirect acquisition costs and their allocations
//! - [`CostingContext`] - Tenant, base currency, policy and rounding
//! - [`CostingError`] - Everything that can go wrong
//!
//! # Example
//!
//! ```
//! use costledger_core::{CostLayer, LayerId, Receipt, Rounding, TenantId};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let receipt = Receipt::new(
//!     "WIDGET",
//!     "MAIN",
//!     dec!(10),
//!     dec!(5.00),
//!     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//! );
//! let rounding = Rounding::default();
//! let mut layer =
//!     CostLayer::from_receipt(LayerId(1), TenantId::from("acme"), "USD", &receipt, &rounding)
//!         .unwrap();
//!
//! let cost = layer.cost_of(dec!(4), &rounding);
//! layer.decrement(dec!(4), cost).unwrap();
//!
//! assert_eq!(cost, dec!(20.00));
//! assert_eq!(layer.quantity_remaining, dec!(6));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumption;
pub mod context;
pub mod error;
pub mod ids;
pub mod landed;
pub mod layer;
pub mod money;
pub mod movement;
pub mod policy;

pub use consumption::{
    Availability, ConsumptionPlan, ConsumptionRecord, ConsumptionResult, Depletion,
    DepletionKind, PlanLine,
};
pub use context::CostingContext;
pub use error::CostingError;
pub use ids::{ConsumptionId, LandedCostId, LayerId, ProductId, TenantId, WarehouseId};
pub use landed::{
    AllocationMethod, CostComponents, LandedCost, LandedCostAllocation, LandedCostEvent,
    LandedCostStatus,
};
pub use layer::{CostLayer, LayerType, Receipt};
pub use money::{apportion, Rounding, RoundingMode};
pub use movement::{
    Adjustment, AdjustmentOutcome, Revaluation, RevaluationOutcome, Transfer, TransferOutcome,
};
pub use policy::{LayerOrder, ValuationPolicy};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
