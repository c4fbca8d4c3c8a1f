//! Inventory costing engine.
//!
//! This crate provides:
//! - Consumption planning under FIFO, LIFO and weighted-average policies
//! - The [`CostingEngine`], which commits plans atomically against a
//!   [`costledger_store::LayerStore`], plus adjustments, transfers and
//!   revaluations
//! - The [`LandedCostAllocator`], which spreads indirect costs over layers
//!
//! # Consumption
//!
//! A depletion is planned against the layers on hand as of its date and
//! committed in the same store transaction, so two depletions racing for
//! the same units are serialized and the loser sees the winner's result.
//!
//! ```
//! use costledger_booking::CostingEngine;
//! use costledger_core::{CostingContext, Depletion, Receipt, ValuationPolicy};
//! use costledger_store::LayerStore;
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let store = LayerStore::new();
//! let engine = CostingEngine::new(&store);
//! let ctx = CostingContext::new("acme").with_policy(ValuationPolicy::Fifo);
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//!
//! engine.receive(&ctx, &Receipt::new("WIDGET", "MAIN", dec!(10), dec!(5), day(1))).unwrap();
//! engine.receive(&ctx, &Receipt::new("WIDGET", "MAIN", dec!(10), dec!(7), day(2))).unwrap();
//!
//! let result = engine
//!     .consume(&ctx, &Depletion::new("WIDGET", "MAIN", dec!(12), day(3)))
//!     .unwrap();
//! assert_eq!(result.total_cost, dec!(64));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod landed;
mod plan;

pub use engine::CostingEngine;
pub use landed::{compute_allocations, LandedCostAllocator};
pub use plan::{plan_consumption, visit_order};
