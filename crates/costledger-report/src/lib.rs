//! Read-only reports over cost layers.
//!
//! Every report takes a [`LedgerState`](costledger_store::LedgerState)
//! borrowed under the store's read lock, so it sees a consistent snapshot
//! and never a half-applied consumption.
//!
//! - [`valuate_inventory`] - On-hand quantity and value per product and warehouse
//! - [`aging_report`] - Remaining value bucketed by layer age
//! - [`cost_variance`] - Unit cost statistics and volatility over a date range
//! - [`cogs_analysis`] - Cost of sales per product over a date range
//! - [`product_cost_summary`] and [`layer_history`] - Per-product views
//! - [`validate_integrity`] and [`reconcile`] - Ledger health checks
//!
//! # Example
//!
//! ```
//! use costledger_core::{CostingContext, Receipt};
//! use costledger_report::valuate_inventory;
//! use costledger_store::LayerStore;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let store = LayerStore::new();
//! let ctx = CostingContext::new("acme");
//! let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! store
//!     .create_layer(&ctx, &Receipt::new("WIDGET", "MAIN", dec!(10), dec!(5), day))
//!     .unwrap();
//!
//! let report = store.read(|state| valuate_inventory(state, &ctx, day, None));
//! assert_eq!(report.total_value, dec!(50.00));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aging;
pub mod cogs;
pub mod integrity;
pub mod summary;
pub mod valuation;
pub mod variance;

pub use aging::{aging_report, AgingBucket, AgingBucketTotal, AgingBuckets, AgingDetail, AgingReport};
pub use cogs::{cogs_analysis, CogsAnalysis, ProductCogs};
pub use integrity::{
    reconcile, validate_integrity, IntegrityCode, IntegrityIssue, IntegrityReport, Reconciliation,
};
pub use summary::{layer_history, product_cost_summary, LayerHistoryEntry, ProductCostSummary};
pub use valuation::{valuate_inventory, ValuationLine, ValuationReport};
pub use variance::{
    cost_variance, CostStatistics, CostTrend, MonthlyCost, TrendDirection, VarianceReport,
    Volatility, VolatilePeriod,
};

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by report parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// Aging buckets do not partition the non-negative ages.
    #[error("invalid aging buckets: {reason}")]
    InvalidBuckets {
        /// What is wrong with them.
        reason: String,
    },

    /// A date range ends before it starts.
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },
}
