//! Cost layer store.
//!
//! The store is the append-mostly ledger behind costledger: cost layers,
//! consumption records, landed costs and their allocation rows.
//!
//! # Concurrency
//!
//! All state sits behind one `parking_lot::RwLock`:
//!
//! - [`LayerStore::transaction`] takes the write lock, so every mutation
//!   (including the sufficiency check that precedes a consumption) runs
//!   serialized against every other mutation. Two depletions racing for the
//!   same units cannot both see them.
//! - [`LayerStore::read`] takes the read lock. Readers see committed state
//!   only, never a decrement without its consumption record.
//!
//! A transaction that returns `Err`, or panics, is rolled back.
//!
//! ```
//! use costledger_core::{CostingContext, Receipt};
//! use costledger_store::LayerStore;
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let store = LayerStore::new();
//! let ctx = CostingContext::new("acme");
//! let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!
//! let layer = store
//!     .create_layer(&ctx, &Receipt::new("WIDGET", "MAIN", dec!(10), dec!(5), date))
//!     .unwrap();
//! assert_eq!(store.read(|s| s.layers().len()), 1);
//! assert_eq!(layer.base_total_cost, dec!(50));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod state;
mod transaction;

pub use state::{sort_layers, LedgerState};
pub use transaction::{NewConsumption, Transaction};

use chrono::NaiveDate;
use costledger_core::{
    ConsumptionRecord, CostLayer, CostingContext, CostingError, LayerId, LayerOrder, ProductId,
    Receipt, WarehouseId,
};
use parking_lot::RwLock;
use tracing::info;

/// Thread-safe cost layer ledger.
#[derive(Debug, Default)]
pub struct LayerStore {
    state: RwLock<LedgerState>,
}

impl LayerStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding previously saved state.
    #[must_use]
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// A copy of the committed state.
    #[must_use]
    pub fn snapshot(&self) -> LedgerState {
        self.state.read().clone()
    }

    /// Consume the store, returning its state.
    #[must_use]
    pub fn into_state(self) -> LedgerState {
        self.state.into_inner()
    }

    /// Run `f` against committed state under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        f(&self.state.read())
    }

    /// Run `f` under the write lock, committing only if it returns `Ok`.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.state.write();
        let mut tx = Transaction::begin(&mut guard);
        let result = f(&mut tx);
        if result.is_ok() {
            tx.commit();
        }
        result
    }

    /// Validate a receipt and record it as a new layer.
    pub fn create_layer(
        &self,
        ctx: &CostingContext,
        receipt: &Receipt,
    ) -> Result<CostLayer, CostingError> {
        let layer = self.transaction(|tx| tx.insert_layer(ctx, receipt))?;
        info!(
            layer = %layer.id,
            product = %layer.product,
            warehouse = %layer.warehouse,
            quantity = %layer.quantity,
            base_total = %layer.base_total_cost,
            "created cost layer"
        );
        Ok(layer)
    }

    /// Layers with stock left as of a date, in the requested order.
    #[must_use]
    pub fn find_available_layers(
        &self,
        ctx: &CostingContext,
        product: &ProductId,
        warehouse: &WarehouseId,
        as_of: NaiveDate,
        order: LayerOrder,
    ) -> Vec<CostLayer> {
        self.read(|state| {
            state
                .available_layers(&ctx.tenant, product, warehouse, as_of, order)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Decrement one layer with its consumption record, as its own
    /// transaction.
    pub fn decrement_layer(
        &self,
        layer: LayerId,
        entry: NewConsumption,
    ) -> Result<ConsumptionRecord, CostingError> {
        self.transaction(|tx| tx.decrement_layer(layer, entry))
    }
}
