//! All-or-nothing mutation of the ledger.
//!
//! A [`Transaction`] holds the store's write lock for its whole lifetime and
//! records enough to undo every change it makes. Dropping it without a
//! commit (an error returned from the closure, or a panic) restores the
//! state exactly as it was.

use chrono::NaiveDate;
use costledger_core::{
    ConsumptionId, ConsumptionRecord, CostLayer, CostingContext, CostingError, DepletionKind,
    LandedCost, LandedCostAllocation, LandedCostEvent, LandedCostId, LandedCostStatus, LayerId,
    Receipt, Rounding,
};
use rust_decimal::Decimal;
use std::ops::Deref;
use tracing::debug;

use crate::LedgerState;

/// A consumption record about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsumption {
    /// Quantity taken.
    pub quantity: Decimal,
    /// Unit cost charged.
    pub unit_cost: Decimal,
    /// Cost charged.
    pub total_cost: Decimal,
    /// Consumption date.
    pub date: NaiveDate,
    /// Depleting document.
    pub source_ref: Option<String>,
    /// Why the stock left.
    pub kind: DepletionKind,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    layers: usize,
    consumptions: usize,
    landed_costs: usize,
    allocations: usize,
}

#[derive(Debug)]
enum Undo {
    Layer(usize, CostLayer),
    LandedCost(usize, LandedCost),
}

/// An open ledger transaction.
pub struct Transaction<'a> {
    state: &'a mut LedgerState,
    mark: Mark,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(state: &'a mut LedgerState) -> Self {
        let mark = Mark {
            layers: state.layers.len(),
            consumptions: state.consumptions.len(),
            landed_costs: state.landed_costs.len(),
            allocations: state.allocations.len(),
        };
        Self {
            state,
            mark,
            undo: Vec::new(),
            committed: false,
        }
    }

    pub(crate) fn commit(mut self) {
        self.committed = true;
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut CostLayer, CostingError> {
        let idx = self
            .state
            .layer_index(id)
            .ok_or(CostingError::UnknownLayer(id))?;
        self.undo.push(Undo::Layer(idx, self.state.layers[idx].clone()));
        Ok(&mut self.state.layers[idx])
    }

    fn landed_cost_mut(&mut self, id: LandedCostId) -> Result<&mut LandedCost, CostingError> {
        let idx = self
            .state
            .landed_cost_index(id)
            .ok_or(CostingError::UnknownLandedCost(id))?;
        self.undo
            .push(Undo::LandedCost(idx, self.state.landed_costs[idx].clone()));
        Ok(&mut self.state.landed_costs[idx])
    }

    /// Validate a receipt and append the layer it describes.
    pub fn insert_layer(
        &mut self,
        ctx: &CostingContext,
        receipt: &Receipt,
    ) -> Result<CostLayer, CostingError> {
        let id = LayerId(self.state.layers.len() as u64 + 1);
        let layer = CostLayer::from_receipt(
            id,
            ctx.tenant.clone(),
            &ctx.base_currency,
            receipt,
            &ctx.rounding,
        )?;
        self.state.layers.push(layer.clone());
        Ok(layer)
    }

    /// Decrement a layer and append the matching consumption record.
    pub fn decrement_layer(
        &mut self,
        id: LayerId,
        entry: NewConsumption,
    ) -> Result<ConsumptionRecord, CostingError> {
        let record_id = ConsumptionId(self.state.consumptions.len() as u64 + 1);
        let layer = self.layer_mut(id)?;
        layer.decrement(entry.quantity, entry.total_cost)?;

        let record = ConsumptionRecord {
            id: record_id,
            layer: id,
            tenant: layer.tenant.clone(),
            product: layer.product.clone(),
            warehouse: layer.warehouse.clone(),
            quantity: entry.quantity,
            unit_cost: entry.unit_cost,
            total_cost: entry.total_cost,
            date: entry.date,
            source_ref: entry.source_ref,
            kind: entry.kind,
        };
        self.state.consumptions.push(record.clone());
        Ok(record)
    }

    /// Append a pending landed cost.
    pub fn insert_landed_cost(
        &mut self,
        ctx: &CostingContext,
        event: &LandedCostEvent,
    ) -> Result<LandedCost, CostingError> {
        let id = LandedCostId(self.state.landed_costs.len() as u64 + 1);
        let landed = LandedCost::from_event(id, ctx.tenant.clone(), event, &ctx.rounding)?;
        self.state.landed_costs.push(landed.clone());
        Ok(landed)
    }

    /// Move a pending landed cost to a new status.
    pub fn transition_landed_cost(
        &mut self,
        id: LandedCostId,
        status: LandedCostStatus,
    ) -> Result<LandedCost, CostingError> {
        let landed = self.landed_cost_mut(id)?;
        landed.ensure_pending()?;
        landed.status = status;
        Ok(landed.clone())
    }

    /// Append an allocation row and add its amount to the target layer.
    pub fn apply_allocation(&mut self, allocation: LandedCostAllocation) -> Result<(), CostingError> {
        self.layer_mut(allocation.layer)?
            .accumulate_landed_cost(allocation.amount);
        self.state.allocations.push(allocation);
        Ok(())
    }

    /// Revalue a layer's remaining units. Returns the updated layer, its
    /// previous base unit cost and the change in carried value.
    pub fn revalue_layer(
        &mut self,
        id: LayerId,
        new_base_unit_cost: Decimal,
        rounding: &Rounding,
    ) -> Result<(CostLayer, Decimal, Decimal), CostingError> {
        let layer = self.layer_mut(id)?;
        let old = layer.base_unit_cost;
        let change = layer.revalue(new_base_unit_cost, rounding)?;
        Ok((layer.clone(), old, change))
    }

    fn rollback(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Layer(idx, layer) => self.state.layers[idx] = layer,
                Undo::LandedCost(idx, landed) => self.state.landed_costs[idx] = landed,
            }
        }
        self.state.layers.truncate(self.mark.layers);
        self.state.consumptions.truncate(self.mark.consumptions);
        self.state.landed_costs.truncate(self.mark.landed_costs);
        self.state.allocations.truncate(self.mark.allocations);
    }
}

impl Deref for Transaction<'_> {
    type Target = LedgerState;

    fn deref(&self) -> &LedgerState {
        self.state
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(undo = self.undo.len(), "rolling back ledger transaction");
            self.rollback();
        }
    }
}
