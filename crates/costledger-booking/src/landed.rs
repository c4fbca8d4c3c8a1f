//! Landed cost allocation.
//!
//! A landed cost is split across target layers in one batch. The shares are
//! computed with [`apportion`] so they sum to the landed cost total exactly,
//! with the rounding remainder on the layer with the largest allocation base.

use costledger_core::{
    apportion, AllocationMethod, CostLayer, CostingContext, CostingError, LandedCost,
    LandedCostAllocation, LandedCostEvent, LandedCostId, LandedCostStatus, LayerId, Rounding,
};
use costledger_store::{LayerStore, LedgerState};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{info, warn};

/// Records landed costs and allocates them onto cost layers.
#[derive(Debug, Clone, Copy)]
pub struct LandedCostAllocator<'s> {
    store: &'s LayerStore,
}

impl<'s> LandedCostAllocator<'s> {
    /// An allocator over `store`.
    #[must_use]
    pub const fn new(store: &'s LayerStore) -> Self {
        Self { store }
    }

    /// Record a pending landed cost.
    pub fn register(
        &self,
        ctx: &CostingContext,
        event: &LandedCostEvent,
    ) -> Result<LandedCost, CostingError> {
        let landed = self
            .store
            .transaction(|tx| tx.insert_landed_cost(ctx, event))?;
        info!(
            landed_cost = %landed.id,
            source = %landed.source_ref,
            total = %landed.total_amount,
            "registered landed cost"
        );
        Ok(landed)
    }

    /// Compute allocations without committing them.
    pub fn preview(
        &self,
        ctx: &CostingContext,
        landed_cost: LandedCostId,
        targets: &[LayerId],
        method: Option<AllocationMethod>,
    ) -> Result<Vec<LandedCostAllocation>, CostingError> {
        self.store.read(|state| {
            let landed = state
                .landed_cost(&ctx.tenant, landed_cost)
                .ok_or(CostingError::UnknownLandedCost(landed_cost))?;
            landed.ensure_pending()?;
            let layers = resolve_targets(state, ctx, landed_cost, targets)?;
            compute_allocations(
                landed,
                &layers,
                method.unwrap_or(landed.allocation_method),
                &ctx.rounding,
            )
        })
    }

    /// Allocate a pending landed cost onto `targets`.
    ///
    /// Writes every allocation row, adds each share to its layer and marks
    /// the landed cost allocated, all in one transaction. `method` overrides
    /// the landed cost's own allocation method.
    pub fn allocate(
        &self,
        ctx: &CostingContext,
        landed_cost: LandedCostId,
        targets: &[LayerId],
        method: Option<AllocationMethod>,
    ) -> Result<Vec<LandedCostAllocation>, CostingError> {
        let allocations = self.store.transaction(|tx| {
            let landed = tx
                .landed_cost(&ctx.tenant, landed_cost)
                .cloned()
                .ok_or(CostingError::UnknownLandedCost(landed_cost))?;
            landed.ensure_pending()?;
            let layers = resolve_targets(tx, ctx, landed_cost, targets)?;
            let allocations = compute_allocations(
                &landed,
                &layers,
                method.unwrap_or(landed.allocation_method),
                &ctx.rounding,
            )?;

            for allocation in &allocations {
                tx.apply_allocation(allocation.clone())?;
            }
            tx.transition_landed_cost(landed_cost, LandedCostStatus::Allocated)?;
            Ok(allocations)
        })?;

        info!(
            landed_cost = %landed_cost,
            layers = allocations.len(),
            total = %allocations.iter().map(|a| a.amount).sum::<Decimal>(),
            "allocated landed cost"
        );
        Ok(allocations)
    }

    /// Cancel a pending landed cost.
    pub fn cancel(
        &self,
        ctx: &CostingContext,
        landed_cost: LandedCostId,
    ) -> Result<LandedCost, CostingError> {
        let landed = self.store.transaction(|tx| {
            if tx.landed_cost(&ctx.tenant, landed_cost).is_none() {
                return Err(CostingError::UnknownLandedCost(landed_cost));
            }
            tx.transition_landed_cost(landed_cost, LandedCostStatus::Cancelled)
        })?;
        info!(landed_cost = %landed_cost, "cancelled landed cost");
        Ok(landed)
    }
}

fn resolve_targets<'a>(
    state: &'a LedgerState,
    ctx: &CostingContext,
    landed_cost: LandedCostId,
    targets: &[LayerId],
) -> Result<Vec<&'a CostLayer>, CostingError> {
    if targets.is_empty() {
        return Err(CostingError::NoTargets { landed_cost });
    }
    targets
        .iter()
        .map(|&id| {
            state
                .tenant_layer(&ctx.tenant, id)
                .ok_or(CostingError::UnknownLayer(id))
        })
        .collect()
}

/// Split a landed cost across `layers` by `method`.
///
/// WEIGHT and VOLUME fall back to QUANTITY for the whole batch when any
/// layer lacks the measure.
///
/// # Errors
///
/// - [`CostingError::NoTargets`] if `layers` is empty.
/// - [`CostingError::DuplicateTarget`] if a layer appears twice.
/// - [`CostingError::LayerConsumed`] if a layer has no stock left to carry
///   its share.
/// - [`CostingError::ZeroAllocationBase`] if every base is zero.
pub fn compute_allocations(
    landed: &LandedCost,
    layers: &[&CostLayer],
    method: AllocationMethod,
    rounding: &Rounding,
) -> Result<Vec<LandedCostAllocation>, CostingError> {
    if layers.is_empty() {
        return Err(CostingError::NoTargets {
            landed_cost: landed.id,
        });
    }
    let mut seen = HashSet::new();
    for layer in layers {
        if !seen.insert(layer.id) {
            return Err(CostingError::DuplicateTarget { layer: layer.id });
        }
        if layer.quantity_remaining <= Decimal::ZERO {
            return Err(CostingError::LayerConsumed(layer.id));
        }
    }

    let method = match method {
        AllocationMethod::Weight if layers.iter().any(|l| l.unit_weight.is_none()) => {
            warn!(landed_cost = %landed.id, "unit weight missing on a target layer, allocating by quantity");
            AllocationMethod::Quantity
        }
        AllocationMethod::Volume if layers.iter().any(|l| l.unit_volume.is_none()) => {
            warn!(landed_cost = %landed.id, "unit volume missing on a target layer, allocating by quantity");
            AllocationMethod::Quantity
        }
        other => other,
    };

    let bases: Vec<Decimal> = layers
        .iter()
        .map(|l| allocation_base(l, method))
        .collect();
    let base_sum: Decimal = bases.iter().copied().sum();
    if base_sum <= Decimal::ZERO {
        return Err(CostingError::ZeroAllocationBase {
            landed_cost: landed.id,
        });
    }

    let mut largest = 0;
    for (i, base) in bases.iter().enumerate() {
        if *base > bases[largest] {
            largest = i;
        }
    }

    let amounts = apportion(
        landed.total_amount,
        &bases,
        None,
        largest,
        rounding.money_scale,
        rounding.mode.strategy(),
    );

    Ok(layers
        .iter()
        .zip(bases.iter().zip(amounts))
        .map(|(layer, (&base, amount))| LandedCostAllocation {
            landed_cost: landed.id,
            layer: layer.id,
            amount,
            percentage: rounding.percentage(base, base_sum),
            base_value: base,
            method,
        })
        .collect())
}

fn allocation_base(layer: &CostLayer, method: AllocationMethod) -> Decimal {
    match method {
        AllocationMethod::Quantity => layer.quantity,
        AllocationMethod::Value => layer.base_total_cost,
        AllocationMethod::Weight => layer.unit_weight.unwrap_or(Decimal::ONE) * layer.quantity,
        AllocationMethod::Volume => layer.unit_volume.unwrap_or(Decimal::ONE) * layer.quantity,
        AllocationMethod::Manual => Decimal::ONE,
    }
}
