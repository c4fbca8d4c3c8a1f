//! Committed ledger state and the queries reports run against it.

use chrono::NaiveDate;
use costledger_core::{
    ConsumptionRecord, CostLayer, LandedCost, LandedCostAllocation, LandedCostId, LayerId,
    LayerOrder, ProductId, TenantId, WarehouseId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything the ledger holds. Rows are only ever appended; layers and
/// landed costs are the only rows mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub(crate) layers: Vec<CostLayer>,
    pub(crate) consumptions: Vec<ConsumptionRecord>,
    pub(crate) landed_costs: Vec<LandedCost>,
    pub(crate) allocations: Vec<LandedCostAllocation>,
}

impl LedgerState {
    /// All layers, in insertion order.
    #[must_use]
    pub fn layers(&self) -> &[CostLayer] {
        &self.layers
    }

    /// All consumption records, in insertion order.
    #[must_use]
    pub fn consumptions(&self) -> &[ConsumptionRecord] {
        &self.consumptions
    }

    /// All landed costs, in insertion order.
    #[must_use]
    pub fn landed_costs(&self) -> &[LandedCost] {
        &self.landed_costs
    }

    /// All landed cost allocations, in insertion order.
    #[must_use]
    pub fn allocations(&self) -> &[LandedCostAllocation] {
        &self.allocations
    }

    pub(crate) fn layer_index(&self, id: LayerId) -> Option<usize> {
        let guess = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        match self.layers.get(guess) {
            Some(layer) if layer.id == id => Some(guess),
            _ => self.layers.iter().position(|l| l.id == id),
        }
    }

    pub(crate) fn landed_cost_index(&self, id: LandedCostId) -> Option<usize> {
        let guess = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        match self.landed_costs.get(guess) {
            Some(lc) if lc.id == id => Some(guess),
            _ => self.landed_costs.iter().position(|lc| lc.id == id),
        }
    }

    /// Look up a layer by id, regardless of tenant.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&CostLayer> {
        self.layer_index(id).map(|i| &self.layers[i])
    }

    /// Look up a layer owned by `tenant`.
    #[must_use]
    pub fn tenant_layer(&self, tenant: &TenantId, id: LayerId) -> Option<&CostLayer> {
        self.layer(id).filter(|l| &l.tenant == tenant)
    }

    /// Look up a landed cost owned by `tenant`.
    #[must_use]
    pub fn landed_cost(&self, tenant: &TenantId, id: LandedCostId) -> Option<&LandedCost> {
        self.landed_cost_index(id)
            .map(|i| &self.landed_costs[i])
            .filter(|lc| &lc.tenant == tenant)
    }

    /// Every layer of a tenant.
    pub fn tenant_layers<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> impl Iterator<Item = &'a CostLayer> + 'a {
        self.layers.iter().filter(move |l| &l.tenant == tenant)
    }

    /// Every layer of a product, optionally restricted to one warehouse.
    pub fn product_layers<'a>(
        &'a self,
        tenant: &'a TenantId,
        product: &'a ProductId,
        warehouse: Option<&'a WarehouseId>,
    ) -> impl Iterator<Item = &'a CostLayer> + 'a {
        self.tenant_layers(tenant).filter(move |l| {
            &l.product == product && warehouse.map_or(true, |w| &l.warehouse == w)
        })
    }

    /// Layers with stock left, acquired on or before `as_of`, in `order`.
    #[must_use]
    pub fn available_layers(
        &self,
        tenant: &TenantId,
        product: &ProductId,
        warehouse: &WarehouseId,
        as_of: NaiveDate,
        order: LayerOrder,
    ) -> Vec<&CostLayer> {
        let mut layers: Vec<&CostLayer> = self
            .layers
            .iter()
            .filter(|l| {
                &l.tenant == tenant
                    && &l.product == product
                    && &l.warehouse == warehouse
                    && l.quantity_remaining > Decimal::ZERO
                    && l.acquisition_date <= as_of
            })
            .collect();
        sort_layers(&mut layers, order);
        layers
    }

    /// Total remaining quantity available as of a date.
    #[must_use]
    pub fn available_quantity(
        &self,
        tenant: &TenantId,
        product: &ProductId,
        warehouse: &WarehouseId,
        as_of: NaiveDate,
    ) -> Decimal {
        self.available_layers(tenant, product, warehouse, as_of, LayerOrder::OldestFirst)
            .iter()
            .map(|l| l.quantity_remaining)
            .sum()
    }

    /// Consumption records written against a layer.
    pub fn consumptions_for_layer(
        &self,
        layer: LayerId,
    ) -> impl Iterator<Item = &ConsumptionRecord> + '_ {
        self.consumptions.iter().filter(move |c| c.layer == layer)
    }

    /// Allocation rows of a landed cost.
    pub fn allocations_for(
        &self,
        landed_cost: LandedCostId,
    ) -> impl Iterator<Item = &LandedCostAllocation> + '_ {
        self.allocations
            .iter()
            .filter(move |a| a.landed_cost == landed_cost)
    }

    /// Allocation rows targeting a layer.
    pub fn allocations_to_layer(
        &self,
        layer: LayerId,
    ) -> impl Iterator<Item = &LandedCostAllocation> + '_ {
        self.allocations.iter().filter(move |a| a.layer == layer)
    }
}

/// Sort by acquisition date, ties broken by insertion order.
pub fn sort_layers(layers: &mut [&CostLayer], order: LayerOrder) {
    layers.sort_by_key(|l| (l.acquisition_date, l.id));
    if order == LayerOrder::NewestFirst {
        layers.reverse();
    }
}
