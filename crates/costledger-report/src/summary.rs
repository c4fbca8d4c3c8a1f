//! Per-product cost summaries and layer history.

use costledger_core::{
    ConsumptionRecord, CostLayer, CostingContext, LandedCostAllocation, ProductId, WarehouseId,
};
use costledger_store::LedgerState;
use rust_decimal::Decimal;
use serde::Serialize;

/// Cost position of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCostSummary {
    /// Product.
    pub product: ProductId,
    /// Warehouse filter, if any.
    pub warehouse: Option<WarehouseId>,
    /// Units on hand.
    pub quantity_on_hand: Decimal,
    /// Remaining value including landed costs.
    pub value: Decimal,
    /// Remaining units at their base cost, before landed costs.
    pub value_excluding_landed: Decimal,
    /// `value_excluding_landed / quantity_on_hand`.
    pub weighted_average_cost: Decimal,
    /// `value / quantity_on_hand`.
    pub effective_average_cost: Decimal,
    /// Current unit cost of the newest layer with stock.
    pub latest_unit_cost: Option<Decimal>,
    /// Current unit cost of the oldest layer with stock.
    pub oldest_unit_cost: Option<Decimal>,
    /// Lowest current unit cost among layers with stock.
    pub min_unit_cost: Option<Decimal>,
    /// Highest current unit cost among layers with stock.
    pub max_unit_cost: Option<Decimal>,
    /// Layers with stock.
    pub active_layers: usize,
    /// All layers.
    pub total_layers: usize,
    /// Layers drained to zero.
    pub fully_consumed_layers: usize,
    /// Units ever received.
    pub total_received: Decimal,
    /// Units ever consumed.
    pub total_consumed: Decimal,
    /// Landed costs ever allocated.
    pub total_landed_costs: Decimal,
}

/// Summarize a product, optionally in one warehouse.
#[must_use]
pub fn product_cost_summary(
    state: &LedgerState,
    ctx: &CostingContext,
    product: &ProductId,
    warehouse: Option<&WarehouseId>,
) -> ProductCostSummary {
    let r = &ctx.rounding;
    let mut layers: Vec<&CostLayer> = state.product_layers(&ctx.tenant, product, warehouse).collect();
    layers.sort_by_key(|l| (l.acquisition_date, l.id));

    let active: Vec<&CostLayer> = layers
        .iter()
        .copied()
        .filter(|l| l.quantity_remaining > Decimal::ZERO)
        .collect();
    let unit_costs: Vec<Decimal> = active
        .iter()
        .map(|l| r.unit_cost(l.current_unit_cost()))
        .collect();

    let quantity_on_hand: Decimal = active.iter().map(|l| l.quantity_remaining).sum();
    let value: Decimal = active.iter().map(|l| l.remaining_value()).sum();
    let value_excluding_landed: Decimal = active
        .iter()
        .map(|l| r.money(l.quantity_remaining * l.base_total_cost / l.quantity))
        .sum();
    let average = |total: Decimal| {
        if quantity_on_hand.is_zero() {
            Decimal::ZERO
        } else {
            r.unit_cost(total / quantity_on_hand)
        }
    };

    ProductCostSummary {
        product: product.clone(),
        warehouse: warehouse.cloned(),
        quantity_on_hand,
        value,
        value_excluding_landed,
        weighted_average_cost: average(value_excluding_landed),
        effective_average_cost: average(value),
        latest_unit_cost: unit_costs.last().copied(),
        oldest_unit_cost: unit_costs.first().copied(),
        min_unit_cost: unit_costs.iter().min().copied(),
        max_unit_cost: unit_costs.iter().max().copied(),
        active_layers: active.len(),
        total_layers: layers.len(),
        fully_consumed_layers: layers.iter().filter(|l| l.is_fully_consumed).count(),
        total_received: layers.iter().map(|l| l.quantity).sum(),
        total_consumed: layers
            .iter()
            .map(|l| l.quantity - l.quantity_remaining)
            .sum(),
        total_landed_costs: layers.iter().map(|l| l.allocated_landed_costs).sum(),
    }
}

/// A layer with everything that happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerHistoryEntry {
    /// The layer as it stands.
    pub layer: CostLayer,
    /// Consumptions from the layer, in order.
    pub consumptions: Vec<ConsumptionRecord>,
    /// Landed costs allocated onto the layer.
    pub allocations: Vec<LandedCostAllocation>,
}

/// Every layer of a product with its consumptions, oldest first.
#[must_use]
pub fn layer_history(
    state: &LedgerState,
    ctx: &CostingContext,
    product: &ProductId,
    warehouse: Option<&WarehouseId>,
) -> Vec<LayerHistoryEntry> {
    let mut layers: Vec<&CostLayer> = state.product_layers(&ctx.tenant, product, warehouse).collect();
    layers.sort_by_key(|l| (l.acquisition_date, l.id));
    layers
        .into_iter()
        .map(|layer| LayerHistoryEntry {
            layer: layer.clone(),
            consumptions: state.consumptions_for_layer(layer.id).cloned().collect(),
            allocations: state.allocations_to_layer(layer.id).cloned().collect(),
        })
        .collect()
}
