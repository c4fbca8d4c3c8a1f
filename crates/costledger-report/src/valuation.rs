//! Point-in-time inventory valuation.

use chrono::NaiveDate;
use costledger_core::{CostingContext, ProductId, WarehouseId};
use costledger_store::LedgerState;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// On-hand stock of one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuationLine {
    /// Product.
    pub product: ProductId,
    /// Warehouse.
    pub warehouse: WarehouseId,
    /// Units on hand.
    pub quantity: Decimal,
    /// Carried value of those units.
    pub value: Decimal,
    /// `value / quantity`, at unit cost scale.
    pub average_unit_cost: Decimal,
    /// Number of layers with stock remaining.
    pub layer_count: usize,
}

/// Inventory value as of a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuationReport {
    /// Valuation date.
    pub as_of: NaiveDate,
    /// Warehouse filter, if any.
    pub warehouse: Option<WarehouseId>,
    /// Currency of every amount.
    pub currency: String,
    /// One line per (product, warehouse), in that order.
    pub lines: Vec<ValuationLine>,
    /// Units on hand across all lines.
    pub total_quantity: Decimal,
    /// Value across all lines.
    pub total_value: Decimal,
}

#[derive(Default)]
struct Totals {
    quantity: Decimal,
    value: Decimal,
    layers: usize,
}

/// Value the tenant's inventory as of `as_of`.
///
/// Counts every layer acquired on or before `as_of` that still has stock,
/// at its remaining value. The valuation policy only decides which layers
/// remain; it plays no part here.
#[must_use]
pub fn valuate_inventory(
    state: &LedgerState,
    ctx: &CostingContext,
    as_of: NaiveDate,
    warehouse: Option<&WarehouseId>,
) -> ValuationReport {
    let mut groups: BTreeMap<(&ProductId, &WarehouseId), Totals> = BTreeMap::new();

    for layer in state.tenant_layers(&ctx.tenant).filter(|l| {
        l.quantity_remaining > Decimal::ZERO
            && l.acquisition_date <= as_of
            && warehouse.map_or(true, |w| &l.warehouse == w)
    }) {
        let totals = groups.entry((&layer.product, &layer.warehouse)).or_default();
        totals.quantity += layer.quantity_remaining;
        totals.value += layer.remaining_value();
        totals.layers += 1;
    }

    let lines: Vec<ValuationLine> = groups
        .into_iter()
        .map(|((product, warehouse), totals)| ValuationLine {
            product: product.clone(),
            warehouse: warehouse.clone(),
            quantity: totals.quantity,
            value: totals.value,
            average_unit_cost: ctx.rounding.unit_cost(totals.value / totals.quantity),
            layer_count: totals.layers,
        })
        .collect();

    let total_quantity = lines.iter().map(|l| l.quantity).sum();
    let total_value = lines.iter().map(|l| l.value).sum();
    debug!(%as_of, lines = lines.len(), %total_value, "valuated inventory");

    ValuationReport {
        as_of,
        warehouse: warehouse.cloned(),
        currency: ctx.base_currency.clone(),
        lines,
        total_quantity,
        total_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costledger_booking::CostingEngine;
    use costledger_core::{Depletion, Receipt, ValuationPolicy};
    use costledger_store::LayerStore;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn stocked(ctx: &CostingContext) -> LayerStore {
        let store = LayerStore::new();
        let engine = CostingEngine::new(&store);
        for (product, warehouse, qty, cost, day) in [
            ("B", "MAIN", dec!(10), dec!(5), 1),
            ("B", "MAIN", dec!(10), dec!(7), 2),
            ("A", "EAST", dec!(4), dec!(2.50), 3),
            ("A", "MAIN", dec!(1), dec!(9.99), 10),
        ] {
            engine
                .receive(ctx, &Receipt::new(product, warehouse, qty, cost, date(2024, 1, day)))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_lines_ordered_by_product_then_warehouse() {
        let ctx = CostingContext::new("acme");
        let store = stocked(&ctx);
        let report = store.read(|s| valuate_inventory(s, &ctx, date(2024, 2, 1), None));

        let keys: Vec<_> = report
            .lines
            .iter()
            .map(|l| (l.product.as_str(), l.warehouse.as_str()))
            .collect();
        assert_eq!(keys, vec![("A", "EAST"), ("A", "MAIN"), ("B", "MAIN")]);
        assert_eq!(report.lines[2].value, dec!(120.00));
        assert_eq!(report.lines[2].average_unit_cost, dec!(6));
        assert_eq!(report.lines[2].layer_count, 2);
        assert_eq!(report.total_value, dec!(139.99));
        assert_eq!(report.total_quantity, dec!(25));
    }

    #[test]
    fn test_as_of_and_warehouse_filters() {
        let ctx = CostingContext::new("acme");
        let store = stocked(&ctx);
        let report = store.read(|s| {
            valuate_inventory(s, &ctx, date(2024, 1, 5), Some(&WarehouseId::from("MAIN")))
        });
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.total_value, dec!(120.00));
    }

    #[test]
    fn test_value_follows_policy_through_remaining_layers() {
        for (policy, expected) in [
            (ValuationPolicy::Fifo, dec!(56.00)),
            (ValuationPolicy::Lifo, dec!(40.00)),
            (ValuationPolicy::WeightedAverage, dec!(48.00)),
        ] {
            let ctx = CostingContext::new("acme").with_policy(policy);
            let store = stocked(&ctx);
            CostingEngine::new(&store)
                .consume(&ctx, &Depletion::new("B", "MAIN", dec!(12), date(2024, 1, 5)))
                .unwrap();
            let report = store.read(|s| {
                valuate_inventory(s, &ctx, date(2024, 1, 5), Some(&WarehouseId::from("MAIN")))
            });
            assert_eq!(report.lines[0].value, expected, "{policy}");
            assert_eq!(report.lines[0].quantity, dec!(8));
        }
    }

    #[test]
    fn test_repeated_valuation_is_identical() {
        let ctx = CostingContext::new("acme");
        let store = stocked(&ctx);
        let first = store.read(|s| valuate_inventory(s, &ctx, date(2024, 2, 1), None));
        let second = store.read(|s| valuate_inventory(s, &ctx, date(2024, 2, 1), None));
        assert_eq!(first, second);
    }

    #[test]
    fn test_other_tenants_invisible() {
        let ctx = CostingContext::new("acme");
        let store = stocked(&ctx);
        let other = CostingContext::new("globex");
        let report = store.read(|s| valuate_inventory(s, &other, date(2024, 2, 1), None));
        assert!(report.lines.is_empty());
        assert_eq!(report.total_value, Decimal::ZERO);
    }
}
