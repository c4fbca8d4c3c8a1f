//! Consumption planning.
//!
//! Planning is pure: it reads layers and returns the lines a depletion would
//! consume, without touching the store. The engine commits a plan inside the
//! same transaction that produced it.

use costledger_core::{
    apportion, ConsumptionPlan, CostLayer, CostingError, LayerOrder, PlanLine, ProductId,
    Rounding, ValuationPolicy, WarehouseId,
};
use costledger_store::sort_layers;
use rust_decimal::Decimal;
use tracing::warn;

/// Plan the consumption of `quantity` from `layers` under `policy`.
///
/// `layers` may arrive in any order; they are sorted by acquisition date
/// and insertion order here. Layers without remaining stock are ignored.
///
/// # Errors
///
/// - [`CostingError::InvalidQuantity`] if `quantity` is not positive or is
///   finer than the quantity scale.
/// - [`CostingError::InsufficientInventory`] if the layers together hold
///   less than `quantity`. Nothing is planned in that case.
pub fn plan_consumption(
    layers: &[&CostLayer],
    product: &ProductId,
    warehouse: &WarehouseId,
    quantity: Decimal,
    policy: ValuationPolicy,
    rounding: &Rounding,
) -> Result<ConsumptionPlan, CostingError> {
    if quantity <= Decimal::ZERO {
        return Err(CostingError::InvalidQuantity {
            quantity,
            reason: "depletion quantity must be positive",
        });
    }
    if !rounding.is_quantity_exact(quantity) {
        return Err(CostingError::InvalidQuantity {
            quantity,
            reason: "depletion quantity has more decimal places than the quantity scale",
        });
    }

    let mut open: Vec<&CostLayer> = layers
        .iter()
        .copied()
        .filter(|l| l.quantity_remaining > Decimal::ZERO)
        .collect();

    let available: Decimal = open.iter().map(|l| l.quantity_remaining).sum();
    if quantity > available {
        return Err(CostingError::InsufficientInventory {
            product: product.clone(),
            warehouse: warehouse.clone(),
            requested: quantity,
            available,
            shortage: quantity - available,
        });
    }

    let applied = policy.effective();
    if applied != policy {
        warn!(
            requested = %policy,
            applied = %applied,
            "specific identification is not supported, consuming in FIFO order"
        );
    }

    sort_layers(&mut open, applied.layer_order());
    let lines = match applied {
        ValuationPolicy::Fifo | ValuationPolicy::Lifo | ValuationPolicy::SpecificId => {
            plan_ordered(&open, quantity, rounding)
        }
        ValuationPolicy::WeightedAverage => plan_weighted_average(&open, quantity, rounding),
    };

    Ok(ConsumptionPlan {
        product: product.clone(),
        warehouse: warehouse.clone(),
        quantity,
        requested_policy: policy,
        applied_policy: applied,
        lines,
    })
}

/// Walk layers in order, draining each before moving on (FIFO or LIFO).
fn plan_ordered(ordered: &[&CostLayer], quantity: Decimal, rounding: &Rounding) -> Vec<PlanLine> {
    let mut remaining = quantity;
    let mut lines = Vec::new();

    for layer in ordered {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(layer.quantity_remaining);
        lines.push(PlanLine {
            layer: layer.id,
            quantity: take,
            unit_cost: rounding.unit_cost(layer.current_unit_cost()),
            line_cost: layer.cost_of(take, rounding),
        });
        remaining -= take;
    }

    lines
}

/// Shrink every layer by the same fraction.
///
/// Quantities are split in proportion to remaining quantity and costs in
/// proportion to each layer's share of the value taken, so the total is
/// `quantity × average cost` and every layer keeps its own unit value.
/// Rounding remainders land on the last layer processed (the newest).
fn plan_weighted_average(
    ordered: &[&CostLayer],
    quantity: Decimal,
    rounding: &Rounding,
) -> Vec<PlanLine> {
    let Some(last) = ordered.len().checked_sub(1) else {
        return Vec::new();
    };
    let strategy = rounding.mode.strategy();

    let remaining: Vec<Decimal> = ordered.iter().map(|l| l.quantity_remaining).collect();
    let values: Vec<Decimal> = ordered.iter().map(|l| l.remaining_value()).collect();
    let total_remaining: Decimal = remaining.iter().copied().sum();
    let total_value: Decimal = values.iter().copied().sum();
    let average = total_value / total_remaining;

    let takes = apportion(
        quantity,
        &remaining,
        Some(&remaining),
        last,
        rounding.quantity_scale,
        strategy,
    );

    let target = if quantity == total_remaining {
        total_value
    } else {
        rounding.money(quantity * average)
    };

    // A drained layer must give up exactly its remaining value; the rest of
    // the target is spread over the partially consumed layers.
    let mut drained_value = Decimal::ZERO;
    let mut weights = vec![Decimal::ZERO; ordered.len()];
    let mut caps = vec![Decimal::ZERO; ordered.len()];
    for i in 0..ordered.len() {
        if takes[i] == remaining[i] {
            drained_value += values[i];
        } else {
            weights[i] = values[i] * takes[i] / remaining[i];
            caps[i] = values[i];
        }
    }
    let partial_cap: Decimal = caps.iter().copied().sum();
    let residual = (target - drained_value)
        .max(Decimal::ZERO)
        .min(partial_cap);
    let designated = (0..ordered.len())
        .rev()
        .find(|&i| !takes[i].is_zero() && takes[i] != remaining[i])
        .unwrap_or(last);
    let shares = apportion(
        residual,
        &weights,
        Some(&caps),
        designated,
        rounding.money_scale,
        strategy,
    );

    ordered
        .iter()
        .enumerate()
        .filter(|(i, _)| !takes[*i].is_zero())
        .map(|(i, layer)| PlanLine {
            layer: layer.id,
            quantity: takes[i],
            unit_cost: rounding.unit_cost(layer.current_unit_cost()),
            line_cost: if takes[i] == remaining[i] {
                values[i]
            } else {
                shares[i]
            },
        })
        .collect()
}

/// Order layers are visited in for a policy.
#[must_use]
pub const fn visit_order(policy: ValuationPolicy) -> LayerOrder {
    policy.effective().layer_order()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use costledger_core::{LayerId, Receipt, TenantId};
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn layer(id: u64, quantity: Decimal, unit_cost: Decimal, day: u32) -> CostLayer {
        let receipt = Receipt::new("W", "MAIN", quantity, unit_cost, date(2024, 1, day));
        CostLayer::from_receipt(
            LayerId(id),
            TenantId::from("acme"),
            "USD",
            &receipt,
            &Rounding::default(),
        )
        .unwrap()
    }

    fn plan(layers: &[CostLayer], quantity: Decimal, policy: ValuationPolicy) -> ConsumptionPlan {
        let refs: Vec<&CostLayer> = layers.iter().collect();
        plan_consumption(
            &refs,
            &ProductId::from("W"),
            &WarehouseId::from("MAIN"),
            quantity,
            policy,
            &Rounding::default(),
        )
        .unwrap()
    }

    fn two_layers() -> Vec<CostLayer> {
        vec![layer(1, dec!(10), dec!(5), 1), layer(2, dec!(10), dec!(7), 2)]
    }

    #[test]
    fn test_fifo() {
        let p = plan(&two_layers(), dec!(12), ValuationPolicy::Fifo);
        assert_eq!(p.total_cost(), dec!(64));
        assert_eq!(p.layer_ids(), vec![LayerId(1), LayerId(2)]);
        assert_eq!(p.lines[0].quantity, dec!(10));
        assert_eq!(p.lines[1].quantity, dec!(2));
        assert_eq!(p.lines[1].unit_cost, dec!(7));
    }

    #[test]
    fn test_lifo() {
        let p = plan(&two_layers(), dec!(12), ValuationPolicy::Lifo);
        assert_eq!(p.total_cost(), dec!(80));
        assert_eq!(p.layer_ids(), vec![LayerId(2), LayerId(1)]);
    }

    #[test]
    fn test_weighted_average() {
        let p = plan(&two_layers(), dec!(12), ValuationPolicy::WeightedAverage);
        assert_eq!(p.total_cost(), dec!(72));
        assert_eq!(p.lines.len(), 2);
        assert!(p.lines.iter().all(|l| l.quantity == dec!(6)));
    }

    #[test]
    fn test_weighted_average_rounding_residual() {
        let layers = vec![
            layer(1, dec!(3), dec!(1), 1),
            layer(2, dec!(3), dec!(2), 2),
            layer(3, dec!(3), dec!(4), 3),
        ];
        let p = plan(&layers, dec!(1), ValuationPolicy::WeightedAverage);
        let qty: Decimal = p.lines.iter().map(|l| l.quantity).sum();
        assert_eq!(qty, dec!(1));
        // 21 / 9 = 2.333..., so one unit costs 2.33.
        assert_eq!(p.total_cost(), dec!(2.33));
        assert_eq!(p.lines.last().unwrap().quantity, dec!(0.3334));
    }

    #[test]
    fn test_weighted_average_full_drain() {
        let layers = vec![
            layer(1, dec!(3), dec!(3.3333), 1),
            layer(2, dec!(7), dec!(1.1111), 2),
        ];
        let p = plan(&layers, dec!(10), ValuationPolicy::WeightedAverage);
        assert_eq!(p.total_cost(), layers[0].base_total_cost + layers[1].base_total_cost);
        assert_eq!(p.lines[0].line_cost, layers[0].base_total_cost);
    }

    #[test]
    fn test_specific_id_falls_back_to_fifo() {
        let p = plan(&two_layers(), dec!(12), ValuationPolicy::SpecificId);
        assert_eq!(p.requested_policy, ValuationPolicy::SpecificId);
        assert_eq!(p.applied_policy, ValuationPolicy::Fifo);
        assert_eq!(p.total_cost(), dec!(64));
    }

    #[test]
    fn test_same_date_uses_insertion_order() {
        let layers = vec![layer(2, dec!(5), dec!(9), 1), layer(1, dec!(5), dec!(3), 1)];
        let p = plan(&layers, dec!(5), ValuationPolicy::Fifo);
        assert_eq!(p.layer_ids(), vec![LayerId(1)]);
        assert_eq!(p.total_cost(), dec!(15));
    }

    #[test]
    fn test_insufficient() {
        let refs: Vec<CostLayer> = two_layers();
        let refs: Vec<&CostLayer> = refs.iter().collect();
        let err = plan_consumption(
            &refs,
            &ProductId::from("W"),
            &WarehouseId::from("MAIN"),
            dec!(25),
            ValuationPolicy::Fifo,
            &Rounding::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CostingError::InsufficientInventory {
                product: ProductId::from("W"),
                warehouse: WarehouseId::from("MAIN"),
                requested: dec!(25),
                available: dec!(20),
                shortage: dec!(5),
            }
        );
    }

    #[test]
    fn test_invalid_quantity() {
        let layers = two_layers();
        let refs: Vec<&CostLayer> = layers.iter().collect();
        for q in [Decimal::ZERO, dec!(-1), dec!(0.00001)] {
            let err = plan_consumption(
                &refs,
                &ProductId::from("W"),
                &WarehouseId::from("MAIN"),
                q,
                ValuationPolicy::Fifo,
                &Rounding::default(),
            )
            .unwrap_err();
            assert!(matches!(err, CostingError::InvalidQuantity { .. }));
        }
    }

    #[test]
    fn test_visit_order() {
        assert_eq!(visit_order(ValuationPolicy::Lifo), LayerOrder::NewestFirst);
        assert_eq!(visit_order(ValuationPolicy::SpecificId), LayerOrder::OldestFirst);
    }
}
