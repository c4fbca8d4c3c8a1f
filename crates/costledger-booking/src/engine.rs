//! The consumption engine.
//!
//! Every mutating operation here plans and commits inside one store
//! transaction, so the sufficiency check, each layer decrement and each
//! consumption record are applied together or not at all.

use chrono::NaiveDate;
use costledger_core::{
    Adjustment, AdjustmentOutcome, Availability, ConsumptionPlan, ConsumptionResult, CostLayer,
    CostingContext, CostingError, Depletion, DepletionKind, LayerType, ProductId, Receipt,
    Revaluation, RevaluationOutcome, Transfer, TransferOutcome, WarehouseId,
};
use costledger_store::{LayerStore, LedgerState, NewConsumption, Transaction};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::plan::{plan_consumption, visit_order};

/// Receives, consumes, adjusts, transfers and revalues inventory against a
/// [`LayerStore`].
#[derive(Debug, Clone, Copy)]
pub struct CostingEngine<'s> {
    store: &'s LayerStore,
}

impl<'s> CostingEngine<'s> {
    /// An engine over `store`.
    #[must_use]
    pub const fn new(store: &'s LayerStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &'s LayerStore {
        self.store
    }

    /// Record a receipt as a new cost layer.
    pub fn receive(
        &self,
        ctx: &CostingContext,
        receipt: &Receipt,
    ) -> Result<CostLayer, CostingError> {
        self.store.create_layer(ctx, receipt)
    }

    /// Plan a depletion under the active policy without committing it.
    pub fn plan(
        &self,
        ctx: &CostingContext,
        depletion: &Depletion,
    ) -> Result<ConsumptionPlan, CostingError> {
        self.store.read(|state| plan_in(state, ctx, depletion))
    }

    /// Consume a depletion under the active policy.
    ///
    /// Fails with [`CostingError::InsufficientInventory`] without touching
    /// any layer if there is not enough stock as of the depletion date.
    pub fn consume(
        &self,
        ctx: &CostingContext,
        depletion: &Depletion,
    ) -> Result<ConsumptionResult, CostingError> {
        self.consume_as(ctx, depletion, DepletionKind::Sale)
    }

    fn consume_as(
        &self,
        ctx: &CostingContext,
        depletion: &Depletion,
        kind: DepletionKind,
    ) -> Result<ConsumptionResult, CostingError> {
        let result = self
            .store
            .transaction(|tx| consume_in(tx, ctx, depletion, kind));
        match &result {
            Ok(consumed) => info!(
                product = %depletion.product,
                warehouse = %depletion.warehouse,
                quantity = %depletion.quantity,
                total_cost = %consumed.total_cost,
                policy = %consumed.plan.applied_policy,
                %kind,
                "consumed inventory"
            ),
            Err(e) if e.is_invariant_violation() => {
                error!(error = %e, product = %depletion.product, "cost layer invariant violated");
            }
            Err(e) => debug!(error = %e, product = %depletion.product, "consumption rejected"),
        }
        result
    }

    /// Apply a signed quantity correction.
    ///
    /// Increases create an adjustment layer at the given unit cost, or at
    /// the current weighted-average cost. Decreases consume through the
    /// active policy.
    pub fn adjust(
        &self,
        ctx: &CostingContext,
        adjustment: &Adjustment,
    ) -> Result<AdjustmentOutcome, CostingError> {
        let change = adjustment.quantity_change;
        if change.is_zero() {
            return Err(CostingError::InvalidQuantity {
                quantity: change,
                reason: "adjustment quantity cannot be zero",
            });
        }

        if change.is_sign_negative() {
            let depletion = Depletion {
                product: adjustment.product.clone(),
                warehouse: adjustment.warehouse.clone(),
                quantity: -change,
                date: adjustment.date,
                source_ref: (!adjustment.reason.is_empty()).then(|| adjustment.reason.clone()),
            };
            return self
                .consume_as(ctx, &depletion, DepletionKind::Adjustment)
                .map(|consumption| AdjustmentOutcome::Decrease { consumption });
        }

        let layer = self.store.transaction(|tx| {
            let unit_cost = match adjustment.unit_cost {
                Some(cost) => cost,
                None => ctx.rounding.unit_cost(weighted_average_in(
                    tx,
                    ctx,
                    &adjustment.product,
                    Some(&adjustment.warehouse),
                )),
            };
            let receipt = Receipt::new(
                adjustment.product.clone(),
                adjustment.warehouse.clone(),
                change,
                unit_cost,
                adjustment.date,
            )
            .with_type(LayerType::Adjustment)
            .with_source(adjustment.reason.clone());
            tx.insert_layer(ctx, &receipt)
        })?;
        info!(layer = %layer.id, product = %layer.product, quantity = %change, "inventory increased by adjustment");
        Ok(AdjustmentOutcome::Increase { layer })
    }

    /// Move stock between warehouses, carrying its value exactly.
    pub fn transfer(
        &self,
        ctx: &CostingContext,
        transfer: &Transfer,
    ) -> Result<TransferOutcome, CostingError> {
        if transfer.from_warehouse == transfer.to_warehouse {
            return Err(CostingError::InvalidTransfer {
                product: transfer.product.clone(),
                warehouse: transfer.from_warehouse.clone(),
            });
        }

        let outcome = self.store.transaction(|tx| {
            let depletion = Depletion {
                product: transfer.product.clone(),
                warehouse: transfer.from_warehouse.clone(),
                quantity: transfer.quantity,
                date: transfer.date,
                source_ref: transfer.source_ref.clone(),
            };
            let consumption = consume_in(tx, ctx, &depletion, DepletionKind::TransferOut)?;

            let source = consumption
                .plan
                .lines
                .first()
                .and_then(|line| tx.layer(line.layer));
            let mut receipt = Receipt::new(
                transfer.product.clone(),
                transfer.to_warehouse.clone(),
                transfer.quantity,
                consumption.average_unit_cost,
                transfer.date,
            )
            .with_type(LayerType::TransferIn)
            .with_total_cost(consumption.total_cost)
            .with_source(transfer.source_ref.clone().unwrap_or_else(|| {
                format!("transfer from {}", transfer.from_warehouse)
            }));
            receipt.unit_weight = source.and_then(|l| l.unit_weight);
            receipt.unit_volume = source.and_then(|l| l.unit_volume);

            let layer = tx.insert_layer(ctx, &receipt)?;
            Ok(TransferOutcome { consumption, layer })
        })?;

        info!(
            product = %transfer.product,
            from = %transfer.from_warehouse,
            to = %transfer.to_warehouse,
            quantity = %transfer.quantity,
            value = %outcome.layer.base_total_cost,
            "transferred inventory"
        );
        Ok(outcome)
    }

    /// Correct the base unit cost of a layer's remaining units.
    pub fn revalue(
        &self,
        ctx: &CostingContext,
        revaluation: &Revaluation,
    ) -> Result<RevaluationOutcome, CostingError> {
        let outcome = self.store.transaction(|tx| {
            if tx.tenant_layer(&ctx.tenant, revaluation.layer).is_none() {
                return Err(CostingError::UnknownLayer(revaluation.layer));
            }
            let (layer, old_unit_cost, value_change) =
                tx.revalue_layer(revaluation.layer, revaluation.new_unit_cost, &ctx.rounding)?;
            Ok(RevaluationOutcome {
                layer: layer.id,
                product: layer.product,
                warehouse: layer.warehouse,
                old_unit_cost,
                new_unit_cost: revaluation.new_unit_cost,
                quantity_remaining: layer.quantity_remaining,
                value_change,
                date: revaluation.date,
                reason: revaluation.reason.clone(),
            })
        })?;
        info!(layer = %outcome.layer, value_change = %outcome.value_change, "revalued cost layer");
        Ok(outcome)
    }

    /// Report whether a quantity is available as of a date.
    #[must_use]
    pub fn check_availability(
        &self,
        ctx: &CostingContext,
        product: &ProductId,
        warehouse: &WarehouseId,
        quantity: Decimal,
        as_of: NaiveDate,
    ) -> Availability {
        let available = self
            .store
            .read(|state| state.available_quantity(&ctx.tenant, product, warehouse, as_of));
        Availability::new(quantity, available)
    }

    /// Current weighted-average unit cost of a product, optionally in one
    /// warehouse. Zero when nothing is on hand.
    #[must_use]
    pub fn weighted_average_cost(
        &self,
        ctx: &CostingContext,
        product: &ProductId,
        warehouse: Option<&WarehouseId>,
    ) -> Decimal {
        let average = self
            .store
            .read(|state| weighted_average_in(state, ctx, product, warehouse));
        ctx.rounding.unit_cost(average)
    }
}

fn plan_in(
    state: &LedgerState,
    ctx: &CostingContext,
    depletion: &Depletion,
) -> Result<ConsumptionPlan, CostingError> {
    let layers = state.available_layers(
        &ctx.tenant,
        &depletion.product,
        &depletion.warehouse,
        depletion.date,
        visit_order(ctx.policy),
    );
    plan_consumption(
        &layers,
        &depletion.product,
        &depletion.warehouse,
        depletion.quantity,
        ctx.policy,
        &ctx.rounding,
    )
}

fn consume_in(
    tx: &mut Transaction<'_>,
    ctx: &CostingContext,
    depletion: &Depletion,
    kind: DepletionKind,
) -> Result<ConsumptionResult, CostingError> {
    let plan = plan_in(tx, ctx, depletion)?;
    debug!(lines = plan.lines.len(), total = %plan.total_cost(), "committing consumption plan");

    let mut records = Vec::with_capacity(plan.lines.len());
    for line in &plan.lines {
        let record = tx.decrement_layer(
            line.layer,
            NewConsumption {
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                total_cost: line.line_cost,
                date: depletion.date,
                source_ref: depletion.source_ref.clone(),
                kind,
            },
        )?;
        records.push(record);
    }

    let total_cost = plan.total_cost();
    Ok(ConsumptionResult {
        total_cost,
        average_unit_cost: ctx.rounding.unit_cost(total_cost / plan.quantity),
        plan,
        records,
        date: depletion.date,
        source_ref: depletion.source_ref.clone(),
        kind,
    })
}

fn weighted_average_in(
    state: &LedgerState,
    ctx: &CostingContext,
    product: &ProductId,
    warehouse: Option<&WarehouseId>,
) -> Decimal {
    let (quantity, value) = state
        .product_layers(&ctx.tenant, product, warehouse)
        .filter(|l| l.quantity_remaining > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(q, v), l| {
            (q + l.quantity_remaining, v + l.remaining_value())
        });
    if quantity.is_zero() {
        Decimal::ZERO
    } else {
        value / quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costledger_core::{LayerId, ValuationPolicy};
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn seeded(policy: ValuationPolicy) -> (LayerStore, CostingContext) {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme").with_policy(policy);
        let engine = CostingEngine::new(&store);
        engine
            .receive(&ctx, &Receipt::new("W", "MAIN", dec!(10), dec!(5), date(2024, 1, 1)))
            .unwrap();
        engine
            .receive(&ctx, &Receipt::new("W", "MAIN", dec!(10), dec!(7), date(2024, 1, 2)))
            .unwrap();
        (store, ctx)
    }

    fn sale(quantity: Decimal) -> Depletion {
        Depletion::new("W", "MAIN", quantity, date(2024, 1, 10)).with_source("SO-1")
    }

    #[test]
    fn test_consume_fifo_commits_records() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let engine = CostingEngine::new(&store);
        let result = engine.consume(&ctx, &sale(dec!(12))).unwrap();

        assert_eq!(result.total_cost, dec!(64));
        assert_eq!(result.average_unit_cost, dec!(5.3333));
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.kind, DepletionKind::Sale);

        store.read(|s| {
            assert!(s.layer(LayerId(1)).unwrap().is_fully_consumed);
            assert_eq!(s.layer(LayerId(2)).unwrap().quantity_remaining, dec!(8));
            assert_eq!(s.consumptions().len(), 2);
        });
    }

    #[test]
    fn test_consume_lifo() {
        let (store, ctx) = seeded(ValuationPolicy::Lifo);
        let result = CostingEngine::new(&store).consume(&ctx, &sale(dec!(12))).unwrap();
        assert_eq!(result.total_cost, dec!(80));
        assert_eq!(result.average_unit_cost, dec!(6.6667));
    }

    #[test]
    fn test_consume_weighted_average() {
        let (store, ctx) = seeded(ValuationPolicy::WeightedAverage);
        let result = CostingEngine::new(&store).consume(&ctx, &sale(dec!(12))).unwrap();
        assert_eq!(result.total_cost, dec!(72));
        assert_eq!(result.average_unit_cost, dec!(6));
        store.read(|s| {
            assert_eq!(s.layer(LayerId(1)).unwrap().quantity_remaining, dec!(4));
            assert_eq!(s.layer(LayerId(2)).unwrap().quantity_remaining, dec!(4));
        });
    }

    #[test]
    fn test_insufficient_leaves_layers_unchanged() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let before = store.snapshot();
        let err = CostingEngine::new(&store)
            .consume(&ctx, &sale(dec!(21)))
            .unwrap_err();
        assert!(matches!(
            err,
            CostingError::InsufficientInventory { shortage, .. } if shortage == dec!(1)
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_depletion_date_limits_layers() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let early = Depletion::new("W", "MAIN", dec!(12), date(2024, 1, 1));
        let err = CostingEngine::new(&store).consume(&ctx, &early).unwrap_err();
        assert!(matches!(err, CostingError::InsufficientInventory { .. }));
    }

    #[test]
    fn test_plan_is_dry_run() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let before = store.snapshot();
        let plan = CostingEngine::new(&store).plan(&ctx, &sale(dec!(12))).unwrap();
        assert_eq!(plan.total_cost(), dec!(64));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_adjust_increase_at_average_cost() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let engine = CostingEngine::new(&store);
        let adjustment = Adjustment {
            product: ProductId::from("W"),
            warehouse: WarehouseId::from("MAIN"),
            quantity_change: dec!(5),
            unit_cost: None,
            date: date(2024, 1, 5),
            reason: "cycle count".to_string(),
        };
        let AdjustmentOutcome::Increase { layer } = engine.adjust(&ctx, &adjustment).unwrap()
        else {
            panic!("expected an increase");
        };
        assert_eq!(layer.layer_type, LayerType::Adjustment);
        assert_eq!(layer.base_unit_cost, dec!(6));
        assert_eq!(layer.base_total_cost, dec!(30));
    }

    #[test]
    fn test_adjust_decrease_consumes() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let adjustment = Adjustment {
            product: ProductId::from("W"),
            warehouse: WarehouseId::from("MAIN"),
            quantity_change: dec!(-3),
            unit_cost: None,
            date: date(2024, 1, 5),
            reason: "damaged".to_string(),
        };
        let AdjustmentOutcome::Decrease { consumption } =
            CostingEngine::new(&store).adjust(&ctx, &adjustment).unwrap()
        else {
            panic!("expected a decrease");
        };
        assert_eq!(consumption.total_cost, dec!(15));
        assert_eq!(consumption.kind, DepletionKind::Adjustment);
        assert_eq!(consumption.records[0].source_ref.as_deref(), Some("damaged"));
    }

    #[test]
    fn test_adjust_zero_rejected() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let adjustment = Adjustment {
            product: ProductId::from("W"),
            warehouse: WarehouseId::from("MAIN"),
            quantity_change: Decimal::ZERO,
            unit_cost: None,
            date: date(2024, 1, 5),
            reason: String::new(),
        };
        let err = CostingEngine::new(&store).adjust(&ctx, &adjustment).unwrap_err();
        assert!(matches!(err, CostingError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_transfer_carries_value() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let transfer = Transfer {
            product: ProductId::from("W"),
            from_warehouse: WarehouseId::from("MAIN"),
            to_warehouse: WarehouseId::from("EAST"),
            quantity: dec!(12),
            date: date(2024, 1, 10),
            source_ref: None,
        };
        let outcome = CostingEngine::new(&store).transfer(&ctx, &transfer).unwrap();
        assert_eq!(outcome.consumption.total_cost, dec!(64));
        assert_eq!(outcome.layer.base_total_cost, dec!(64));
        assert_eq!(outcome.layer.warehouse, WarehouseId::from("EAST"));
        assert_eq!(outcome.layer.layer_type, LayerType::TransferIn);
        assert_eq!(outcome.layer.source_ref, "transfer from MAIN");
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let transfer = Transfer {
            product: ProductId::from("W"),
            from_warehouse: WarehouseId::from("MAIN"),
            to_warehouse: WarehouseId::from("MAIN"),
            quantity: dec!(1),
            date: date(2024, 1, 10),
            source_ref: None,
        };
        let err = CostingEngine::new(&store).transfer(&ctx, &transfer).unwrap_err();
        assert!(matches!(err, CostingError::InvalidTransfer { .. }));
    }

    #[test]
    fn test_failed_transfer_rolls_back_source() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let before = store.snapshot();
        let transfer = Transfer {
            product: ProductId::from("W"),
            from_warehouse: WarehouseId::from("MAIN"),
            to_warehouse: WarehouseId::from("EAST"),
            quantity: dec!(12.00001),
            date: date(2024, 1, 10),
            source_ref: None,
        };
        assert!(CostingEngine::new(&store).transfer(&ctx, &transfer).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_revalue() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let engine = CostingEngine::new(&store);
        engine.consume(&ctx, &sale(dec!(4))).unwrap();
        let outcome = engine
            .revalue(
                &ctx,
                &Revaluation {
                    layer: LayerId(1),
                    new_unit_cost: dec!(4.5),
                    date: date(2024, 1, 20),
                    reason: "vendor credit".to_string(),
                },
            )
            .unwrap();
        assert_eq!(outcome.old_unit_cost, dec!(5));
        assert_eq!(outcome.value_change, dec!(-3.00));
        assert_eq!(outcome.quantity_remaining, dec!(6));
    }

    #[test]
    fn test_revalue_other_tenant_unknown() {
        let (store, _) = seeded(ValuationPolicy::Fifo);
        let other = CostingContext::new("globex");
        let err = CostingEngine::new(&store)
            .revalue(
                &other,
                &Revaluation {
                    layer: LayerId(1),
                    new_unit_cost: dec!(1),
                    date: date(2024, 1, 20),
                    reason: String::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, CostingError::UnknownLayer(LayerId(1)));
    }

    #[test]
    fn test_availability_and_average() {
        let (store, ctx) = seeded(ValuationPolicy::Fifo);
        let engine = CostingEngine::new(&store);
        let product = ProductId::from("W");
        let main = WarehouseId::from("MAIN");

        let a = engine.check_availability(&ctx, &product, &main, dec!(25), date(2024, 2, 1));
        assert_eq!(a.available, dec!(20));
        assert_eq!(a.shortage, dec!(5));

        assert_eq!(engine.weighted_average_cost(&ctx, &product, Some(&main)), dec!(6));
        assert_eq!(
            engine.weighted_average_cost(&ctx, &ProductId::from("NONE"), None),
            Decimal::ZERO
        );
    }
}
