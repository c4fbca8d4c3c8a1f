//! The inventory account tracks the layers exactly.
//!
//! Every costing operation is posted to an in-memory ledger and the
//! inventory balance is compared against the sum of remaining layer values.

use chrono::NaiveDate;
use costledger_booking::{CostingEngine, LandedCostAllocator};
use costledger_core::{
    Adjustment, AllocationMethod, CostComponents, CostingContext, Depletion, LandedCostEvent,
    CostingError, LayerId, ProductId, Receipt, Revaluation, Transfer, ValuationPolicy, WarehouseId,
};
use costledger_posting::{
    post_adjustment, post_consumption, post_landed_cost, post_receipt, post_revaluation,
    AccountRefs, GeneralLedger, InMemoryJournal,
};
use costledger_store::LayerStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn remaining_value(store: &LayerStore, ctx: &CostingContext) -> Decimal {
    store.read(|state| {
        state
            .tenant_layers(&ctx.tenant)
            .map(|l| l.remaining_value())
            .sum()
    })
}

fn run_scenario(policy: ValuationPolicy) {
    let store = LayerStore::new();
    let ctx = CostingContext::new("acme").with_policy(policy);
    let accounts = AccountRefs::default();
    let engine = CostingEngine::new(&store);
    let allocator = LandedCostAllocator::new(&store);
    let mut gl = InMemoryJournal::new();

    for (qty, cost, day) in [
        (dec!(10), dec!(5.00), 1),
        (dec!(7), dec!(6.35), 2),
        (dec!(3), dec!(7.10), 3),
    ] {
        let layer = engine
            .receive(&ctx, &Receipt::new("W", "MAIN", qty, cost, date(2024, 3, day)))
            .unwrap();
        gl.submit(&post_receipt(&layer, &ctx, &accounts)).unwrap();
    }

    let result = engine
        .consume(&ctx, &Depletion::new("W", "MAIN", dec!(4.5), date(2024, 3, 4)))
        .unwrap();
    gl.submit(&post_consumption(&result, &ctx, &accounts)).unwrap();

    let landed = allocator
        .register(
            &ctx,
            &LandedCostEvent {
                source_ref: "FRT-77".to_string(),
                date: date(2024, 3, 5),
                total_amount: None,
                components: CostComponents {
                    freight: dec!(9.99),
                    duty: dec!(3.01),
                    ..CostComponents::default()
                },
                allocation_method: AllocationMethod::Value,
            },
        )
        .unwrap();
    // LIFO has already emptied the newest layer
    let targets: Vec<LayerId> = store.read(|state| {
        state
            .tenant_layers(&ctx.tenant)
            .filter(|l| l.quantity_remaining > Decimal::ZERO)
            .map(|l| l.id)
            .collect()
    });
    let allocations = allocator.allocate(&ctx, landed.id, &targets, None).unwrap();
    gl.submit(&post_landed_cost(&landed, &allocations, &ctx, &accounts))
        .unwrap();

    let result = engine
        .consume(&ctx, &Depletion::new("W", "MAIN", dec!(6.25), date(2024, 3, 6)))
        .unwrap();
    gl.submit(&post_consumption(&result, &ctx, &accounts)).unwrap();

    let transfer = engine
        .transfer(
            &ctx,
            &Transfer {
                product: ProductId::from("W"),
                from_warehouse: WarehouseId::from("MAIN"),
                to_warehouse: WarehouseId::from("EAST"),
                quantity: dec!(2),
                date: date(2024, 3, 7),
                source_ref: None,
            },
        )
        .unwrap();
    gl.submit(&post_consumption(&transfer.consumption, &ctx, &accounts))
        .unwrap();
    gl.submit(&post_receipt(&transfer.layer, &ctx, &accounts))
        .unwrap();

    let shrink = engine
        .adjust(
            &ctx,
            &Adjustment {
                product: ProductId::from("W"),
                warehouse: WarehouseId::from("MAIN"),
                quantity_change: dec!(-1.5),
                unit_cost: None,
                date: date(2024, 3, 8),
                reason: "count".to_string(),
            },
        )
        .unwrap();
    gl.submit(&post_adjustment(&shrink, &ctx, &accounts)).unwrap();

    let found = engine
        .adjust(
            &ctx,
            &Adjustment {
                product: ProductId::from("W"),
                warehouse: WarehouseId::from("EAST"),
                quantity_change: dec!(1),
                unit_cost: None,
                date: date(2024, 3, 8),
                reason: "count".to_string(),
            },
        )
        .unwrap();
    gl.submit(&post_adjustment(&found, &ctx, &accounts)).unwrap();

    let revalued = engine
        .revalue(
            &ctx,
            &Revaluation {
                layer: transfer.layer.id,
                new_unit_cost: dec!(4.90),
                date: date(2024, 3, 9),
                reason: "write-down".to_string(),
            },
        )
        .unwrap();
    gl.submit(&post_revaluation(&revalued, &ctx, &accounts))
        .unwrap();

    let gl_inventory = gl.balance(&accounts.inventory, date(2024, 12, 31));
    assert_eq!(gl_inventory, remaining_value(&store, &ctx), "{policy}");

    // Nothing was lost: receipts plus landed costs equal COGS plus stock
    // plus adjustment write-offs.
    let received = dec!(50.00) + dec!(44.45) + dec!(21.30) + dec!(13.00);
    let expensed = gl.balance(&accounts.cogs, date(2024, 12, 31))
        + gl.balance(&accounts.inventory_adjustment, date(2024, 12, 31));
    assert_eq!(received, expensed + gl_inventory, "{policy}");
}

#[test]
fn test_gl_reconciles_under_fifo() {
    run_scenario(ValuationPolicy::Fifo);
}

#[test]
fn test_gl_reconciles_under_lifo() {
    run_scenario(ValuationPolicy::Lifo);
}

#[test]
fn test_gl_reconciles_under_weighted_average() {
    run_scenario(ValuationPolicy::WeightedAverage);
}

#[test]
fn test_every_posting_is_balanced() {
    let store = LayerStore::new();
    let ctx = CostingContext::new("acme");
    let accounts = AccountRefs::default();
    let engine = CostingEngine::new(&store);
    let mut gl = InMemoryJournal::new();

    let layer = engine
        .receive(
            &ctx,
            &Receipt::new("W", "MAIN", dec!(3), dec!(3.333), date(2024, 1, 1)),
        )
        .unwrap();
    gl.submit(&post_receipt(&layer, &ctx, &accounts)).unwrap();
    let result = engine
        .consume(&ctx, &Depletion::new("W", "MAIN", dec!(1), date(2024, 1, 2)))
        .unwrap();
    gl.submit(&post_consumption(&result, &ctx, &accounts)).unwrap();

    assert_eq!(gl.len(), 2);
    for entry in gl.entries() {
        assert!(entry.request.is_balanced());
        assert_eq!(entry.request.currency, "USD");
    }
}

#[test]
fn test_landed_cost_on_consumed_layer_keeps_gl_in_step() {
    let store = LayerStore::new();
    let ctx = CostingContext::new("acme");
    let accounts = AccountRefs::default();
    let engine = CostingEngine::new(&store);
    let allocator = LandedCostAllocator::new(&store);
    let mut gl = InMemoryJournal::new();

    for day in [1, 2] {
        let layer = engine
            .receive(&ctx, &Receipt::new("W", "MAIN", dec!(10), dec!(5), date(2024, 1, day)))
            .unwrap();
        gl.submit(&post_receipt(&layer, &ctx, &accounts)).unwrap();
    }
    let result = engine
        .consume(&ctx, &Depletion::new("W", "MAIN", dec!(14), date(2024, 1, 3)))
        .unwrap();
    gl.submit(&post_consumption(&result, &ctx, &accounts)).unwrap();

    let landed = allocator
        .register(
            &ctx,
            &LandedCostEvent {
                source_ref: "FRT-9".to_string(),
                date: date(2024, 1, 4),
                total_amount: Some(dec!(20)),
                components: CostComponents::default(),
                allocation_method: AllocationMethod::Quantity,
            },
        )
        .unwrap();
    let err = allocator
        .allocate(&ctx, landed.id, &[LayerId(1), LayerId(2)], None)
        .unwrap_err();
    assert_eq!(err, CostingError::LayerConsumed(LayerId(1)));

    let allocations = allocator.allocate(&ctx, landed.id, &[LayerId(2)], None).unwrap();
    gl.submit(&post_landed_cost(&landed, &allocations, &ctx, &accounts))
        .unwrap();

    // 6 units at 5 plus the whole freight bill
    let gl_inventory = gl.balance(&accounts.inventory, date(2024, 12, 31));
    assert_eq!(gl_inventory, dec!(50.00));
    assert_eq!(gl_inventory, remaining_value(&store, &ctx));
    store.read(|state| {
        assert!(state
            .tenant_layers(&ctx.tenant)
            .filter(|l| l.quantity_remaining.is_zero())
            .all(|l| l.remaining_value().is_zero()));
    });
}
