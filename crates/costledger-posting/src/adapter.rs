//! Builders turning costing outcomes into posting requests.
//!
//! Every builder produces a balanced request: each posts one amount to a
//! debit account and the same amount to a credit account. Nothing here
//! submits anything; the caller hands the request to its ledger.

use costledger_core::{
    AdjustmentOutcome, ConsumptionResult, CostLayer, CostingContext, DepletionKind, LandedCost,
    LandedCostAllocation, LayerType, RevaluationOutcome,
};
use rust_decimal::Decimal;

use crate::{AccountRefs, PostingKind, PostingLine, PostingMetadata, PostingRequest};

fn balanced(
    ctx: &CostingContext,
    date: chrono::NaiveDate,
    description: String,
    debit: &str,
    credit: &str,
    amount: Decimal,
    metadata: PostingMetadata,
) -> PostingRequest {
    PostingRequest {
        date,
        description,
        currency: ctx.base_currency.clone(),
        lines: vec![
            PostingLine::debit(debit, amount),
            PostingLine::credit(credit, amount),
        ],
        metadata,
    }
}

/// Dr COGS, Cr Inventory for a sale.
///
/// Adjustment depletions debit the inventory adjustment account instead;
/// transfer-out depletions post to inventory on both sides.
#[must_use]
pub fn post_consumption(
    result: &ConsumptionResult,
    ctx: &CostingContext,
    accounts: &AccountRefs,
) -> PostingRequest {
    let (debit, kind) = match result.kind {
        DepletionKind::Sale => (&accounts.cogs, PostingKind::Consumption),
        DepletionKind::Adjustment => (
            &accounts.inventory_adjustment,
            PostingKind::AdjustmentDecrease,
        ),
        DepletionKind::TransferOut => (&accounts.inventory, PostingKind::Transfer),
    };

    let mut metadata = PostingMetadata::new(ctx.tenant.clone(), kind);
    metadata.product = Some(result.plan.product.clone());
    metadata.warehouse = Some(result.plan.warehouse.clone());
    metadata.source_ref = result.source_ref.clone();
    metadata.layer_ids = result.plan.layer_ids();
    metadata.quantity = Some(result.plan.quantity);
    metadata.unit_cost = Some(result.average_unit_cost);

    let description = format!(
        "COGS {} {} of {} ({})",
        result.plan.applied_policy, result.plan.quantity, result.plan.product, result.kind
    );
    balanced(
        ctx,
        result.date,
        description,
        debit,
        &accounts.inventory,
        result.total_cost,
        metadata,
    )
}

/// Dr Inventory, Cr Accounts-Payable-in-transit for a received layer.
///
/// Adjustment layers credit the inventory adjustment account.
#[must_use]
pub fn post_receipt(
    layer: &CostLayer,
    ctx: &CostingContext,
    accounts: &AccountRefs,
) -> PostingRequest {
    let (credit, kind) = match layer.layer_type {
        LayerType::Adjustment => (
            &accounts.inventory_adjustment,
            PostingKind::AdjustmentIncrease,
        ),
        LayerType::TransferIn => (&accounts.inventory, PostingKind::Transfer),
        _ => (&accounts.payable_in_transit, PostingKind::Receipt),
    };

    let mut metadata = PostingMetadata::new(ctx.tenant.clone(), kind);
    metadata.product = Some(layer.product.clone());
    metadata.warehouse = Some(layer.warehouse.clone());
    metadata.source_ref = (!layer.source_ref.is_empty()).then(|| layer.source_ref.clone());
    metadata.layer_ids = vec![layer.id];
    metadata.quantity = Some(layer.quantity);
    metadata.unit_cost = Some(layer.base_unit_cost);

    let description = format!(
        "{} {} of {} into {}",
        layer.layer_type, layer.quantity, layer.product, layer.warehouse
    );
    balanced(
        ctx,
        layer.acquisition_date,
        description,
        &accounts.inventory,
        credit,
        layer.base_total_cost,
        metadata,
    )
}

/// Dr Inventory, Cr landed cost clearing for an allocated landed cost.
#[must_use]
pub fn post_landed_cost(
    landed: &LandedCost,
    allocations: &[LandedCostAllocation],
    ctx: &CostingContext,
    accounts: &AccountRefs,
) -> PostingRequest {
    let amount: Decimal = allocations.iter().map(|a| a.amount).sum();
    let mut metadata = PostingMetadata::new(ctx.tenant.clone(), PostingKind::LandedCost);
    metadata.source_ref = Some(landed.source_ref.clone());
    metadata.layer_ids = allocations.iter().map(|a| a.layer).collect();
    metadata.landed_cost = Some(landed.id);

    balanced(
        ctx,
        landed.date,
        format!("Landed cost {} allocated", landed.source_ref),
        &accounts.inventory,
        &accounts.landed_cost_clearing,
        amount,
        metadata,
    )
}

/// Post either side of an adjustment.
#[must_use]
pub fn post_adjustment(
    outcome: &AdjustmentOutcome,
    ctx: &CostingContext,
    accounts: &AccountRefs,
) -> PostingRequest {
    match outcome {
        AdjustmentOutcome::Increase { layer } => post_receipt(layer, ctx, accounts),
        AdjustmentOutcome::Decrease { consumption } => post_consumption(consumption, ctx, accounts),
    }
}

/// Write-up: Dr Inventory, Cr adjustment. Write-down: the reverse.
#[must_use]
pub fn post_revaluation(
    outcome: &RevaluationOutcome,
    ctx: &CostingContext,
    accounts: &AccountRefs,
) -> PostingRequest {
    let (debit, credit) = if outcome.value_change.is_sign_negative() {
        (&accounts.inventory_adjustment, &accounts.inventory)
    } else {
        (&accounts.inventory, &accounts.inventory_adjustment)
    };

    let mut metadata = PostingMetadata::new(ctx.tenant.clone(), PostingKind::Revaluation);
    metadata.product = Some(outcome.product.clone());
    metadata.warehouse = Some(outcome.warehouse.clone());
    metadata.source_ref = (!outcome.reason.is_empty()).then(|| outcome.reason.clone());
    metadata.layer_ids = vec![outcome.layer];
    metadata.quantity = Some(outcome.quantity_remaining);
    metadata.unit_cost = Some(outcome.new_unit_cost);

    balanced(
        ctx,
        outcome.date,
        format!(
            "Revalue layer {} from {} to {}",
            outcome.layer, outcome.old_unit_cost, outcome.new_unit_cost
        ),
        debit,
        credit,
        outcome.value_change.abs(),
        metadata,
    )
}
