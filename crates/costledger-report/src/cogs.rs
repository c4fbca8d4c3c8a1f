//! Cost of goods sold over a period.
//!
//! Only sales count. Adjustments and transfer-outs also consume layers but
//! never reach the COGS account.

use chrono::NaiveDate;
use costledger_core::{ConsumptionRecord, CostingContext, DepletionKind, ProductId, ValuationPolicy};
use costledger_store::LedgerState;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::ReportError;

/// COGS of one product over the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCogs {
    /// Product.
    pub product: ProductId,
    /// Cost charged to sales.
    pub total_cogs: Decimal,
    /// Units sold.
    pub total_quantity: Decimal,
    /// `total_cogs / total_quantity`, at unit cost scale.
    pub average_unit_cost: Decimal,
    /// Sales depletions that touched the product.
    pub transaction_count: usize,
}

/// COGS analysis for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CogsAnalysis {
    /// First day of the range.
    pub start: NaiveDate,
    /// Last day of the range, inclusive.
    pub end: NaiveDate,
    /// Currency of every amount.
    pub currency: String,
    /// Policy the ledger was costed under.
    pub valuation_policy: ValuationPolicy,
    /// Cost charged to sales across all products.
    pub total_cogs: Decimal,
    /// Units sold across all products.
    pub total_quantity: Decimal,
    /// Overall `total_cogs / total_quantity`.
    pub average_unit_cost: Decimal,
    /// Sales depletions across all products.
    pub transaction_count: usize,
    /// Per product, highest COGS first.
    pub products: Vec<ProductCogs>,
}

#[derive(Default)]
struct Totals {
    cogs: Decimal,
    quantity: Decimal,
    transactions: usize,
}

/// Summarize the cost of sales between `start` and `end`, inclusive.
///
/// One depletion writes one record per layer it draws from, all in a row.
/// A run of adjacent records with the same product, warehouse, date and
/// source document counts as one transaction.
///
/// # Errors
///
/// [`ReportError::InvalidRange`] if `start` is after `end`.
pub fn cogs_analysis(
    state: &LedgerState,
    ctx: &CostingContext,
    start: NaiveDate,
    end: NaiveDate,
    product: Option<&ProductId>,
) -> Result<CogsAnalysis, ReportError> {
    if start > end {
        return Err(ReportError::InvalidRange { start, end });
    }

    let mut groups: BTreeMap<&ProductId, Totals> = BTreeMap::new();
    let mut previous: Option<&ConsumptionRecord> = None;
    for record in state.consumptions().iter().filter(|c| {
        c.tenant == ctx.tenant
            && c.kind == DepletionKind::Sale
            && c.date >= start
            && c.date <= end
            && product.map_or(true, |p| &c.product == p)
    }) {
        let totals = groups.entry(&record.product).or_default();
        totals.cogs += record.total_cost;
        totals.quantity += record.quantity;
        if !previous.is_some_and(|p| same_depletion(p, record)) {
            totals.transactions += 1;
        }
        previous = Some(record);
    }

    let mut products: Vec<ProductCogs> = groups
        .into_iter()
        .map(|(product, totals)| ProductCogs {
            product: product.clone(),
            total_cogs: totals.cogs,
            total_quantity: totals.quantity,
            average_unit_cost: average(ctx, totals.cogs, totals.quantity),
            transaction_count: totals.transactions,
        })
        .collect();
    // stable, so equal COGS stay in product order
    products.sort_by(|a, b| b.total_cogs.cmp(&a.total_cogs));

    let total_cogs: Decimal = products.iter().map(|p| p.total_cogs).sum();
    let total_quantity: Decimal = products.iter().map(|p| p.total_quantity).sum();
    let transaction_count = products.iter().map(|p| p.transaction_count).sum();
    debug!(%start, %end, products = products.len(), %total_cogs, "analysed cost of sales");

    Ok(CogsAnalysis {
        start,
        end,
        currency: ctx.base_currency.clone(),
        valuation_policy: ctx.policy,
        total_cogs,
        total_quantity,
        average_unit_cost: average(ctx, total_cogs, total_quantity),
        transaction_count,
        products,
    })
}

fn same_depletion(a: &ConsumptionRecord, b: &ConsumptionRecord) -> bool {
    a.product == b.product
        && a.warehouse == b.warehouse
        && a.date == b.date
        && a.source_ref == b.source_ref
        && a.layer != b.layer
}

fn average(ctx: &CostingContext, value: Decimal, quantity: Decimal) -> Decimal {
    if quantity.is_zero() {
        Decimal::ZERO
    } else {
        ctx.rounding.unit_cost(value / quantity)
    }
}
