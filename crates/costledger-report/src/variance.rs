//! Unit cost variance over acquisitions in a date range.

use chrono::{Datelike, NaiveDate};
use costledger_core::{CostLayer, CostingContext, LayerId, LayerType, ProductId, WarehouseId};
use costledger_store::LedgerState;
use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::ReportError;

/// Percentage change between consecutive layers that counts as volatile.
const VOLATILE_CHANGE: Decimal = Decimal::TEN;

/// Volatility rating from the coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    /// CV up to 5%.
    Low,
    /// CV up to 15%.
    Moderate,
    /// CV up to 30%.
    High,
    /// CV above 30%.
    VeryHigh,
}

impl Volatility {
    /// Rate a coefficient of variation given in percent.
    #[must_use]
    pub fn from_cv(cv: Decimal) -> Self {
        if cv <= Decimal::from(5) {
            Self::Low
        } else if cv <= Decimal::from(15) {
            Self::Moderate
        } else if cv <= Decimal::from(30) {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
            Self::VeryHigh => write!(f, "VERY_HIGH"),
        }
    }
}

/// Direction of the first-to-last cost change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Later layers cost more.
    Increasing,
    /// Later layers cost less.
    Decreasing,
    /// No change.
    Stable,
}

/// Summary statistics of unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostStatistics {
    /// Layers acquired in the range.
    pub layer_count: usize,
    /// Units acquired in the range.
    pub total_quantity: Decimal,
    /// Lowest unit cost.
    pub min: Decimal,
    /// Highest unit cost.
    pub max: Decimal,
    /// Plain mean of unit costs.
    pub mean: Decimal,
    /// Mean weighted by acquired quantity.
    pub weighted_mean: Decimal,
    /// Population standard deviation.
    pub std_dev: Decimal,
    /// `std_dev / mean` as a percentage.
    pub coefficient_of_variation: Decimal,
    /// `max - min`.
    pub range: Decimal,
    /// `range / min` as a percentage.
    pub range_percentage: Decimal,
    /// Rating from the coefficient of variation.
    pub volatility: Volatility,
}

/// First-to-last movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostTrend {
    /// Unit cost of the earliest layer.
    pub first_unit_cost: Decimal,
    /// Unit cost of the latest layer.
    pub last_unit_cost: Decimal,
    /// Change as a percentage of the first.
    pub change_percentage: Decimal,
    /// Direction.
    pub direction: TrendDirection,
}

/// A jump of more than 10% between consecutive layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolatilePeriod {
    /// Earlier layer.
    pub from_layer: LayerId,
    /// Later layer.
    pub to_layer: LayerId,
    /// Earlier acquisition date.
    pub from_date: NaiveDate,
    /// Later acquisition date.
    pub to_date: NaiveDate,
    /// Earlier unit cost.
    pub from_unit_cost: Decimal,
    /// Later unit cost.
    pub to_unit_cost: Decimal,
    /// Signed change as a percentage of the earlier cost.
    pub change_percentage: Decimal,
}

/// Acquisitions in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCost {
    /// `YYYY-MM`.
    pub month: String,
    /// Layers acquired.
    pub layer_count: usize,
    /// Units acquired.
    pub quantity: Decimal,
    /// Quantity-weighted average unit cost.
    pub average_unit_cost: Decimal,
}

/// Cost variance of a product over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarianceReport {
    /// Product.
    pub product: ProductId,
    /// Warehouse filter, if any.
    pub warehouse: Option<WarehouseId>,
    /// Range start, inclusive.
    pub start: NaiveDate,
    /// Range end, inclusive.
    pub end: NaiveDate,
    /// `None` when nothing was acquired in the range.
    pub statistics: Option<CostStatistics>,
    /// `None` with fewer than two layers.
    pub trend: Option<CostTrend>,
    /// Consecutive layers whose cost moved more than 10%.
    pub volatile_periods: Vec<VolatilePeriod>,
    /// Per-month averages, oldest first.
    pub monthly: Vec<MonthlyCost>,
}

/// Unit cost statistics over layers of `product` acquired in `start..=end`.
///
/// Unit cost is the effective cost including landed costs. Transfer-in
/// layers restate costs already counted at the source and are left out.
pub fn cost_variance(
    state: &LedgerState,
    ctx: &CostingContext,
    product: &ProductId,
    warehouse: Option<&WarehouseId>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<VarianceReport, ReportError> {
    if start > end {
        return Err(ReportError::InvalidRange { start, end });
    }

    let mut layers: Vec<&CostLayer> = state
        .product_layers(&ctx.tenant, product, warehouse)
        .filter(|l| {
            l.layer_type != LayerType::TransferIn
                && l.acquisition_date >= start
                && l.acquisition_date <= end
        })
        .collect();
    layers.sort_by_key(|l| (l.acquisition_date, l.id));

    let costs: Vec<(&CostLayer, Decimal)> = layers
        .iter()
        .map(|&l| (l, ctx.rounding.unit_cost(l.effective_unit_cost())))
        .collect();

    Ok(VarianceReport {
        product: product.clone(),
        warehouse: warehouse.cloned(),
        start,
        end,
        statistics: statistics(&costs, ctx),
        trend: trend(&costs, ctx),
        volatile_periods: volatile_periods(&costs, ctx),
        monthly: monthly(&costs, ctx),
    })
}

fn statistics(costs: &[(&CostLayer, Decimal)], ctx: &CostingContext) -> Option<CostStatistics> {
    let r = &ctx.rounding;
    let first = costs.first()?.1;
    let n = Decimal::from(costs.len());

    let (mut min, mut max, mut sum) = (first, first, Decimal::ZERO);
    let (mut quantity, mut weighted) = (Decimal::ZERO, Decimal::ZERO);
    for &(layer, cost) in costs {
        min = min.min(cost);
        max = max.max(cost);
        sum += cost;
        quantity += layer.quantity;
        weighted += cost * layer.quantity;
    }
    let mean = sum / n;
    let variance = costs
        .iter()
        .map(|&(_, cost)| (cost - mean) * (cost - mean))
        .sum::<Decimal>()
        / n;
    let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);
    let cv = r.percentage(std_dev, mean);
    let range = max - min;

    Some(CostStatistics {
        layer_count: costs.len(),
        total_quantity: quantity,
        min,
        max,
        mean: r.unit_cost(mean),
        weighted_mean: r.unit_cost(weighted / quantity),
        std_dev: r.unit_cost(std_dev),
        coefficient_of_variation: cv,
        range,
        range_percentage: r.percentage(range, min),
        volatility: Volatility::from_cv(cv),
    })
}

fn trend(costs: &[(&CostLayer, Decimal)], ctx: &CostingContext) -> Option<CostTrend> {
    if costs.len() < 2 {
        return None;
    }
    let first = costs.first()?.1;
    let last = costs.last()?.1;
    let change = last - first;
    Some(CostTrend {
        first_unit_cost: first,
        last_unit_cost: last,
        change_percentage: ctx.rounding.percentage(change, first),
        direction: match change.cmp(&Decimal::ZERO) {
            std::cmp::Ordering::Greater => TrendDirection::Increasing,
            std::cmp::Ordering::Less => TrendDirection::Decreasing,
            std::cmp::Ordering::Equal => TrendDirection::Stable,
        },
    })
}

fn volatile_periods(costs: &[(&CostLayer, Decimal)], ctx: &CostingContext) -> Vec<VolatilePeriod> {
    costs
        .windows(2)
        .filter_map(|pair| {
            let (prev, prev_cost) = pair[0];
            let (next, next_cost) = pair[1];
            if prev_cost.is_zero() {
                return None;
            }
            let change = ctx.rounding.percentage(next_cost - prev_cost, prev_cost);
            (change.abs() > VOLATILE_CHANGE).then(|| VolatilePeriod {
                from_layer: prev.id,
                to_layer: next.id,
                from_date: prev.acquisition_date,
                to_date: next.acquisition_date,
                from_unit_cost: prev_cost,
                to_unit_cost: next_cost,
                change_percentage: change,
            })
        })
        .collect()
}

fn monthly(costs: &[(&CostLayer, Decimal)], ctx: &CostingContext) -> Vec<MonthlyCost> {
    let mut months: BTreeMap<(i32, u32), (usize, Decimal, Decimal)> = BTreeMap::new();
    for &(layer, cost) in costs {
        let date = layer.acquisition_date;
        let entry = months.entry((date.year(), date.month())).or_default();
        entry.0 += 1;
        entry.1 += layer.quantity;
        entry.2 += cost * layer.quantity;
    }
    months
        .into_iter()
        .map(|((year, month), (count, quantity, weighted))| MonthlyCost {
            month: format!("{year:04}-{month:02}"),
            layer_count: count,
            quantity,
            average_unit_cost: ctx.rounding.unit_cost(weighted / quantity),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use costledger_core::Receipt;
    use costledger_store::LayerStore;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn store_with(costs: &[(Decimal, Decimal, NaiveDate)]) -> (LayerStore, CostingContext) {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme");
        for &(qty, cost, on) in costs {
            store
                .create_layer(&ctx, &Receipt::new("W", "MAIN", qty, cost, on))
                .unwrap();
        }
        (store, ctx)
    }

    #[test]
    fn test_statistics() {
        let (store, ctx) = store_with(&[
            (dec!(10), dec!(4), date(2024, 1, 5)),
            (dec!(30), dec!(6), date(2024, 1, 20)),
            (dec!(10), dec!(5), date(2024, 2, 3)),
        ]);
        let report = store
            .read(|s| {
                cost_variance(s, &ctx, &ProductId::from("W"), None, date(2024, 1, 1), date(2024, 12, 31))
            })
            .unwrap();
        let stats = report.statistics.unwrap();

        assert_eq!(stats.layer_count, 3);
        assert_eq!(stats.min, dec!(4));
        assert_eq!(stats.max, dec!(6));
        assert_eq!(stats.mean, dec!(5));
        assert_eq!(stats.weighted_mean, dec!(5.4));
        // sqrt(2/3)
        assert_eq!(stats.std_dev, dec!(0.8165));
        assert_eq!(stats.coefficient_of_variation, dec!(16.3299));
        assert_eq!(stats.volatility, Volatility::High);
        assert_eq!(stats.range, dec!(2));
        assert_eq!(stats.range_percentage, dec!(50));

        let trend = report.trend.unwrap();
        assert_eq!(trend.change_percentage, dec!(25));
        assert_eq!(trend.direction, TrendDirection::Increasing);

        assert_eq!(report.volatile_periods.len(), 2);
        assert_eq!(report.volatile_periods[1].change_percentage, dec!(-16.6667));

        assert_eq!(report.monthly.len(), 2);
        assert_eq!(report.monthly[0].month, "2024-01");
        assert_eq!(report.monthly[0].average_unit_cost, dec!(5.5));
    }

    #[test]
    fn test_single_layer_has_no_trend() {
        let (store, ctx) = store_with(&[(dec!(1), dec!(3), date(2024, 3, 1))]);
        let report = store
            .read(|s| {
                cost_variance(s, &ctx, &ProductId::from("W"), None, date(2024, 1, 1), date(2024, 12, 31))
            })
            .unwrap();
        let stats = report.statistics.unwrap();
        assert_eq!(stats.std_dev, Decimal::ZERO);
        assert_eq!(stats.volatility, Volatility::Low);
        assert!(report.trend.is_none());
    }

    #[test]
    fn test_empty_range() {
        let (store, ctx) = store_with(&[(dec!(1), dec!(3), date(2024, 3, 1))]);
        let report = store
            .read(|s| {
                cost_variance(s, &ctx, &ProductId::from("W"), None, date(2025, 1, 1), date(2025, 2, 1))
            })
            .unwrap();
        assert!(report.statistics.is_none());
        assert!(report.monthly.is_empty());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let (store, ctx) = store_with(&[]);
        let err = store
            .read(|s| {
                cost_variance(s, &ctx, &ProductId::from("W"), None, date(2025, 1, 1), date(2024, 1, 1))
            })
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidRange { .. }));
    }

    #[test]
    fn test_volatility_thresholds() {
        assert_eq!(Volatility::from_cv(dec!(5)), Volatility::Low);
        assert_eq!(Volatility::from_cv(dec!(5.01)), Volatility::Moderate);
        assert_eq!(Volatility::from_cv(dec!(15)), Volatility::Moderate);
        assert_eq!(Volatility::from_cv(dec!(30)), Volatility::High);
        assert_eq!(Volatility::from_cv(dec!(30.0001)), Volatility::VeryHigh);
        assert_eq!(Volatility::VeryHigh.to_string(), "VERY_HIGH");
    }
}
