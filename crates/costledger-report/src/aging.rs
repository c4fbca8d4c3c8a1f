//! Inventory aging.
//!
//! Remaining value is bucketed by layer age in days. Buckets are half-open
//! day ranges `[min_days, max_days)` that partition every non-negative age,
//! so each layer's value lands in exactly one bucket.

use chrono::NaiveDate;
use costledger_core::{CostingContext, LayerId, ProductId, WarehouseId};
use costledger_store::LedgerState;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ReportError;

/// One age range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingBucket {
    /// Display label.
    pub label: String,
    /// Inclusive lower bound in days.
    pub min_days: i64,
    /// Exclusive upper bound in days; `None` for the last bucket.
    pub max_days: Option<i64>,
}

impl AgingBucket {
    /// A bucket covering `[min_days, max_days)`.
    pub fn new(label: impl Into<String>, min_days: i64, max_days: Option<i64>) -> Self {
        Self {
            label: label.into(),
            min_days,
            max_days,
        }
    }

    fn contains(&self, age: i64) -> bool {
        age >= self.min_days && self.max_days.map_or(true, |max| age < max)
    }
}

/// A validated set of buckets partitioning all ages from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AgingBuckets(Vec<AgingBucket>);

impl AgingBuckets {
    /// Validate caller-supplied buckets.
    ///
    /// The first must start at 0, each must start where the previous one
    /// ended, none may be empty and only the last may be unbounded.
    pub fn new(buckets: Vec<AgingBucket>) -> Result<Self, ReportError> {
        let invalid = |reason: String| Err(ReportError::InvalidBuckets { reason });

        let Some(first) = buckets.first() else {
            return invalid("at least one bucket is required".to_string());
        };
        if first.min_days != 0 {
            return invalid(format!("first bucket starts at {} days, not 0", first.min_days));
        }

        for (i, bucket) in buckets.iter().enumerate() {
            let is_last = i + 1 == buckets.len();
            match bucket.max_days {
                None if !is_last => {
                    return invalid(format!("bucket '{}' is unbounded but not last", bucket.label));
                }
                None => {}
                Some(_) if is_last => {
                    return invalid(format!("last bucket '{}' must be unbounded", bucket.label));
                }
                Some(max) if max <= bucket.min_days => {
                    return invalid(format!("bucket '{}' is empty", bucket.label));
                }
                Some(max) => {
                    let next = &buckets[i + 1];
                    if next.min_days != max {
                        return invalid(format!(
                            "bucket '{}' ends at {max} days but '{}' starts at {}",
                            bucket.label, next.label, next.min_days
                        ));
                    }
                }
            }
        }
        Ok(Self(buckets))
    }

    /// Buckets from ascending period ends in days.
    ///
    /// `[30, 60, 90]` gives: current (0 days), 1-30, 31-60, 61-90, over 90.
    pub fn from_periods(periods: &[i64]) -> Result<Self, ReportError> {
        let mut buckets = vec![AgingBucket::new("current", 0, Some(1))];
        let mut start = 1;
        for &end in periods {
            if end < start {
                return Err(ReportError::InvalidBuckets {
                    reason: format!("period ends must be ascending and positive, got {end}"),
                });
            }
            buckets.push(AgingBucket::new(
                format!("{start}-{end} days"),
                start,
                Some(end + 1),
            ));
            start = end + 1;
        }
        let label = match periods.last() {
            Some(last) => format!("over {last} days"),
            None => "over 0 days".to_string(),
        };
        buckets.push(AgingBucket::new(label, start, None));
        Self::new(buckets)
    }

    /// The buckets, youngest first.
    #[must_use]
    pub fn as_slice(&self) -> &[AgingBucket] {
        &self.0
    }

    /// Index of the bucket holding `age`.
    ///
    /// Negative ages fall into the first bucket.
    #[must_use]
    pub fn index_of(&self, age: i64) -> usize {
        self.0
            .iter()
            .position(|b| b.contains(age.max(0)))
            .unwrap_or(self.0.len() - 1)
    }
}

impl Default for AgingBuckets {
    /// Current, 1-30, 31-60, 61-90, 91-180 and over 180 days.
    fn default() -> Self {
        Self(vec![
            AgingBucket::new("current", 0, Some(1)),
            AgingBucket::new("1-30 days", 1, Some(31)),
            AgingBucket::new("31-60 days", 31, Some(61)),
            AgingBucket::new("61-90 days", 61, Some(91)),
            AgingBucket::new("91-180 days", 91, Some(181)),
            AgingBucket::new("over 180 days", 181, None),
        ])
    }
}

/// Totals for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingBucketTotal {
    /// The bucket.
    #[serde(flatten)]
    pub bucket: AgingBucket,
    /// Units in the bucket.
    pub quantity: Decimal,
    /// Value in the bucket.
    pub value: Decimal,
    /// Layers in the bucket.
    pub layer_count: usize,
    /// Share of total value.
    pub percentage: Decimal,
}

/// One layer's place in the aging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingDetail {
    /// Layer.
    pub layer: LayerId,
    /// Product.
    pub product: ProductId,
    /// Warehouse.
    pub warehouse: WarehouseId,
    /// Acquisition date.
    pub acquisition_date: NaiveDate,
    /// Age in days as of the report date.
    pub age_days: i64,
    /// Units remaining.
    pub quantity_remaining: Decimal,
    /// Current unit cost.
    pub unit_cost: Decimal,
    /// Remaining value.
    pub value: Decimal,
    /// Label of the bucket the layer falls in.
    pub bucket: String,
}

/// Remaining value by age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingReport {
    /// Report date.
    pub as_of: NaiveDate,
    /// Currency of every amount.
    pub currency: String,
    /// Bucket totals, youngest first.
    pub buckets: Vec<AgingBucketTotal>,
    /// Every layer with stock, oldest first.
    pub details: Vec<AgingDetail>,
    /// Units on hand.
    pub total_quantity: Decimal,
    /// Value on hand.
    pub total_value: Decimal,
    /// Age of the oldest layer with stock.
    pub oldest_age_days: Option<i64>,
    /// Average age weighted by value.
    pub weighted_average_age_days: Decimal,
    /// Threshold used for slow-moving value.
    pub slow_moving_days: i64,
    /// Value in buckets starting at or after `slow_moving_days`.
    pub slow_moving_value: Decimal,
}

/// Bucket the tenant's remaining inventory value by age as of `as_of`.
#[must_use]
pub fn aging_report(
    state: &LedgerState,
    ctx: &CostingContext,
    as_of: NaiveDate,
    buckets: &AgingBuckets,
    slow_moving_days: i64,
    warehouse: Option<&WarehouseId>,
) -> AgingReport {
    let mut layers: Vec<_> = state
        .tenant_layers(&ctx.tenant)
        .filter(|l| {
            l.quantity_remaining > Decimal::ZERO
                && l.acquisition_date <= as_of
                && warehouse.map_or(true, |w| &l.warehouse == w)
        })
        .collect();
    layers.sort_by_key(|l| (l.acquisition_date, l.id));

    let mut totals: Vec<AgingBucketTotal> = buckets
        .as_slice()
        .iter()
        .map(|bucket| AgingBucketTotal {
            bucket: bucket.clone(),
            quantity: Decimal::ZERO,
            value: Decimal::ZERO,
            layer_count: 0,
            percentage: Decimal::ZERO,
        })
        .collect();

    let mut details = Vec::with_capacity(layers.len());
    let mut age_weighted = Decimal::ZERO;
    for layer in layers {
        let age = layer.age_in_days(as_of);
        let value = layer.remaining_value();
        let total = &mut totals[buckets.index_of(age)];
        total.quantity += layer.quantity_remaining;
        total.value += value;
        total.layer_count += 1;
        age_weighted += Decimal::from(age) * value;

        details.push(AgingDetail {
            layer: layer.id,
            product: layer.product.clone(),
            warehouse: layer.warehouse.clone(),
            acquisition_date: layer.acquisition_date,
            age_days: age,
            quantity_remaining: layer.quantity_remaining,
            unit_cost: ctx.rounding.unit_cost(layer.current_unit_cost()),
            value,
            bucket: total.bucket.label.clone(),
        });
    }

    let total_value: Decimal = totals.iter().map(|t| t.value).sum();
    for total in &mut totals {
        total.percentage = ctx.rounding.percentage(total.value, total_value);
    }

    let weighted_average_age_days = if total_value.is_zero() {
        Decimal::ZERO
    } else {
        (age_weighted / total_value).round_dp(2)
    };

    AgingReport {
        as_of,
        currency: ctx.base_currency.clone(),
        total_quantity: totals.iter().map(|t| t.quantity).sum(),
        total_value,
        oldest_age_days: details.first().map(|d| d.age_days),
        weighted_average_age_days,
        slow_moving_days,
        slow_moving_value: totals
            .iter()
            .filter(|t| t.bucket.min_days >= slow_moving_days)
            .map(|t| t.value)
            .sum(),
        buckets: totals,
        details,
    }
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

    #[test]
    fn test_from_periods_matches_default() {
        assert_eq!(
            AgingBuckets::from_periods(&[30, 60, 90, 180]).unwrap(),
            AgingBuckets::default()
        );
    }

    #[test]
    fn test_bucket_boundaries() {
        let buckets = AgingBuckets::default();
        assert_eq!(buckets.index_of(0), 0);
        assert_eq!(buckets.index_of(1), 1);
        assert_eq!(buckets.index_of(30), 1);
        assert_eq!(buckets.index_of(31), 2);
        assert_eq!(buckets.index_of(180), 4);
        assert_eq!(buckets.index_of(181), 5);
        assert_eq!(buckets.index_of(10_000), 5);
    }

    #[test]
    fn test_invalid_buckets_rejected() {
        let gap = vec![
            AgingBucket::new("a", 0, Some(10)),
            AgingBucket::new("b", 11, None),
        ];
        assert!(matches!(
            AgingBuckets::new(gap),
            Err(ReportError::InvalidBuckets { .. })
        ));

        let bounded_last = vec![AgingBucket::new("a", 0, Some(10))];
        assert!(AgingBuckets::new(bounded_last).is_err());

        let late_start = vec![AgingBucket::new("a", 5, None)];
        assert!(AgingBuckets::new(late_start).is_err());

        let empty = vec![
            AgingBucket::new("a", 0, Some(0)),
            AgingBucket::new("b", 0, None),
        ];
        assert!(AgingBuckets::new(empty).is_err());

        assert!(AgingBuckets::new(Vec::new()).is_err());
        assert!(AgingBuckets::from_periods(&[60, 30]).is_err());
    }

    #[test]
    fn test_aging_report() {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme");
        for (qty, cost, on) in [
            (dec!(10), dec!(5), date(2024, 1, 1)),
            (dec!(5), dec!(4), date(2024, 5, 20)),
            (dec!(2), dec!(10), date(2024, 6, 30)),
        ] {
            store
                .create_layer(&ctx, &Receipt::new("W", "MAIN", qty, cost, on))
                .unwrap();
        }

        let report = store.read(|s| {
            aging_report(s, &ctx, date(2024, 6, 30), &AgingBuckets::default(), 90, None)
        });

        assert_eq!(report.total_value, dec!(90.00));
        assert_eq!(report.buckets[0].value, dec!(20.00));
        assert_eq!(report.buckets[2].value, dec!(20.00));
        assert_eq!(report.buckets[4].value, Decimal::ZERO);
        assert_eq!(report.buckets[5].value, dec!(50.00));
        assert_eq!(report.buckets[5].percentage, dec!(55.5556));
        assert_eq!(report.oldest_age_days, Some(181));
        assert_eq!(report.details[0].age_days, 181);
        assert_eq!(report.details[0].bucket, "over 180 days");
        assert_eq!(report.slow_moving_value, dec!(50.00));
        // (181 * 50 + 41 * 20 + 0 * 20) / 90
        assert_eq!(report.weighted_average_age_days, dec!(109.67));
    }
}
