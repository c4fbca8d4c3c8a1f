//! Property-based tests for costledger-core.
//!
//! These tests verify invariants hold for arbitrary inputs using proptest.
//!
//! Run with: cargo test -p costledger-core --test `property_tests`

use chrono::NaiveDate;
use costledger_core::{apportion, CostLayer, LayerId, Receipt, Rounding, TenantId};
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_money() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

fn arb_weights() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 3)), 1..12)
}

fn arb_strategy() -> impl Strategy<Value = RoundingStrategy> {
    prop_oneof![
        Just(RoundingStrategy::MidpointAwayFromZero),
        Just(RoundingStrategy::MidpointNearestEven),
        Just(RoundingStrategy::ToZero),
        Just(RoundingStrategy::AwayFromZero),
    ]
}

// ============================================================================
// Apportionment
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Shares always sum to the total, whatever the weights or rounding.
    #[test]
    fn prop_apportion_sums_exactly(
        total in arb_money(),
        weights in arb_weights(),
        strategy in arb_strategy(),
        designated in 0usize..12,
    ) {
        let shares = apportion(total, &weights, None, designated, 2, strategy);
        prop_assert_eq!(shares.len(), weights.len());
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
        prop_assert!(shares.iter().all(|s| !s.is_sign_negative()));
    }

    /// With caps equal to the weights and a total within their sum, every
    /// share stays within its cap.
    #[test]
    fn prop_apportion_respects_caps(
        weights in arb_weights(),
        fraction in 1u32..=100u32,
        strategy in arb_strategy(),
    ) {
        let sum: Decimal = weights.iter().copied().sum();
        let total = (sum * Decimal::from(fraction) / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(3, RoundingStrategy::ToZero);
        let last = weights.len() - 1;
        let shares = apportion(total, &weights, Some(&weights), last, 3, strategy);
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
        for (share, cap) in shares.iter().zip(weights.iter()) {
            prop_assert!(!share.is_sign_negative());
            prop_assert!(share <= cap);
        }
    }
}

// ============================================================================
// Layer draining
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Consuming a layer in arbitrary slices charges exactly its total.
    #[test]
    fn prop_layer_drains_to_carrying_value(
        quantity in arb_quantity(),
        unit_cost in (0i64..1_000_000i64).prop_map(|n| Decimal::new(n, 4)),
        slices in prop::collection::vec(1u32..=100u32, 1..10),
    ) {
        let rounding = Rounding::default();
        let receipt = Receipt::new(
            "P",
            "W",
            quantity,
            unit_cost,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let mut layer =
            CostLayer::from_receipt(LayerId(1), TenantId::from("t"), "USD", &receipt, &rounding)
                .unwrap();
        let carrying = layer.carrying_value();

        for pct in slices {
            if layer.is_fully_consumed {
                break;
            }
            let take = rounding
                .quantity(layer.quantity_remaining * Decimal::from(pct) / Decimal::ONE_HUNDRED)
                .max(Decimal::new(1, 4))
                .min(layer.quantity_remaining);
            let cost = layer.cost_of(take, &rounding);
            layer.decrement(take, cost).unwrap();
            prop_assert!(layer.remaining_value() >= Decimal::ZERO);
        }
        if !layer.is_fully_consumed {
            let rest = layer.quantity_remaining;
            let cost = layer.cost_of(rest, &rounding);
            layer.decrement(rest, cost).unwrap();
        }
        prop_assert_eq!(layer.consumed_value, carrying);
        prop_assert_eq!(layer.quantity_remaining, Decimal::ZERO);
    }
}
