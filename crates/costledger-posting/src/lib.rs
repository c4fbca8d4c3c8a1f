//! Ledger posting adapter.
//!
//! Turns receipts, consumptions, landed cost allocations, adjustments and
//! revaluations into balanced [`PostingRequest`]s for an external general
//! ledger. The adapter never looks accounts up: the caller resolves an
//! [`AccountRefs`] once and passes it in.
//!
//! The [`GeneralLedger`] trait is the seam to the bookkeeping system;
//! [`InMemoryJournal`] implements it for tools and tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod journal;
mod request;

pub use adapter::{
    post_adjustment, post_consumption, post_landed_cost, post_receipt, post_revaluation,
};
pub use journal::{GeneralLedger, InMemoryJournal, JournalEntry, PostingId};
pub use request::{AccountRefs, PostingKind, PostingLine, PostingMetadata, PostingRequest};

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a general ledger rejects a posting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingError {
    /// Debits and credits differ.
    #[error("unbalanced posting: debits {debits}, credits {credits}")]
    Unbalanced {
        /// Sum of debits.
        debits: Decimal,
        /// Sum of credits.
        credits: Decimal,
    },

    /// A line carries a negative amount.
    #[error("negative amount on account {account}")]
    NegativeAmount {
        /// The offending account.
        account: String,
    },

    /// A posting needs at least a debit and a credit.
    #[error("posting has {lines} line(s), at least 2 required")]
    TooFewLines {
        /// Number of lines present.
        lines: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use costledger_booking::{CostingEngine, LandedCostAllocator};
    use costledger_core::{
        Adjustment, AllocationMethod, CostComponents, CostingContext, Depletion, LandedCostEvent,
        LayerId, ProductId, Receipt, Revaluation, TenantId, WarehouseId,
    };
    use costledger_store::LayerStore;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn request(lines: Vec<PostingLine>) -> PostingRequest {
        PostingRequest {
            date: date(2024, 1, 1),
            description: "test".to_string(),
            currency: "USD".to_string(),
            lines,
            metadata: PostingMetadata::new(TenantId::from("acme"), PostingKind::Receipt),
        }
    }

    #[test]
    fn test_journal_rejects_unbalanced() {
        let mut journal = InMemoryJournal::new();
        let err = journal
            .submit(&request(vec![
                PostingLine::debit("A", dec!(10)),
                PostingLine::credit("B", dec!(9.99)),
            ]))
            .unwrap_err();
        assert_eq!(
            err,
            PostingError::Unbalanced {
                debits: dec!(10),
                credits: dec!(9.99),
            }
        );
        assert!(journal.is_empty());
    }

    #[test]
    fn test_journal_rejects_malformed() {
        let mut journal = InMemoryJournal::new();
        assert_eq!(
            journal.submit(&request(vec![PostingLine::debit("A", Decimal::ZERO)])),
            Err(PostingError::TooFewLines { lines: 1 })
        );
        assert!(matches!(
            journal.submit(&request(vec![
                PostingLine::debit("A", dec!(-1)),
                PostingLine::credit("B", dec!(-1)),
            ])),
            Err(PostingError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_receipt_and_consumption_postings() {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme");
        let accounts = AccountRefs::default();
        let engine = CostingEngine::new(&store);
        let mut journal = InMemoryJournal::new();

        for (cost, day) in [(dec!(5), 1), (dec!(7), 2)] {
            let layer = engine
                .receive(
                    &ctx,
                    &Receipt::new("W", "MAIN", dec!(10), cost, date(2024, 1, day))
                        .with_source("PO-1"),
                )
                .unwrap();
            let posting = post_receipt(&layer, &ctx, &accounts);
            assert!(posting.is_balanced());
            assert_eq!(posting.lines[0].account, accounts.inventory);
            assert_eq!(posting.lines[1].account, accounts.payable_in_transit);
            journal.submit(&posting).unwrap();
        }

        let result = engine
            .consume(
                &ctx,
                &Depletion::new("W", "MAIN", dec!(12), date(2024, 1, 3)).with_source("SO-9"),
            )
            .unwrap();
        let posting = post_consumption(&result, &ctx, &accounts);
        assert_eq!(posting.lines[0], PostingLine::debit(&accounts.cogs, dec!(64)));
        assert_eq!(posting.lines[1], PostingLine::credit(&accounts.inventory, dec!(64)));
        assert_eq!(posting.metadata.kind, PostingKind::Consumption);
        assert_eq!(posting.metadata.source_ref.as_deref(), Some("SO-9"));
        assert_eq!(posting.metadata.layer_ids, vec![LayerId(1), LayerId(2)]);
        journal.submit(&posting).unwrap();

        assert_eq!(journal.balance(&accounts.inventory, date(2024, 12, 31)), dec!(56));
        assert_eq!(journal.balance(&accounts.inventory, date(2024, 1, 1)), dec!(50));
        assert_eq!(journal.balance(&accounts.cogs, date(2024, 12, 31)), dec!(64));
    }

    #[test]
    fn test_landed_cost_posting() {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme");
        let accounts = AccountRefs::default();
        CostingEngine::new(&store)
            .receive(&ctx, &Receipt::new("W", "MAIN", dec!(10), dec!(5), date(2024, 1, 1)))
            .unwrap();
        let allocator = LandedCostAllocator::new(&store);
        let landed = allocator
            .register(
                &ctx,
                &LandedCostEvent {
                    source_ref: "FRT-1".to_string(),
                    date: date(2024, 1, 4),
                    total_amount: Some(dec!(12.50)),
                    components: CostComponents::default(),
                    allocation_method: AllocationMethod::Quantity,
                },
            )
            .unwrap();
        let allocations = allocator
            .allocate(&ctx, landed.id, &[LayerId(1)], None)
            .unwrap();

        let posting = post_landed_cost(&landed, &allocations, &ctx, &accounts);
        assert_eq!(posting.total_debits(), dec!(12.50));
        assert_eq!(posting.lines[1].account, accounts.landed_cost_clearing);
        assert_eq!(posting.metadata.landed_cost, Some(landed.id));
    }

    #[test]
    fn test_adjustment_and_revaluation_postings() {
        let store = LayerStore::new();
        let ctx = CostingContext::new("acme");
        let accounts = AccountRefs::default();
        let engine = CostingEngine::new(&store);
        engine
            .receive(&ctx, &Receipt::new("W", "MAIN", dec!(10), dec!(5), date(2024, 1, 1)))
            .unwrap();

        let decrease = engine
            .adjust(
                &ctx,
                &Adjustment {
                    product: ProductId::from("W"),
                    warehouse: WarehouseId::from("MAIN"),
                    quantity_change: dec!(-2),
                    unit_cost: None,
                    date: date(2024, 1, 2),
                    reason: "shrinkage".to_string(),
                },
            )
            .unwrap();
        let posting = post_adjustment(&decrease, &ctx, &accounts);
        assert_eq!(posting.metadata.kind, PostingKind::AdjustmentDecrease);
        assert_eq!(
            posting.lines[0],
            PostingLine::debit(&accounts.inventory_adjustment, dec!(10))
        );

        let down = engine
            .revalue(
                &ctx,
                &Revaluation {
                    layer: LayerId(1),
                    new_unit_cost: dec!(4),
                    date: date(2024, 1, 3),
                    reason: "market".to_string(),
                },
            )
            .unwrap();
        let posting = post_revaluation(&down, &ctx, &accounts);
        assert_eq!(
            posting.lines[1],
            PostingLine::credit(&accounts.inventory, dec!(8))
        );
        assert!(posting.validate().is_ok());
    }
}
