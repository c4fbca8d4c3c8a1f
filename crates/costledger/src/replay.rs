//! Replaying an event file into a fresh ledger.
//!
//! Every event goes through the costing engine or the landed cost
//! allocator, and whatever it commits is posted to an [`InMemoryJournal`].
//! The first event that fails stops the replay.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use costledger_booking::{CostingEngine, LandedCostAllocator};
use costledger_core::CostingContext;
use costledger_loader::{CostEvent, EventRecord, Options};
use costledger_posting::{
    post_adjustment, post_consumption, post_landed_cost, post_receipt, post_revaluation,
    AccountRefs, GeneralLedger, InMemoryJournal, PostingId, PostingRequest,
};
use costledger_store::LayerStore;
use tracing::debug;

/// A ledger built by replaying events, with its journal.
#[derive(Debug)]
pub struct Replay {
    /// Costing context from the options.
    pub ctx: CostingContext,
    /// Accounts postings go to.
    pub accounts: AccountRefs,
    /// The cost layers.
    pub store: LayerStore,
    /// Accepted postings.
    pub journal: InMemoryJournal,
    /// Latest date carried by any replayed event.
    pub last_date: Option<NaiveDate>,
}

impl Replay {
    /// An empty ledger configured by `options`.
    #[must_use]
    pub fn new(options: &Options) -> Self {
        Self {
            ctx: options.context(),
            accounts: options.accounts(),
            store: LayerStore::new(),
            journal: InMemoryJournal::new(),
            last_date: None,
        }
    }

    /// Replay `records` in order.
    pub fn run(&mut self, records: &[EventRecord]) -> Result<()> {
        for record in records {
            self.apply(&record.event)
                .with_context(|| format!("line {}: {} event failed", record.line, record.event.kind()))?;
        }
        debug!(
            events = records.len(),
            postings = self.journal.len(),
            "replay finished"
        );
        Ok(())
    }

    /// Apply one event and post what it committed.
    pub fn apply(&mut self, event: &CostEvent) -> Result<Vec<PostingId>> {
        if let Some(date) = event_date(event) {
            self.last_date = Some(self.last_date.map_or(date, |last| last.max(date)));
        }

        let ctx = &self.ctx;
        let accounts = &self.accounts;
        let engine = CostingEngine::new(&self.store);
        let allocator = LandedCostAllocator::new(&self.store);

        let requests = match event {
            CostEvent::Receipt(receipt) => {
                let layer = engine.receive(ctx, receipt)?;
                vec![post_receipt(&layer, ctx, accounts)]
            }
            CostEvent::Depletion(depletion) => {
                let result = engine.consume(ctx, depletion)?;
                vec![post_consumption(&result, ctx, accounts)]
            }
            CostEvent::LandedCost(landed) => {
                allocator.register(ctx, landed)?;
                Vec::new()
            }
            CostEvent::AllocateLandedCost {
                landed_cost,
                targets,
                method,
            } => {
                let allocations = allocator.allocate(ctx, *landed_cost, targets, *method)?;
                let landed = self
                    .store
                    .read(|state| state.landed_cost(&ctx.tenant, *landed_cost).cloned())
                    .with_context(|| format!("landed cost {landed_cost} vanished after allocation"))?;
                vec![post_landed_cost(&landed, &allocations, ctx, accounts)]
            }
            CostEvent::CancelLandedCost { landed_cost } => {
                allocator.cancel(ctx, *landed_cost)?;
                Vec::new()
            }
            CostEvent::Adjustment(adjustment) => {
                let outcome = engine.adjust(ctx, adjustment)?;
                vec![post_adjustment(&outcome, ctx, accounts)]
            }
            CostEvent::Transfer(transfer) => {
                let outcome = engine.transfer(ctx, transfer)?;
                vec![
                    post_consumption(&outcome.consumption, ctx, accounts),
                    post_receipt(&outcome.layer, ctx, accounts),
                ]
            }
            CostEvent::Revaluation(revaluation) => {
                let outcome = engine.revalue(ctx, revaluation)?;
                if outcome.value_change.is_zero() {
                    Vec::new()
                } else {
                    vec![post_revaluation(&outcome, ctx, accounts)]
                }
            }
        };

        requests
            .iter()
            .map(|request| submit(&mut self.journal, request))
            .collect()
    }

    /// `last_date`, or today when nothing dated was replayed.
    #[must_use]
    pub fn default_as_of(&self) -> NaiveDate {
        self.last_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

fn submit(journal: &mut InMemoryJournal, request: &PostingRequest) -> Result<PostingId> {
    journal
        .submit(request)
        .with_context(|| format!("ledger rejected posting \"{}\"", request.description))
}

const fn event_date(event: &CostEvent) -> Option<NaiveDate> {
    match event {
        CostEvent::Receipt(r) => Some(r.acquisition_date),
        CostEvent::Depletion(d) => Some(d.date),
        CostEvent::LandedCost(l) => Some(l.date),
        CostEvent::Adjustment(a) => Some(a.date),
        CostEvent::Transfer(t) => Some(t.date),
        CostEvent::Revaluation(r) => Some(r.date),
        CostEvent::AllocateLandedCost { .. } | CostEvent::CancelLandedCost { .. } => None,
    }
}
