//! The general-ledger collaborator seam and an in-memory implementation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::{PostingError, PostingRequest};

/// Identifier the ledger assigns to an accepted posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostingId(pub u64);

impl fmt::Display for PostingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JE{}", self.0)
    }
}

/// The bookkeeping ledger postings are submitted to.
///
/// Implementations own the double-entry balance check, account balances
/// and period locks.
pub trait GeneralLedger {
    /// Accept or reject a posting.
    fn submit(&mut self, request: &PostingRequest) -> Result<PostingId, PostingError>;

    /// Debit-positive balance of `account` as of a date.
    fn balance(&self, account: &str, as_of: NaiveDate) -> Decimal;
}

/// An accepted posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    /// Assigned id.
    pub id: PostingId,
    /// The posting.
    pub request: PostingRequest,
}

/// A general ledger that keeps postings in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    entries: Vec<JournalEntry>,
}

impl InMemoryJournal {
    /// An empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted postings, in submission order.
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of accepted postings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been posted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeneralLedger for InMemoryJournal {
    fn submit(&mut self, request: &PostingRequest) -> Result<PostingId, PostingError> {
        if let Err(e) = request.validate() {
            warn!(error = %e, description = %request.description, "posting rejected");
            return Err(e);
        }
        let id = PostingId(self.entries.len() as u64 + 1);
        debug!(%id, kind = %request.metadata.kind, amount = %request.total_debits(), "posted");
        self.entries.push(JournalEntry {
            id,
            request: request.clone(),
        });
        Ok(id)
    }

    fn balance(&self, account: &str, as_of: NaiveDate) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.request.date <= as_of)
            .map(|e| e.request.net_change(account))
            .sum()
    }
}
