//! Duplicate filter.
//!
//! # Responsibility
//! - Reject lemmas already in the ledger or accepted earlier in the batch.
//!
//! # Invariants
//! - Runs after normalization and before any enrichment call.
//! - Comparison uses [`crate::model::item::lemma_key`].
//! - A fresh filter over the same batch and ledger accepts the same items.

use crate::model::item::NormalizedItem;
use crate::repo::ledger_repo::{Ledger, LedgerResult};
use std::collections::HashSet;

/// Where a duplicate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateSource {
    /// Accepted earlier in this batch.
    Batch,
    /// Recorded by a previous run.
    Ledger,
}

impl DuplicateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Ledger => "ledger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Accept,
    Duplicate(DuplicateSource),
}

/// Batch-scoped filter over one ledger.
pub struct DuplicateFilter<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    accepted: HashSet<String>,
}

impl<'a, L: Ledger + ?Sized> DuplicateFilter<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self {
            ledger,
            accepted: HashSet::new(),
        }
    }

    /// Decides on one item; accepted keys are remembered for the rest of the batch.
    pub fn check(&mut self, item: &NormalizedItem) -> LedgerResult<DedupDecision> {
        let key = item.key();
        if self.accepted.contains(&key) {
            return Ok(DedupDecision::Duplicate(DuplicateSource::Batch));
        }
        if self.ledger.contains(&key)? {
            return Ok(DedupDecision::Duplicate(DuplicateSource::Ledger));
        }
        self.accepted.insert(key);
        Ok(DedupDecision::Accept)
    }

    pub fn accepted_len(&self) -> usize {
        self.accepted.len()
    }
}

/// Filters a whole batch, keeping order of first acceptance.
pub fn filter_batch<L: Ledger + ?Sized>(
    ledger: &L,
    items: &[NormalizedItem],
) -> LedgerResult<Vec<NormalizedItem>> {
    let mut filter = DuplicateFilter::new(ledger);
    let mut accepted = Vec::new();
    for item in items {
        if filter.check(item)? == DedupDecision::Accept {
            accepted.push(item.clone());
        }
    }
    Ok(accepted)
}
