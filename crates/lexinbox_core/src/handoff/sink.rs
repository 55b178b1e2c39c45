//! Note-store handoff.

use crate::handoff::enrich::EnrichedCard;
use crate::model::item::NormalizedItem;
use crate::repo::ledger_repo::LedgerError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Everything the downstream store receives for one accepted item.
#[derive(Debug, Clone, Copy)]
pub struct PersistRequest<'a> {
    pub item: &'a NormalizedItem,
    pub card: &'a EnrichedCard,
    pub source_tag: Option<&'a str>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Recorded,
    /// Another writer recorded this lemma first; nothing was written.
    AlreadyRecorded,
}

#[derive(Debug)]
pub enum SinkError {
    Ledger(LedgerError),
    Rejected(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Rejected(message) => write!(f, "note store rejected card: {message}"),
        }
    }
}

impl Error for SinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl From<LedgerError> for SinkError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// Write-of-record for enriched cards; owns the ledger.
pub trait NoteSink {
    fn persist(&self, request: &PersistRequest<'_>) -> Result<PersistOutcome, SinkError>;
}
