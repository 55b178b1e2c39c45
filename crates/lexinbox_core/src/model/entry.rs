//! Raw queue entry model.
//!
//! # Responsibility
//! - Represent one captured text item exactly as a capture client wrote it.
//!
//! # Invariants
//! - `raw_text` is trimmed and non-empty.
//! - Entries are immutable once parsed; only a committed run removes them from
//!   the active queue.

use serde::{Deserialize, Serialize};

/// One raw capture read from the canonical queue file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Captured text, already split out of multi-entry payloads.
    pub raw_text: String,
    /// Source-supplied timestamp (`ts`), kept as opaque text.
    pub timestamp: Option<String>,
    /// Free-form capture client tag (`src`).
    pub source_tag: Option<String>,
}

impl QueueEntry {
    /// Creates an entry without metadata.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            timestamp: None,
            source_tag: None,
        }
    }

    /// Attaches optional metadata carried on the same queue line.
    pub fn with_metadata(mut self, timestamp: Option<String>, source_tag: Option<String>) -> Self {
        self.timestamp = timestamp;
        self.source_tag = source_tag;
        self
    }
}
