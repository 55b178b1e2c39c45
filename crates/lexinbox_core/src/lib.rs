//! Core inbox ingestion and normalization pipeline for lexinbox.
//! This crate owns every queue, lock, dedup and rotation invariant.

pub mod config;
pub mod db;
pub mod handoff;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod store;

pub use config::{ConfigError, NormalizerConfig, PipelineConfig, PrecheckConfig};
pub use handoff::enrich::{
    parse_enrichment_response, EnrichError, EnrichedCard, Enricher, EnrichmentRequest,
};
pub use handoff::precheck::{Precheck, PrecheckFailure};
pub use handoff::sink::{NoteSink, PersistOutcome, PersistRequest, SinkError};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::entry::QueueEntry;
pub use model::item::{lemma_key, Normalization, NormalizedItem, RuleApplied, SkipReason};
pub use pipeline::coordinator::{
    FailureStage, ItemFailure, RotationOutcome, RunCoordinator, RunError, RunOptions, RunReport,
    RunResult, RunStatus,
};
pub use pipeline::dedupe::{filter_batch, DedupDecision, DuplicateFilter, DuplicateSource};
pub use pipeline::merge::{FragmentMerger, MergeReport};
pub use pipeline::normalize::LemmaNormalizer;
pub use pipeline::parse::{parse_line, parse_lines, read_entries, ParsedQueue};
pub use repo::ledger_repo::{Ledger, LedgerError, LedgerRecord, LedgerResult, SqliteLedger};
pub use store::{FileQueueStore, QueueStore, RetryPolicy, RotationStamps, RunLock, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
