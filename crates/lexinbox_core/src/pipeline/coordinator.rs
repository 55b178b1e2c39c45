//! Run coordinator.
//!
//! # Responsibility
//! - Drive one run: lock, precheck, merge, parse, normalize, dedupe, hand off,
//!   then commit or leave the queue for retry.
//!
//! # Invariants
//! - A held lock or failed precheck ends the run before any item is touched.
//! - The queue lines read by this run are archived and removed only when every
//!   item was accounted for without failure, and at most once per calendar day.
//!   Lines appended while the run was in flight stay queued.
//! - A queue holding only unparseable lines is still committed so the noise
//!   does not linger.
//! - On any per-item failure the queue file is left byte-identical.
//! - The run lock is released on every exit path (guard drop).

use crate::config::PipelineConfig;
use crate::handoff::enrich::{Enricher, EnrichmentRequest};
use crate::handoff::precheck::{run_prechecks, Precheck, PrecheckFailure};
use crate::handoff::sink::{NoteSink, PersistOutcome, PersistRequest};
use crate::model::item::{Normalization, NormalizedItem, SkipReason};
use crate::pipeline::dedupe::{DedupDecision, DuplicateFilter, DuplicateSource};
use crate::pipeline::merge::{FragmentMerger, MergeReport};
use crate::pipeline::normalize::LemmaNormalizer;
use crate::pipeline::parse::read_entries;
use crate::repo::ledger_repo::{Ledger, LedgerError};
use crate::store::{QueueStore, RotationStamps, RunLock, StoreError};
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

pub type RunResult<T> = Result<T, RunError>;

/// Setup-level failure; the run mutated nothing it could not retry.
#[derive(Debug)]
pub enum RunError {
    Store(StoreError),
    Ledger(LedgerError),
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "ledger unavailable: {err}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Ledger(err) => Some(err),
        }
    }
}

impl From<StoreError> for RunError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<LedgerError> for RunError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Parse, normalize and dedupe only; no handoff, no commit.
    pub dry_run: bool,
    /// Maximum number of items handed to enrichment in this run.
    pub limit: Option<usize>,
    /// Fold drop-folder fragments into the queue before parsing.
    pub merge_fragments: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            merge_fragments: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Enrich,
    Persist,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enrich => "enrich",
            Self::Persist => "persist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub lemma: String,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub raw_text: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntry {
    pub lemma: String,
    pub source: DuplicateSource,
}

/// What happened to the queue at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Snapshot written and queue cleared.
    Archived(PathBuf),
    /// Commit succeeded but the queue was already empty.
    NothingToArchive,
    /// Commit succeeded but today's rotation already happened.
    AlreadyRotatedToday,
    /// Failures or deferred items; queue left untouched.
    NotCommitted,
    /// Commit was attempted and failed; queue left for the next run.
    CommitFailed(String),
    DryRun,
}

/// Full accounting of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub merge: Option<MergeReport>,
    pub parsed_entries: usize,
    pub skipped_lines: usize,
    pub skipped: Vec<SkippedEntry>,
    pub duplicates: Vec<DuplicateEntry>,
    /// Accepted items handed off (or, in a dry run, that would be).
    pub accepted: Vec<NormalizedItem>,
    /// Accepted items held back by the run limit.
    pub deferred: usize,
    pub persisted: Vec<NormalizedItem>,
    pub already_recorded: usize,
    pub failures: Vec<ItemFailure>,
    pub rotation: RotationOutcome,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            merge: None,
            parsed_entries: 0,
            skipped_lines: 0,
            skipped: Vec::new(),
            duplicates: Vec::new(),
            accepted: Vec::new(),
            deferred: 0,
            persisted: Vec::new(),
            already_recorded: 0,
            failures: Vec::new(),
            rotation: RotationOutcome::NotCommitted,
        }
    }
}

/// Terminal state of a run. Every variant is a clean exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Another run holds the lock; this cycle is skipped.
    LockHeld,
    PrecheckFailed(PrecheckFailure),
    /// Nothing in the queue.
    Empty,
    Processed(RunReport),
    /// At least one item failed; the queue was left for retry.
    Failed(RunReport),
}

impl RunStatus {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Processed(report) | Self::Failed(report) => Some(report),
            _ => None,
        }
    }
}

/// Orchestrates one pipeline run over its collaborators.
pub struct RunCoordinator<'a> {
    config: &'a PipelineConfig,
    queue: &'a dyn QueueStore,
    ledger: &'a dyn Ledger,
    enricher: &'a dyn Enricher,
    sink: &'a dyn NoteSink,
    prechecks: Vec<Box<dyn Precheck + 'a>>,
    normalizer: LemmaNormalizer,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        queue: &'a dyn QueueStore,
        ledger: &'a dyn Ledger,
        enricher: &'a dyn Enricher,
        sink: &'a dyn NoteSink,
    ) -> Self {
        Self {
            config,
            queue,
            ledger,
            enricher,
            sink,
            prechecks: Vec::new(),
            normalizer: LemmaNormalizer::new(&config.normalizer),
        }
    }

    /// Registers a reachability check; checks run in registration order.
    pub fn with_precheck(mut self, check: Box<dyn Precheck + 'a>) -> Self {
        self.prechecks.push(check);
        self
    }

    pub fn run(&self, options: RunOptions) -> RunResult<RunStatus> {
        self.run_at(options, Local::now())
    }

    /// Runs the pipeline as if the current time were `now`.
    ///
    /// # Errors
    /// - Returns `RunError` only for setup failures (lock file, queue or ledger
    ///   unreadable). Per-item failures are reported in `RunStatus::Failed`.
    pub fn run_at(&self, options: RunOptions, now: DateTime<Local>) -> RunResult<RunStatus> {
        let run_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=run_start module=coordinator status=start run_id={} dry_run={} limit={}",
            run_id,
            options.dry_run,
            options
                .limit
                .map(|limit| limit.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let Some(_lock) = RunLock::try_acquire(&self.config.lock_path(), now)? else {
            info!("event=run_end module=coordinator status=skip run_id={run_id} reason=lock_held");
            return Ok(RunStatus::LockHeld);
        };

        let status = self.run_locked(run_id, options, now)?;
        info!(
            "event=run_end module=coordinator status={} run_id={} duration_ms={}",
            status_tag(&status),
            run_id,
            started_at.elapsed().as_millis()
        );
        Ok(status)
    }

    fn run_locked(
        &self,
        run_id: Uuid,
        options: RunOptions,
        now: DateTime<Local>,
    ) -> RunResult<RunStatus> {
        let today = now.date_naive();
        let stamps = RotationStamps::new(self.config.state_dir());
        stamps.purge_stale(today)?;

        if !options.dry_run {
            if let Err(failure) =
                run_prechecks(&self.prechecks, &self.config.precheck.retry_policy())
            {
                return Ok(RunStatus::PrecheckFailed(failure));
            }
        }

        let mut report = RunReport::new(run_id);
        if options.merge_fragments && !options.dry_run {
            let merger = FragmentMerger::new(
                self.config.inbox_dir(),
                self.config.fragment_prefix.as_str(),
                self.config.queue_file_name.as_str(),
                self.config.file_retry,
            );
            report.merge = Some(merger.merge(self.queue, now)?);
        }

        let parsed = read_entries(self.queue)?;
        report.parsed_entries = parsed.entries.len();
        report.skipped_lines = parsed.skipped_lines.len();
        if parsed.lines.is_empty() {
            info!("event=queue_read module=coordinator status=skip run_id={run_id} reason=empty");
            return Ok(RunStatus::Empty);
        }

        let mut filter = DuplicateFilter::new(self.ledger);
        let mut accepted = Vec::new();
        for entry in &parsed.entries {
            let item = match self.normalizer.normalize(&entry.raw_text) {
                Normalization::Item(item) => item,
                Normalization::Skip(reason) => {
                    info!(
                        "event=item_skip module=coordinator status=skip run_id={run_id} reason={reason}"
                    );
                    report.skipped.push(SkippedEntry {
                        raw_text: entry.raw_text.clone(),
                        reason,
                    });
                    continue;
                }
            };
            match filter.check(&item)? {
                DedupDecision::Accept => accepted.push((entry, item)),
                DedupDecision::Duplicate(source) => {
                    info!(
                        "event=item_duplicate module=coordinator status=skip run_id={} rule={} source={}",
                        run_id,
                        item.rule_applied,
                        source.as_str()
                    );
                    report.duplicates.push(DuplicateEntry {
                        lemma: item.lemma,
                        source,
                    });
                }
            }
        }

        info!(
            "event=dedupe module=coordinator status=ok run_id={} accepted={} duplicates={} skipped={}",
            run_id,
            filter.accepted_len(),
            report.duplicates.len(),
            report.skipped.len()
        );

        if let Some(limit) = options.limit {
            if accepted.len() > limit {
                report.deferred = accepted.len() - limit;
                accepted.truncate(limit);
            }
        }
        report.accepted = accepted.iter().map(|(_, item)| item.clone()).collect();

        if options.dry_run {
            report.rotation = RotationOutcome::DryRun;
            return Ok(RunStatus::Processed(report));
        }

        for (entry, item) in &accepted {
            self.hand_off(run_id, entry.source_tag.as_deref(), item, now, &mut report);
        }

        if !report.failures.is_empty() || report.deferred > 0 {
            warn!(
                "event=commit module=coordinator status=skip run_id={} failures={} deferred={}",
                run_id,
                report.failures.len(),
                report.deferred
            );
            report.rotation = RotationOutcome::NotCommitted;
            return Ok(if report.failures.is_empty() {
                RunStatus::Processed(report)
            } else {
                RunStatus::Failed(report)
            });
        }

        report.rotation = self.commit(run_id, &stamps, &parsed.lines, now);
        Ok(match report.rotation {
            RotationOutcome::CommitFailed(_) => RunStatus::Failed(report),
            _ => RunStatus::Processed(report),
        })
    }

    fn hand_off(
        &self,
        run_id: Uuid,
        source_tag: Option<&str>,
        item: &NormalizedItem,
        now: DateTime<Local>,
        report: &mut RunReport,
    ) {
        let card = match self.enricher.enrich(&EnrichmentRequest::from(item)) {
            Ok(card) => card,
            Err(err) => {
                warn!(
                    "event=item_enrich module=coordinator status=error run_id={} rule={} error={}",
                    run_id, item.rule_applied, err
                );
                report.failures.push(ItemFailure {
                    lemma: item.lemma.clone(),
                    stage: FailureStage::Enrich,
                    message: err.to_string(),
                });
                return;
            }
        };

        let request = PersistRequest {
            item,
            card: &card,
            source_tag,
            date: now.date_naive(),
        };
        match self.sink.persist(&request) {
            Ok(PersistOutcome::Recorded) => report.persisted.push(item.clone()),
            Ok(PersistOutcome::AlreadyRecorded) => report.already_recorded += 1,
            Err(err) => {
                warn!(
                    "event=item_persist module=coordinator status=error run_id={} rule={} error={}",
                    run_id, item.rule_applied, err
                );
                report.failures.push(ItemFailure {
                    lemma: item.lemma.clone(),
                    stage: FailureStage::Persist,
                    message: err.to_string(),
                });
            }
        }
    }

    fn commit(
        &self,
        run_id: Uuid,
        stamps: &RotationStamps,
        consumed: &[String],
        now: DateTime<Local>,
    ) -> RotationOutcome {
        if stamps.is_rotated(now.date_naive()) {
            info!("event=commit module=coordinator status=skip run_id={run_id} reason=rotated_today");
            return RotationOutcome::AlreadyRotatedToday;
        }

        let outcome = match self.queue.archive_consumed(consumed, now) {
            Ok(Some(snapshot)) => RotationOutcome::Archived(snapshot),
            Ok(None) => RotationOutcome::NothingToArchive,
            Err(err) => {
                error!("event=commit module=coordinator status=error run_id={run_id} error={err}");
                return RotationOutcome::CommitFailed(err.to_string());
            }
        };

        if let Err(err) = stamps.mark(now) {
            // Consumed lines are already archived; the commit stands without the stamp.
            warn!("event=stamp_write module=coordinator status=error run_id={run_id} error={err}");
        }
        info!("event=commit module=coordinator status=ok run_id={run_id}");
        outcome
    }
}

fn status_tag(status: &RunStatus) -> &'static str {
    match status {
        RunStatus::LockHeld => "lock_held",
        RunStatus::PrecheckFailed(_) => "precheck_failed",
        RunStatus::Empty => "empty",
        RunStatus::Processed(_) => "ok",
        RunStatus::Failed(_) => "failed",
    }
}
