//! Fragment merger.
//!
//! # Responsibility
//! - Find loose fragment files dropped by capture clients.
//! - Fold their records into the canonical queue and archive them.
//!
//! # Invariants
//! - A fragment is archived only after its records reached the queue.
//! - One unreadable fragment never blocks the others.
//! - Archived fragments are renamed, never deleted.

use crate::store::atomic::read_to_string_with_retry;
use crate::store::retry::RetryPolicy;
use crate::store::{QueueStore, StoreError, StoreResult};
use chrono::{DateTime, Local};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

static LEGACY_NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.jsonl\.\d+$").expect("valid legacy fragment regex"));

const ARCHIVE_MARKER: &str = ".done";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// One record per non-blank line.
    Jsonl,
    /// One JSON value; arrays expand to one record per element.
    Json,
}

/// Merge outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Archive paths of fragments that were merged.
    pub archived: Vec<PathBuf>,
    /// Fragments skipped because they could not be read or parsed.
    pub failed: Vec<PathBuf>,
    pub records_read: usize,
    /// Lines that were new to the queue.
    pub lines_appended: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.archived.is_empty() && self.failed.is_empty()
    }
}

/// Classifies a file name as a fragment, excluding the canonical queue and archives.
pub fn fragment_kind(file_name: &str, prefix: &str, queue_file_name: &str) -> Option<FragmentKind> {
    if file_name == queue_file_name
        || !file_name.starts_with(prefix)
        || file_name.contains(ARCHIVE_MARKER)
    {
        return None;
    }
    if file_name.ends_with(".jsonl") || LEGACY_NUMBERED_RE.is_match(file_name) {
        return Some(FragmentKind::Jsonl);
    }
    if file_name.ends_with(".json") {
        return Some(FragmentKind::Json);
    }
    None
}

/// Extracts queue records from fragment content.
pub fn fragment_records(kind: FragmentKind, text: &str) -> Result<Vec<String>, String> {
    match kind {
        FragmentKind::Jsonl => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        FragmentKind::Json => {
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            let value: Value = serde_json::from_str(text).map_err(|err| err.to_string())?;
            let values = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            values
                .iter()
                .map(|value| serde_json::to_string(value).map_err(|err| err.to_string()))
                .collect()
        }
    }
}

/// Drop-folder scanner for one canonical queue.
#[derive(Debug, Clone)]
pub struct FragmentMerger {
    inbox_dir: PathBuf,
    prefix: String,
    queue_file_name: String,
    retry: RetryPolicy,
}

impl FragmentMerger {
    pub fn new(
        inbox_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        queue_file_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inbox_dir: inbox_dir.into(),
            prefix: prefix.into(),
            queue_file_name: queue_file_name.into(),
            retry,
        }
    }

    /// Lists fragment files sorted by name.
    pub fn find_fragments(&self) -> StoreResult<Vec<(PathBuf, FragmentKind)>> {
        let entries = match std::fs::read_dir(&self.inbox_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::new("read_dir", &self.inbox_dir, err)),
        };

        let mut fragments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::new("read_dir", &self.inbox_dir, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(kind) = fragment_kind(&name, &self.prefix, &self.queue_file_name) {
                fragments.push((path, kind));
            }
        }
        fragments.sort_by(|left, right| left.0.file_name().cmp(&right.0.file_name()));
        Ok(fragments)
    }

    /// Merges all fragments into `queue`.
    ///
    /// # Errors
    /// - Returns an error only when the inbox cannot be listed or the queue
    ///   cannot be written; fragments stay in place in that case.
    pub fn merge(&self, queue: &dyn QueueStore, now: DateTime<Local>) -> StoreResult<MergeReport> {
        let fragments = self.find_fragments()?;
        let mut report = MergeReport::default();
        if fragments.is_empty() {
            info!("event=fragment_merge module=merger status=skip reason=no_fragments");
            return Ok(report);
        }

        let mut consumed = Vec::new();
        let mut records = Vec::new();
        for (path, kind) in fragments {
            match self.read_fragment(&path, kind) {
                Ok(lines) => {
                    report.records_read += lines.len();
                    records.extend(lines);
                    consumed.push(path);
                }
                Err(reason) => {
                    warn!(
                        "event=fragment_merge module=merger status=skip fragment={} error={}",
                        path.display(),
                        reason
                    );
                    report.failed.push(path);
                }
            }
        }

        report.lines_appended = queue.append(&records)?;

        let stamp = now.format("%Y%m%d-%H%M%S").to_string();
        for path in consumed {
            let archived = archive_path(&path, &stamp);
            match std::fs::rename(&path, &archived) {
                Ok(()) => report.archived.push(archived),
                Err(err) => warn!(
                    "event=fragment_archive module=merger status=error fragment={} error={}",
                    path.display(),
                    err
                ),
            }
        }

        info!(
            "event=fragment_merge module=merger status=ok merged={} failed={} records={} appended={}",
            report.archived.len(),
            report.failed.len(),
            report.records_read,
            report.lines_appended
        );
        Ok(report)
    }

    fn read_fragment(&self, path: &Path, kind: FragmentKind) -> Result<Vec<String>, String> {
        let text = read_to_string_with_retry(path, &self.retry)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| "fragment disappeared".to_string())?;
        fragment_records(kind, &text)
    }
}

fn archive_path(path: &Path, stamp: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{stamp}{ARCHIVE_MARKER}"))
}
