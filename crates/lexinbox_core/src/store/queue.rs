//! Canonical queue store.
//!
//! # Responsibility
//! - Read the newline-delimited queue file.
//! - Append new lines with exact-line de-duplication.
//! - Snapshot consumed lines and drop them from the queue on commit.
//!
//! # Invariants
//! - First-seen line order is preserved on append.
//! - `archive_consumed` removes only lines the caller consumed; lines appended
//!   after the batch was read stay queued.
//! - The snapshot is written before the queue is rewritten; a failed snapshot
//!   leaves the queue untouched.

use super::atomic::{read_to_string_with_retry, write_atomic};
use super::retry::RetryPolicy;
use super::{StoreError, StoreResult};
use chrono::{DateTime, Local};
use log::info;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Storage contract for the canonical queue.
pub trait QueueStore {
    /// Returns every non-blank line, trimmed, in file order.
    fn read_all(&self) -> StoreResult<Vec<String>>;

    /// Appends lines not already present (exact match after trimming).
    ///
    /// Returns how many lines were actually added.
    fn append(&self, lines: &[String]) -> StoreResult<usize>;

    /// Writes `consumed` to a timestamped snapshot, then removes those lines
    /// (one occurrence each) from the queue.
    ///
    /// Returns the snapshot path, or `None` when nothing was consumed.
    fn archive_consumed(
        &self,
        consumed: &[String],
        now: DateTime<Local>,
    ) -> StoreResult<Option<PathBuf>>;
}

/// Queue store backed by one file on (possibly cloud-synced) disk.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
    archive_dir: PathBuf,
    retry: RetryPolicy,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            archive_dir: archive_dir.into(),
            retry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_text(&self) -> StoreResult<String> {
        Ok(read_to_string_with_retry(&self.path, &self.retry)?.unwrap_or_default())
    }

    fn snapshot_path(&self, now: DateTime<Local>) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "queue".to_string());
        let stamp = now.format("%Y%m%d-%H%M%S");
        let mut candidate = self.archive_dir.join(format!("{stem}.{stamp}.jsonl"));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self
                .archive_dir
                .join(format!("{stem}.{stamp}-{counter}.jsonl"));
            counter += 1;
        }
        candidate
    }
}

impl QueueStore for FileQueueStore {
    fn read_all(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .read_text()?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn append(&self, lines: &[String]) -> StoreResult<usize> {
        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        for line in self.read_all()? {
            if seen.insert(line.clone()) {
                merged.push(line);
            }
        }

        let existing = merged.len();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || seen.contains(line) {
                continue;
            }
            seen.insert(line.to_string());
            merged.push(line.to_string());
        }

        let added = merged.len() - existing;
        if added == 0 {
            return Ok(0);
        }

        write_atomic(&self.path, join_lines(&merged).as_bytes(), &self.retry)?;
        Ok(added)
    }

    fn archive_consumed(
        &self,
        consumed: &[String],
        now: DateTime<Local>,
    ) -> StoreResult<Option<PathBuf>> {
        if consumed.is_empty() {
            return Ok(None);
        }

        let mut pending: HashMap<&str, usize> = HashMap::new();
        for line in consumed {
            *pending.entry(line.trim()).or_default() += 1;
        }
        let mut remaining = Vec::new();
        for line in self.read_all()? {
            match pending.get_mut(line.as_str()) {
                Some(count) if *count > 0 => *count -= 1,
                _ => remaining.push(line),
            }
        }

        std::fs::create_dir_all(&self.archive_dir)
            .map_err(|err| StoreError::new("create_dir", &self.archive_dir, err))?;
        let snapshot = self.snapshot_path(now);
        write_atomic(&snapshot, join_lines(consumed).as_bytes(), &self.retry)?;
        write_atomic(&self.path, join_lines(&remaining).as_bytes(), &self.retry)?;

        info!(
            "event=queue_archive module=store status=ok archived={} kept={} snapshot={}",
            consumed.len(),
            remaining.len(),
            snapshot.display()
        );
        Ok(Some(snapshot))
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut body = String::new();
    for line in lines {
        body.push_str(line.trim());
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::{FileQueueStore, QueueStore};
    use crate::store::retry::RetryPolicy;
    use chrono::{Local, TimeZone};

    fn store(dir: &std::path::Path) -> FileQueueStore {
        FileQueueStore::new(
            dir.join("inbox").join("quick.jsonl"),
            dir.join("archive"),
            RetryPolicy::none(),
        )
    }

    #[test]
    fn append_dedupes_and_preserves_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = store(dir.path());

        let added = queue
            .append(&[r#"{"word":"calm"}"#.to_string(), r#"{"word":"door"}"#.to_string()])
            .unwrap();
        assert_eq!(added, 2);

        let added = queue
            .append(&[r#"{"word":"door"}"#.to_string(), r#"{"word":"fax"}"#.to_string()])
            .unwrap();
        assert_eq!(added, 1);

        assert_eq!(
            queue.read_all().unwrap(),
            vec![
                r#"{"word":"calm"}"#.to_string(),
                r#"{"word":"door"}"#.to_string(),
                r#"{"word":"fax"}"#.to_string(),
            ]
        );
    }

    #[test]
    fn archive_consumed_keeps_lines_that_arrived_later() {
        let dir = tempfile::tempdir().unwrap();
        let queue = store(dir.path());
        std::fs::create_dir_all(dir.path().join("inbox")).unwrap();
        std::fs::write(queue.path(), "{\"word\":\"calm\"}\n\n{\"word\":\"door\"}\n").unwrap();
        let consumed = queue.read_all().unwrap();

        queue
            .append(&[r#"{"word":"late"}"#.to_string()])
            .unwrap();

        let now = Local.with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap();
        let snapshot = queue
            .archive_consumed(&consumed, now)
            .unwrap()
            .expect("snapshot");

        assert!(snapshot.ends_with("quick.20251016-093000.jsonl"));
        assert_eq!(
            std::fs::read_to_string(&snapshot).unwrap(),
            "{\"word\":\"calm\"}\n{\"word\":\"door\"}\n"
        );
        assert_eq!(
            std::fs::read_to_string(queue.path()).unwrap(),
            "{\"word\":\"late\"}\n"
        );
        assert!(queue.archive_consumed(&[], now).unwrap().is_none());
    }

    #[test]
    fn archive_consumed_of_whole_queue_leaves_it_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = store(dir.path());
        queue
            .append(&[r#"{"word":"calm"}"#.to_string()])
            .unwrap();
        let consumed = queue.read_all().unwrap();

        let now = Local.with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap();
        let first = queue.archive_consumed(&consumed, now).unwrap().expect("snapshot");
        assert_eq!(std::fs::read_to_string(queue.path()).unwrap(), "");

        let second = queue.archive_consumed(&consumed, now).unwrap().expect("snapshot");
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(queue.path()).unwrap(), "");
    }
}
