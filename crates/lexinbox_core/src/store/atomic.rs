//! Atomic file replacement and contention-tolerant reads.
//!
//! # Responsibility
//! - Replace file content via a sibling temp file and rename.
//! - Retry reads/writes that fail with transient lock-style errors.
//!
//! # Invariants
//! - A reader never observes a half-written target file.
//! - The temp file lives in the target directory so the rename stays on one
//!   filesystem.

use super::retry::RetryPolicy;
use super::{StoreError, StoreResult};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// `EBUSY` on Linux and macOS.
const EBUSY: i32 = 16;
/// `EDEADLK` on macOS, reported by synced folders under file coordination.
const EDEADLK_MACOS: i32 = 11;

/// Returns whether an I/O error looks like transient contention.
pub fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut
    ) || matches!(err.raw_os_error(), Some(EBUSY) | Some(EDEADLK_MACOS))
}

/// Atomically replaces `path` with `contents`, retrying transient failures.
///
/// # Errors
/// - Returns the last I/O error once the retry budget is spent.
pub fn write_atomic(path: &Path, contents: &[u8], policy: &RetryPolicy) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| StoreError::new("create_dir", parent, err))?;

    policy
        .run(
            "write_atomic",
            || -> std::io::Result<()> {
                let mut temp = NamedTempFile::new_in(parent)?;
                temp.write_all(contents)?;
                temp.as_file().sync_all()?;
                temp.persist(path).map_err(|err| err.error)?;
                Ok(())
            },
            is_transient,
        )
        .map_err(|err| StoreError::new("write_atomic", path, err))
}

/// Reads `path` to a string, retrying transient failures.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_to_string_with_retry(path: &Path, policy: &RetryPolicy) -> StoreResult<Option<String>> {
    let result = policy.run(
        "read",
        || std::fs::read_to_string(path),
        is_transient,
    );
    match result {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::new("read", path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{is_transient, read_to_string_with_retry, write_atomic};
    use crate::store::retry::RetryPolicy;
    use std::io::{Error, ErrorKind};

    #[test]
    fn write_atomic_replaces_content_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.jsonl");

        write_atomic(&path, b"first\n", &RetryPolicy::none()).unwrap();
        write_atomic(&path, b"second\n", &RetryPolicy::none()).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let read = read_to_string_with_retry(&dir.path().join("absent"), &RetryPolicy::none())
            .unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&Error::from(ErrorKind::WouldBlock)));
        assert!(is_transient(&Error::from_raw_os_error(16)));
        assert!(!is_transient(&Error::from(ErrorKind::NotFound)));
    }
}
