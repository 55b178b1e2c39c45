//! File-backed state owned by the pipeline.
//!
//! # Responsibility
//! - Own the canonical queue file, the run lock and the rotation stamps.
//! - Route every queue mutation through temp-file + atomic rename.
//!
//! # Invariants
//! - Queue content is never written in place.
//! - Transient contention from synced storage is retried, never surfaced first try.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub mod atomic;
pub mod lock;
pub mod queue;
pub mod retry;
pub mod rotation;

pub use atomic::{read_to_string_with_retry, write_atomic};
pub use lock::RunLock;
pub use queue::{FileQueueStore, QueueStore};
pub use retry::RetryPolicy;
pub use rotation::RotationStamps;

pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem error annotated with the failing operation and path.
#[derive(Debug)]
pub struct StoreError {
    pub op: &'static str,
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl StoreError {
    pub fn new(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}` failed: {}", self.op, self.path.display(), self.source)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
