//! Exclusive run lock.
//!
//! # Responsibility
//! - Guarantee at most one pipeline run per base directory.
//! - Record holder PID and acquisition time for operators.
//!
//! # Invariants
//! - Acquisition never blocks: a held lock yields `Ok(None)`.
//! - The lock is released when the guard drops, on every exit path.
//! - The lock file is never removed, so every contender locks the same inode.
//!   Release truncates the holder record instead.

use super::{StoreError, StoreResult};
use chrono::{DateTime, Local};
use fs2::FileExt;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Scoped advisory lock over the run lock file.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Tries to take the lock without waiting.
    ///
    /// # Errors
    /// - Returns an error when the lock file cannot be created or written.
    ///   Contention from another holder is not an error.
    pub fn try_acquire(path: &Path, now: DateTime<Local>) -> StoreResult<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| StoreError::new("create_dir", parent, err))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| StoreError::new("open_lock", path, err))?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == fs2::lock_contended_error().kind() {
                info!(
                    "event=lock_acquire module=store status=skip reason=held path={}",
                    path.display()
                );
                return Ok(None);
            }
            return Err(StoreError::new("lock", path, err));
        }

        let record = format!(
            "pid={}\nacquired_at={}\n",
            std::process::id(),
            now.to_rfc3339()
        );
        file.set_len(0)
            .and_then(|_| file.write_all(record.as_bytes()))
            .and_then(|_| file.flush())
            .map_err(|err| StoreError::new("write_lock", path, err))?;

        debug!(
            "event=lock_acquire module=store status=ok path={}",
            path.display()
        );
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
        debug!(
            "event=lock_release module=store status=ok path={}",
            self.path.display()
        );
    }
}
