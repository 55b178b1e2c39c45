//! Once-per-day rotation stamps.
//!
//! # Invariants
//! - At most one stamp file exists per calendar day.
//! - Stamps from other days are purged at run start; unrelated files are kept.

use super::{StoreError, StoreResult};
use chrono::{DateTime, Local, NaiveDate};
use log::debug;
use std::path::PathBuf;

const STAMP_PREFIX: &str = "rotated-";
const STAMP_SUFFIX: &str = ".stamp";

/// Directory of per-day rotation markers.
#[derive(Debug, Clone)]
pub struct RotationStamps {
    dir: PathBuf,
}

impl RotationStamps {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn stamp_path(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{STAMP_PREFIX}{}{STAMP_SUFFIX}", day.format("%Y-%m-%d")))
    }

    /// Whether the queue was already rotated on `day`.
    pub fn is_rotated(&self, day: NaiveDate) -> bool {
        self.stamp_path(day).is_file()
    }

    /// Records that rotation happened at `now`.
    pub fn mark(&self, now: DateTime<Local>) -> StoreResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| StoreError::new("create_dir", &self.dir, err))?;
        let path = self.stamp_path(now.date_naive());
        std::fs::write(&path, format!("{}\n", now.to_rfc3339()))
            .map_err(|err| StoreError::new("write_stamp", &path, err))?;
        Ok(path)
    }

    /// Lists days that currently carry a stamp, oldest first.
    pub fn stamped_days(&self) -> StoreResult<Vec<NaiveDate>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::new("read_dir", &self.dir, err)),
        };

        let mut days = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::new("read_dir", &self.dir, err))?;
            if let Some(day) = parse_stamp_name(&entry.file_name().to_string_lossy()) {
                days.push(day);
            }
        }
        days.sort();
        Ok(days)
    }

    /// Removes stamps for every day other than `today`.
    pub fn purge_stale(&self, today: NaiveDate) -> StoreResult<usize> {
        let mut purged = 0;
        for day in self.stamped_days()? {
            if day == today {
                continue;
            }
            let path = self.stamp_path(day);
            std::fs::remove_file(&path).map_err(|err| StoreError::new("remove_stamp", &path, err))?;
            purged += 1;
        }
        if purged > 0 {
            debug!("event=stamp_purge module=store status=ok purged={purged}");
        }
        Ok(purged)
    }
}

fn parse_stamp_name(name: &str) -> Option<NaiveDate> {
    let day = name.strip_prefix(STAMP_PREFIX)?.strip_suffix(STAMP_SUFFIX)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::RotationStamps;
    use chrono::{Local, NaiveDate, TimeZone};

    #[test]
    fn purge_keeps_today_and_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let stamps = RotationStamps::new(dir.path());
        let yesterday = Local.with_ymd_and_hms(2025, 10, 15, 8, 0, 0).unwrap();
        let today = Local.with_ymd_and_hms(2025, 10, 16, 8, 0, 0).unwrap();

        stamps.mark(yesterday).unwrap();
        stamps.mark(today).unwrap();
        std::fs::write(dir.path().join("run.lock"), "pid=1\n").unwrap();

        assert_eq!(stamps.purge_stale(today.date_naive()).unwrap(), 1);
        assert_eq!(
            stamps.stamped_days().unwrap(),
            vec![NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()]
        );
        assert!(dir.path().join("run.lock").exists());
        assert!(stamps.is_rotated(today.date_naive()));
        assert!(!stamps.is_rotated(yesterday.date_naive()));
    }
}
