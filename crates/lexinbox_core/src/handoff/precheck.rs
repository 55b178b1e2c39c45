//! Service reachability prechecks.
//!
//! # Invariants
//! - Checks run in registration order; the first exhausted check aborts.
//! - Each check is retried with the configured fixed backoff.

use crate::store::retry::RetryPolicy;
use log::{info, warn};

/// One reachability check (network, downstream service, ...).
pub trait Precheck {
    fn name(&self) -> &str;
    fn check(&self) -> Result<(), String>;
}

/// Check that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecheckFailure {
    pub check: String,
    pub reason: String,
}

/// Runs every check with bounded retries.
pub fn run_prechecks<'c>(
    checks: &[Box<dyn Precheck + 'c>],
    policy: &RetryPolicy,
) -> Result<(), PrecheckFailure> {
    for check in checks {
        match policy.run(check.name(), || check.check(), |_| true) {
            Ok(()) => info!(
                "event=precheck module=coordinator status=ok check={}",
                check.name()
            ),
            Err(reason) => {
                warn!(
                    "event=precheck module=coordinator status=error check={} attempts={} error={}",
                    check.name(),
                    policy.attempts,
                    reason
                );
                return Err(PrecheckFailure {
                    check: check.name().to_string(),
                    reason,
                });
            }
        }
    }
    Ok(())
}
