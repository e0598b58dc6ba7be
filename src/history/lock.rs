//! History locking.
//!
//! An `apply` run holds the history lock from before its first provider call
//! until its record is written. The lease covers the worst case of the run:
//! every step uses its full timeout forward and again for its compensation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Shortest lease ever granted, in seconds.
pub const MIN_LEASE_SECS: u64 = 300;

/// Longest lease ever granted, in weeks.
const MAX_LEASE_WEEKS: i64 = 52 * 100;

/// The lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLock {
    /// Identifier needed to release the lock.
    pub lock_id: String,
    /// Process that took the lock.
    pub holder: String,
    /// Number of plan steps the run declared.
    pub steps: usize,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When another run may take the lock over.
    pub expires_at: DateTime<Utc>,
}

impl HistoryLock {
    /// Takes a lease for a run of `steps` steps bounded by `step_timeout`.
    #[must_use]
    pub fn for_run(holder: impl Into<String>, steps: usize, step_timeout: Duration) -> Self {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease_for(steps, step_timeout))
            .unwrap_or_else(|_| chrono::Duration::weeks(MAX_LEASE_WEEKS));
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.into(),
            steps,
            acquired_at: now,
            expires_at: now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the holding run has outlived its lease.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Seconds left on the lease.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Lease length for a run: forward and compensating call per step.
#[must_use]
pub fn lease_for(steps: usize, step_timeout: Duration) -> Duration {
    let calls = u32::try_from(steps.saturating_mul(2)).unwrap_or(u32::MAX);
    step_timeout
        .checked_mul(calls)
        .unwrap_or(Duration::MAX)
        .max(Duration::from_secs(MIN_LEASE_SECS))
}

/// Identifies this process as `cloudpilot@<host>:<pid>`.
#[must_use]
pub fn holder_id() -> String {
    let host = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().into_owned());
    format!("cloudpilot@{host}:{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_covers_forward_and_undo() {
        assert_eq!(lease_for(10, Duration::from_secs(60)), Duration::from_secs(1200));
        assert_eq!(lease_for(1, Duration::from_secs(5)), Duration::from_secs(MIN_LEASE_SECS));
        assert_eq!(lease_for(0, Duration::from_secs(60)), Duration::from_secs(MIN_LEASE_SECS));
        assert_eq!(lease_for(usize::MAX, Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_new_lock_is_live() {
        let lock = HistoryLock::for_run("ci-runner", 4, Duration::from_secs(300));
        assert_eq!(lock.holder, "ci-runner");
        assert_eq!(lock.steps, 4);
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() > 2300);
    }

    #[test]
    fn test_huge_lease_saturates() {
        let lock = HistoryLock::for_run("ci-runner", usize::MAX, Duration::MAX);
        assert!(lock.expires_at > Utc::now() + chrono::Duration::weeks(52 * 99));
    }

    #[test]
    fn test_backdated_lock_is_expired() {
        let mut lock = HistoryLock::for_run("ci-runner", 1, Duration::from_secs(1));
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(lock.is_expired());
        assert_eq!(lock.remaining_secs(), 0);
    }

    #[test]
    fn test_holder_id_names_process() {
        let id = holder_id();
        assert!(id.starts_with("cloudpilot@"));
        assert!(id.ends_with(&format!(":{}", std::process::id())));
    }
}
