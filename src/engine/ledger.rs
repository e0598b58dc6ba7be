//! Deployment ledger.
//!
//! The ledger is the append-only record of actions that completed
//! successfully during one deployment attempt. Rollback walks it backwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{CloudPilotError, Result};
use crate::plan::{Action, ParamValue, PayloadSource, StepId};

/// Last timestamp (µs) used for a deployment id in this process.
static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(0);

/// Identifier of one deployment attempt.
///
/// Derived from the start time with microsecond precision. Identifiers issued
/// by one process are strictly increasing, in time order and as strings; a
/// random suffix keeps them unique across processes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Issues a new identifier for an attempt starting at `started_at`.
    #[must_use]
    pub fn generate(started_at: DateTime<Utc>) -> Self {
        let candidate = started_at.timestamp_micros();
        let previous = LAST_ISSUED_MICROS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let issued = candidate.max(previous + 1);

        let stamp = DateTime::<Utc>::from_timestamp_micros(issued)
            .unwrap_or(started_at)
            .format("%Y%m%dT%H%M%S%.6fZ");
        let suffix = Uuid::new_v4().simple().to_string();

        Self(format!("deploy-{stamp}-{}", &suffix[..8]))
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed step.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Step identifier.
    pub step: StepId,
    /// The action, carrying its success result.
    pub action: Action,
}

/// Record of completed actions for one deployment attempt.
#[derive(Debug)]
pub struct DeploymentLedger {
    deployment_id: DeploymentId,
    started_at: DateTime<Utc>,
    entries: Vec<LedgerEntry>,
}

impl Default for DeploymentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentLedger {
    /// Starts a ledger for a new attempt.
    #[must_use]
    pub fn new() -> Self {
        let started_at = Utc::now();
        Self {
            deployment_id: DeploymentId::generate(started_at),
            started_at,
            entries: Vec::new(),
        }
    }

    /// The attempt's identifier.
    #[must_use]
    pub const fn deployment_id(&self) -> &DeploymentId {
        &self.deployment_id
    }

    /// When the attempt started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Appends a completed action.
    ///
    /// # Errors
    ///
    /// Returns [`CloudPilotError::PreconditionViolation`] if the action has no
    /// success result. The ledger is left unchanged.
    pub fn record(&mut self, step: &str, action: &Action) -> Result<()> {
        if !action.is_succeeded() {
            error!("Refusing to record step '{step}' without a success result");
            return Err(CloudPilotError::precondition(format!(
                "step '{step}' was recorded in the ledger without a success result"
            )));
        }

        debug!("Ledger {}: recorded step '{step}'", self.deployment_id);
        self.entries.push(LedgerEntry {
            step: step.to_string(),
            action: action.clone(),
        });
        Ok(())
    }

    /// Recorded entries in strict reverse recording order.
    pub fn rollback_order(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().rev()
    }

    /// Recorded entries in recording order.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Recorded step identifiers in recording order.
    #[must_use]
    pub fn recorded_steps(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.step.as_str()).collect()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PayloadSource for DeploymentLedger {
    fn payload(&self, step: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .and_then(|e| e.action.success_payload())
    }
}
