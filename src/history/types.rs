//! Deployment history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{DeploymentId, ExecutionReport, ExecutionState};
use crate::plan::{Plan, PlanHasher};

/// Current version of the record format.
pub const RECORD_VERSION: &str = "1.0";

/// Audit record of one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Record format version.
    pub version: String,
    /// Identifier of the attempt.
    pub deployment_id: DeploymentId,
    /// SHA-256 fingerprint of the plan that ran.
    pub plan_fingerprint: String,
    /// The plan's explanation.
    pub explanation: String,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// Terminal state.
    pub state: ExecutionState,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Full execution report.
    pub report: ExecutionReport,
}

impl DeploymentRecord {
    /// Builds a record for a finished attempt.
    #[must_use]
    pub fn new(plan: &Plan, report: ExecutionReport) -> Self {
        Self {
            version: String::from(RECORD_VERSION),
            deployment_id: report.deployment_id.clone(),
            plan_fingerprint: PlanHasher::new().fingerprint(plan),
            explanation: plan.explanation.clone(),
            recorded_at: Utc::now(),
            state: report.state,
            success: report.success,
            report,
        }
    }

    /// Number of compensations that failed.
    #[must_use]
    pub fn rollback_failure_count(&self) -> usize {
        self.report.rollback_failures().len()
    }
}
