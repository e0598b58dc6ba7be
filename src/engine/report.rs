//! Execution report returned to the caller in every terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::CostEstimate;
use crate::error::RollbackError;
use crate::plan::{ActionResult, ParamValue, StepId};

use super::ledger::DeploymentId;
use super::state::ExecutionState;

/// Complete account of one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// True only if every step succeeded.
    pub success: bool,
    /// Identifier of the attempt.
    pub deployment_id: DeploymentId,
    /// Terminal state.
    pub state: ExecutionState,
    /// Outcome of every step that ran, in execution order.
    pub steps: Vec<StepOutcome>,
    /// Compensation outcomes in sweep order. Present iff rollback ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Vec<RollbackOutcome>>,
    /// The step that failed and why.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    /// Plan-time cost estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<CostEstimate>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt reached its terminal state.
    pub finished_at: DateTime<Utc>,
}

/// Outcome of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepOutcome {
    /// Step identifier.
    pub step: StepId,
    /// Success payload or failure detail.
    #[serde(flatten)]
    pub result: ActionResult,
}

/// The step that ended execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepFailure {
    /// Step identifier.
    pub step: StepId,
    /// Failure detail.
    pub error: String,
}

/// Status of one compensation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The call succeeded.
    Success,
    /// The call failed.
    Failed,
}

/// Outcome of one compensation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollbackOutcome {
    /// Step being compensated.
    pub step: StepId,
    /// Compensating operation.
    pub action: String,
    /// Call status.
    pub status: OutcomeStatus,
    /// Provider payload on success, failure message otherwise.
    pub detail: ParamValue,
}

impl RollbackOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn succeeded(step: &str, action: &str, payload: ParamValue) -> Self {
        Self {
            step: step.to_string(),
            action: action.to_string(),
            status: OutcomeStatus::Success,
            detail: payload,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(step: &str, action: &str, message: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            action: action.to_string(),
            status: OutcomeStatus::Failed,
            detail: ParamValue::Text(message.into()),
        }
    }

    /// Returns true if the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

impl ExecutionReport {
    /// Compensations that failed, for operator follow-up.
    #[must_use]
    pub fn rollback_failures(&self) -> Vec<RollbackError> {
        self.rollback
            .iter()
            .flatten()
            .filter(|o| !o.is_success())
            .map(|o| RollbackError {
                step: o.step.clone(),
                operation: o.action.clone(),
                message: o.detail.to_string(),
            })
            .collect()
    }

    /// Returns true if a rollback sweep ran.
    #[must_use]
    pub const fn rolled_back(&self) -> bool {
        self.rollback.is_some()
    }

    /// Identifiers of the steps that succeeded.
    #[must_use]
    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.result.is_success())
            .map(|s| s.step.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_with_rollback(rollback: Vec<RollbackOutcome>) -> ExecutionReport {
        let now = Utc::now();
        ExecutionReport {
            success: false,
            deployment_id: DeploymentId::generate(now),
            state: ExecutionState::RollbackFailed,
            steps: vec![
                StepOutcome {
                    step: String::from("bucket"),
                    result: ActionResult::success(ParamValue::from("assets")),
                },
                StepOutcome {
                    step: String::from("instance"),
                    result: ActionResult::failed("quota exceeded"),
                },
            ],
            rollback: Some(rollback),
            failure: Some(StepFailure {
                step: String::from("instance"),
                error: String::from("quota exceeded"),
            }),
            cost_estimate: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_step_outcome_wire_format() {
        let outcome = StepOutcome {
            step: String::from("bucket"),
            result: ActionResult::success(ParamValue::from("assets")),
        };
        let value = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(value, json!({"step": "bucket", "status": "success", "payload": "assets"}));

        let failed = StepOutcome {
            step: String::from("vm"),
            result: ActionResult::failed("boom"),
        };
        let value = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(value, json!({"step": "vm", "status": "failed", "error": "boom"}));
    }

    #[test]
    fn test_rollback_failures() {
        let report = report_with_rollback(vec![
            RollbackOutcome::failed("bucket", "delete_bucket", "access denied"),
            RollbackOutcome::succeeded("network", "delete_vpc", ParamValue::Null),
        ]);

        let failures = report.rollback_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "bucket");
        assert_eq!(failures[0].operation, "delete_bucket");
        assert_eq!(failures[0].message, "access denied");
        assert_eq!(report.succeeded_steps(), vec!["bucket"]);
    }

    #[test]
    fn test_rollback_section_omitted_when_absent() {
        let mut report = report_with_rollback(Vec::new());
        report.rollback = None;

        let value = serde_json::to_value(&report).expect("serialize");
        assert!(value.get("rollback").is_none());
        assert_eq!(value["state"], "rollback_failed");
        assert!(value.get("deploymentId").is_some());
    }
}
