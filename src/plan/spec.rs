//! Plan and action types.
//!
//! These types map to the plan document produced by the planning
//! collaborator. The same structs carry execution results once a plan has
//! been run, so a plan can be written back out with its outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cost::{CostEstimate, CostFactors};

use super::value::{ParamValue, Parameters};

/// Identifier of a plan step.
pub type StepId = String;

/// An ordered set of provisioning actions executed as one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Human-readable explanation of what the plan does.
    pub explanation: String,
    /// Step identifiers in execution order.
    #[serde(alias = "deployment_order")]
    pub deployment_order: Vec<StepId>,
    /// Actions keyed by step identifier.
    pub steps: BTreeMap<StepId, Action>,
    /// Aggregate cost estimate. Derived by the cost model, never read from input.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<CostEstimate>,
}

/// One provisioning operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Target capability group (e.g. `ec2`, `s3`).
    pub service: String,
    /// Mutating operation to invoke.
    #[serde(alias = "action")]
    pub operation: String,
    /// Named arguments, possibly containing placeholders.
    #[serde(default)]
    pub parameters: Parameters,
    /// Compensating call, invoked only after this action succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackSpec>,
    /// Sizing attributes used for cost estimation.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "cost_factors")]
    pub cost_factors: Option<CostFactors>,
    /// Outcome, set by the executor.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
}

/// Compensating operation for an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollbackSpec {
    /// Operation that undoes the action.
    #[serde(alias = "action")]
    pub operation: String,
    /// Arguments for the undo call. May reference the action's own payload.
    #[serde(default)]
    pub parameters: Parameters,
}

/// Outcome of an executed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionResult {
    /// The provider call succeeded.
    Success {
        /// Payload returned by the provider.
        payload: ParamValue,
    },
    /// The step did not succeed.
    Failed {
        /// Failure detail.
        error: String,
    },
}

impl Plan {
    /// Creates an empty plan with the given explanation.
    #[must_use]
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            deployment_order: Vec::new(),
            steps: BTreeMap::new(),
            cost_estimate: None,
        }
    }

    /// Appends a step to the plan and to the deployment order.
    #[must_use]
    pub fn with_step(mut self, id: impl Into<StepId>, action: Action) -> Self {
        let id = id.into();
        self.deployment_order.push(id.clone());
        self.steps.insert(id, action);
        self
    }

    /// Returns true if the plan has no steps to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployment_order.is_empty()
    }

    /// Returns the number of steps in the deployment order.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.deployment_order.len()
    }

    /// Iterates steps in deployment order, skipping unknown references.
    pub fn ordered_steps(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.deployment_order
            .iter()
            .filter_map(|id| self.steps.get(id).map(|a| (id.as_str(), a)))
    }

    /// Clears all execution results and the derived cost estimate.
    pub fn reset_results(&mut self) {
        self.cost_estimate = None;
        for action in self.steps.values_mut() {
            action.result = None;
        }
    }
}

impl Action {
    /// Creates an action with no parameters.
    #[must_use]
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            parameters: Parameters::new(),
            rollback: None,
            cost_factors: None,
            result: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the compensating operation.
    #[must_use]
    pub fn with_rollback(mut self, operation: impl Into<String>, parameters: Parameters) -> Self {
        self.rollback = Some(RollbackSpec {
            operation: operation.into(),
            parameters,
        });
        self
    }

    /// Sets the cost factors.
    #[must_use]
    pub fn with_cost_factors(mut self, factors: CostFactors) -> Self {
        self.cost_factors = Some(factors);
        self
    }

    /// Name of the compensating operation, if any.
    #[must_use]
    pub fn rollback_operation(&self) -> Option<&str> {
        self.rollback.as_ref().map(|r| r.operation.as_str())
    }

    /// Returns the success payload, if the action succeeded.
    #[must_use]
    pub const fn success_payload(&self) -> Option<&ParamValue> {
        match &self.result {
            Some(ActionResult::Success { payload }) => Some(payload),
            _ => None,
        }
    }

    /// Returns true if the action has a recorded success.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        self.success_payload().is_some()
    }

    /// Human-readable `service.operation` label.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{}.{}", self.service, self.operation)
    }
}

impl ActionResult {
    /// Creates a success result.
    #[must_use]
    pub const fn success(payload: ParamValue) -> Self {
        Self::Success { payload }
    }

    /// Creates a failure result.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Returns true for [`ActionResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())?;
        if let Some(op) = self.rollback_operation() {
            write!(f, " (rollback: {op})")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "Empty plan");
        }

        writeln!(f, "Deployment Plan ({} steps):", self.step_count())?;
        for (i, id) in self.deployment_order.iter().enumerate() {
            match self.steps.get(id) {
                Some(action) => writeln!(f, "  {}. {id}: {action}", i + 1)?,
                None => writeln!(f, "  {}. {id}: <unknown step>", i + 1)?,
            }
        }
        Ok(())
    }
}
