//! Plan validation.
//!
//! A plan is validated completely before the executor makes any provider
//! call. All problems are collected so the planner can be shown every issue
//! at once; the first error becomes the returned [`PlanError`].

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::cost::RateCard;
use crate::error::{PlanError, Result};

use super::spec::{Action, Plan};
use super::value::parameter_placeholders;

/// Validator for plans.
#[derive(Debug)]
pub struct PlanValidator {
    /// Services the cost model can price.
    known_cost_services: BTreeSet<String>,
}

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanValidator {
    /// Creates a validator that knows the default rate card's services.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_card(&RateCard::default())
    }

    /// Creates a validator that knows the services of `rates`.
    #[must_use]
    pub fn with_rate_card(rates: &RateCard) -> Self {
        Self {
            known_cost_services: rates.service_names(),
        }
    }

    /// Validates a plan.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if the plan is invalid.
    pub fn validate(&self, plan: &Plan) -> Result<ValidationResult> {
        let result = self.check(plan);

        if let Some(first) = result.errors.first() {
            let message = if result.errors.len() > 1 {
                format!("{} (and {} more errors)", first.message, result.errors.len() - 1)
            } else {
                first.message.clone()
            };
            return Err(PlanError::validation(message, first.field.clone()).into());
        }

        debug!("Plan validation passed with {} warnings", result.warnings.len());
        Ok(result)
    }

    /// Collects all errors and warnings without failing.
    #[must_use]
    pub fn check(&self, plan: &Plan) -> ValidationResult {
        let mut result = ValidationResult::default();

        if plan.explanation.trim().is_empty() {
            result.warnings.push(String::from("Plan has no explanation"));
        }

        let positions = Self::validate_order(plan, &mut result);

        for (position, id) in plan.deployment_order.iter().enumerate() {
            if positions.get(id.as_str()) != Some(&position) {
                continue;
            }
            if let Some(action) = plan.steps.get(id) {
                self.validate_action(id, position, action, &positions, &mut result);
            }
        }

        for id in plan.steps.keys() {
            if !positions.contains_key(id.as_str()) {
                result
                    .warnings
                    .push(format!("Step '{id}' is not part of the deployment order and will not run"));
            }
        }

        result
    }

    /// Checks order entries; returns the first position of each known step.
    fn validate_order<'a>(plan: &'a Plan, result: &mut ValidationResult) -> HashMap<&'a str, usize> {
        let mut positions = HashMap::new();
        let mut seen = HashSet::new();

        for (i, id) in plan.deployment_order.iter().enumerate() {
            let field = format!("deploymentOrder[{i}]");

            if !plan.steps.contains_key(id) {
                result.errors.push(ValidationError {
                    field,
                    message: format!("Deployment order references unknown step '{id}'"),
                });
                continue;
            }

            if !seen.insert(id.as_str()) {
                result.errors.push(ValidationError {
                    field,
                    message: format!("Step '{id}' appears more than once in the deployment order"),
                });
                continue;
            }

            positions.insert(id.as_str(), i);
        }

        positions
    }

    fn validate_action(
        &self,
        id: &str,
        position: usize,
        action: &Action,
        positions: &HashMap<&str, usize>,
        result: &mut ValidationResult,
    ) {
        let prefix = format!("steps.{id}");

        if action.service.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.service"),
                message: format!("Step '{id}' has an empty service"),
            });
        }

        if action.operation.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.operation"),
                message: format!("Step '{id}' has an empty operation"),
            });
        }

        // Forward parameters may only use payloads of strictly earlier steps.
        for placeholder in parameter_placeholders(&action.parameters) {
            match positions.get(placeholder.step.as_str()) {
                Some(&p) if p < position => {}
                Some(_) => result.errors.push(ValidationError {
                    field: format!("{prefix}.parameters"),
                    message: format!(
                        "Step '{id}' references {placeholder}, which does not run before it"
                    ),
                }),
                None => result.errors.push(ValidationError {
                    field: format!("{prefix}.parameters"),
                    message: format!("Step '{id}' references {placeholder} of an unknown step"),
                }),
            }
        }

        match &action.rollback {
            Some(rollback) => {
                if rollback.operation.trim().is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.rollback.operation"),
                        message: format!("Step '{id}' has an empty rollback operation"),
                    });
                }

                // Compensation runs after the step itself, so its own payload is usable.
                for placeholder in parameter_placeholders(&rollback.parameters) {
                    match positions.get(placeholder.step.as_str()) {
                        Some(&p) if p <= position => {}
                        _ => result.errors.push(ValidationError {
                            field: format!("{prefix}.rollback.parameters"),
                            message: format!(
                                "Rollback of step '{id}' references {placeholder}, which is not available"
                            ),
                        }),
                    }
                }
            }
            None => result
                .warnings
                .push(format!("Step '{id}' has no rollback and cannot be undone")),
        }

        if let Some(factors) = &action.cost_factors {
            for (field, message) in factors.out_of_range() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.costFactors.{field}"),
                    message: format!("Step '{id}': {message}"),
                });
            }

            let service = factors.service.as_deref().unwrap_or(&action.service);
            if !self.known_cost_services.contains(&service.to_lowercase()) {
                result.warnings.push(format!(
                    "Step '{id}' declares cost factors for unrecognized service '{service}'"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostFactors;
    use crate::error::CloudPilotError;
    use crate::plan::{ParamValue, Parameters};
    use rust_decimal::Decimal;

    fn placeholder(text: &str) -> ParamValue {
        ParamValue::from(serde_json::Value::String(text.to_string()))
    }

    fn valid_plan() -> Plan {
        Plan::new("vpc with subnet")
            .with_step(
                "vpc",
                Action::new("ec2", "create_vpc")
                    .with_param("CidrBlock", "10.0.0.0/16")
                    .with_rollback(
                        "delete_vpc",
                        Parameters::from([(String::from("VpcId"), placeholder("${vpc.Vpc.VpcId}"))]),
                    ),
            )
            .with_step(
                "subnet",
                Action::new("ec2", "create_subnet")
                    .with_param("VpcId", placeholder("${vpc.Vpc.VpcId}"))
                    .with_rollback("delete_subnet", Parameters::new()),
            )
    }

    #[test]
    fn test_valid_plan_passes() {
        let validator = PlanValidator::new();
        let result = validator.validate(&valid_plan()).expect("valid");
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_step_reference() {
        let mut plan = valid_plan();
        plan.deployment_order.push(String::from("missing"));

        let err = PlanValidator::new().validate(&plan).expect_err("invalid");
        match err {
            CloudPilotError::Plan(PlanError::Validation { message, field }) => {
                assert!(message.contains("missing"));
                assert_eq!(field.as_deref(), Some("deploymentOrder[2]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_order_entry() {
        let mut plan = valid_plan();
        plan.deployment_order.push(String::from("vpc"));

        let result = PlanValidator::new().check(&plan);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("more than once"));
    }

    #[test]
    fn test_empty_service_and_operation() {
        let plan = Plan::new("broken").with_step("a", Action::new("", " "));

        let result = PlanValidator::new().check(&plan);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_forward_placeholder_is_rejected() {
        let plan = Plan::new("reversed")
            .with_step(
                "subnet",
                Action::new("ec2", "create_subnet").with_param("VpcId", placeholder("${vpc.VpcId}")),
            )
            .with_step("vpc", Action::new("ec2", "create_vpc"));

        let result = PlanValidator::new().check(&plan);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("does not run before it"));
    }

    #[test]
    fn test_rollback_may_reference_own_payload_only_backwards() {
        let plan = Plan::new("bad rollback")
            .with_step(
                "a",
                Action::new("s3", "create_bucket").with_rollback(
                    "delete_bucket",
                    Parameters::from([(String::from("Bucket"), placeholder("${b.Name}"))]),
                ),
            )
            .with_step("b", Action::new("s3", "create_bucket"));

        let result = PlanValidator::new().check(&plan);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "steps.a.rollback.parameters");
    }

    #[test]
    fn test_negative_sizing_is_rejected() {
        let factors = CostFactors {
            storage_gb: Some(Decimal::from(-5)),
            ..CostFactors::compute("ec2", "small").with_hours(Decimal::from(-730))
        };
        let plan = Plan::new("negative sizing")
            .with_step("web", Action::new("ec2", "run_instances").with_cost_factors(factors));

        let result = PlanValidator::new().check(&plan);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["steps.web.costFactors.hours", "steps.web.costFactors.storageGb"]
        );
        assert!(PlanValidator::new().validate(&plan).is_err());
    }

    #[test]
    fn test_oversized_sizing_is_rejected() {
        let plan = Plan::new("huge volume").with_step(
            "bucket",
            Action::new("s3", "create_bucket")
                .with_rollback("delete_bucket", Parameters::new())
                .with_cost_factors(CostFactors::storage("s3", Decimal::MAX)),
        );

        let result = PlanValidator::new().check(&plan);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "steps.bucket.costFactors.storageGb");
        assert!(result.errors[0].message.contains("exceeds"));
    }

    #[test]
    fn test_warnings() {
        let mut plan = Plan::new("")
            .with_step(
                "db",
                Action::new("dynamodb", "create_table")
                    .with_cost_factors(CostFactors::default()),
            );
        plan.steps
            .insert(String::from("orphan"), Action::new("s3", "create_bucket"));

        let result = PlanValidator::new().validate(&plan).expect("warnings only");
        assert_eq!(result.warnings.len(), 4);
    }
}
