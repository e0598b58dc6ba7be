//! Plan executor.
//!
//! Runs a validated plan step by step through a [`ProviderClient`], records
//! every success in the deployment ledger and, on the first failure, sweeps
//! the ledger backwards invoking each declared compensation exactly once.
//! Rollback is best-effort: a failed compensation does not stop the sweep.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cost::CostModel;
use crate::error::{CloudPilotError, ExecutionError, Result};
use crate::plan::{resolve_parameters, Action, ActionResult, ParamValue, Parameters, Plan, PlanValidator};
use crate::provider::ProviderClient;

use super::context::ExecutionContext;
use super::ledger::DeploymentLedger;
use super::report::{ExecutionReport, RollbackOutcome, StepFailure, StepOutcome};
use super::state::{ExecutionState, StateMachine};

/// Executor for deployment plans.
#[derive(Debug)]
pub struct PlanExecutor<'a, P: ProviderClient + ?Sized> {
    /// Provider used for every forward and compensating call.
    provider: &'a P,
    /// Cost model used to price the plan before it runs.
    cost_model: CostModel,
    /// Validator run before any provider call.
    validator: PlanValidator,
}

/// Step that stopped forward execution.
struct Halt {
    step: String,
    error: ExecutionError,
}

impl<'a, P: ProviderClient + ?Sized> PlanExecutor<'a, P> {
    /// Creates an executor using the default rate card.
    #[must_use]
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            cost_model: CostModel::new(),
            validator: PlanValidator::new(),
        }
    }

    /// Uses a custom cost model; the validator learns its services.
    #[must_use]
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.validator = PlanValidator::with_rate_card(cost_model.rates());
        self.cost_model = cost_model;
        self
    }

    /// Executes a plan.
    ///
    /// The plan is validated and priced first; its action results are
    /// overwritten with the outcome of this attempt. Step failures, timeouts,
    /// cancellation and failed compensations are reported in the returned
    /// [`ExecutionReport`], never as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudPilotError::Plan`] if the plan is invalid (no provider
    /// call is made), or [`CloudPilotError::PreconditionViolation`] if an
    /// internal contract is broken.
    pub async fn execute(&self, plan: &mut Plan, ctx: &ExecutionContext) -> Result<ExecutionReport> {
        let validation = self.validator.validate(plan)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        plan.reset_results();
        let estimate = self.cost_model.estimate_plan(plan);
        info!("Estimated monthly cost: ${}", estimate.rounded_total());
        plan.cost_estimate = Some(estimate);

        let mut ledger = DeploymentLedger::new();
        let mut machine = StateMachine::new();
        info!(
            "Starting deployment {} with {} steps",
            ledger.deployment_id(),
            plan.step_count()
        );

        if plan.is_empty() {
            machine.transition(ExecutionState::Succeeded)?;
            return Ok(Self::report(plan, &ledger, &machine, Vec::new(), None, None));
        }

        machine.transition(ExecutionState::Executing)?;
        let (steps, halt) = self.run_forward(plan, &mut ledger, ctx).await?;

        let Some(halt) = halt else {
            machine.transition(ExecutionState::Succeeded)?;
            info!("Deployment {} succeeded", ledger.deployment_id());
            return Ok(Self::report(plan, &ledger, &machine, steps, None, None));
        };

        machine.transition(ExecutionState::Failed)?;
        error!("Step '{}' failed: {}", halt.step, halt.error);

        machine.transition(ExecutionState::RollingBack)?;
        let outcomes = self.roll_back(&ledger, ctx).await;

        if outcomes.iter().all(RollbackOutcome::is_success) {
            machine.transition(ExecutionState::RolledBack)?;
            info!("Deployment {} rolled back", ledger.deployment_id());
        } else {
            machine.transition(ExecutionState::RollbackFailed)?;
            error!(
                "Deployment {} rollback incomplete: {} compensation(s) failed",
                ledger.deployment_id(),
                outcomes.iter().filter(|o| !o.is_success()).count()
            );
        }

        let failure = StepFailure {
            step: halt.step,
            error: halt.error.to_string(),
        };
        Ok(Self::report(plan, &ledger, &machine, steps, Some(outcomes), Some(failure)))
    }

    /// Runs steps in order until one fails or cancellation is observed.
    async fn run_forward(
        &self,
        plan: &mut Plan,
        ledger: &mut DeploymentLedger,
        ctx: &ExecutionContext,
    ) -> Result<(Vec<StepOutcome>, Option<Halt>)> {
        let mut outcomes = Vec::with_capacity(plan.step_count());
        let order = plan.deployment_order.clone();

        for step in order {
            if ctx.is_cancelled() {
                warn!("Cancellation requested before step '{step}'");
                return Ok((
                    outcomes,
                    Some(Halt {
                        step,
                        error: ExecutionError::Cancelled,
                    }),
                ));
            }

            let Some(action) = plan.steps.get_mut(&step) else {
                return Err(CloudPilotError::precondition(format!(
                    "step '{step}' is in the deployment order but has no action"
                )));
            };

            info!("Executing step '{step}': {}", action.description());
            match self.run_step(action, ledger, ctx.step_timeout()).await {
                Ok(payload) => {
                    info!("Step '{step}' succeeded");
                    let result = ActionResult::success(payload);
                    action.result = Some(result.clone());
                    ledger.record(&step, action)?;
                    outcomes.push(StepOutcome { step, result });
                }
                Err(e) => {
                    let result = ActionResult::failed(e.to_string());
                    action.result = Some(result.clone());
                    outcomes.push(StepOutcome {
                        step: step.clone(),
                        result,
                    });
                    return Ok((outcomes, Some(Halt { step, error: e })));
                }
            }
        }

        Ok((outcomes, None))
    }

    async fn run_step(
        &self,
        action: &Action,
        ledger: &DeploymentLedger,
        timeout: Duration,
    ) -> std::result::Result<ParamValue, ExecutionError> {
        let parameters = resolve_parameters(&action.parameters, ledger)?;
        self.invoke_bounded(&action.service, &action.operation, &parameters, timeout)
            .await
    }

    /// Invokes the compensation of every recorded step, newest first.
    ///
    /// Steps without a compensation are skipped. Cancellation is not observed
    /// here; every eligible compensation is attempted exactly once.
    async fn roll_back(&self, ledger: &DeploymentLedger, ctx: &ExecutionContext) -> Vec<RollbackOutcome> {
        let mut outcomes = Vec::new();

        for entry in ledger.rollback_order() {
            let Some(compensation) = &entry.action.rollback else {
                debug!("Step '{}' declares no compensation, skipping", entry.step);
                continue;
            };

            let service = &entry.action.service;
            warn!("Rolling back step '{}' with {service}.{}", entry.step, compensation.operation);

            let result = match resolve_parameters(&compensation.parameters, ledger) {
                Ok(parameters) => {
                    self.invoke_bounded(service, &compensation.operation, &parameters, ctx.step_timeout())
                        .await
                }
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(payload) => {
                    info!("Rolled back step '{}'", entry.step);
                    RollbackOutcome::succeeded(&entry.step, &compensation.operation, payload)
                }
                Err(e) => {
                    error!("Rollback of step '{}' failed: {e}", entry.step);
                    RollbackOutcome::failed(&entry.step, &compensation.operation, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Calls the provider, treating an elapsed timeout as a failure.
    async fn invoke_bounded(
        &self,
        service: &str,
        operation: &str,
        parameters: &Parameters,
        timeout: Duration,
    ) -> std::result::Result<ParamValue, ExecutionError> {
        match tokio::time::timeout(timeout, self.provider.invoke(service, operation, parameters)).await {
            Ok(result) => result.map_err(ExecutionError::from),
            Err(_) => Err(ExecutionError::Timeout { after: timeout }),
        }
    }

    fn report(
        plan: &Plan,
        ledger: &DeploymentLedger,
        machine: &StateMachine,
        steps: Vec<StepOutcome>,
        rollback: Option<Vec<RollbackOutcome>>,
        failure: Option<StepFailure>,
    ) -> ExecutionReport {
        ExecutionReport {
            success: machine.state() == ExecutionState::Succeeded,
            deployment_id: ledger.deployment_id().clone(),
            state: machine.state(),
            steps,
            rollback,
            failure,
            cost_estimate: plan.cost_estimate.clone(),
            started_at: ledger.started_at(),
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostFactors, RateCard};
    use crate::error::ProviderError;
    use crate::provider::{DispatchTable, MockProviderClient, OperationHandler, ProviderResult};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Registers a handler that logs the call and answers with `result`.
    fn record(
        table: &mut DispatchTable,
        log: &CallLog,
        service: &str,
        operation: &str,
        result: ProviderResult,
    ) {
        let log = Arc::clone(log);
        let label = format!("{service}.{operation}");
        table.register_fn(service, operation, move |_| {
            log.lock().expect("lock").push(label.clone());
            result.clone()
        });
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().expect("lock").clone()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Duration::from_secs(5))
    }

    fn with_undo(service: &str, create: &str, undo: &str) -> Action {
        Action::new(service, create).with_rollback(undo, Parameters::new())
    }

    fn three_step_plan() -> Plan {
        Plan::new("three resources")
            .with_step("a", with_undo("svc", "create_a", "delete_a"))
            .with_step("b", with_undo("svc", "create_b", "delete_b"))
            .with_step("c", with_undo("svc", "create_c", "delete_c"))
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds_immediately() {
        let table = DispatchTable::new();
        let mut plan = Plan::new("nothing to do");

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert!(report.success);
        assert_eq!(report.state, ExecutionState::Succeeded);
        assert!(report.steps.is_empty());
        assert!(report.rollback.is_none());
        assert_eq!(report.cost_estimate.map(|c| c.monthly_total), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_all_steps_succeed_in_declared_order() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        for op in ["create_a", "create_b", "create_c", "delete_a", "delete_b", "delete_c"] {
            record(&mut table, &log, "svc", op, Ok(ParamValue::from(op)));
        }
        let mut plan = three_step_plan();
        plan.deployment_order = vec!["c".into(), "a".into(), "b".into()];

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert!(report.success);
        assert_eq!(report.state, ExecutionState::Succeeded);
        assert!(report.rollback.is_none());
        assert!(report.failure.is_none());
        assert_eq!(calls(&log), vec!["svc.create_c", "svc.create_a", "svc.create_b"]);
        assert_eq!(report.succeeded_steps(), vec!["c", "a", "b"]);
        assert!(plan.steps.values().all(Action::is_succeeded));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_earlier_steps_in_reverse() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        record(&mut table, &log, "svc", "create_a", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "create_b", Ok(ParamValue::Null));
        record(
            &mut table,
            &log,
            "svc",
            "create_c",
            Err(ProviderError::failed("svc", "create_c", "quota exceeded")),
        );
        for op in ["delete_a", "delete_b", "delete_c"] {
            record(&mut table, &log, "svc", op, Ok(ParamValue::Null));
        }
        let mut plan = three_step_plan();

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert!(!report.success);
        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(
            calls(&log),
            vec!["svc.create_a", "svc.create_b", "svc.create_c", "svc.delete_b", "svc.delete_a"]
        );

        let failure = report.failure.as_ref().expect("failure recorded");
        assert_eq!(failure.step, "c");
        assert!(failure.error.contains("quota exceeded"));

        let rolled: Vec<&str> = report
            .rollback
            .iter()
            .flatten()
            .map(|o| o.step.as_str())
            .collect();
        assert_eq!(rolled, vec!["b", "a"]);
        assert!(report.rollback_failures().is_empty());
        assert!(matches!(
            plan.steps["c"].result,
            Some(ActionResult::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_compensation_does_not_stop_sweep() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        record(&mut table, &log, "svc", "create_a", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "create_b", Ok(ParamValue::Null));
        record(
            &mut table,
            &log,
            "svc",
            "create_c",
            Err(ProviderError::failed("svc", "create_c", "boom")),
        );
        record(
            &mut table,
            &log,
            "svc",
            "delete_b",
            Err(ProviderError::failed("svc", "delete_b", "in use")),
        );
        record(&mut table, &log, "svc", "delete_a", Ok(ParamValue::Null));
        let mut plan = three_step_plan();

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert_eq!(report.state, ExecutionState::RollbackFailed);
        assert_eq!(
            calls(&log),
            vec!["svc.create_a", "svc.create_b", "svc.create_c", "svc.delete_b", "svc.delete_a"]
        );
        let failures = report.rollback_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step, "b");
        assert_eq!(failures[0].operation, "delete_b");
    }

    #[tokio::test]
    async fn test_steps_without_compensation_are_skipped() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        record(&mut table, &log, "svc", "create_a", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "create_b", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "delete_a", Ok(ParamValue::Null));
        let mut plan = Plan::new("partial compensation")
            .with_step("a", with_undo("svc", "create_a", "delete_a"))
            .with_step("b", Action::new("svc", "create_b"))
            .with_step("c", Action::new("svc", "create_c"));

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(calls(&log), vec!["svc.create_a", "svc.create_b", "svc.delete_a"]);
        assert!(report.failure.expect("failure").error.contains("Unsupported"));
    }

    #[tokio::test]
    async fn test_first_step_failure_has_empty_rollback() {
        let table = DispatchTable::new();
        let mut plan = three_step_plan();

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(report.rollback, Some(Vec::new()));
        assert_eq!(report.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_step_is_rejected_before_any_call() {
        let mut provider = MockProviderClient::new();
        provider.expect_invoke().never();

        let mut plan = Plan::new("broken").with_step("a", Action::new("svc", "create_a"));
        plan.deployment_order.push(String::from("ghost"));

        let err = PlanExecutor::new(&provider)
            .execute(&mut plan, &ctx())
            .await
            .expect_err("validation failure");

        assert!(err.is_validation());
        assert!(plan.steps["a"].result.is_none());
    }

    #[tokio::test]
    async fn test_placeholders_resolved_from_earlier_payloads() {
        let mut provider = MockProviderClient::new();
        provider
            .expect_invoke()
            .withf(|service, operation, _| service == "ec2" && operation == "create_subnet")
            .times(1)
            .returning(|_, _, _| {
                Ok(ParamValue::from(serde_json::json!({"Subnet": {"SubnetId": "subnet-42"}})))
            });
        provider
            .expect_invoke()
            .withf(|_, operation, params| {
                operation == "run_instances"
                    && params.get("SubnetId") == Some(&ParamValue::from("subnet-42"))
            })
            .times(1)
            .returning(|_, _, _| Ok(ParamValue::from("i-123")));

        let mut plan = Plan::new("network then instance")
            .with_step("subnet", Action::new("ec2", "create_subnet"))
            .with_step(
                "vm",
                Action::new("ec2", "run_instances")
                    .with_param("SubnetId", ParamValue::from(serde_json::json!("${subnet.Subnet.SubnetId}"))),
            );

        let report = PlanExecutor::new(&provider).execute(&mut plan, &ctx()).await.expect("report");
        assert!(report.success);
        assert_eq!(plan.steps["vm"].success_payload(), Some(&ParamValue::from("i-123")));
    }

    #[tokio::test]
    async fn test_rollback_parameters_reference_own_payload() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        table.register_fn("ec2", "run_instances", |_| {
            Ok(ParamValue::from(serde_json::json!({"InstanceId": "i-9"})))
        });
        {
            let log = Arc::clone(&log);
            table.register_fn("ec2", "terminate_instances", move |params| {
                let id = params.get("InstanceId").map(ToString::to_string).unwrap_or_default();
                log.lock().expect("lock").push(id);
                Ok(ParamValue::Null)
            });
        }

        let undo = Parameters::from([(
            String::from("InstanceId"),
            ParamValue::from(serde_json::json!("${vm.InstanceId}")),
        )]);
        let mut plan = Plan::new("instance then broken step")
            .with_step("vm", Action::new("ec2", "run_instances").with_rollback("terminate_instances", undo))
            .with_step("dns", Action::new("route53", "change_records"));

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(calls(&log), vec!["i-9"]);
    }

    struct SlowHandler;

    #[async_trait]
    impl OperationHandler for SlowHandler {
        async fn handle(&self, _parameters: &Parameters) -> ProviderResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ParamValue::Null)
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_step_failure() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        record(&mut table, &log, "svc", "create_a", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "delete_a", Ok(ParamValue::Null));
        table.register("svc", "create_b", SlowHandler);
        let mut plan = Plan::new("slow second step")
            .with_step("a", with_undo("svc", "create_a", "delete_a"))
            .with_step("b", Action::new("svc", "create_b"));

        let ctx = ExecutionContext::new(Duration::from_millis(20));
        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx).await.expect("report");

        assert_eq!(report.state, ExecutionState::RolledBack);
        assert!(report.failure.expect("failure").error.contains("timed out"));
        assert_eq!(calls(&log), vec!["svc.create_a", "svc.delete_a"]);
    }

    #[tokio::test]
    async fn test_cancellation_checked_at_step_boundary() {
        let log = CallLog::default();
        let ctx = ctx();
        let mut table = DispatchTable::new();
        {
            let log = Arc::clone(&log);
            let flag = ctx.cancellation().clone();
            table.register_fn("svc", "create_a", move |_| {
                log.lock().expect("lock").push(String::from("svc.create_a"));
                flag.cancel();
                Ok(ParamValue::Null)
            });
        }
        record(&mut table, &log, "svc", "create_b", Ok(ParamValue::Null));
        record(&mut table, &log, "svc", "delete_a", Ok(ParamValue::Null));
        let mut plan = Plan::new("cancelled midway")
            .with_step("a", with_undo("svc", "create_a", "delete_a"))
            .with_step("b", Action::new("svc", "create_b"));

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx).await.expect("report");

        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(calls(&log), vec!["svc.create_a", "svc.delete_a"]);
        assert_eq!(report.steps.len(), 1);
        let failure = report.failure.expect("failure");
        assert_eq!(failure.step, "b");
        assert_eq!(failure.error, ExecutionError::Cancelled.to_string());
    }

    #[tokio::test]
    async fn test_compute_then_storage_failure_scenario() {
        let log = CallLog::default();
        let mut table = DispatchTable::new();
        record(&mut table, &log, "ec2", "run_instances", Ok(ParamValue::from("i-1")));
        record(&mut table, &log, "ec2", "terminate_instances", Ok(ParamValue::Null));
        record(
            &mut table,
            &log,
            "s3",
            "create_bucket",
            Err(ProviderError::failed("s3", "create_bucket", "BucketAlreadyExists")),
        );

        let mut plan = Plan::new("compute and storage")
            .with_step(
                "A",
                with_undo("ec2", "run_instances", "terminate_instances")
                    .with_cost_factors(CostFactors::compute("ec2", "small")),
            )
            .with_step(
                "B",
                Action::new("s3", "create_bucket")
                    .with_cost_factors(CostFactors::storage("s3", Decimal::from(5))),
            );

        let report = PlanExecutor::new(&table).execute(&mut plan, &ctx()).await.expect("report");

        assert!(!report.success);
        assert_eq!(report.state, ExecutionState::RolledBack);
        assert_eq!(report.succeeded_steps(), vec!["A"]);
        assert_eq!(
            calls(&log),
            vec!["ec2.run_instances", "s3.create_bucket", "ec2.terminate_instances"]
        );

        // 0.0208 x 730 for A plus 5 x 0.023 for B
        let expected = Decimal::new(208, 4) * Decimal::from(730) + Decimal::from(5) * Decimal::new(23, 3);
        let estimate = report.cost_estimate.expect("estimate");
        assert_eq!(estimate.monthly_total, expected);
        assert_eq!(estimate.line_items.len(), 2);
    }

    #[tokio::test]
    async fn test_overflowing_estimate_still_executes() {
        let mut table = DispatchTable::new();
        table.register_fn("ec2", "run_instances", |_| Ok(ParamValue::from("i-1")));

        let mut rates = RateCard::default();
        rates.set_compute_rate("metal", Decimal::MAX);
        let host = || {
            Action::new("ec2", "run_instances").with_cost_factors(
                CostFactors::compute("ec2", "metal").with_count(u32::MAX),
            )
        };
        let mut plan = Plan::new("oversized fleet")
            .with_step("a", host())
            .with_step("b", host());

        let report = PlanExecutor::new(&table)
            .with_cost_model(CostModel::with_rates(rates))
            .execute(&mut plan, &ctx())
            .await
            .expect("report");

        assert!(report.success);
        let estimate = report.cost_estimate.expect("estimate");
        assert_eq!(estimate.monthly_total, Decimal::ZERO);
        assert!(estimate.line_items.iter().all(|l| l.label.contains("overflowed")));
    }

    #[tokio::test]
    async fn test_results_are_reset_between_attempts() {
        let mut table = DispatchTable::new();
        table.register_fn("svc", "create_a", |_| Ok(ParamValue::Null));
        let mut plan = Plan::new("rerun").with_step("a", Action::new("svc", "create_a"));

        let executor = PlanExecutor::new(&table);
        let first = executor.execute(&mut plan, &ctx()).await.expect("first");
        let second = executor.execute(&mut plan, &ctx()).await.expect("second");

        assert!(first.success && second.success);
        assert_ne!(first.deployment_id, second.deployment_id);
        assert!(first.deployment_id < second.deployment_id);
    }
}
