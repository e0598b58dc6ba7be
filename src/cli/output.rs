//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::cost::CostEstimate;
use crate::engine::{ExecutionReport, ExecutionState, OutcomeStatus};
use crate::history::DeploymentRecord;
use crate::plan::{ActionResult, Plan, ValidationResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Rollback")]
    rollback: String,
}

/// Cost line row for table display.
#[derive(Tabled)]
struct CostRow {
    #[tabled(rename = "Item")]
    label: String,
    #[tabled(rename = "Monthly")]
    monthly: String,
}

/// Step outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// History row for table display.
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Deployment")]
    id: String,
    #[tabled(rename = "Recorded")]
    recorded: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Undo failures")]
    undo_failures: String,
    #[tabled(rename = "Plan")]
    fingerprint: String,
    #[tabled(rename = "Explanation")]
    explanation: String,
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    errors: Vec<ValidationErrorJson<'a>>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct ValidationErrorJson<'a> {
    field: &'a str,
    message: &'a str,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true for human-readable output.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.format, OutputFormat::Text)
    }

    /// Formats the result of plan validation.
    #[must_use]
    pub fn format_validation(&self, plan: &Plan, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = ValidationJson {
                    valid: result.errors.is_empty(),
                    errors: result
                        .errors
                        .iter()
                        .map(|e| ValidationErrorJson {
                            field: &e.field,
                            message: &e.message,
                        })
                        .collect(),
                    warnings: &result.warnings,
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = Self::format_plan_text(plan);

                if result.errors.is_empty() {
                    let _ = writeln!(output, "\n{} Plan is valid", "✓".green());
                } else {
                    let _ = writeln!(output, "\n{} Plan is invalid:", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field.dimmed(), error.message);
                    }
                }

                if !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a plan as a step table.
    fn format_plan_text(plan: &Plan) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "\nDeployment Plan: {}\n", plan.explanation);

        if plan.is_empty() {
            output.push_str("   No steps.\n");
            return output;
        }

        let rows: Vec<StepRow> = plan
            .deployment_order
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let (operation, rollback) = plan.steps.get(id).map_or_else(
                    || ("<unknown step>".red().to_string(), String::new()),
                    |a| {
                        (
                            a.description(),
                            a.rollback_operation().unwrap_or("-").to_string(),
                        )
                    },
                );
                StepRow {
                    index: i + 1,
                    step: id.clone(),
                    operation,
                    rollback,
                }
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        output
    }

    /// Formats a cost estimate.
    #[must_use]
    pub fn format_estimate(&self, estimate: &CostEstimate) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(estimate).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::from("\nEstimated monthly cost\n\n");

                if !estimate.line_items.is_empty() {
                    let rows: Vec<CostRow> = estimate
                        .line_items
                        .iter()
                        .map(|item| CostRow {
                            label: item.label.clone(),
                            monthly: format!("${}", item.monthly.round_dp(2)),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                let _ = writeln!(
                    output,
                    "\nTotal: {}",
                    format!("${}/month", estimate.rounded_total()).bold()
                );
                for note in &estimate.notes {
                    let _ = writeln!(output, "   {} {note}", "*".dimmed());
                }

                output
            }
        }
    }

    /// Formats an execution report.
    #[must_use]
    pub fn format_report(&self, report: &ExecutionReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &ExecutionReport) -> String {
        let mut output = String::new();

        let headline = if report.success {
            format!("{} Deployment succeeded", "✓".green())
        } else {
            format!("{} Deployment failed", "✗".red())
        };
        let _ = writeln!(output, "\n{headline}");
        let _ = writeln!(output, "   Deployment: {}", report.deployment_id);
        let _ = writeln!(output, "   State: {}", Self::format_state(report.state));

        if !report.steps.is_empty() {
            let rows: Vec<OutcomeRow> = report
                .steps
                .iter()
                .map(|s| match &s.result {
                    ActionResult::Success { payload } => OutcomeRow {
                        step: s.step.clone(),
                        status: "success".green().to_string(),
                        detail: Self::truncate(&payload.to_string(), 60),
                    },
                    ActionResult::Failed { error } => OutcomeRow {
                        step: s.step.clone(),
                        status: "failed".red().to_string(),
                        detail: Self::truncate(error, 60),
                    },
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if let Some(failure) = &report.failure {
            let _ = writeln!(output, "\nFailed at step '{}': {}", failure.step, failure.error);
        }

        if let Some(rollback) = &report.rollback {
            if rollback.is_empty() {
                output.push_str("\nRollback: nothing to undo\n");
            } else {
                let rows: Vec<OutcomeRow> = rollback
                    .iter()
                    .map(|o| OutcomeRow {
                        step: format!("{} ({})", o.step, o.action),
                        status: match o.status {
                            OutcomeStatus::Success => "undone".green().to_string(),
                            OutcomeStatus::Failed => "failed".red().to_string(),
                        },
                        detail: Self::truncate(&o.detail.to_string(), 60),
                    })
                    .collect();
                output.push_str("\nRollback:\n");
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
            }
        }

        let failures = report.rollback_failures();
        if !failures.is_empty() {
            let _ = writeln!(
                output,
                "\n{} Manual cleanup required, these compensations failed:",
                "⚠".yellow()
            );
            for failure in &failures {
                let _ = writeln!(output, "   - {failure}");
            }
        }

        if let Some(estimate) = &report.cost_estimate {
            let _ = writeln!(output, "\nEstimated monthly cost: ${}", estimate.rounded_total());
        }

        output
    }

    /// Formats a list of history records.
    #[must_use]
    pub fn format_history(&self, records: &[DeploymentRecord]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_default(),
            OutputFormat::Text => {
                if records.is_empty() {
                    return String::from("No deployments recorded.\n");
                }

                let rows: Vec<HistoryRow> = records
                    .iter()
                    .map(|r| HistoryRow {
                        id: r.deployment_id.to_string(),
                        recorded: r.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        state: Self::format_state(r.state),
                        undo_failures: match r.rollback_failure_count() {
                            0 => String::from("-"),
                            n => n.to_string().red().to_string(),
                        },
                        fingerprint: r.plan_fingerprint.get(..8).unwrap_or(&r.plan_fingerprint).to_string(),
                        explanation: Self::truncate(&r.explanation, 40),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a single history record.
    #[must_use]
    pub fn format_record(&self, record: &DeploymentRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(record).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\nPlan: {}", record.explanation);
                let _ = writeln!(output, "   Fingerprint: {}", record.plan_fingerprint);
                let _ = writeln!(output, "   Recorded: {}", record.recorded_at.to_rfc3339());
                output.push_str(&Self::format_report_text(&record.report));
                output
            }
        }
    }

    /// Formats an execution state with color.
    fn format_state(state: ExecutionState) -> String {
        match state {
            ExecutionState::Succeeded | ExecutionState::RolledBack => state.to_string().green().to_string(),
            ExecutionState::RollbackFailed | ExecutionState::Failed => state.to_string().red().to_string(),
            _ => state.to_string().yellow().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostFactors, CostModel};
    use crate::engine::{DeploymentId, RollbackOutcome, StepFailure, StepOutcome};
    use crate::plan::{Action, ParamValue, PlanValidator};
    use chrono::Utc;

    fn failed_report() -> ExecutionReport {
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
                    step: String::from("vm"),
                    result: ActionResult::failed("quota exceeded"),
                },
            ],
            rollback: Some(vec![RollbackOutcome::failed("bucket", "delete_bucket", "access denied")]),
            failure: Some(StepFailure {
                step: String::from("vm"),
                error: String::from("quota exceeded"),
            }),
            cost_estimate: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_report_text_mentions_failures() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_report(&failed_report());

        assert!(text.contains("Deployment failed"));
        assert!(text.contains("Failed at step 'vm': quota exceeded"));
        assert!(text.contains("Manual cleanup required"));
        assert!(text.contains("delete_bucket"));
    }

    #[test]
    fn test_report_json_is_wire_format() {
        let json = OutputFormatter::new(OutputFormat::Json).format_report(&failed_report());
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["success"], false);
        assert_eq!(value["steps"][1]["status"], "failed");
        assert_eq!(value["rollback"][0]["action"], "delete_bucket");
        assert_eq!(value["rollback"][0]["status"], "failed");
    }

    #[test]
    fn test_validation_json() {
        let mut plan = Plan::new("broken").with_step("a", Action::new("s3", "create_bucket"));
        plan.deployment_order.push(String::from("ghost"));
        let result = PlanValidator::new().check(&plan);

        let json = OutputFormatter::new(OutputFormat::Json).format_validation(&plan, &result);
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["valid"], false);
        assert!(!value["errors"].as_array().expect("errors").is_empty());
    }

    #[test]
    fn test_estimate_text_shows_total() {
        colored::control::set_override(false);
        let plan = Plan::new("one vm").with_step(
            "vm",
            Action::new("ec2", "run_instances").with_cost_factors(CostFactors::compute("ec2", "small")),
        );
        let estimate = CostModel::new().estimate_plan(&plan);

        let text = OutputFormatter::new(OutputFormat::Text).format_estimate(&estimate);
        assert!(text.contains("Total: $15.18/month"));
    }

    #[test]
    fn test_history_table_counts_undo_failures() {
        colored::control::set_override(false);
        let plan = Plan::new("bucket and vm").with_step("bucket", Action::new("s3", "create_bucket"));
        let record = DeploymentRecord::new(&plan, failed_report());
        assert_eq!(record.rollback_failure_count(), 1);

        let text = OutputFormatter::new(OutputFormat::Text).format_history(&[record]);
        assert!(text.contains("Undo failures"));
        assert!(text.contains("rollback_failed"));
        assert!(text.contains("| 1 "));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("ééééééééééé", 6), "ééé...");
    }
}
