//! Deployment engine.
//!
//! This module drives one deployment attempt:
//! - Explicit execution context (timeout, cancellation)
//! - The deployment ledger of completed actions
//! - The execution state machine
//! - Sequential execution with best-effort rollback

mod context;
mod executor;
mod ledger;
mod report;
mod state;

pub use context::{CancellationFlag, ExecutionContext};
pub use executor::PlanExecutor;
pub use ledger::{DeploymentId, DeploymentLedger, LedgerEntry};
pub use report::{ExecutionReport, OutcomeStatus, RollbackOutcome, StepFailure, StepOutcome};
pub use state::{ExecutionState, StateMachine};
