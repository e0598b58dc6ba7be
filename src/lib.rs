// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # cloudpilot
//!
//! Executes ordered cloud provisioning plans with plan-time cost estimates and
//! best-effort rollback.
//!
//! ## Overview
//!
//! A plan produced by an external planning step lists provisioning actions
//! (`service`, `operation`, `parameters`) in a declared order, each with an
//! optional compensating operation and optional sizing attributes. cloudpilot:
//!
//! - Validates the plan before touching the cloud
//! - Prices it with fixed-point decimal arithmetic
//! - Runs each step strictly in order through a provider client
//! - On the first failure, undoes the completed steps in reverse order
//! - Returns a structured report of what ran, what failed and what was undone
//!
//! ## Architecture
//!
//! The kernel is built around a per-attempt **deployment ledger**:
//!
//! 1. **Plan**: Declared steps, parsed from JSON or YAML
//! 2. **Ledger**: Actions that completed successfully, in execution order
//! 3. **Executor**: State machine that drives execution and the rollback sweep
//!
//! ## Modules
//!
//! - [`plan`]: Plan model, placeholders, parsing and validation
//! - [`cost`]: Cost model and rate card
//! - [`provider`]: Provider client capability, dispatch table, HTTP gateway
//! - [`engine`]: Ledger, state machine and plan executor
//! - [`history`]: Deployment history storage
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "explanation": "Static site bucket and one web server",
//!   "deploymentOrder": ["bucket", "web"],
//!   "steps": {
//!     "bucket": {
//!       "service": "s3", "operation": "create_bucket",
//!       "parameters": {"Bucket": "site-assets"},
//!       "rollback": {"operation": "delete_bucket", "parameters": {"Bucket": "site-assets"}},
//!       "costFactors": {"service": "s3", "storageGb": 5}
//!     },
//!     "web": {
//!       "service": "ec2", "operation": "run_instances",
//!       "parameters": {"InstanceType": "t3.micro"},
//!       "rollback": {"operation": "terminate_instances",
//!                    "parameters": {"InstanceId": "${web.InstanceId}"}},
//!       "costFactors": {"instanceType": "t3.micro"}
//!     }
//!   }
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod cost;
pub mod engine;
pub mod error;
pub mod history;
pub mod plan;
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{AppConfig, ConfigParser, ConfigValidator};
pub use cost::{CostEstimate, CostFactors, CostModel, RateCard};
pub use engine::{
    CancellationFlag, DeploymentId, DeploymentLedger, ExecutionContext, ExecutionReport,
    ExecutionState, PlanExecutor,
};
pub use error::{CloudPilotError, ExecutionError, Result, RollbackError};
pub use history::{DeploymentRecord, HistoryStore, LocalHistoryStore};
pub use plan::{Action, ParamValue, Parameters, Plan, PlanParser, PlanValidator};
pub use provider::{DispatchTable, HttpProviderClient, ProviderClient};
