//! Plan model, loading and validation.
//!
//! This module defines the structured plan consumed by the executor:
//! - Plan and action types with their execution results
//! - Parameter values with typed placeholders
//! - Parsing from JSON and YAML documents
//! - Validation before execution
//! - Content fingerprints for deployment history

mod hash;
mod parser;
mod spec;
mod validator;
mod value;

pub use hash::PlanHasher;
pub use parser::{PlanFormat, PlanParser};
pub use spec::{Action, ActionResult, Plan, RollbackSpec, StepId};
pub use validator::{PlanValidator, ValidationError, ValidationResult};
pub use value::{
    parameter_placeholders, resolve_parameters, ParamValue, Parameters, PayloadSource, Placeholder,
};
