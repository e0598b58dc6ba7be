//! Provider client trait definition.
//!
//! This is the capability the executor consumes. Implementations wrap
//! whatever SDK or gateway actually talks to the cloud.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::plan::{ParamValue, Parameters};

/// Outcome of a provider call: a payload, or a failure value.
pub type ProviderResult = std::result::Result<ParamValue, ProviderError>;

/// Capability for invoking a named operation on a named service.
///
/// Failures must be reported through the returned [`ProviderResult`], never
/// by panicking. Retrying is the implementation's decision; the executor
/// calls each operation at most once per attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Invokes `service.operation` with fully resolved parameters.
    async fn invoke(&self, service: &str, operation: &str, parameters: &Parameters) -> ProviderResult;
}

