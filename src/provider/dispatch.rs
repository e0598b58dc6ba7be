//! Explicit `(service, operation)` dispatch.
//!
//! Instead of looking operations up by name on a generic SDK object, every
//! supported pair is registered with a typed handler. Calling a pair that was
//! never registered yields [`ProviderError::Unsupported`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::plan::Parameters;

use super::client::{ProviderClient, ProviderResult};

/// Handler for one `(service, operation)` pair.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Runs the operation.
    async fn handle(&self, parameters: &Parameters) -> ProviderResult;
}

/// Adapts a synchronous closure into an [`OperationHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&Parameters) -> ProviderResult + Send + Sync,
{
    /// Wraps a closure.
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> OperationHandler for FnHandler<F>
where
    F: Fn(&Parameters) -> ProviderResult + Send + Sync,
{
    async fn handle(&self, parameters: &Parameters) -> ProviderResult {
        (self.0)(parameters)
    }
}

/// Key of a dispatch table entry.
type OperationKey = (String, String);

/// A provider client backed by registered handlers.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: BTreeMap<OperationKey, Arc<dyn OperationHandler>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for the same pair.
    pub fn register(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: impl OperationHandler + 'static,
    ) -> &mut Self {
        let key = (service.into(), operation.into());
        debug!("Registering handler for {}.{}", key.0, key.1);
        self.handlers.insert(key, Arc::new(handler));
        self
    }

    /// Registers a synchronous closure as a handler.
    pub fn register_fn<F>(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(&Parameters) -> ProviderResult + Send + Sync + 'static,
    {
        self.register(service, operation, FnHandler::new(f))
    }

    /// Returns true if the pair has a handler.
    #[must_use]
    pub fn supports(&self, service: &str, operation: &str) -> bool {
        self.handlers
            .contains_key(&(service.to_string(), operation.to_string()))
    }

    /// All registered pairs, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<(&str, &str)> {
        self.handlers
            .keys()
            .map(|(s, o)| (s.as_str(), o.as_str()))
            .collect()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("operations", &self.operations())
            .finish()
    }
}

#[async_trait]
impl ProviderClient for DispatchTable {
    async fn invoke(&self, service: &str, operation: &str, parameters: &Parameters) -> ProviderResult {
        let key = (service.to_string(), operation.to_string());
        let Some(handler) = self.handlers.get(&key) else {
            warn!("No handler registered for {service}.{operation}");
            return Err(ProviderError::Unsupported {
                service: key.0,
                operation: key.1,
            });
        };
        handler.handle(parameters).await
    }
}
