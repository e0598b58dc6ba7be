//! Per-call execution context.
//!
//! Everything the executor needs from its caller besides the plan and the
//! provider: the bound on each provider call and a cancellation flag. The
//! executor holds no ambient state of its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ExecutionConfig, DEFAULT_STEP_TIMEOUT_SECS};

/// Shared flag used to request cancellation of a running deployment.
///
/// Cancellation is observed only between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-supplied settings for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    step_timeout: Duration,
    cancellation: CancellationFlag,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS))
    }
}

impl ExecutionContext {
    /// Creates a context with the given per-call timeout.
    #[must_use]
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            step_timeout,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Creates a context from configuration.
    #[must_use]
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(Duration::from_secs(config.step_timeout_secs))
    }

    /// Uses an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Bound on each provider call.
    #[must_use]
    pub const fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// The cancellation flag, for handing to a signal handler.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
