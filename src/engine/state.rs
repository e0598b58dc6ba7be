//! Execution state machine.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{CloudPilotError, Result};

/// State of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Nothing has run yet.
    Pending,
    /// Steps are being executed in order.
    Executing,
    /// Every step succeeded.
    Succeeded,
    /// A step failed or the attempt was cancelled.
    Failed,
    /// Compensations are being invoked.
    RollingBack,
    /// Every attempted compensation succeeded.
    RolledBack,
    /// At least one compensation failed.
    RollbackFailed,
}

impl ExecutionState {
    /// Returns true if the machine may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing | Self::Succeeded)
                | (Self::Executing, Self::Succeeded | Self::Failed)
                | (Self::Failed, Self::RollingBack)
                | (Self::RollingBack, Self::RolledBack | Self::RollbackFailed)
        )
    }

    /// Returns true for states with no outgoing transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::RolledBack | Self::RollbackFailed)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
        };
        write!(f, "{s}")
    }
}

/// Tracks the current state of one attempt and rejects illegal moves.
#[derive(Debug)]
pub struct StateMachine {
    state: ExecutionState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Creates a machine in [`ExecutionState::Pending`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ExecutionState::Pending,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudPilotError::PreconditionViolation`] if the move is not
    /// allowed from the current state. The state is left unchanged.
    pub fn transition(&mut self, next: ExecutionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            error!("Illegal state transition {} -> {next}", self.state);
            return Err(CloudPilotError::precondition(format!(
                "illegal state transition {} -> {next}",
                self.state
            )));
        }

        debug!("State transition {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }
}
