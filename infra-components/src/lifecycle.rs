//! Lifecycle state machine for a deployment run.

use infra_primitives::RunId;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// States a deployment run can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Constructed, nothing issued yet.
    Pending,
    /// Resources are being created.
    Running,
    /// Every step completed.
    Succeeded,
    /// A step failed; resources created before it are left in place.
    Failed,
}

impl DeploymentState {
    /// Returns `true` once the run has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Begin issuing operations.
    Start,
    /// All operations completed.
    Succeed,
    /// An operation failed.
    Fail,
}

/// Lifecycle state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    run_id: RunId,
    state: DeploymentState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given run.
    #[must_use]
    pub const fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: DeploymentState::Pending,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> DeploymentState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state. Finished runs accept no events.
    pub fn transition(&mut self, event: DeploymentEvent) -> LifecycleResult<DeploymentState> {
        let next = match (self.state, event) {
            (DeploymentState::Pending, DeploymentEvent::Start) => DeploymentState::Running,
            (DeploymentState::Running, DeploymentEvent::Succeed) => DeploymentState::Succeeded,
            (DeploymentState::Pending | DeploymentState::Running, DeploymentEvent::Fail) => {
                DeploymentState::Failed
            }
            _ => {
                return Err(LifecycleError::InvalidTransition {
                    run_id: self.run_id,
                    from: self.state,
                    event,
                });
            }
        };

        debug!(run_id = %self.run_id, from = ?self.state, to = ?next, ?event, "deployment transition");
        self.state = next;
        Ok(next)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid deployment transition from {from:?} via {event:?} for run {run_id}")]
    InvalidTransition {
        /// Run whose transition failed.
        run_id: RunId,
        /// State prior to the attempted transition.
        from: DeploymentState,
        /// Event that triggered the failure.
        event: DeploymentEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
