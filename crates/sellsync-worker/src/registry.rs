//! Action handler registry.
//!
//! Every executable action maps to exactly one [`ActionHandler`]. The
//! registry is populated once at startup and only read afterwards, so it
//! needs no interior locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use sellsync_core::AppError;
use sellsync_entity::action::ActionType;
use sellsync_entity::job::Job;

/// How a single job execution failed.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A passing condition. The job keeps its retry budget and may run again.
    #[error("retryable: {0}")]
    Retryable(String),

    /// The command itself is broken. Retrying would fail the same way.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Worker-side infrastructure failure, e.g. the database going away.
    #[error(transparent)]
    Internal(#[from] AppError),
}

/// One executable job kind.
#[async_trait]
pub trait ActionHandler: Send + Sync + std::fmt::Debug {
    /// The action this handler executes.
    fn action_type(&self) -> ActionType;

    /// Deadline for one execution, including the remote round trip.
    fn timeout(&self) -> Duration;

    /// Runs the job and returns the result to store on completion.
    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError>;
}

/// Maps action types to their handlers.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. Replacing an existing registration is a wiring
    /// mistake and is logged loudly.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        let action = handler.action_type();
        if self.handlers.insert(action, handler).is_some() {
            warn!(action = %action, "Replaced an existing action handler");
        } else {
            debug!(action = %action, "Registered action handler");
        }
    }

    /// Looks up the handler for an action.
    pub fn resolve(&self, action: ActionType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&action).map(Arc::clone)
    }

    /// Whether an action can currently be executed.
    pub fn has_handler(&self, action: ActionType) -> bool {
        self.handlers.contains_key(&action)
    }

    /// All registered actions, in no particular order.
    pub fn registered_actions(&self) -> Vec<ActionType> {
        self.handlers.keys().copied().collect()
    }

    /// Executes a job through its registered handler. A job whose action
    /// has no handler fails fatally, since requeueing it could never help.
    pub async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let Some(handler) = self.resolve(job.action_type) else {
            return Err(ActionError::Fatal(format!(
                "no handler registered for action {}",
                job.action_type
            )));
        };
        handler.execute(job).await
    }
}
