//! Error types for the action engine.

use crate::types::ActionState;
use tether_core::error::{StoreError, TetherError};
use uuid::Uuid;

/// Errors raised by an action's `execute` operation.
///
/// These never cross back into the run queue; the proxy records them and
/// reports them through its view.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action failed: {0}")]
    Failed(String),
    #[error("Invalid action input: {0}")]
    InvalidInput(String),
    #[error("Action interrupted by cancellation")]
    Interrupted,
    #[error("Action panicked: {0}")]
    Panicked(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Engine misuse and queue errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Proxy {0} has already been run")]
    AlreadyRun(Uuid),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(ActionState, ActionState),
    #[error("A notification service is required but none was supplied")]
    MissingNotificationService,
    #[error("Run queue is closed")]
    QueueClosed,
    #[error("No async runtime available to run the queue")]
    NoRuntime,
    #[error(transparent)]
    Core(#[from] TetherError),
}
