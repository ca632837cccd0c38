//! Lifecycle enumerations shared by proxies and observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an action proxy.
///
/// Transitions are monotonic: `Created -> Executing -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Created,
    Executing,
    Finished,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Finished)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Created => write!(f, "created"),
            ActionState::Executing => write!(f, "executing"),
            ActionState::Finished => write!(f, "finished"),
        }
    }
}

impl std::str::FromStr for ActionState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActionState::Created),
            "executing" => Ok(ActionState::Executing),
            "finished" => Ok(ActionState::Finished),
            _ => Err(format!("Unknown action state: {}", s)),
        }
    }
}

/// Terminal outcome of one action run.
///
/// `Unknown` until the proxy reaches `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Unknown,
    Successful,
    Failed,
    Canceled,
}

impl CompletionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompletionStatus::Unknown)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Unknown => write!(f, "unknown"),
            CompletionStatus::Successful => write!(f, "successful"),
            CompletionStatus::Failed => write!(f, "failed"),
            CompletionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for CompletionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(CompletionStatus::Unknown),
            "successful" => Ok(CompletionStatus::Successful),
            "failed" => Ok(CompletionStatus::Failed),
            "canceled" => Ok(CompletionStatus::Canceled),
            _ => Err(format!("Unknown completion status: {}", s)),
        }
    }
}
