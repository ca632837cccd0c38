//! Proxy state machine with validated transitions.
//!
//! Created -> Executing -> Finished. No state is revisited.

use crate::error::EngineError;
use crate::types::ActionState;

/// Validate that a state transition is allowed.
pub fn validate_transition(from: ActionState, to: ActionState) -> Result<(), EngineError> {
    let valid = matches!(
        (from, to),
        (ActionState::Created, ActionState::Executing)
            | (ActionState::Executing, ActionState::Finished)
    );

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition(from, to))
    }
}
