//! Action lifecycle state machine.
//!
//! | From                  | Event             | To                 |
//! |-----------------------|-------------------|--------------------|
//! | Pending, Retrying     | `Dispatch`        | Running            |
//! | Pending               | `RequireApproval` | AwaitingApproval   |
//! | Pending               | `Skip`            | Skipped            |
//! | AwaitingApproval      | `Approve`         | Pending            |
//! | Running               | `Succeed`         | Succeeded          |
//! | Running               | `RetryScheduled`  | Retrying           |
//! | Running, Retrying     | `Fail`            | Failed             |
//!
//! Every other pair is an [`InvalidTransition`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where an action currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Skipped,
    AwaitingApproval,
}

/// Inputs that move an action between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    Dispatch,
    Succeed,
    RetryScheduled,
    Fail,
    RequireApproval,
    Approve,
    Skip,
}

/// A transition not present in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid action transition: {event:?} from {from:?}")]
pub struct InvalidTransition {
    pub from: ActionState,
    pub event: ActionEvent,
}

impl ActionState {
    /// Applies an event, returning the next state.
    pub fn apply(self, event: ActionEvent) -> Result<Self, InvalidTransition> {
        use ActionEvent as E;
        use ActionState as S;

        let next = match (self, event) {
            (S::Pending | S::Retrying, E::Dispatch) => S::Running,
            (S::Pending, E::RequireApproval) => S::AwaitingApproval,
            (S::Pending, E::Skip) => S::Skipped,
            (S::AwaitingApproval, E::Approve) => S::Pending,
            (S::Running, E::Succeed) => S::Succeeded,
            (S::Running, E::RetryScheduled) => S::Retrying,
            (S::Running | S::Retrying, E::Fail) => S::Failed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Terminal states never change again within one execution.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

/// Tracks an action's current state and every state it passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    current: ActionState,
    history: Vec<ActionState>,
}

impl StateTrail {
    pub fn new() -> Self {
        Self {
            current: ActionState::Pending,
            history: vec![ActionState::Pending],
        }
    }

    pub fn current(&self) -> ActionState {
        self.current
    }

    /// Applies an event and records the resulting state.
    pub fn advance(&mut self, event: ActionEvent) -> Result<ActionState, InvalidTransition> {
        let next = self.current.apply(event)?;
        self.current = next;
        self.history.push(next);
        Ok(next)
    }

    pub fn into_history(self) -> Vec<ActionState> {
        self.history
    }
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ActionState::Pending, ActionEvent::Dispatch, ActionState::Running)]
    #[test_case(ActionState::Running, ActionEvent::Succeed, ActionState::Succeeded)]
    #[test_case(ActionState::Running, ActionEvent::RetryScheduled, ActionState::Retrying)]
    #[test_case(ActionState::Retrying, ActionEvent::Dispatch, ActionState::Running)]
    #[test_case(ActionState::Retrying, ActionEvent::Fail, ActionState::Failed)]
    #[test_case(ActionState::Pending, ActionEvent::RequireApproval, ActionState::AwaitingApproval)]
    #[test_case(ActionState::AwaitingApproval, ActionEvent::Approve, ActionState::Pending)]
    #[test_case(ActionState::Pending, ActionEvent::Skip, ActionState::Skipped)]
    fn test_valid_transitions(from: ActionState, event: ActionEvent, to: ActionState) {
        assert_eq!(from.apply(event), Ok(to));
    }

    #[test_case(ActionState::Succeeded, ActionEvent::Dispatch; "succeeded is terminal")]
    #[test_case(ActionState::Failed, ActionEvent::Dispatch; "failed is terminal")]
    #[test_case(ActionState::Skipped, ActionEvent::Dispatch; "skipped is terminal")]
    #[test_case(ActionState::Pending, ActionEvent::Succeed; "cannot succeed without running")]
    #[test_case(ActionState::AwaitingApproval, ActionEvent::Dispatch; "approval first")]
    fn test_invalid_transitions(from: ActionState, event: ActionEvent) {
        assert_eq!(from.apply(event), Err(InvalidTransition { from, event }));
    }

    #[test]
    fn test_trail_records_retry_path() {
        let mut trail = StateTrail::new();
        trail.advance(ActionEvent::Dispatch).unwrap();
        trail.advance(ActionEvent::RetryScheduled).unwrap();
        trail.advance(ActionEvent::Dispatch).unwrap();
        trail.advance(ActionEvent::Succeed).unwrap();

        assert_eq!(trail.current(), ActionState::Succeeded);
        assert!(trail.current().is_terminal());
        assert_eq!(
            trail.into_history(),
            vec![
                ActionState::Pending,
                ActionState::Running,
                ActionState::Retrying,
                ActionState::Running,
                ActionState::Succeeded,
            ]
        );
    }
}
