//! Side-effect dispatch.
//!
//! The executor never performs side effects itself. Live execution hands each
//! attempt to a [`Dispatcher`] supplied by the caller (a provisioning
//! connector, ticketing client, webhook sender). Dry runs hand attempts to a
//! [`FaultPlan`], which scripts failures without touching anything.

use std::collections::HashMap;

use thiserror::Error;
use warden_types::{ActionId, RuleId, SubjectId};

use crate::action::Action;

/// Why a single dispatch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The attempt may succeed if retried.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying cannot help; the action fails immediately.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The retry budget ran out before the action succeeded.
    #[error("timed out after {elapsed_ms}ms: {last_error}")]
    TimedOut { elapsed_ms: u64, last_error: String },
}

impl ActionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Everything a dispatcher needs to know about one attempt.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub subject: &'a SubjectId,
    pub rule: &'a RuleId,
    pub action: &'a Action,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Performs the side effect of one action attempt.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<(), ActionError>;
}

// ============================================================================
// Fault Plan
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fault {
    /// Fail the first `failures` attempts transiently, then succeed.
    Transient { failures: u32 },
    Permanent { message: String },
}

/// Scripted dispatch outcomes keyed by action id.
///
/// Actions without an entry succeed on their first attempt. The plan is
/// stateless: the attempt number in the request decides the result, so one
/// plan can drive many concurrent simulations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    faults: HashMap<ActionId, Fault>,
}

impl FaultPlan {
    /// Every action succeeds.
    pub fn none() -> Self {
        Self::default()
    }

    /// The action fails transiently on its first `failures` attempts.
    pub fn transient(mut self, action: impl Into<ActionId>, failures: u32) -> Self {
        self.faults
            .insert(action.into(), Fault::Transient { failures });
        self
    }

    /// The action fails transiently on every attempt.
    pub fn always_failing(self, action: impl Into<ActionId>) -> Self {
        self.transient(action, u32::MAX)
    }

    /// The action fails permanently on its first attempt.
    pub fn permanent(mut self, action: impl Into<ActionId>, message: &str) -> Self {
        self.faults.insert(
            action.into(),
            Fault::Permanent {
                message: message.to_string(),
            },
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }
}

impl Dispatcher for FaultPlan {
    fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<(), ActionError> {
        match self.faults.get(&request.action.id) {
            None => Ok(()),
            Some(Fault::Transient { failures }) if request.attempt <= *failures => {
                Err(ActionError::Transient(format!(
                    "scripted failure on attempt {}",
                    request.attempt
                )))
            }
            Some(Fault::Transient { .. }) => Ok(()),
            Some(Fault::Permanent { message }) => Err(ActionError::Permanent(message.clone())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
