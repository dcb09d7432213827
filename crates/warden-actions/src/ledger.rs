//! Completion tracking for idempotent re-execution.
//!
//! Re-running a rule for the same subject after a partial failure must not
//! re-apply actions that already completed. The executor consults a
//! [`CompletionLedger`] before dispatching and records each live success.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use warden_types::{ActionId, RuleId, SubjectId};

/// Identifies one action applied to one subject on behalf of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionKey {
    pub subject: SubjectId,
    pub rule: RuleId,
    pub action: ActionId,
}

impl CompletionKey {
    pub fn new(subject: &SubjectId, rule: &RuleId, action: &ActionId) -> Self {
        Self {
            subject: subject.clone(),
            rule: rule.clone(),
            action: action.clone(),
        }
    }
}

/// External store of completed `(subject, rule, action)` tuples.
pub trait CompletionLedger: Send + Sync {
    fn is_complete(&self, key: &CompletionKey) -> bool;

    fn record_completion(&self, key: CompletionKey);
}

/// Process-local ledger, suitable for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    completed: Mutex<HashSet<CompletionKey>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CompletionLedger for InMemoryLedger {
    fn is_complete(&self, key: &CompletionKey) -> bool {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn record_completion(&self, key: CompletionKey) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }
}
