//! External collaborators the engine reads from and reports to.
//!
//! The engine owns none of this state. Attribute and grant lookups, the
//! rule/SoD/weight store and the audit sink are supplied by the embedding
//! application; the in-memory implementations here back tests, the CLI and
//! small deployments.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use warden_actions::ActionOutcome;
use warden_policy::RuleError;
use warden_sim::PolicySnapshot;
use warden_sod::Violation;
use warden_types::{AttributeMap, RuleId, Subject, SubjectId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("subject '{0}' not found")]
    SubjectNotFound(SubjectId),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;

// ============================================================================
// Traits
// ============================================================================

/// Supplies a subject's current profile attributes.
pub trait AttributeSource: Send + Sync {
    fn attributes(&self, subject: &SubjectId) -> Result<AttributeMap>;

    /// Normalized risk factors for the subject. Sources that do not compute
    /// any report none, which scores 0.
    fn risk_factors(&self, subject: &SubjectId) -> Result<BTreeMap<String, f64>> {
        let _ = subject;
        Ok(BTreeMap::new())
    }
}

/// Supplies held grants and display names for grant identifiers.
pub trait GrantCatalog: Send + Sync {
    fn grants(&self, subject: &SubjectId) -> Result<BTreeSet<String>>;

    fn display_name(&self, grant: &str) -> Option<String> {
        let _ = grant;
        None
    }
}

/// Supplies the current immutable policy snapshot.
pub trait PolicyStore: Send + Sync {
    fn snapshot(&self) -> Result<PolicySnapshot>;
}

/// Receives outcomes and findings for display and compliance logging.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// One entry handed to an [`AuditSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuditRecord {
    ActionOutcome {
        subject: SubjectId,
        rule: RuleId,
        outcome: ActionOutcome,
    },
    Violation(Violation),
    RuleError(RuleError),
}

// ============================================================================
// In-Memory Implementations
// ============================================================================

/// Subjects and grant display names held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    subjects: RwLock<HashMap<SubjectId, Subject>>,
    display_names: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a subject.
    pub fn upsert(&self, subject: Subject) {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.id.clone(), subject);
    }

    pub fn name_grant(&self, grant: &str, display_name: &str) {
        self.display_names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(grant.to_string(), display_name.to_string());
    }

    /// Records a granted role or entitlement.
    pub fn grant(&self, subject: &SubjectId, grant: &str) -> Result<()> {
        let mut subjects = self
            .subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = subjects
            .get_mut(subject)
            .ok_or_else(|| CollaboratorError::SubjectNotFound(subject.clone()))?;
        entry.grants.insert(grant.to_string());
        Ok(())
    }

    fn with_subject<T>(&self, id: &SubjectId, f: impl FnOnce(&Subject) -> T) -> Result<T> {
        self.subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(f)
            .ok_or_else(|| CollaboratorError::SubjectNotFound(id.clone()))
    }
}

impl AttributeSource for InMemoryDirectory {
    fn attributes(&self, subject: &SubjectId) -> Result<AttributeMap> {
        self.with_subject(subject, |s| s.attributes.clone())
    }

    fn risk_factors(&self, subject: &SubjectId) -> Result<BTreeMap<String, f64>> {
        self.with_subject(subject, |s| s.risk_factors.clone())
    }
}

impl GrantCatalog for InMemoryDirectory {
    fn grants(&self, subject: &SubjectId) -> Result<BTreeSet<String>> {
        self.with_subject(subject, |s| s.grants.clone())
    }

    fn display_name(&self, grant: &str) -> Option<String> {
        self.display_names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(grant)
            .cloned()
    }
}

/// A policy store holding one published snapshot at a time.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    current: RwLock<PolicySnapshot>,
}

impl InMemoryPolicyStore {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// Replaces the snapshot. Evaluations already running keep the one
    /// they started with.
    pub fn publish(&self, snapshot: PolicySnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn snapshot(&self) -> Result<PolicySnapshot> {
        Ok(self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Emits one structured `tracing` event per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        match record {
            AuditRecord::ActionOutcome {
                subject,
                rule,
                outcome,
            } => info!(
                subject = %subject,
                rule = %rule,
                action = %outcome.action_id,
                status = ?outcome.status,
                attempts = outcome.attempts,
                duration_ms = outcome.duration_ms,
                dry_run = outcome.dry_run,
                "audit: action outcome"
            ),
            AuditRecord::Violation(violation) => warn!(
                subject = %violation.subject,
                rule = %violation.rule_id,
                severity = %violation.severity,
                blocking = violation.is_blocking(),
                "audit: sod violation"
            ),
            AuditRecord::RuleError(error) => warn!(
                rule = %error.rule_id,
                error = %error.error,
                "audit: rule configuration error"
            ),
        }
    }
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_policy::{Rule, RuleSet};

    #[test]
    fn test_directory_lookups() {
        let directory = InMemoryDirectory::new();
        directory.upsert(
            Subject::new("u-1")
                .with_attribute("department", "Finance")
                .with_grant("finance-approve")
                .with_risk_factor("privileged", 0.5),
        );
        directory.name_grant("finance-approve", "Approve payments");
        let id = SubjectId::new("u-1");

        assert!(directory.attributes(&id).unwrap().contains_key("department"));
        assert!(directory.grants(&id).unwrap().contains("finance-approve"));
        assert_eq!(directory.risk_factors(&id).unwrap()["privileged"], 0.5);
        assert_eq!(
            directory.display_name("finance-approve").as_deref(),
            Some("Approve payments")
        );
    }

    #[test]
    fn test_unknown_subject() {
        let directory = InMemoryDirectory::new();
        let id = SubjectId::new("ghost");
        assert_eq!(
            directory.grants(&id),
            Err(CollaboratorError::SubjectNotFound(id.clone()))
        );
        assert!(directory.grant(&id, "x").is_err());
    }

    #[test]
    fn test_store_publishes_new_snapshot() {
        let store = InMemoryPolicyStore::default();
        assert!(store.snapshot().unwrap().rules().is_empty());

        store.publish(PolicySnapshot::new(
            RuleSet::new("v2").with_rule(Rule::new("r", 1)),
        ));
        assert_eq!(store.snapshot().unwrap().rules().len(), 1);
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        let violation = warden_sod::check(
            &["a".to_string(), "b".to_string()].into_iter().collect(),
            &[warden_sod::SodRule::mutual_exclusion("ab", &["a"], &["b"])],
            &SubjectId::new("u-1"),
        )
        .remove(0);
        sink.record(&AuditRecord::Violation(violation.clone()));
        TracingAuditSink.record(&AuditRecord::Violation(violation));

        assert_eq!(sink.records().len(), 1);
    }
}
