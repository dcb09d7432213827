//! Conflict detection over grant sets.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_types::{SodRuleId, Subject, SubjectId};

use crate::rule::{Enforcement, Severity, SodRule, SodRuleType};

// ============================================================================
// Violation
// ============================================================================

/// One subject violating one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub subject: SubjectId,
    pub rule_id: SodRuleId,
    pub rule_name: String,
    pub rule_type: SodRuleType,
    pub severity: Severity,
    pub enforcement: Enforcement,
    /// Held grants from the rule's left set.
    pub left_held: BTreeSet<String>,
    /// Held grants from the rule's right set.
    pub right_held: BTreeSet<String>,
}

impl Violation {
    pub fn is_blocking(&self) -> bool {
        self.enforcement == Enforcement::Block
    }
}

// ============================================================================
// Single Subject
// ============================================================================

/// Checks one subject's grants against every rule.
///
/// Returns one violation per violated rule, in rule order. Rules listing the
/// subject as an exception are skipped.
pub fn check(grants: &BTreeSet<String>, rules: &[SodRule], subject: &SubjectId) -> Vec<Violation> {
    rules
        .iter()
        .filter(|rule| !rule.exempts(subject))
        .filter_map(|rule| {
            let (left_held, right_held) = rule.conflict(grants)?;
            debug!(
                subject = %subject,
                rule = %rule.id,
                severity = %rule.severity,
                "sod violation"
            );
            Some(Violation {
                subject: subject.clone(),
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                rule_type: rule.rule_type,
                severity: rule.severity,
                enforcement: rule.enforcement,
                left_held,
                right_held,
            })
        })
        .collect()
}

/// Result of pre-checking a single grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCheck {
    /// `false` when any new violation has `block` enforcement.
    pub allowed: bool,
    /// New violations with `block` enforcement.
    pub blocking: Vec<Violation>,
    /// New violations with `detect` enforcement.
    pub detected: Vec<Violation>,
}

/// Would adding `grant` create a violation the subject does not already have?
///
/// Conflicts that exist before the grant are not attributed to it.
pub fn check_grant(
    current: &BTreeSet<String>,
    grant: &str,
    rules: &[SodRule],
    subject: &SubjectId,
) -> GrantCheck {
    let existing: HashSet<SodRuleId> = check(current, rules, subject)
        .into_iter()
        .map(|v| v.rule_id)
        .collect();

    let mut proposed = current.clone();
    proposed.insert(grant.to_string());

    let (blocking, detected): (Vec<Violation>, Vec<Violation>) = check(&proposed, rules, subject)
        .into_iter()
        .filter(|v| !existing.contains(&v.rule_id))
        .partition(Violation::is_blocking);

    let allowed = blocking.is_empty();
    if !allowed {
        warn!(
            subject = %subject,
            grant = %grant,
            rules = blocking.len(),
            "grant blocked by sod policy"
        );
    }

    GrantCheck {
        allowed,
        blocking,
        detected,
    }
}

// ============================================================================
// Population
// ============================================================================

/// Violations across many subjects. Totals are derived, not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub violations: Vec<Violation>,
}

impl ViolationReport {
    pub fn total(&self) -> usize {
        self.violations.len()
    }

    /// Number of distinct subjects with at least one violation.
    pub fn affected_subjects(&self) -> usize {
        self.violations
            .iter()
            .map(|v| &v.subject)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for violation in &self.violations {
            *counts.entry(violation.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }
}

/// Checks every subject in parallel. Violations keep subject order.
pub fn check_population(subjects: &[Subject], rules: &[SodRule]) -> ViolationReport {
    let violations = subjects
        .par_iter()
        .flat_map_iter(|subject| check(&subject.grants, rules, &subject.id))
        .collect();
    ViolationReport { violations }
}

// ============================================================================
// Tests
// ============================================================================
