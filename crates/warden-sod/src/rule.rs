//! SoD rule definitions.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_types::{SodRuleId, SubjectId};

/// How the two sets of a rule relate.
///
/// Both kinds are evaluated identically: a subject violates the rule when it
/// holds at least one grant from each side. `Conditional` is kept as a
/// separate kind so authored rule sets round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SodRuleType {
    #[default]
    MutualExclusion,
    Conditional,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// What the caller should do about a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Prevent the grant that would create the conflict.
    Block,
    /// Report the conflict for review.
    #[default]
    Detect,
}

/// A problem with how an SoD rule is authored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SodRuleError {
    #[error("rule '{rule}' lists {} on both sides", .grants.join(", "))]
    OverlappingSets { rule: SodRuleId, grants: Vec<String> },

    #[error("rule '{rule}' has an empty {side} set and can never fire")]
    EmptySet { rule: SodRuleId, side: &'static str },
}

/// A Segregation-of-Duties rule over role/entitlement identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SodRule {
    pub id: SodRuleId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub rule_type: SodRuleType,
    pub left_set: BTreeSet<String>,
    pub right_set: BTreeSet<String>,
    /// Subjects exempt from this rule.
    #[serde(default)]
    pub exceptions: BTreeSet<SubjectId>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub enforcement: Enforcement,
}

impl SodRule {
    pub fn mutual_exclusion(
        id: impl Into<SodRuleId>,
        left: &[&str],
        right: &[&str],
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            rule_type: SodRuleType::MutualExclusion,
            left_set: left.iter().map(|g| (*g).to_string()).collect(),
            right_set: right.iter().map(|g| (*g).to_string()).collect(),
            exceptions: BTreeSet::new(),
            severity: Severity::default(),
            enforcement: Enforcement::default(),
        }
    }

    pub fn conditional(id: impl Into<SodRuleId>, left: &[&str], right: &[&str]) -> Self {
        Self {
            rule_type: SodRuleType::Conditional,
            ..Self::mutual_exclusion(id, left, right)
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    pub fn with_exception(mut self, subject: impl Into<SubjectId>) -> Self {
        self.exceptions.insert(subject.into());
        self
    }

    pub fn exempts(&self, subject: &SubjectId) -> bool {
        self.exceptions.contains(subject)
    }

    /// Grants from each side held by `grants`, or `None` if either side is
    /// not held at all.
    pub fn conflict(
        &self,
        grants: &BTreeSet<String>,
    ) -> Option<(BTreeSet<String>, BTreeSet<String>)> {
        let left: BTreeSet<String> = self.left_set.intersection(grants).cloned().collect();
        if left.is_empty() {
            return None;
        }
        let right: BTreeSet<String> = self.right_set.intersection(grants).cloned().collect();
        if right.is_empty() {
            return None;
        }
        Some((left, right))
    }

    /// Checks that both sides are non-empty and disjoint.
    ///
    /// An overlapping rule is still evaluated as written: a subject holding
    /// only a shared grant violates it.
    pub fn validate(&self) -> Result<(), SodRuleError> {
        if self.left_set.is_empty() {
            return Err(SodRuleError::EmptySet {
                rule: self.id.clone(),
                side: "left",
            });
        }
        if self.right_set.is_empty() {
            return Err(SodRuleError::EmptySet {
                rule: self.id.clone(),
                side: "right",
            });
        }
        let shared: Vec<String> = self
            .left_set
            .intersection(&self.right_set)
            .cloned()
            .collect();
        if shared.is_empty() {
            Ok(())
        } else {
            Err(SodRuleError::OverlappingSets {
                rule: self.id.clone(),
                grants: shared,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
