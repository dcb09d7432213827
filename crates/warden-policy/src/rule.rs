//! Lifecycle rules and rule sets.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_actions::{Action, ActionGraph};
use warden_types::{ConfigurationError, RuleId};

use crate::condition::ConditionGroup;
use crate::evaluator::ConditionEvaluator;

// ============================================================================
// Rule
// ============================================================================

/// Authoring status of a rule. Only published rules fire live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    #[default]
    Draft,
    Test,
    Published,
}

/// A lifecycle automation rule: when the conditions match, run the actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Lower numbers are evaluated first.
    pub priority: u32,
    #[serde(default)]
    pub status: RuleStatus,
    #[serde(default)]
    pub conditions: ConditionGroup,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub requires_approval: bool,
    /// Days between a match and the actions taking effect.
    #[serde(default)]
    pub effective_delay: u32,
    #[serde(default)]
    pub dry_run: bool,
}

impl Rule {
    /// Creates a published rule that matches everyone and does nothing.
    pub fn new(id: impl Into<RuleId>, priority: u32) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            description: String::new(),
            priority,
            status: RuleStatus::Published,
            conditions: ConditionGroup::default(),
            actions: Vec::new(),
            requires_approval: false,
            effective_delay: 0,
            dry_run: false,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionGroup) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn with_effective_delay(mut self, days: u32) -> Self {
        self.effective_delay = days;
        self
    }

    pub fn as_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == RuleStatus::Published
    }

    /// When the actions of a match evaluated at `evaluated_at` take effect.
    pub fn effective_at(&self, evaluated_at: DateTime<Utc>) -> DateTime<Utc> {
        evaluated_at + Duration::days(i64::from(self.effective_delay))
    }

    /// Validates conditions and the action dependency graph.
    pub fn validate(&self, evaluator: &ConditionEvaluator) -> Result<(), ConfigurationError> {
        evaluator.validate(&self.conditions)?;
        ActionGraph::build(&self.actions)?;
        Ok(())
    }
}

// ============================================================================
// Rule Set
// ============================================================================

/// A problem found by [`RuleSet::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetIssue {
    #[error("rules {} share priority {priority}", join(.rules))]
    DuplicatePriority { priority: u32, rules: Vec<RuleId> },

    #[error("rule '{rule}' has priority 0; priorities start at 1")]
    ZeroPriority { rule: RuleId },

    #[error("rule id '{rule}' is used more than once")]
    DuplicateRuleId { rule: RuleId },

    #[error("rule '{rule}': {error}")]
    Configuration {
        rule: RuleId,
        error: ConfigurationError,
    },
}

fn join(rules: &[RuleId]) -> String {
    rules
        .iter()
        .map(|r| format!("'{r}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An ordered bucket of rules evaluated together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Reports every authoring problem in the set without evaluating any
    /// subject. An empty result means the set is safe to publish.
    pub fn validate(&self, evaluator: &ConditionEvaluator) -> Vec<RuleSetIssue> {
        let mut issues = Vec::new();

        let mut seen_ids = HashSet::new();
        let mut by_priority: BTreeMap<u32, Vec<RuleId>> = BTreeMap::new();
        for rule in &self.rules {
            if !seen_ids.insert(&rule.id) {
                issues.push(RuleSetIssue::DuplicateRuleId {
                    rule: rule.id.clone(),
                });
            }
            if rule.priority == 0 {
                issues.push(RuleSetIssue::ZeroPriority {
                    rule: rule.id.clone(),
                });
            }
            by_priority
                .entry(rule.priority)
                .or_default()
                .push(rule.id.clone());
        }

        for (priority, rules) in by_priority {
            if rules.len() > 1 {
                issues.push(RuleSetIssue::DuplicatePriority { priority, rules });
            }
        }

        for rule in &self.rules {
            if let Err(error) = rule.validate(evaluator) {
                issues.push(RuleSetIssue::Configuration {
                    rule: rule.id.clone(),
                    error,
                });
            }
        }

        issues
    }
}

// ============================================================================
// Tests
// ============================================================================
