//! Rule resolution.
//!
//! Rules are filtered by visibility, then stably sorted by priority (lowest
//! number first), so rules sharing a priority keep the order they were
//! supplied in. In first-match mode the first matching rule wins and later
//! rules are never evaluated.
//!
//! A rule whose conditions are malformed is treated as non-matching, and its
//! configuration error is returned alongside the resolution.

use serde::Serialize;
use tracing::{debug, warn};
use warden_types::{AttributeMap, ConfigurationError, RuleId};

use crate::evaluator::ConditionEvaluator;
use crate::rule::Rule;

/// Which rule statuses participate in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Live evaluation: published rules only.
    #[default]
    Published,
    /// Simulation: drafts and test rules too.
    All,
}

/// A configuration error attributed to the rule it occurred in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleError {
    pub rule_id: RuleId,
    #[serde(serialize_with = "serialize_display")]
    pub error: ConfigurationError,
}

fn serialize_display<S: serde::Serializer>(
    error: &ConfigurationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Matched rules in evaluation order, plus any rules that failed to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'r> {
    pub matched: Vec<&'r Rule>,
    pub errors: Vec<RuleError>,
}

impl<'r> Resolution<'r> {
    /// The rule that fires under first-match-wins.
    pub fn first(&self) -> Option<&'r Rule> {
        self.matched.first().copied()
    }

    pub fn is_noop(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Selects the rule(s) that apply to a subject.
#[derive(Debug, Clone, Default)]
pub struct RuleResolver {
    evaluator: ConditionEvaluator,
    visibility: Visibility,
}

impl RuleResolver {
    pub fn new(evaluator: ConditionEvaluator) -> Self {
        Self {
            evaluator,
            visibility: Visibility::Published,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    /// Visible rules in evaluation order.
    pub fn candidates<'r>(&self, rules: &'r [Rule]) -> Vec<&'r Rule> {
        let mut candidates: Vec<&Rule> = rules
            .iter()
            .filter(|rule| self.visibility == Visibility::All || rule.is_published())
            .collect();
        candidates.sort_by_key(|rule| rule.priority);
        candidates
    }

    /// First-match-wins. An empty resolution is a no-op; no default rule is
    /// implied.
    pub fn resolve<'r>(&self, rules: &'r [Rule], attributes: &AttributeMap) -> Resolution<'r> {
        self.run(rules, attributes, true)
    }

    /// Every matching rule, for audit and simulation.
    pub fn resolve_all<'r>(&self, rules: &'r [Rule], attributes: &AttributeMap) -> Resolution<'r> {
        self.run(rules, attributes, false)
    }

    fn run<'r>(
        &self,
        rules: &'r [Rule],
        attributes: &AttributeMap,
        first_only: bool,
    ) -> Resolution<'r> {
        let mut resolution = Resolution {
            matched: Vec::new(),
            errors: Vec::new(),
        };

        for rule in self.candidates(rules) {
            match self.evaluator.evaluate(&rule.conditions, attributes) {
                Ok(true) => {
                    debug!(rule = %rule.id, priority = rule.priority, "rule matched");
                    resolution.matched.push(rule);
                    if first_only {
                        break;
                    }
                }
                Ok(false) => {
                    debug!(rule = %rule.id, priority = rule.priority, "rule did not match");
                }
                Err(error) => {
                    warn!(rule = %rule.id, error = %error, "rule skipped: configuration error");
                    resolution.errors.push(RuleError {
                        rule_id: rule.id.clone(),
                        error,
                    });
                }
            }
        }

        resolution
    }
}

// ============================================================================
// Tests
// ============================================================================
