//! Simulation outputs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use warden_actions::{ActionOutcome, OverallStatus};
use warden_policy::RuleError;
use warden_risk::RiskBand;
use warden_sod::Violation;
use warden_types::{RuleId, SubjectId};

/// Something a reviewer should look at, found while simulating one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ComplianceIssue {
    /// The subject's grants violate an SoD rule.
    SodViolation(Violation),
    /// A rule's conditions could not be evaluated; it was treated as
    /// non-matching.
    RuleConfiguration { rule: RuleId, message: String },
    /// The fired rule's action list could not be scheduled.
    ActionConfiguration { rule: RuleId, message: String },
    /// The weight vector was rejected.
    RiskConfiguration { message: String },
}

impl ComplianceIssue {
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::SodViolation(_))
    }
}

impl From<&RuleError> for ComplianceIssue {
    fn from(error: &RuleError) -> Self {
        Self::RuleConfiguration {
            rule: error.rule_id.clone(),
            message: error.error.to_string(),
        }
    }
}

/// Everything the harness learned about one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub subject: SubjectId,
    /// Every matching rule in evaluation order.
    pub matched_rules: Vec<RuleId>,
    /// The rule that would fire live (first match).
    pub fired_rule: Option<RuleId>,
    pub action_outcomes: Vec<ActionOutcome>,
    pub total_duration_ms: u64,
    pub overall_status: OverallStatus,
    /// Absent when the weight vector was rejected.
    pub risk_score: Option<u8>,
    pub risk_band: Option<RiskBand>,
    pub compliance_issues: Vec<ComplianceIssue>,
}

impl SimulationResult {
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.compliance_issues.iter().filter_map(|issue| match issue {
            ComplianceIssue::SodViolation(violation) => Some(violation),
            _ => None,
        })
    }
}

/// Results of a batch run with derived totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One result per scenario, in scenario order.
    pub results: Vec<SimulationResult>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn count(&self, status: OverallStatus) -> usize {
        self.results
            .iter()
            .filter(|r| r.overall_status == status)
            .count()
    }

    /// Subjects for which at least one rule matched.
    pub fn matched(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.fired_rule.is_some())
            .count()
    }

    pub fn total_violations(&self) -> usize {
        self.results.iter().map(|r| r.violations().count()).sum()
    }

    pub fn affected_subjects(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.violations().next().is_some())
            .map(|r| &r.subject)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Mean risk score over the subjects that could be scored.
    pub fn average_risk(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .results
            .iter()
            .filter_map(|r| r.risk_score)
            .map(f64::from)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// Throughput of repeated simulation of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressReport {
    pub iterations: u32,
    pub workers: usize,
    pub elapsed_ms: u64,
    pub evaluations_per_second: f64,
    /// Every iteration produced the same result.
    pub deterministic: bool,
    pub sample: SimulationResult,
}
