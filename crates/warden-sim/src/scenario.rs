//! Simulation inputs: scenarios and policy snapshots.

use serde::{Deserialize, Serialize};
use warden_actions::{Approvals, FaultPlan};
use warden_policy::{AttributeCatalog, ConditionEvaluator, Rule, RuleSet};
use warden_risk::RiskWeight;
use warden_sod::SodRule;
use warden_types::{ActionId, Subject};

/// A scripted dispatch failure for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScenarioFault {
    /// Fails the first `failures` attempts, then succeeds.
    Transient { action: ActionId, failures: u32 },
    /// Fails every attempt.
    AlwaysFailing { action: ActionId },
    /// Fails on the first attempt without retrying.
    Permanent { action: ActionId, message: String },
}

/// One synthetic or real subject to simulate, plus what the caller wants to
/// pretend about approvals and failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub subject: Subject,
    #[serde(default)]
    pub approvals: Approvals,
    #[serde(default)]
    pub faults: Vec<ScenarioFault>,
}

impl Scenario {
    pub fn new(subject: Subject) -> Self {
        Self {
            name: subject.id.to_string(),
            subject,
            approvals: Approvals::none(),
            faults: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_approvals(mut self, approvals: Approvals) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn with_fault(mut self, fault: ScenarioFault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn fault_plan(&self) -> FaultPlan {
        self.faults
            .iter()
            .fold(FaultPlan::none(), |plan, fault| match fault {
                ScenarioFault::Transient { action, failures } => {
                    plan.transient(action.clone(), *failures)
                }
                ScenarioFault::AlwaysFailing { action } => plan.always_failing(action.clone()),
                ScenarioFault::Permanent { action, message } => {
                    plan.permanent(action.clone(), message)
                }
            })
    }
}

/// The immutable policy a simulation runs against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySnapshot {
    pub rule_set: RuleSet,
    pub sod_rules: Vec<SodRule>,
    pub weights: Vec<RiskWeight>,
    /// Replaces the standard attribute catalog when present.
    pub catalog: Option<AttributeCatalog>,
}

impl PolicySnapshot {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            rule_set,
            ..Self::default()
        }
    }

    pub fn with_sod_rule(mut self, rule: SodRule) -> Self {
        self.sod_rules.push(rule);
        self
    }

    pub fn with_weights(mut self, weights: Vec<RiskWeight>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_catalog(mut self, catalog: AttributeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rule_set.rules
    }

    pub fn evaluator(&self) -> ConditionEvaluator {
        self.catalog
            .clone()
            .map_or_else(ConditionEvaluator::standard, ConditionEvaluator::new)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_actions::{Dispatcher, DispatchRequest};

    #[test]
    fn test_scenario_parses_from_json() {
        let json = r#"{
            "name": "contractor",
            "subject": { "id": "u-7", "attributes": { "department": "Sales" } },
            "approvals": { "ruleApproved": true },
            "faults": [
                { "kind": "transient", "action": "a", "failures": 2 },
                { "kind": "permanent", "action": "b", "message": "no such group" }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert_eq!(scenario.subject.id.as_str(), "u-7");
        assert!(scenario.approvals.rule_approved);
        assert_eq!(scenario.faults.len(), 2);
        assert!(!scenario.fault_plan().is_empty());
    }

    #[test]
    fn test_fault_plan_follows_faults() {
        let scenario = Scenario::new(Subject::new("u-1")).with_fault(ScenarioFault::Transient {
            action: ActionId::new("a"),
            failures: 1,
        });
        let plan = scenario.fault_plan();
        let action = warden_actions::Action::new("a", warden_actions::ActionType::Webhook, "hook");
        let subject = warden_types::SubjectId::new("u-1");
        let rule = warden_types::RuleId::new("r");
        let request = |attempt| DispatchRequest {
            subject: &subject,
            rule: &rule,
            action: &action,
            attempt,
        };

        assert!(plan.dispatch(&request(1)).is_err());
        assert!(plan.dispatch(&request(2)).is_ok());
    }

    #[test]
    fn test_snapshot_defaults_to_standard_catalog() {
        let snapshot: PolicySnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.rules().is_empty());
        assert!(snapshot.evaluator().catalog().contains("department"));
    }
}
