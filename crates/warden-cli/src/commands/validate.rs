//! Policy validation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use warden::{PolicySnapshot, RiskScorer};

use super::print_json;
use crate::input::read_json;
use crate::style::{print_error, print_success, print_warn};

#[derive(Debug, Default, Serialize)]
struct ValidationReport {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Checks a policy file without evaluating any subject.
///
/// Rule set issues and malformed SoD rules are errors. A weight vector that
/// does not sum to 100 is a warning, since scoring normalizes it.
pub fn run(policy: &Path, json: bool) -> Result<()> {
    let snapshot: PolicySnapshot = read_json(policy)?;
    let report = validate(&snapshot);

    if json {
        print_json(&report)?;
    } else {
        for error in &report.errors {
            print_error(error);
        }
        for warning in &report.warnings {
            print_warn(warning);
        }
        if report.valid {
            print_success(&format!(
                "{} rules, {} SoD rules, {} weights are valid",
                snapshot.rules().len(),
                snapshot.sod_rules.len(),
                snapshot.weights.len()
            ));
        }
    }

    if !report.valid {
        anyhow::bail!("{} validation error(s)", report.errors.len());
    }
    Ok(())
}

fn validate(snapshot: &PolicySnapshot) -> ValidationReport {
    let mut report = ValidationReport::default();

    let evaluator = snapshot.evaluator();
    report.errors.extend(
        snapshot
            .rule_set
            .validate(&evaluator)
            .into_iter()
            .map(|issue| issue.to_string()),
    );
    report.errors.extend(
        snapshot
            .sod_rules
            .iter()
            .filter_map(|rule| rule.validate().err())
            .map(|error| error.to_string()),
    );

    if !snapshot.weights.is_empty() {
        match RiskScorer::strict().score(&BTreeMap::new(), &snapshot.weights) {
            Ok(_) => {}
            Err(error @ warden::RiskError::WeightsDoNotSumTo100 { .. }) => {
                report.warnings.push(format!("{error}; scores will be normalized"));
            }
            Err(error) => report.errors.push(error.to_string()),
        }
    }

    report.valid = report.errors.is_empty();
    report
}
