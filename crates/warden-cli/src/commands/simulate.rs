//! Simulation commands: single scenario, batch and stress.

use std::path::Path;

use anyhow::{Context, Result};
use warden::{
    ActionOutcome, BatchReport, ComplianceIssue, EngineSettings, OutcomeReason, OutcomeStatus,
    OverallStatus, PolicySnapshot, Scenario, SimulationResult, Simulator,
};

use super::print_json;
use crate::input::read_json;
use crate::style::{
    self, colors::SemanticStyle, info_table, print_heading, print_labeled, styled_table,
};

/// Simulates one scenario.
pub fn run(scenario: &Path, policy: &Path, settings: &EngineSettings, json: bool) -> Result<()> {
    let scenario: Scenario = read_json(scenario)?;
    let policy: PolicySnapshot = read_json(policy)?;

    let result = Simulator::new(settings.simulator).simulate(&scenario, &policy);

    if json {
        return print_json(&result);
    }
    print_result(&scenario.name, &result);
    Ok(())
}

/// Simulates a list of scenarios in parallel.
pub fn batch(scenarios: &Path, policy: &Path, settings: &EngineSettings, json: bool) -> Result<()> {
    let scenarios: Vec<Scenario> = read_json(scenarios)?;
    let policy: PolicySnapshot = read_json(policy)?;

    let report = Simulator::new(settings.simulator)
        .simulate_batch(&scenarios, &policy)
        .context("Batch simulation failed")?;

    if json {
        return print_json(&report);
    }
    print_batch(&report);
    Ok(())
}

/// Simulates one scenario repeatedly.
pub fn stress(
    scenario: &Path,
    policy: &Path,
    iterations: Option<u32>,
    settings: &EngineSettings,
    json: bool,
) -> Result<()> {
    let scenario: Scenario = read_json(scenario)?;
    let policy: PolicySnapshot = read_json(policy)?;
    let iterations = iterations.unwrap_or(settings.stress_iterations);

    let report = Simulator::new(settings.simulator)
        .stress(&scenario, &policy, iterations)
        .context("Stress simulation failed")?;

    if json {
        return print_json(&report);
    }

    print_heading(&format!("Stress: {}", scenario.name));
    println!(
        "{}",
        info_table(&[
            ("Iterations", report.iterations.to_string()),
            ("Workers", report.workers.to_string()),
            ("Elapsed", format!("{} ms", report.elapsed_ms)),
            ("Throughput", format!("{:.0} evaluations/sec", report.evaluations_per_second)),
            ("Deterministic", report.deterministic.to_string()),
            ("Overall status", overall_label(report.sample.overall_status)),
        ])
    );

    if !report.deterministic {
        anyhow::bail!("simulation results varied between iterations");
    }
    Ok(())
}

fn print_result(name: &str, result: &SimulationResult) {
    print_heading(&format!("Simulation: {name}"));
    print_labeled("Subject", result.subject.as_str());
    let matched: Vec<&str> = result.matched_rules.iter().map(|r| r.as_str()).collect();
    print_labeled(
        "Matched rules",
        &if matched.is_empty() {
            "none".to_string()
        } else {
            matched.join(", ")
        },
    );
    print_labeled(
        "Fired rule",
        result.fired_rule.as_ref().map_or("none", |r| r.as_str()),
    );
    print_labeled("Overall status", &overall_label(result.overall_status));
    print_labeled("Total duration", &format!("{} ms", result.total_duration_ms));
    print_labeled(
        "Risk",
        &match (result.risk_score, result.risk_band) {
            (Some(score), Some(band)) => format!("{score} ({band})"),
            _ => "not scored".to_string(),
        },
    );

    if !result.action_outcomes.is_empty() {
        println!();
        println!("{}", outcome_table(&result.action_outcomes));
    }

    if result.compliance_issues.is_empty() {
        println!();
        style::print_success("No compliance issues");
    } else {
        println!();
        for issue in &result.compliance_issues {
            style::print_warn(&issue_label(issue));
        }
    }
}

fn print_batch(report: &BatchReport) {
    print_heading("Batch simulation");

    let mut table = styled_table(&["Subject", "Fired rule", "Status", "Risk", "Issues"]);
    for result in &report.results {
        table.add_row(vec![
            result.subject.to_string(),
            result
                .fired_rule
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            overall_label(result.overall_status),
            result
                .risk_score
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            result.compliance_issues.len().to_string(),
        ]);
    }
    println!("{table}");

    println!(
        "{}",
        info_table(&[
            ("Subjects", report.total().to_string()),
            ("Matched", report.matched().to_string()),
            ("Success", report.count(OverallStatus::Success).to_string()),
            ("Partial", report.count(OverallStatus::Partial).to_string()),
            ("Failed", report.count(OverallStatus::Failed).to_string()),
            ("SoD violations", report.total_violations().to_string()),
            ("Affected subjects", report.affected_subjects().to_string()),
            (
                "Average risk",
                report
                    .average_risk()
                    .map_or_else(|| "-".to_string(), |avg| format!("{avg:.1}")),
            ),
        ])
    );
}

fn outcome_table(outcomes: &[ActionOutcome]) -> comfy_table::Table {
    let mut table = styled_table(&[
        "Action", "Type", "Status", "Attempts", "Start", "Duration", "Detail",
    ]);
    for outcome in outcomes {
        let detail = outcome
            .error
            .clone()
            .or_else(|| outcome.reason.map(|r| reason_label(r).to_string()))
            .unwrap_or_default();
        table.add_row(vec![
            outcome.action_id.to_string(),
            outcome.action_type.name().to_string(),
            status_label(outcome.status),
            outcome.attempts.to_string(),
            format!("{} ms", outcome.started_at_ms),
            format!("{} ms", outcome.duration_ms),
            detail,
        ]);
    }
    table
}

fn status_label(status: OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Success => "success".success(),
        OutcomeStatus::Failed => "failed".error(),
        OutcomeStatus::Skipped => "skipped".muted(),
        OutcomeStatus::Pending => "pending".warning(),
    }
}

fn overall_label(status: OverallStatus) -> String {
    match status {
        OverallStatus::Success => "success".success(),
        OverallStatus::Partial => "partial".warning(),
        OverallStatus::Failed => "failed".error(),
    }
}

fn reason_label(reason: OutcomeReason) -> &'static str {
    match reason {
        OutcomeReason::AwaitingApproval => "awaiting approval",
        OutcomeReason::BlockedByPending => "blocked by pending dependency",
        OutcomeReason::Deferred => "deferred until effective date",
        OutcomeReason::DependencyNotSatisfied => "dependency not satisfied",
        OutcomeReason::Cancelled => "cancelled",
        OutcomeReason::RetriesExhausted => "retries exhausted",
        OutcomeReason::TimedOut => "timed out",
        OutcomeReason::PermanentFailure => "permanent failure",
        OutcomeReason::AlreadyCompleted => "already completed",
    }
}

fn issue_label(issue: &ComplianceIssue) -> String {
    match issue {
        ComplianceIssue::SodViolation(v) => format!(
            "SoD violation '{}' ({} severity, {:?}): holds {:?} and {:?}",
            v.rule_name, v.severity, v.enforcement, v.left_held, v.right_held
        ),
        ComplianceIssue::RuleConfiguration { rule, message } => {
            format!("rule '{rule}' skipped: {message}")
        }
        ComplianceIssue::ActionConfiguration { rule, message } => {
            format!("rule '{rule}' actions not scheduled: {message}")
        }
        ComplianceIssue::RiskConfiguration { message } => format!("risk not scored: {message}"),
    }
}
