//! The simulation harness.
//!
//! Each subject goes through the same pipeline: all-match rule resolution
//! (drafts and test rules included), a forced dry run of the first match's
//! actions, SoD detection and risk scoring. Batch and stress runs fan that
//! pipeline out over a bounded rayon pool; only the fan-out differs.

use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};
use warden_actions::{
    ActionExecutor, ExecutionContext, ExecutionMode, ExecutionReport, ExecutorSettings,
    OverallStatus,
};
use warden_policy::{Rule, RuleResolver, Visibility};
use warden_risk::RiskScorer;
use warden_sod::check;

use crate::report::{BatchReport, ComplianceIssue, SimulationResult, StressReport};
use crate::scenario::{PolicySnapshot, Scenario};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to start simulation workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("stress runs need at least one iteration")]
    NoIterations,
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Harness knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorSettings {
    /// Worker threads for batch and stress runs; 0 uses available
    /// parallelism.
    pub workers: usize,
    /// Let draft and test rules match.
    pub include_unpublished: bool,
    /// Rescale weight vectors that do not sum to 100 instead of rejecting
    /// them.
    pub normalize_weights: bool,
    pub executor: ExecutorSettings,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            include_unpublished: true,
            normalize_weights: true,
            executor: ExecutorSettings::default(),
        }
    }
}

/// Runs scenarios against a policy snapshot without side effects.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    settings: SimulatorSettings,
}

impl Simulator {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// Simulates one subject.
    pub fn simulate(&self, scenario: &Scenario, policy: &PolicySnapshot) -> SimulationResult {
        let subject = &scenario.subject;
        let visibility = if self.settings.include_unpublished {
            Visibility::All
        } else {
            Visibility::Published
        };
        let resolver = RuleResolver::new(policy.evaluator()).with_visibility(visibility);
        let resolution = resolver.resolve_all(policy.rules(), &subject.attributes);

        let mut issues: Vec<ComplianceIssue> =
            resolution.errors.iter().map(ComplianceIssue::from).collect();

        let fired = resolution.first();
        let report = match fired {
            Some(rule) => self.dry_run(rule, scenario).unwrap_or_else(|issue| {
                issues.push(issue);
                ExecutionReport {
                    outcomes: Vec::new(),
                    total_duration_ms: 0,
                    overall: OverallStatus::Failed,
                }
            }),
            None => ExecutionReport::empty(),
        };

        issues.extend(
            check(&subject.grants, &policy.sod_rules, &subject.id)
                .into_iter()
                .map(ComplianceIssue::SodViolation),
        );

        let scorer = RiskScorer::with_normalization(self.settings.normalize_weights);
        let (risk_score, risk_band) = match scorer.score(&subject.risk_factors, &policy.weights) {
            Ok(assessment) => (Some(assessment.score), Some(assessment.band)),
            Err(error) => {
                issues.push(ComplianceIssue::RiskConfiguration {
                    message: error.to_string(),
                });
                (None, None)
            }
        };

        debug!(
            subject = %subject.id,
            matched = resolution.matched.len(),
            issues = issues.len(),
            "subject simulated"
        );

        SimulationResult {
            subject: subject.id.clone(),
            matched_rules: resolution.matched.iter().map(|r| r.id.clone()).collect(),
            fired_rule: fired.map(|r| r.id.clone()),
            action_outcomes: report.outcomes,
            total_duration_ms: report.total_duration_ms,
            overall_status: report.overall,
            risk_score,
            risk_band,
            compliance_issues: issues,
        }
    }

    /// Simulates a fixed set of scenarios in parallel. Results keep scenario
    /// order.
    pub fn simulate_batch(
        &self,
        scenarios: &[Scenario],
        policy: &PolicySnapshot,
    ) -> Result<BatchReport> {
        let pool = self.pool()?;
        let results: Vec<SimulationResult> = pool.install(|| {
            scenarios
                .par_iter()
                .map(|scenario| self.simulate(scenario, policy))
                .collect()
        });

        let report = BatchReport { results };
        info!(
            subjects = report.total(),
            matched = report.matched(),
            violations = report.total_violations(),
            "batch simulation complete"
        );
        Ok(report)
    }

    /// Simulates one scenario `iterations` times to estimate throughput and
    /// confirm the result does not vary between runs.
    pub fn stress(
        &self,
        scenario: &Scenario,
        policy: &PolicySnapshot,
        iterations: u32,
    ) -> Result<StressReport> {
        if iterations == 0 {
            return Err(SimError::NoIterations);
        }
        let pool = self.pool()?;
        let workers = pool.current_num_threads();

        let started = Instant::now();
        let results: Vec<SimulationResult> = pool.install(|| {
            (0..iterations)
                .into_par_iter()
                .map(|_| self.simulate(scenario, policy))
                .collect()
        });
        let elapsed = started.elapsed();

        let sample = results[0].clone();
        let deterministic = results.iter().all(|r| *r == sample);
        let evaluations_per_second = f64::from(iterations) / elapsed.as_secs_f64().max(1e-9);

        info!(
            iterations,
            workers,
            elapsed_ms = elapsed.as_millis() as u64,
            deterministic,
            "stress simulation complete"
        );

        Ok(StressReport {
            iterations,
            workers,
            elapsed_ms: elapsed.as_millis() as u64,
            evaluations_per_second,
            deterministic,
            sample,
        })
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .build()?)
    }

    /// Dry-runs the fired rule's actions. Every attempt goes to the
    /// scenario's fault plan regardless of the actions' own flags.
    fn dry_run(
        &self,
        rule: &Rule,
        scenario: &Scenario,
    ) -> std::result::Result<ExecutionReport, ComplianceIssue> {
        let executor =
            ActionExecutor::simulated(scenario.fault_plan()).with_settings(self.settings.executor);
        let ctx = ExecutionContext::new(scenario.subject.id.clone(), rule.id.clone())
            .requiring_approval(rule.requires_approval)
            .with_rule_dry_run(true)
            .with_approvals(scenario.approvals.clone());

        executor
            .execute(&rule.actions, ExecutionMode::DryRun, &ctx)
            .map_err(|error| ComplianceIssue::ActionConfiguration {
                rule: rule.id.clone(),
                message: error.to_string(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
