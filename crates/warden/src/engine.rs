//! The live evaluation engine.
//!
//! ```text
//! AttributeSource ─┐
//! GrantCatalog ────┼─► Subject snapshot ─► RuleResolver (published only)
//! PolicyStore ─────┘                            │ first match
//!                                               ▼
//!                              ActionExecutor (live, ledger, dispatcher)
//!                                               │
//!                              SoD check ─► risk score ─► AuditSink
//! ```
//!
//! Each evaluation reads one policy snapshot up front and uses it
//! throughout, so a concurrent publish never mixes rule versions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use warden_actions::{
    ActionExecutor, Approvals, CancellationToken, CompletionLedger, Dispatcher, ExecutionContext,
    ExecutionError, ExecutionMode, ExecutionReport,
};
use warden_policy::{RuleError, RuleResolver};
use warden_risk::{RiskAssessment, RiskError};
use warden_sim::{Scenario, SimulationResult, Simulator};
use warden_sod::{GrantCheck, Violation, check, check_grant};
use warden_types::{RuleId, Subject, SubjectId};

use crate::collaborators::{
    AttributeSource, AuditRecord, AuditSink, CollaboratorError, GrantCatalog, PolicyStore,
    TracingAuditSink,
};
use crate::settings::EngineSettings;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("engine is missing its {0}")]
    MissingCollaborator(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Requests and Results
// ============================================================================

/// Per-call inputs to [`Engine::evaluate`].
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    pub approvals: Approvals,
    pub mode: ExecutionMode,
    pub cancellation: CancellationToken,
    /// Defaults to now.
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            approvals: Approvals::none(),
            mode: ExecutionMode::Live,
            cancellation: CancellationToken::new(),
            evaluated_at: None,
        }
    }
}

impl EvaluationOptions {
    pub fn with_approvals(mut self, approvals: Approvals) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.mode = ExecutionMode::DryRun;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn at(mut self, evaluated_at: DateTime<Utc>) -> Self {
        self.evaluated_at = Some(evaluated_at);
        self
    }
}

/// Outcome of one live evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub subject: SubjectId,
    pub evaluated_at: DateTime<Utc>,
    pub fired_rule: Option<RuleId>,
    /// When the fired rule's actions take effect.
    pub effective_at: Option<DateTime<Utc>>,
    pub execution: ExecutionReport,
    pub violations: Vec<Violation>,
    pub risk: RiskAssessment,
    /// Rules skipped because their conditions are malformed.
    pub rule_errors: Vec<RuleError>,
}

impl Evaluation {
    pub fn is_deferred(&self) -> bool {
        self.effective_at
            .is_some_and(|effective_at| effective_at > self.evaluated_at)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Wires the evaluators to their collaborators.
pub struct Engine {
    attributes: Arc<dyn AttributeSource>,
    grants: Arc<dyn GrantCatalog>,
    policy: Arc<dyn PolicyStore>,
    audit: Arc<dyn AuditSink>,
    executor: ActionExecutor,
    settings: EngineSettings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Assembles the subject snapshot from the attribute source and grant
    /// catalog.
    pub fn subject(&self, id: &SubjectId) -> Result<Subject> {
        let mut subject = Subject::new(id.clone());
        subject.attributes = self.attributes.attributes(id)?;
        subject.risk_factors = self.attributes.risk_factors(id)?;
        subject.grants = self.grants.grants(id)?;
        Ok(subject)
    }

    /// Evaluates one subject against the published rules.
    ///
    /// The first matching published rule fires. Its actions run unless the
    /// rule's effective delay has not elapsed, in which case every action is
    /// reported `pending` (`Deferred`). SoD violations and the risk score are
    /// computed from the same snapshot, and everything is sent to the audit
    /// sink. The risk score comes first: weights the scorer rejects fail the
    /// call before anything is dispatched.
    pub fn evaluate(&self, id: &SubjectId, options: &EvaluationOptions) -> Result<Evaluation> {
        let snapshot = self.policy.snapshot()?;
        let subject = self.subject(id)?;
        let evaluated_at = options.evaluated_at.unwrap_or_else(Utc::now);

        let risk = self
            .settings
            .scorer()
            .score(&subject.risk_factors, &snapshot.weights)?;

        let resolver = RuleResolver::new(snapshot.evaluator());
        let resolution = resolver.resolve(snapshot.rules(), &subject.attributes);
        for error in &resolution.errors {
            self.audit.record(&AuditRecord::RuleError(error.clone()));
        }

        let fired = resolution.first();
        let (execution, effective_at) = match fired {
            Some(rule) => {
                let effective_at = rule.effective_at(evaluated_at);
                let deferred = effective_at > evaluated_at;
                info!(
                    subject = %subject.id,
                    rule = %rule.id,
                    deferred,
                    "rule fired"
                );

                let ctx = ExecutionContext::new(subject.id.clone(), rule.id.clone())
                    .requiring_approval(rule.requires_approval)
                    .with_rule_dry_run(rule.dry_run)
                    .with_approvals(options.approvals.clone())
                    .deferred(deferred)
                    .with_cancellation(options.cancellation.clone());
                let report = self.executor.execute(&rule.actions, options.mode, &ctx)?;

                for outcome in &report.outcomes {
                    self.audit.record(&AuditRecord::ActionOutcome {
                        subject: subject.id.clone(),
                        rule: rule.id.clone(),
                        outcome: outcome.clone(),
                    });
                }
                (report, Some(effective_at))
            }
            None => {
                debug!(subject = %subject.id, "no rule matched");
                (ExecutionReport::empty(), None)
            }
        };

        let violations = check(&subject.grants, &snapshot.sod_rules, &subject.id);
        for violation in &violations {
            self.audit.record(&AuditRecord::Violation(violation.clone()));
        }

        Ok(Evaluation {
            subject: subject.id,
            evaluated_at,
            fired_rule: fired.map(|rule| rule.id.clone()),
            effective_at,
            execution,
            violations,
            risk,
            rule_errors: resolution.errors,
        })
    }

    /// Would granting `grant` to the subject create a new SoD violation?
    ///
    /// New violations are sent to the audit sink whether or not they block.
    pub fn pre_check_grant(&self, id: &SubjectId, grant: &str) -> Result<GrantCheck> {
        let snapshot = self.policy.snapshot()?;
        let current = self.grants.grants(id)?;
        let result = check_grant(&current, grant, &snapshot.sod_rules, id);

        for violation in result.blocking.iter().chain(&result.detected) {
            self.audit.record(&AuditRecord::Violation(violation.clone()));
        }
        debug!(
            subject = %id,
            grant = %grant,
            display_name = self.grants.display_name(grant).as_deref().unwrap_or(grant),
            allowed = result.allowed,
            "grant pre-checked"
        );
        Ok(result)
    }

    /// Simulates a scenario against the current snapshot. Nothing is
    /// dispatched or audited.
    pub fn simulate(&self, scenario: &Scenario) -> Result<SimulationResult> {
        let snapshot = self.policy.snapshot()?;
        Ok(Simulator::new(self.settings.simulator).simulate(scenario, &snapshot))
    }

    /// Simulates a real subject as it currently stands.
    pub fn simulate_subject(&self, id: &SubjectId, approvals: Approvals) -> Result<SimulationResult> {
        let scenario = Scenario::new(self.subject(id)?).with_approvals(approvals);
        self.simulate(&scenario)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds an [`Engine`]. Attribute source, grant catalog, policy store and
/// dispatcher are required; audit defaults to [`TracingAuditSink`].
#[derive(Default)]
pub struct EngineBuilder {
    attributes: Option<Arc<dyn AttributeSource>>,
    grants: Option<Arc<dyn GrantCatalog>>,
    policy: Option<Arc<dyn PolicyStore>>,
    audit: Option<Arc<dyn AuditSink>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    ledger: Option<Arc<dyn CompletionLedger>>,
    settings: EngineSettings,
}

impl EngineBuilder {
    pub fn attributes(mut self, source: Arc<dyn AttributeSource>) -> Self {
        self.attributes = Some(source);
        self
    }

    pub fn grants(mut self, catalog: Arc<dyn GrantCatalog>) -> Self {
        self.grants = Some(catalog);
        self
    }

    pub fn policy(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.policy = Some(store);
        self
    }

    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn CompletionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let dispatcher = self
            .dispatcher
            .ok_or(EngineError::MissingCollaborator("dispatcher"))?;
        let mut executor = ActionExecutor::new(dispatcher).with_settings(self.settings.executor);
        if let Some(ledger) = self.ledger {
            executor = executor.with_ledger(ledger);
        }

        Ok(Engine {
            attributes: self
                .attributes
                .ok_or(EngineError::MissingCollaborator("attribute source"))?,
            grants: self
                .grants
                .ok_or(EngineError::MissingCollaborator("grant catalog"))?,
            policy: self
                .policy
                .ok_or(EngineError::MissingCollaborator("policy store"))?,
            audit: self
                .audit
                .unwrap_or_else(|| Arc::new(TracingAuditSink)),
            executor,
            settings: self.settings,
        })
    }
}
