//! # Warden
//!
//! Policy and lifecycle rule evaluation for identity governance.
//!
//! Given a subject's attributes and current access grants, Warden decides
//! which automation rule fires, executes its actions with dependency
//! ordering, retries and approval gating, detects Segregation-of-Duties
//! conflicts and computes an aggregate risk score.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Engine                            │
//! │  ┌───────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐  │
//! │  │  Policy   │ → │  Actions  │   │   SoD    │   │  Risk   │  │
//! │  │(conditions│   │(graph,    │   │(conflict │   │(weighted│  │
//! │  │ + rules)  │   │ retries)  │   │ sets)    │   │ score)  │  │
//! │  └───────────┘   └───────────┘   └──────────┘   └─────────┘  │
//! │                 Simulation harness wraps all four            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use warden::{
//!     Action, ActionType, Engine, EvaluationOptions, FaultPlan, InMemoryDirectory,
//!     InMemoryPolicyStore, OutcomeStatus, PolicySnapshot, Rule, RuleSet, Subject, SubjectId,
//! };
//!
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.upsert(Subject::new("u-1").with_attribute("department", "Engineering"));
//!
//! let rule = Rule::new("joiner", 1)
//!     .with_action(Action::new("account", ActionType::CreateAccount, "directory"));
//! let store = Arc::new(InMemoryPolicyStore::new(PolicySnapshot::new(
//!     RuleSet::new("lifecycle").with_rule(rule),
//! )));
//!
//! let engine = Engine::builder()
//!     .attributes(directory.clone())
//!     .grants(directory)
//!     .policy(store)
//!     .dispatcher(Arc::new(FaultPlan::none()))
//!     .build()
//!     .unwrap();
//!
//! let evaluation = engine
//!     .evaluate(&SubjectId::new("u-1"), &EvaluationOptions::default())
//!     .unwrap();
//! assert_eq!(evaluation.execution.outcomes[0].status, OutcomeStatus::Success);
//! ```
//!
//! # Modules
//!
//! - **Engine**: [`Engine`], [`EngineBuilder`], [`EvaluationOptions`]
//! - **Collaborators**: [`AttributeSource`], [`GrantCatalog`], [`PolicyStore`],
//!   [`AuditSink`] and their in-memory implementations
//! - **Components**: re-exported from the `warden-*` crates

mod collaborators;
mod engine;
mod settings;

pub use collaborators::{
    AttributeSource, AuditRecord, AuditSink, CollaboratorError, GrantCatalog, InMemoryDirectory,
    InMemoryPolicyStore, MemoryAuditSink, PolicyStore, TracingAuditSink,
};
pub use engine::{Engine, EngineBuilder, EngineError, Evaluation, EvaluationOptions, Result};
pub use settings::EngineSettings;

// Re-export shared types
pub use warden_types::{
    ActionId, AttributeMap, AttributeValue, ConfigurationError, RuleId, SodRuleId, Subject,
    SubjectId,
};

// Re-export the condition evaluator and rule resolver
pub use warden_policy::{
    AttributeCatalog, Condition, ConditionEvaluator, ConditionGroup, FieldType, LogicalOperator,
    Operator, Rule, RuleResolver, RuleSet, RuleSetIssue, RuleStatus, Visibility,
};

// Re-export the action executor
pub use warden_actions::{
    Action, ActionError, ActionExecutor, ActionOutcome, ActionPriority, ActionType, Approvals,
    CancellationToken, CompletionLedger, DispatchRequest, Dispatcher, ExecutionMode,
    ExecutionReport, FaultPlan, InMemoryLedger, OutcomeReason, OutcomeStatus, OverallStatus,
    RetryPolicy,
};

// Re-export SoD detection and risk scoring
pub use warden_risk::{RiskAssessment, RiskBand, RiskError, RiskScorer, RiskWeight};
pub use warden_sod::{
    Enforcement, GrantCheck, Severity, SodRule, SodRuleError, SodRuleType, Violation,
    ViolationReport, check_population,
};

// Re-export the simulation harness and configuration
pub use warden_config::WardenConfig;
pub use warden_sim::{
    BatchReport, ComplianceIssue, PolicySnapshot, Scenario, ScenarioFault, SimulationResult,
    Simulator, StressReport,
};
