//! # warden-sim: Simulation harness
//!
//! Runs the whole evaluation pipeline against synthetic or real subjects
//! without committing anything:
//!
//! ```text
//! Scenario ──► RuleResolver (all matches, drafts visible)
//!                 │ first match
//!                 ▼
//!              ActionExecutor (dry run forced, fault plan, virtual clock)
//!                 │
//!              SoD check ──► risk score ──► SimulationResult
//! ```
//!
//! [`Simulator::simulate`] handles one subject, [`Simulator::simulate_batch`]
//! a fixed list of scenarios and [`Simulator::stress`] one scenario many
//! times over.
//!
//! ```
//! use warden_actions::{Action, ActionType, OutcomeStatus};
//! use warden_policy::{Rule, RuleSet};
//! use warden_sim::{PolicySnapshot, Scenario, ScenarioFault, Simulator};
//! use warden_types::{ActionId, Subject};
//!
//! let rule = Rule::new("joiner", 1)
//!     .with_action(Action::new("b", ActionType::CreateAccount, "ad"))
//!     .with_action(Action::new("a", ActionType::GrantRole, "staff").depends_on("b"));
//! let policy = PolicySnapshot::new(RuleSet::new("lifecycle").with_rule(rule));
//! let scenario = Scenario::new(Subject::new("u-1"))
//!     .with_fault(ScenarioFault::AlwaysFailing { action: ActionId::new("b") });
//!
//! let result = Simulator::default().simulate(&scenario, &policy);
//!
//! assert_eq!(result.action_outcomes[0].status, OutcomeStatus::Failed);
//! assert_eq!(result.action_outcomes[1].status, OutcomeStatus::Skipped);
//! ```

mod report;
mod scenario;
mod simulator;

pub use report::{BatchReport, ComplianceIssue, SimulationResult, StressReport};
pub use scenario::{PolicySnapshot, Scenario, ScenarioFault};
pub use simulator::{Result, SimError, Simulator, SimulatorSettings};
