//! # warden-actions: Action execution for lifecycle rules
//!
//! When a lifecycle rule fires, its action list is executed here:
//!
//! - [`ActionGraph`]: validates the dependency relation (acyclic, no unknown
//!   or duplicate ids) and computes a deterministic wave schedule
//! - [`ActionExecutor`]: runs the schedule with retries, exponential
//!   backoff, approval gating, cancellation and dry runs
//! - [`StateTrail`]: the per-action lifecycle state machine
//! - [`CompletionLedger`]: idempotency across re-executions
//! - [`Dispatcher`] / [`FaultPlan`]: the side-effect seam and its scripted
//!   stand-in for simulations
//!
//! # Example
//!
//! ```
//! use warden_actions::{
//!     Action, ActionExecutor, ActionType, ExecutionContext, ExecutionMode, FaultPlan,
//!     OutcomeStatus,
//! };
//!
//! let actions = vec![
//!     Action::new("account", ActionType::CreateAccount, "ad"),
//!     Action::new("role", ActionType::GrantRole, "engineer").depends_on("account"),
//! ];
//!
//! let executor = ActionExecutor::simulated(FaultPlan::none().always_failing("account"));
//! let ctx = ExecutionContext::new("u-1", "onboarding");
//! let report = executor.execute(&actions, ExecutionMode::DryRun, &ctx).unwrap();
//!
//! assert_eq!(report.outcome("account").unwrap().status, OutcomeStatus::Failed);
//! assert_eq!(report.outcome("role").unwrap().status, OutcomeStatus::Skipped);
//! ```

pub mod action;
pub mod cancel;
pub mod clock;
pub mod dispatch;
pub mod executor;
pub mod graph;
pub mod ledger;
pub mod state;

pub use action::{Action, ActionPriority, ActionType, RetryPolicy};
pub use cancel::CancellationToken;
pub use clock::{Clock, SystemClock, VirtualClock};
pub use dispatch::{ActionError, DispatchRequest, Dispatcher, FaultPlan};
pub use executor::{
    ActionExecutor, ActionOutcome, Approvals, ExecutionContext, ExecutionError, ExecutionMode,
    ExecutionReport, ExecutorSettings, OutcomeReason, OutcomeStatus, OverallStatus,
};
pub use graph::ActionGraph;
pub use ledger::{CompletionKey, CompletionLedger, InMemoryLedger};
pub use state::{ActionEvent, ActionState, InvalidTransition, StateTrail};
