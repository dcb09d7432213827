//! Dependency-aware action execution.
//!
//! # Scheduling
//!
//! The action list is compiled into an [`ActionGraph`] and processed in its
//! deterministic order. Before an action runs, the executor decides whether
//! it may run at all:
//!
//! 1. the execution was cancelled: `skipped` (`Cancelled`)
//! 2. a dependency failed or was skipped: `skipped` (`DependencyNotSatisfied`)
//! 3. a dependency is pending: `pending` (`BlockedByPending`)
//! 4. the rule's effective date lies in the future: `pending` (`Deferred`)
//! 5. approval is required and not held: `pending` (`AwaitingApproval`)
//!
//! Everything else runs. Cancellation is checked again immediately before
//! each dispatch. In live mode independent branches run concurrently: an
//! action is released as soon as its own dependencies settle, and each
//! branch measures time on its own fork of the executor's clock.
//!
//! # Dry runs
//!
//! A dry run (execution mode, rule flag or action flag) walks the same
//! graph, approval gates and retry loop, but attempts go to a scripted
//! dispatcher and time comes from a [`VirtualClock`]. Each action's virtual
//! timeline starts when its latest dependency finished, so the report's
//! total duration is the critical path. Dry runs never read or write the
//! completion ledger.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use warden_types::{ActionId, ConfigurationError, RuleId, SubjectId};

use crate::action::{Action, ActionType};
use crate::cancel::CancellationToken;
use crate::clock::{Clock, SystemClock, VirtualClock};
use crate::dispatch::{ActionError, DispatchRequest, Dispatcher, FaultPlan};
use crate::graph::ActionGraph;
use crate::ledger::{CompletionKey, CompletionLedger};
use crate::state::{ActionEvent, ActionState, InvalidTransition, StateTrail};

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort an execution as a whole.
///
/// Individual action failures are never errors; they are reported as
/// `failed` outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Live,
    DryRun,
}

/// Approval tokens supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Approvals {
    /// Approval for the rule as a whole. Also satisfies every action-level
    /// approval of that rule.
    pub rule_approved: bool,
    /// Actions approved individually.
    pub actions: BTreeSet<ActionId>,
}

impl Approvals {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn rule() -> Self {
        Self {
            rule_approved: true,
            actions: BTreeSet::new(),
        }
    }

    pub fn with_action(mut self, id: impl Into<ActionId>) -> Self {
        self.actions.insert(id.into());
        self
    }

    /// Whether the approval required to run `action` is held.
    fn satisfies(&self, action: &Action, rule_requires_approval: bool) -> bool {
        if rule_requires_approval && !self.rule_approved {
            return false;
        }
        !action.requires_approval || self.rule_approved || self.actions.contains(&action.id)
    }
}

/// Who and what an execution is on behalf of.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub subject: SubjectId,
    pub rule: RuleId,
    pub rule_requires_approval: bool,
    /// Rule-level dry run flag. Forces every action into dry run.
    pub rule_dry_run: bool,
    pub approvals: Approvals,
    /// The rule matched but its effective date has not arrived.
    pub deferred: bool,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(subject: impl Into<SubjectId>, rule: impl Into<RuleId>) -> Self {
        Self {
            subject: subject.into(),
            rule: rule.into(),
            rule_requires_approval: false,
            rule_dry_run: false,
            approvals: Approvals::none(),
            deferred: false,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn requiring_approval(mut self, required: bool) -> Self {
        self.rule_requires_approval = required;
        self
    }

    pub fn with_rule_dry_run(mut self, dry_run: bool) -> Self {
        self.rule_dry_run = dry_run;
        self
    }

    pub fn with_approvals(mut self, approvals: Approvals) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Retry pacing and concurrency knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Cap on any single retry delay.
    pub max_backoff: Duration,
    /// Run independent branches concurrently in live mode.
    pub parallel_branches: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            parallel_branches: true,
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Skipped,
    Pending,
}

/// Why an action ended up in a non-success state (or was not dispatched).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeReason {
    AwaitingApproval,
    BlockedByPending,
    Deferred,
    DependencyNotSatisfied,
    Cancelled,
    RetriesExhausted,
    TimedOut,
    PermanentFailure,
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    #[serde(rename = "action")]
    pub action_id: ActionId,
    pub action_type: ActionType,
    pub status: OutcomeStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Offset from the start of the execution.
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<OutcomeReason>,
    /// Completed by an earlier execution; not dispatched again.
    #[serde(default)]
    pub replayed: bool,
    pub dry_run: bool,
    pub trail: Vec<ActionState>,
}

impl ActionOutcome {
    fn not_run(action: &Action, status: OutcomeStatus, reason: OutcomeReason, trail: StateTrail) -> Self {
        Self {
            action_id: action.id.clone(),
            action_type: action.action_type,
            status,
            attempts: 0,
            duration_ms: 0,
            started_at_ms: 0,
            error: None,
            reason: Some(reason),
            replayed: false,
            dry_run: false,
            trail: trail.into_history(),
        }
    }

    fn finished_at_ms(&self) -> u64 {
        self.started_at_ms + self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallStatus {
    Success,
    Partial,
    Failed,
}

impl OverallStatus {
    /// `success` when every action succeeded (or there were none),
    /// `partial` when anything succeeded or is still pending, `failed`
    /// otherwise.
    pub fn from_outcomes(outcomes: &[ActionOutcome]) -> Self {
        if outcomes.iter().all(|o| o.status == OutcomeStatus::Success) {
            Self::Success
        } else if outcomes
            .iter()
            .any(|o| matches!(o.status, OutcomeStatus::Success | OutcomeStatus::Pending))
        {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

/// Result of executing one rule's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Outcomes in execution order.
    pub outcomes: Vec<ActionOutcome>,
    /// Latest finish offset across all actions.
    pub total_duration_ms: u64,
    pub overall: OverallStatus,
}

impl ExecutionReport {
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            total_duration_ms: 0,
            overall: OverallStatus::Success,
        }
    }

    pub fn outcome(&self, id: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|o| o.action_id.as_str() == id)
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// What happens to an action once its dependencies are settled.
enum Gate {
    Run { approved: bool },
    Hold {
        status: OutcomeStatus,
        reason: OutcomeReason,
        event: Option<ActionEvent>,
    },
}

/// Result of gating one action.
enum Settled {
    Held(ActionOutcome),
    Run { approved: bool, start_ms: u64 },
}

/// Shared bookkeeping for one concurrent live execution.
struct Branches<'a> {
    graph: &'a ActionGraph<'a>,
    dependents: Vec<Vec<usize>>,
    /// Position of each action in the deterministic schedule.
    rank: Vec<usize>,
    mode: ExecutionMode,
    ctx: &'a ExecutionContext,
    origin: Duration,
    progress: Mutex<Progress>,
}

struct Progress {
    outcomes: Vec<Option<ActionOutcome>>,
    /// Unsettled dependencies per action.
    waiting: Vec<usize>,
    error: Option<ExecutionError>,
}

impl Branches<'_> {
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an outcome and returns the dependents it made ready.
    fn complete(&self, index: usize, outcome: ActionOutcome) -> Vec<usize> {
        let mut progress = self.lock();
        progress.outcomes[index] = Some(outcome);
        if progress.error.is_some() {
            return Vec::new();
        }
        let mut ready = Vec::new();
        for &dependent in &self.dependents[index] {
            progress.waiting[dependent] -= 1;
            if progress.waiting[dependent] == 0 {
                ready.push(dependent);
            }
        }
        ready
    }

    /// Keeps the first error; nothing further is released afterwards.
    fn abort(&self, error: ExecutionError) {
        let mut progress = self.lock();
        if progress.error.is_none() {
            progress.error = Some(error);
        }
    }
}

struct Attempts {
    count: u32,
    result: Result<(), (ActionError, OutcomeReason)>,
}

/// Executes rule action lists against a dispatcher.
pub struct ActionExecutor<C: Clock = SystemClock> {
    dispatcher: Arc<dyn Dispatcher>,
    dry_run_dispatcher: Arc<dyn Dispatcher>,
    ledger: Option<Arc<dyn CompletionLedger>>,
    clock: C,
    settings: ExecutorSettings,
}

impl ActionExecutor<SystemClock> {
    /// Creates a live executor on the wall clock. Dry runs succeed on every
    /// attempt until a fault plan is installed.
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            dry_run_dispatcher: Arc::new(FaultPlan::none()),
            ledger: None,
            clock: SystemClock::new(),
            settings: ExecutorSettings::default(),
        }
    }
}

impl ActionExecutor<VirtualClock> {
    /// Creates an executor that never performs side effects: both live and
    /// dry-run attempts follow `faults`, and time is virtual.
    pub fn simulated(faults: FaultPlan) -> Self {
        let plan: Arc<dyn Dispatcher> = Arc::new(faults);
        Self {
            dispatcher: Arc::clone(&plan),
            dry_run_dispatcher: plan,
            ledger: None,
            clock: VirtualClock::new(),
            settings: ExecutorSettings::default(),
        }
    }
}

impl<C: Clock> ActionExecutor<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ActionExecutor<C2> {
        ActionExecutor {
            dispatcher: self.dispatcher,
            dry_run_dispatcher: self.dry_run_dispatcher,
            ledger: self.ledger,
            clock,
            settings: self.settings,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn CompletionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Scripts dry-run attempt results.
    pub fn with_fault_plan(mut self, faults: FaultPlan) -> Self {
        self.dry_run_dispatcher = Arc::new(faults);
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Executes (or simulates) a rule's action list.
    ///
    /// Fails fast with a configuration error if the dependency graph is
    /// invalid; no action is attempted in that case.
    pub fn execute(
        &self,
        actions: &[Action],
        mode: ExecutionMode,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionReport, ExecutionError> {
        let graph = ActionGraph::build(actions)?;
        let origin = self.clock.now();
        let order = graph.order();

        let concurrent =
            mode == ExecutionMode::Live && self.settings.parallel_branches && actions.len() > 1;
        let mut outcomes = if concurrent {
            self.execute_branches(&graph, &order, mode, ctx, origin)?
        } else {
            let mut outcomes: Vec<Option<ActionOutcome>> = vec![None; actions.len()];
            for &index in &order {
                let outcome = match self.settle(&graph, index, &outcomes, ctx)? {
                    Settled::Held(outcome) => outcome,
                    Settled::Run { approved, start_ms } => {
                        self.start(&actions[index], mode, ctx, approved, start_ms, origin)?
                    }
                };
                outcomes[index] = Some(outcome);
            }
            outcomes
        };

        let outcomes: Vec<ActionOutcome> = order
            .into_iter()
            .filter_map(|index| outcomes[index].take())
            .collect();
        let total_duration_ms = outcomes
            .iter()
            .map(ActionOutcome::finished_at_ms)
            .max()
            .unwrap_or(0);
        let overall = OverallStatus::from_outcomes(&outcomes);

        info!(
            subject = %ctx.subject,
            rule = %ctx.rule,
            ?mode,
            ?overall,
            actions = outcomes.len(),
            total_duration_ms,
            "execution finished"
        );

        Ok(ExecutionReport {
            outcomes,
            total_duration_ms,
            overall,
        })
    }

    /// Runs live branches concurrently. An action is released as soon as its
    /// own dependencies have settled, never waiting on unrelated siblings.
    fn execute_branches(
        &self,
        graph: &ActionGraph<'_>,
        order: &[usize],
        mode: ExecutionMode,
        ctx: &ExecutionContext,
        origin: Duration,
    ) -> Result<Vec<Option<ActionOutcome>>, ExecutionError> {
        let n = graph.actions().len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut waiting = Vec::with_capacity(n);
        for index in 0..n {
            let deps = graph.dependencies_of(index);
            waiting.push(deps.len());
            for &d in deps {
                dependents[d].push(index);
            }
        }
        let mut rank = vec![0; n];
        for (position, &index) in order.iter().enumerate() {
            rank[index] = position;
        }
        let roots: Vec<usize> = (0..n).filter(|&i| waiting[i] == 0).collect();

        let run = Branches {
            graph,
            dependents,
            rank,
            mode,
            ctx,
            origin,
            progress: Mutex::new(Progress {
                outcomes: vec![None; n],
                waiting,
                error: None,
            }),
        };
        rayon::scope(|scope| self.release(&run, scope, roots));

        let progress = run
            .progress
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        match progress.error {
            Some(error) => Err(error),
            None => Ok(progress.outcomes),
        }
    }

    /// Settles every ready action, spawning the runnable ones. Held actions
    /// complete immediately and may make their dependents ready in turn.
    fn release<'s>(
        &'s self,
        run: &'s Branches<'s>,
        scope: &rayon::Scope<'s>,
        mut ready: Vec<usize>,
    ) {
        loop {
            ready.sort_by_key(|&index| Reverse(run.rank[index]));
            let Some(index) = ready.pop() else {
                return;
            };

            let settled = {
                let progress = run.lock();
                self.settle(run.graph, index, &progress.outcomes, run.ctx)
            };
            match settled {
                Ok(Settled::Held(outcome)) => ready.extend(run.complete(index, outcome)),
                Ok(Settled::Run { approved, start_ms }) => scope.spawn(move |scope| {
                    let action = &run.graph.actions()[index];
                    match self.start(action, run.mode, run.ctx, approved, start_ms, run.origin) {
                        Ok(outcome) => {
                            let next = run.complete(index, outcome);
                            self.release(run, scope, next);
                        }
                        Err(error) => run.abort(error),
                    }
                }),
                Err(error) => run.abort(error),
            }
        }
    }

    /// Decides whether the action at `index` runs, given the outcomes of
    /// its dependencies.
    fn settle(
        &self,
        graph: &ActionGraph<'_>,
        index: usize,
        outcomes: &[Option<ActionOutcome>],
        ctx: &ExecutionContext,
    ) -> Result<Settled, ExecutionError> {
        let action = &graph.actions()[index];
        let deps: Vec<&ActionOutcome> = graph
            .dependencies_of(index)
            .iter()
            .filter_map(|&d| outcomes[d].as_ref())
            .collect();

        match self.gate(action, &deps, ctx) {
            Gate::Run { approved } => {
                let start_ms = deps.iter().map(|d| d.finished_at_ms()).max().unwrap_or(0);
                Ok(Settled::Run { approved, start_ms })
            }
            Gate::Hold {
                status,
                reason,
                event,
            } => {
                let mut trail = StateTrail::new();
                if let Some(event) = event {
                    trail.advance(event)?;
                }
                debug!(
                    subject = %ctx.subject,
                    rule = %ctx.rule,
                    action = %action.id,
                    ?status,
                    ?reason,
                    "action not run"
                );
                Ok(Settled::Held(ActionOutcome::not_run(action, status, reason, trail)))
            }
        }
    }

    fn gate(&self, action: &Action, deps: &[&ActionOutcome], ctx: &ExecutionContext) -> Gate {
        let hold = |status, reason, event| Gate::Hold {
            status,
            reason,
            event,
        };

        if ctx.cancellation.is_cancelled() {
            return hold(OutcomeStatus::Skipped, OutcomeReason::Cancelled, Some(ActionEvent::Skip));
        }
        if deps
            .iter()
            .any(|d| matches!(d.status, OutcomeStatus::Failed | OutcomeStatus::Skipped))
        {
            return hold(
                OutcomeStatus::Skipped,
                OutcomeReason::DependencyNotSatisfied,
                Some(ActionEvent::Skip),
            );
        }
        if deps.iter().any(|d| d.status == OutcomeStatus::Pending) {
            return hold(OutcomeStatus::Pending, OutcomeReason::BlockedByPending, None);
        }
        if ctx.deferred {
            return hold(OutcomeStatus::Pending, OutcomeReason::Deferred, None);
        }

        let needs_approval = action.requires_approval || ctx.rule_requires_approval;
        if needs_approval && !ctx.approvals.satisfies(action, ctx.rule_requires_approval) {
            return hold(
                OutcomeStatus::Pending,
                OutcomeReason::AwaitingApproval,
                Some(ActionEvent::RequireApproval),
            );
        }
        Gate::Run {
            approved: needs_approval,
        }
    }

    /// Last cancellation check before an action is dispatched.
    fn start(
        &self,
        action: &Action,
        mode: ExecutionMode,
        ctx: &ExecutionContext,
        approved: bool,
        start_ms: u64,
        origin: Duration,
    ) -> Result<ActionOutcome, ExecutionError> {
        if ctx.cancellation.is_cancelled() {
            let mut trail = StateTrail::new();
            trail.advance(ActionEvent::Skip)?;
            debug!(
                subject = %ctx.subject,
                rule = %ctx.rule,
                action = %action.id,
                "cancelled before dispatch"
            );
            return Ok(ActionOutcome::not_run(
                action,
                OutcomeStatus::Skipped,
                OutcomeReason::Cancelled,
                trail,
            ));
        }
        self.run_action(action, mode, ctx, approved, start_ms, origin)
    }

    fn run_action(
        &self,
        action: &Action,
        mode: ExecutionMode,
        ctx: &ExecutionContext,
        approved: bool,
        start_ms: u64,
        origin: Duration,
    ) -> Result<ActionOutcome, ExecutionError> {
        let mut trail = StateTrail::new();
        if approved {
            trail.advance(ActionEvent::RequireApproval)?;
            trail.advance(ActionEvent::Approve)?;
        }

        let dry_run = mode == ExecutionMode::DryRun || ctx.rule_dry_run || action.dry_run;

        if dry_run {
            let clock = VirtualClock::starting_at(Duration::from_millis(start_ms));
            let attempts = self.attempt_with_retries(
                &clock,
                self.dry_run_dispatcher.as_ref(),
                action,
                ctx,
                true,
                &mut trail,
            )?;
            let duration_ms = clock.now_ms() - start_ms;
            return Ok(finish(action, attempts, start_ms, duration_ms, true, trail));
        }

        let branch = self.clock.fork_at(origin + Duration::from_millis(start_ms));
        let key = CompletionKey::new(&ctx.subject, &ctx.rule, &action.id);
        if let Some(ledger) = &self.ledger {
            if ledger.is_complete(&key) {
                debug!(
                    subject = %ctx.subject,
                    rule = %ctx.rule,
                    action = %action.id,
                    "action already completed, not dispatching"
                );
                return Ok(ActionOutcome {
                    action_id: action.id.clone(),
                    action_type: action.action_type,
                    status: OutcomeStatus::Success,
                    attempts: 0,
                    duration_ms: 0,
                    started_at_ms: branch.now().saturating_sub(origin).as_millis() as u64,
                    error: None,
                    reason: Some(OutcomeReason::AlreadyCompleted),
                    replayed: true,
                    dry_run: false,
                    trail: trail.into_history(),
                });
            }
        }

        let started = branch.now();
        let attempts = self.attempt_with_retries(
            &branch,
            self.dispatcher.as_ref(),
            action,
            ctx,
            false,
            &mut trail,
        )?;
        let duration_ms = branch.now().saturating_sub(started).as_millis() as u64;
        let started_at_ms = started.saturating_sub(origin).as_millis() as u64;

        if attempts.result.is_ok() {
            if let Some(ledger) = &self.ledger {
                ledger.record_completion(key);
            }
        }
        Ok(finish(action, attempts, started_at_ms, duration_ms, false, trail))
    }

    /// The retry loop. `simulate_work` advances the clock by the action's
    /// nominal duration on every attempt.
    fn attempt_with_retries<K: Clock + ?Sized>(
        &self,
        clock: &K,
        dispatcher: &dyn Dispatcher,
        action: &Action,
        ctx: &ExecutionContext,
        simulate_work: bool,
        trail: &mut StateTrail,
    ) -> Result<Attempts, InvalidTransition> {
        let policy = &action.retry_policy;
        let budget = policy.budget();
        let start = clock.now();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            trail.advance(ActionEvent::Dispatch)?;
            if simulate_work {
                clock.sleep(action.action_type.nominal_duration());
            }

            let request = DispatchRequest {
                subject: &ctx.subject,
                rule: &ctx.rule,
                action,
                attempt,
            };
            let error = match dispatcher.dispatch(&request) {
                Ok(()) => {
                    trail.advance(ActionEvent::Succeed)?;
                    return Ok(Attempts {
                        count: attempt,
                        result: Ok(()),
                    });
                }
                Err(error) => error,
            };

            let ActionError::Transient(message) = &error else {
                trail.advance(ActionEvent::Fail)?;
                let reason = match error {
                    ActionError::TimedOut { .. } => OutcomeReason::TimedOut,
                    _ => OutcomeReason::PermanentFailure,
                };
                return Ok(Attempts {
                    count: attempt,
                    result: Err((error, reason)),
                });
            };

            if attempt > policy.max_retries {
                trail.advance(ActionEvent::Fail)?;
                warn!(
                    subject = %ctx.subject,
                    rule = %ctx.rule,
                    action = %action.id,
                    attempts = attempt,
                    error = %error,
                    "retries exhausted"
                );
                return Ok(Attempts {
                    count: attempt,
                    result: Err((error, OutcomeReason::RetriesExhausted)),
                });
            }

            let delay =
                policy.backoff_delay(attempt, self.settings.initial_backoff, self.settings.max_backoff);
            let elapsed = clock.now().saturating_sub(start);
            if budget.is_some_and(|budget| elapsed + delay > budget) {
                trail.advance(ActionEvent::Fail)?;
                warn!(
                    subject = %ctx.subject,
                    rule = %ctx.rule,
                    action = %action.id,
                    attempts = attempt,
                    "retry budget exhausted"
                );
                let timed_out = ActionError::TimedOut {
                    elapsed_ms: elapsed.as_millis() as u64,
                    last_error: message.clone(),
                };
                return Ok(Attempts {
                    count: attempt,
                    result: Err((timed_out, OutcomeReason::TimedOut)),
                });
            }

            debug!(
                action = %action.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retry scheduled"
            );
            trail.advance(ActionEvent::RetryScheduled)?;
            clock.sleep(delay);
        }
    }
}

fn finish(
    action: &Action,
    attempts: Attempts,
    started_at_ms: u64,
    duration_ms: u64,
    dry_run: bool,
    trail: StateTrail,
) -> ActionOutcome {
    let (status, error, reason) = match attempts.result {
        Ok(()) => (OutcomeStatus::Success, None, None),
        Err((error, reason)) => (OutcomeStatus::Failed, Some(error.to_string()), Some(reason)),
    };
    ActionOutcome {
        action_id: action.id.clone(),
        action_type: action.action_type,
        status,
        attempts: attempts.count,
        duration_ms,
        started_at_ms,
        error,
        reason,
        replayed: false,
        dry_run,
        trail: trail.into_history(),
    }
}

impl<C: Clock + std::fmt::Debug> std::fmt::Debug for ActionExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("clock", &self.clock)
            .field("settings", &self.settings)
            .field("ledger", &self.ledger.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
