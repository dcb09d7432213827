//! End-to-end executor behaviour over realistic action lists.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use warden_actions::{
    Action, ActionError, ActionExecutor, ActionType, CancellationToken, DispatchRequest,
    Dispatcher, ExecutionContext, ExecutionMode, ExecutorSettings, FaultPlan, InMemoryLedger,
    OutcomeReason, OutcomeStatus, OverallStatus, VirtualClock,
};

/// Records dispatch order so tests can check dependencies ran first.
#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<(), ActionError> {
        let id = request.action.id.to_string();
        self.calls
            .lock()
            .expect("calls lock")
            .push(id.clone());
        if self.failing.contains(&id) {
            Err(ActionError::Permanent(format!("{id} rejected")))
        } else {
            Ok(())
        }
    }
}

/// Cancels the execution from inside its first dispatch, as an operator
/// would while the first action is in flight.
struct CancelOnFirstDispatch {
    token: CancellationToken,
    calls: Mutex<Vec<String>>,
}

impl Dispatcher for CancelOnFirstDispatch {
    fn dispatch(&self, request: &DispatchRequest<'_>) -> Result<(), ActionError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(request.action.id.to_string());
        self.token.cancel();
        Ok(())
    }
}

fn onboarding() -> Vec<Action> {
    vec![
        Action::new("notify-manager", ActionType::SendNotification, "manager")
            .depends_on("grant-engineer"),
        Action::new("grant-engineer", ActionType::GrantRole, "engineer").depends_on("create-ad"),
        Action::new("create-ad", ActionType::CreateAccount, "active-directory"),
        Action::new("add-all-staff", ActionType::AddToGroup, "all-staff").depends_on("create-ad"),
    ]
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn dependency_failing_after_three_retries_skips_dependent() {
    let actions = vec![
        Action::new("A", ActionType::GrantRole, "finance-approve").depends_on("B"),
        Action::new("B", ActionType::CreateAccount, "erp"),
    ];
    let executor = ActionExecutor::simulated(FaultPlan::none().always_failing("B"));
    let report = executor
        .execute(
            &actions,
            ExecutionMode::DryRun,
            &ExecutionContext::new("u-1", "finance-onboarding"),
        )
        .expect("valid action list");

    let b = report.outcome("B").expect("B outcome");
    assert_eq!(b.status, OutcomeStatus::Failed);
    assert_eq!(b.attempts, 4);
    assert!(b.error.is_some());

    let a = report.outcome("A").expect("A outcome");
    assert_eq!(a.status, OutcomeStatus::Skipped);
    assert_eq!(a.attempts, 0);
}

#[test]
fn live_execution_dispatches_in_dependency_order() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let executor = ActionExecutor::new(dispatcher.clone()).with_clock(VirtualClock::new());
    let report = executor
        .execute(
            &onboarding(),
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding"),
        )
        .expect("valid action list");

    assert_eq!(report.overall, OverallStatus::Success);
    let calls = dispatcher.calls.lock().expect("calls lock").clone();
    let position = |id: &str| calls.iter().position(|c| c == id).expect("dispatched");
    assert!(position("create-ad") < position("grant-engineer"));
    assert!(position("create-ad") < position("add-all-staff"));
    assert!(position("grant-engineer") < position("notify-manager"));
}

#[test]
fn failed_branch_does_not_abort_sibling_branch() {
    let dispatcher = Arc::new(RecordingDispatcher {
        failing: vec!["grant-engineer".to_string()],
        ..RecordingDispatcher::default()
    });
    let executor = ActionExecutor::new(dispatcher).with_clock(VirtualClock::new());
    let report = executor
        .execute(
            &onboarding(),
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding"),
        )
        .expect("valid action list");

    let status = |id: &str| report.outcome(id).expect("outcome").status;
    assert_eq!(status("create-ad"), OutcomeStatus::Success);
    assert_eq!(status("add-all-staff"), OutcomeStatus::Success);
    assert_eq!(status("grant-engineer"), OutcomeStatus::Failed);
    assert_eq!(status("notify-manager"), OutcomeStatus::Skipped);
    assert_eq!(report.overall, OverallStatus::Partial);
}

#[test]
fn dry_run_never_reaches_live_dispatcher() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let executor = ActionExecutor::new(dispatcher.clone()).with_clock(VirtualClock::new());

    let mut actions = onboarding();
    actions[0] = actions[0].clone().as_dry_run();
    let report = executor
        .execute(
            &actions,
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding"),
        )
        .expect("valid action list");

    assert_eq!(report.overall, OverallStatus::Success);
    let calls = dispatcher.calls.lock().expect("calls lock").clone();
    assert!(!calls.contains(&"notify-manager".to_string()));
    assert!(report.outcome("notify-manager").expect("outcome").dry_run);

    let rule_dry_run = ExecutionContext::new("u-2", "onboarding").with_rule_dry_run(true);
    dispatcher.calls.lock().expect("calls lock").clear();
    executor
        .execute(&onboarding(), ExecutionMode::Live, &rule_dry_run)
        .expect("valid action list");
    assert!(dispatcher.calls.lock().expect("calls lock").is_empty());
}

#[test]
fn rerun_after_partial_failure_only_dispatches_remaining_actions() {
    let ledger = Arc::new(InMemoryLedger::new());
    let ctx = ExecutionContext::new("u-1", "onboarding");

    let failing = Arc::new(RecordingDispatcher {
        failing: vec!["grant-engineer".to_string()],
        ..RecordingDispatcher::default()
    });
    ActionExecutor::new(failing)
        .with_clock(VirtualClock::new())
        .with_ledger(ledger.clone())
        .execute(&onboarding(), ExecutionMode::Live, &ctx)
        .expect("first run");

    let healthy = Arc::new(RecordingDispatcher::default());
    let report = ActionExecutor::new(healthy.clone())
        .with_clock(VirtualClock::new())
        .with_ledger(ledger)
        .execute(&onboarding(), ExecutionMode::Live, &ctx)
        .expect("second run");

    assert_eq!(report.overall, OverallStatus::Success);
    let mut calls = healthy.calls.lock().expect("calls lock").clone();
    calls.sort();
    assert_eq!(calls, vec!["grant-engineer", "notify-manager"]);
}

#[test]
fn cancellation_mid_run_stops_remaining_independent_actions() {
    let token = CancellationToken::new();
    let dispatcher = Arc::new(CancelOnFirstDispatch {
        token: token.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let executor = ActionExecutor::new(dispatcher.clone())
        .with_clock(VirtualClock::new())
        .with_settings(ExecutorSettings {
            parallel_branches: false,
            ..ExecutorSettings::default()
        });
    let actions = vec![
        Action::new("grant-a", ActionType::GrantRole, "a"),
        Action::new("grant-b", ActionType::GrantRole, "b"),
        Action::new("grant-c", ActionType::GrantRole, "c"),
    ];

    let report = executor
        .execute(
            &actions,
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding").with_cancellation(token),
        )
        .expect("valid action list");

    assert_eq!(dispatcher.calls.lock().expect("calls lock").len(), 1);
    assert_eq!(report.count(OutcomeStatus::Success), 1);
    let cancelled: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.reason == Some(OutcomeReason::Cancelled))
        .collect();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.iter().all(|o| o.status == OutcomeStatus::Skipped && o.attempts == 0));
    assert_eq!(report.overall, OverallStatus::Partial);
}

#[test]
fn cancellation_in_concurrent_run_skips_dependents() {
    let token = CancellationToken::new();
    let dispatcher = Arc::new(CancelOnFirstDispatch {
        token: token.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let executor = ActionExecutor::new(dispatcher.clone()).with_clock(VirtualClock::new());
    let actions = vec![
        Action::new("create-ad", ActionType::CreateAccount, "active-directory"),
        Action::new("grant-engineer", ActionType::GrantRole, "engineer").depends_on("create-ad"),
        Action::new("notify-manager", ActionType::SendNotification, "manager")
            .depends_on("grant-engineer"),
    ];

    let report = executor
        .execute(
            &actions,
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding").with_cancellation(token),
        )
        .expect("valid action list");

    assert_eq!(
        *dispatcher.calls.lock().expect("calls lock"),
        vec!["create-ad".to_string()]
    );
    for id in ["grant-engineer", "notify-manager"] {
        let outcome = report.outcome(id).expect("outcome");
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.reason, Some(OutcomeReason::Cancelled));
    }
}

#[test]
fn independent_branch_is_not_held_back_by_retrying_sibling() {
    let actions = vec![
        Action::new("grant-slow", ActionType::GrantRole, "slow"),
        Action::new("create-ad", ActionType::CreateAccount, "active-directory"),
        Action::new("add-all-staff", ActionType::AddToGroup, "all-staff").depends_on("create-ad"),
    ];
    // Two transient failures put 1s + 2s of backoff on grant-slow.
    let executor = ActionExecutor::simulated(FaultPlan::none().transient("grant-slow", 2));
    let report = executor
        .execute(
            &actions,
            ExecutionMode::Live,
            &ExecutionContext::new("u-1", "onboarding"),
        )
        .expect("valid action list");

    assert_eq!(report.overall, OverallStatus::Success);
    let slow = report.outcome("grant-slow").expect("outcome");
    assert_eq!(slow.attempts, 3);
    assert_eq!(slow.duration_ms, 3_000);

    // The sibling branch neither waits for nor is billed for those retries.
    let ad = report.outcome("create-ad").expect("outcome");
    let staff = report.outcome("add-all-staff").expect("outcome");
    assert_eq!(ad.duration_ms, 0);
    assert_eq!(staff.started_at_ms, 0);
    assert_eq!(staff.duration_ms, 0);
    assert_eq!(report.total_duration_ms, 3_000);
}

// ============================================================================
// Properties
// ============================================================================

/// Generates an acyclic action list: action `i` may only depend on actions
/// with a lower index, and the list is then reversed so dependencies do not
/// simply follow list order.
fn arb_action_list() -> impl Strategy<Value = (Vec<Action>, Vec<bool>)> {
    (1usize..12)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..3), n),
                proptest::collection::vec(any::<bool>(), n),
            )
        })
        .prop_map(|(deps, failing)| {
            let mut actions: Vec<Action> = deps
                .iter()
                .enumerate()
                .map(|(i, picks)| {
                    let mut action = Action::new(format!("a{i}"), ActionType::GrantRole, "role");
                    if i > 0 {
                        for pick in picks {
                            action = action.depends_on(format!("a{}", pick.index(i)));
                        }
                    }
                    action
                })
                .collect();
            actions.reverse();
            (actions, failing)
        })
}

proptest! {
    #[test]
    fn prop_no_action_runs_before_its_dependencies((actions, failing) in arb_action_list()) {
        let mut plan = FaultPlan::none();
        for (i, fail) in failing.iter().enumerate() {
            if *fail {
                plan = plan.permanent(format!("a{i}"), "scripted");
            }
        }
        let report = ActionExecutor::simulated(plan)
            .execute(&actions, ExecutionMode::DryRun, &ExecutionContext::new("u", "r"))
            .expect("acyclic list");

        prop_assert_eq!(report.outcomes.len(), actions.len());

        let position: HashMap<&str, usize> = report
            .outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| (o.action_id.as_str(), i))
            .collect();

        for action in &actions {
            let outcome = report.outcome(action.id.as_str()).expect("outcome");
            let deps_ok = action.dependencies.iter().all(|dep| {
                report.outcome(dep.as_str()).map(|o| o.status) == Some(OutcomeStatus::Success)
            });

            for dep in &action.dependencies {
                prop_assert!(position[dep.as_str()] < position[action.id.as_str()]);
            }
            if outcome.attempts > 0 {
                prop_assert!(deps_ok);
            }
            if !deps_ok {
                prop_assert_eq!(outcome.status, OutcomeStatus::Skipped);
                prop_assert_eq!(outcome.attempts, 0);
            }
        }
    }

    #[test]
    fn prop_dry_run_is_deterministic((actions, failing) in arb_action_list()) {
        let mut plan = FaultPlan::none();
        for (i, fail) in failing.iter().enumerate() {
            if *fail {
                plan = plan.transient(format!("a{i}"), 2);
            }
        }
        let executor = ActionExecutor::simulated(plan);
        let ctx = ExecutionContext::new("u", "r");
        let first = executor.execute(&actions, ExecutionMode::DryRun, &ctx).expect("acyclic");
        let second = executor.execute(&actions, ExecutionMode::DryRun, &ctx).expect("acyclic");
        prop_assert_eq!(first, second);
    }
}
