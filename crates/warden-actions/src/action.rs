//! Action definitions.
//!
//! An action is one provisioning step a lifecycle rule triggers when it
//! fires: create an account, grant a role, open a ticket. Action kinds are a
//! closed enum so every consumer matches on them exhaustively.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_types::{ActionId, AttributeValue};

// ============================================================================
// Action Type
// ============================================================================

/// The kind of side effect an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    CreateAccount,
    DisableAccount,
    DeleteAccount,
    GrantRole,
    RevokeRole,
    GrantEntitlement,
    RevokeEntitlement,
    AddToGroup,
    RemoveFromGroup,
    UpdateAttribute,
    SendNotification,
    CreateTicket,
    StartReview,
    Webhook,
}

impl ActionType {
    /// Representative duration of one attempt, used to build dry-run timelines.
    pub fn nominal_duration(self) -> Duration {
        let ms = match self {
            Self::SendNotification | Self::UpdateAttribute => 50,
            Self::AddToGroup | Self::RemoveFromGroup => 80,
            Self::GrantRole | Self::RevokeRole => 120,
            Self::GrantEntitlement | Self::RevokeEntitlement => 150,
            Self::DisableAccount => 200,
            Self::CreateTicket | Self::StartReview => 250,
            Self::Webhook => 300,
            Self::CreateAccount => 400,
            Self::DeleteAccount => 500,
        };
        Duration::from_millis(ms)
    }

    /// Whether the action removes access or data.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            Self::DisableAccount
                | Self::DeleteAccount
                | Self::RevokeRole
                | Self::RevokeEntitlement
                | Self::RemoveFromGroup
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateAccount => "createAccount",
            Self::DisableAccount => "disableAccount",
            Self::DeleteAccount => "deleteAccount",
            Self::GrantRole => "grantRole",
            Self::RevokeRole => "revokeRole",
            Self::GrantEntitlement => "grantEntitlement",
            Self::RevokeEntitlement => "revokeEntitlement",
            Self::AddToGroup => "addToGroup",
            Self::RemoveFromGroup => "removeFromGroup",
            Self::UpdateAttribute => "updateAttribute",
            Self::SendNotification => "sendNotification",
            Self::CreateTicket => "createTicket",
            Self::StartReview => "startReview",
            Self::Webhook => "webhook",
        }
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Scheduling priority among actions that are ready at the same time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    #[default]
    Medium,
    High,
}

// ============================================================================
// Retry Policy
// ============================================================================

/// How transient failures of an action are retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `3` means at most four attempts.
    pub max_retries: u32,
    /// Factor applied to the delay on each successive retry. Values below
    /// `1.0` are treated as `1.0`.
    pub backoff_multiplier: f64,
    /// Total time budget for all attempts and delays. `0` disables the cap.
    pub timeout_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_multiplier: 2.0,
            timeout_seconds: 300,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `initial * multiplier^(retry - 1)`, capped at `max`.
    pub fn backoff_delay(&self, retry: u32, initial: Duration, max: Duration) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() {
            self.backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = retry.saturating_sub(1).min(64) as i32;
        let millis = initial.as_millis() as f64 * multiplier.powi(exponent);
        let capped = millis.min(max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Total budget for the retry loop, if capped.
    pub fn budget(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

// ============================================================================
// Action
// ============================================================================

/// One step of a rule's action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// What the action operates on: a role, an application, a group.
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub params: BTreeMap<String, AttributeValue>,
    /// Actions that must succeed before this one may run.
    #[serde(default)]
    pub dependencies: BTreeSet<ActionId>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub priority: ActionPriority,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl Action {
    pub fn new(id: impl Into<ActionId>, action_type: ActionType, target: &str) -> Self {
        Self {
            id: id.into(),
            action_type,
            target: target.to_string(),
            params: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            retry_policy: RetryPolicy::default(),
            priority: ActionPriority::default(),
            requires_approval: false,
            dry_run: false,
        }
    }

    /// Adds a dependency (builder pattern).
    pub fn depends_on(mut self, id: impl Into<ActionId>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn as_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SECOND: Duration = Duration::from_secs(1);
    const MINUTE: Duration = Duration::from_secs(60);

    #[test_case(1, 1_000; "first retry uses the initial delay")]
    #[test_case(2, 2_000; "second retry doubles")]
    #[test_case(3, 4_000; "third retry doubles again")]
    #[test_case(10, 60_000; "capped at max")]
    fn test_backoff_delay(retry: u32, expected_ms: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_delay(retry, SECOND, MINUTE),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_backoff_multiplier_below_one_is_flat() {
        let policy = RetryPolicy {
            backoff_multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(3, SECOND, MINUTE), SECOND);
    }

    #[test]
    fn test_zero_timeout_disables_budget() {
        let policy = RetryPolicy {
            timeout_seconds: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.budget(), None);
        assert_eq!(RetryPolicy::default().budget(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_action_deserializes_with_defaults() {
        let json = r#"{"id": "a1", "type": "grantRole", "target": "finance-approve"}"#;
        let action: Action = serde_json::from_str(json).expect("deserialize action");
        assert_eq!(action.action_type, ActionType::GrantRole);
        assert_eq!(action.priority, ActionPriority::Medium);
        assert_eq!(action.retry_policy, RetryPolicy::default());
        assert!(action.dependencies.is_empty());
        assert!(!action.requires_approval);
    }

    #[test]
    fn test_action_type_names_match_serde() {
        for action_type in [
            ActionType::CreateAccount,
            ActionType::RevokeEntitlement,
            ActionType::StartReview,
        ] {
            let json = serde_json::to_string(&action_type).expect("serialize");
            assert_eq!(json, format!("\"{}\"", action_type.name()));
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ActionPriority::High > ActionPriority::Medium);
        assert!(ActionPriority::Medium > ActionPriority::Low);
    }

    #[test]
    fn test_destructive_kinds() {
        assert!(ActionType::DeleteAccount.is_destructive());
        assert!(!ActionType::SendNotification.is_destructive());
    }
}
