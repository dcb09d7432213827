//! Condition grammar.
//!
//! A [`ConditionGroup`] owns one logical operator that combines all of its
//! direct entries: its conditions first, then its nested groups. Nested
//! groups never inherit the parent's operator, so `A AND (B OR C)` is
//! written as an AND group containing `A` and an OR group of `B` and `C`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use warden_types::{AttributeValue, ConfigurationError};

// ============================================================================
// Operator
// ============================================================================

/// Comparison operator of a single condition.
///
/// Operators arrive as strings from the rule store. Names outside the grammar
/// are kept as [`Operator::Unknown`] and reported when the condition is
/// validated, rather than failing deserialization of the whole rule set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    Before,
    After,
    ContainsAll,
    ContainsAny,
    Unknown(String),
}

impl Operator {
    pub fn name(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEqual => "greaterThanOrEqual",
            Self::LessThan => "lessThan",
            Self::LessThanOrEqual => "lessThanOrEqual",
            Self::Between => "between",
            Self::Before => "before",
            Self::After => "after",
            Self::ContainsAll => "containsAll",
            Self::ContainsAny => "containsAny",
            Self::Unknown(name) => name,
        }
    }

    /// Operators that take no comparison value.
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl FromStr for Operator {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from(s.to_string()) {
            Self::Unknown(operator) => Err(ConfigurationError::UnknownOperator { operator }),
            known => Ok(known),
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "equals" => Self::Equals,
            "notEquals" => Self::NotEquals,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "isEmpty" => Self::IsEmpty,
            "isNotEmpty" => Self::IsNotEmpty,
            "greaterThan" => Self::GreaterThan,
            "greaterThanOrEqual" => Self::GreaterThanOrEqual,
            "lessThan" => Self::LessThan,
            "lessThanOrEqual" => Self::LessThanOrEqual,
            "between" => Self::Between,
            "before" => Self::Before,
            "after" => Self::After,
            "containsAll" => Self::ContainsAll,
            "containsAny" => Self::ContainsAny,
            _ => Self::Unknown(name),
        }
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Unknown(name) => name,
            known => known.name().to_string(),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Condition
// ============================================================================

/// A single `field operator value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: AttributeValue,
    /// Inverts the result after the operator has been applied.
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Condition {
    pub fn new(field: &str, operator: Operator, value: impl Into<AttributeValue>) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value: value.into(),
            negate: false,
            case_sensitive: false,
        }
    }

    /// A condition for a unary operator such as `isEmpty`.
    pub fn unary(field: &str, operator: Operator) -> Self {
        Self::new(field, operator, AttributeValue::Null)
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

// ============================================================================
// Condition Group
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Conditions and nested groups combined by one logical operator.
///
/// An empty group matches every subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionGroup {
    pub logical_operator: LogicalOperator,
    pub conditions: Vec<Condition>,
    pub groups: Vec<ConditionGroup>,
}

impl ConditionGroup {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn any() -> Self {
        Self {
            logical_operator: LogicalOperator::Or,
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }

    /// Every condition in the tree, depth first.
    pub fn walk(&self) -> Vec<&Condition> {
        let mut out: Vec<&Condition> = self.conditions.iter().collect();
        for group in &self.groups {
            out.extend(group.walk());
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_names() {
        for name in ["equals", "notIn", "greaterThanOrEqual", "containsAny", "before"] {
            let operator: Operator = name.parse().expect("known operator");
            assert_eq!(operator.name(), name);
        }
    }

    #[test]
    fn test_unknown_operator_survives_deserialization() {
        let json = r#"{"field": "department", "operator": "resembles", "value": "Eng"}"#;
        let condition: Condition = serde_json::from_str(json).expect("deserialize");
        assert_eq!(condition.operator, Operator::Unknown("resembles".to_string()));

        let err = "resembles".parse::<Operator>().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownOperator {
                operator: "resembles".to_string()
            }
        );
    }

    #[test]
    fn test_group_deserializes_nested() {
        let json = r#"{
            "logicalOperator": "OR",
            "conditions": [{"field": "department", "operator": "equals", "value": "Sales"}],
            "groups": [{
                "logicalOperator": "AND",
                "conditions": [
                    {"field": "location", "operator": "equals", "value": "Berlin"},
                    {"field": "securityLevel", "operator": "greaterThan", "value": 2}
                ]
            }]
        }"#;
        let group: ConditionGroup = serde_json::from_str(json).expect("deserialize");
        assert_eq!(group.logical_operator, LogicalOperator::Or);
        assert_eq!(group.groups[0].logical_operator, LogicalOperator::And);
        assert_eq!(group.walk().len(), 3);
    }

    #[test]
    fn test_empty_group_defaults_to_and() {
        let group: ConditionGroup = serde_json::from_str("{}").expect("deserialize");
        assert!(group.is_empty());
        assert_eq!(group.logical_operator, LogicalOperator::And);
    }

    #[test]
    fn test_operator_serializes_as_name() {
        let json = serde_json::to_string(&Operator::NotEquals).expect("serialize");
        assert_eq!(json, "\"notEquals\"");
    }
}
