//! Condition evaluation engine.
//!
//! Evaluates a [`ConditionGroup`] tree against one subject's attribute map.
//! The whole tree is validated against the catalog before any condition is
//! evaluated, so short-circuiting can never hide a malformed condition.
//!
//! # Absent attributes
//!
//! A field missing from the subject (or explicitly `null`) satisfies only
//! `isEmpty`, `notEquals` and `notContains`. Every other operator yields
//! `false`. `negate` is applied afterwards.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use warden_types::{AttributeMap, AttributeValue, ConfigurationError};

use crate::catalog::{AttributeCatalog, FieldType};
use crate::condition::{Condition, ConditionGroup, LogicalOperator, Operator};

// ============================================================================
// Operands
// ============================================================================

/// A condition's comparison value, coerced to the field's type.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    None,
    Text(String),
    TextList(Vec<String>),
    Number(f64),
    NumberList(Vec<f64>),
    NumberRange(f64, f64),
    Date(NaiveDateTime),
    DateRange(NaiveDateTime, NaiveDateTime),
}

/// Parses `YYYY-MM-DD` (as midnight) or an RFC 3339 timestamp (as UTC).
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluates conditions against a typed attribute catalog.
///
/// The default evaluator uses [`AttributeCatalog::standard`].
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    catalog: AttributeCatalog,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConditionEvaluator {
    pub fn new(catalog: AttributeCatalog) -> Self {
        Self { catalog }
    }

    /// An evaluator over [`AttributeCatalog::standard`].
    pub fn standard() -> Self {
        Self::new(AttributeCatalog::standard())
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// Checks every condition in the tree without evaluating anything.
    pub fn validate(&self, group: &ConditionGroup) -> Result<(), ConfigurationError> {
        for condition in group.walk() {
            self.compile(condition)?;
        }
        Ok(())
    }

    /// Evaluates a group against a subject's attributes.
    ///
    /// An empty group is vacuously true. A malformed condition anywhere in
    /// the tree is an error, even if evaluation would not reach it.
    pub fn evaluate(
        &self,
        group: &ConditionGroup,
        attributes: &AttributeMap,
    ) -> Result<bool, ConfigurationError> {
        self.validate(group)?;
        self.evaluate_group(group, attributes)
    }

    /// Evaluates a single condition, `negate` included.
    pub fn evaluate_condition(
        &self,
        condition: &Condition,
        attributes: &AttributeMap,
    ) -> Result<bool, ConfigurationError> {
        let (field_type, operand) = self.compile(condition)?;

        let matched = match attributes.get(&condition.field).filter(|v| !v.is_null()) {
            None => matches!(
                condition.operator,
                Operator::IsEmpty | Operator::NotEquals | Operator::NotContains
            ),
            Some(value) => match condition.operator {
                Operator::IsEmpty => value.is_empty(),
                Operator::IsNotEmpty => !value.is_empty(),
                _ => compare(
                    field_type,
                    &condition.operator,
                    &operand,
                    value,
                    condition.case_sensitive,
                ),
            },
        };

        Ok(matched != condition.negate)
    }

    fn evaluate_group(
        &self,
        group: &ConditionGroup,
        attributes: &AttributeMap,
    ) -> Result<bool, ConfigurationError> {
        if group.is_empty() {
            return Ok(true);
        }

        // AND stops at the first false entry, OR at the first true one.
        let stop_on = group.logical_operator == LogicalOperator::Or;
        for condition in &group.conditions {
            if self.evaluate_condition(condition, attributes)? == stop_on {
                return Ok(stop_on);
            }
        }
        for nested in &group.groups {
            if self.evaluate_group(nested, attributes)? == stop_on {
                return Ok(stop_on);
            }
        }
        Ok(!stop_on)
    }

    /// Resolves the field type and coerces the comparison value.
    fn compile<'c>(
        &'c self,
        condition: &Condition,
    ) -> Result<(&'c FieldType, Operand), ConfigurationError> {
        if let Operator::Unknown(name) = &condition.operator {
            return Err(ConfigurationError::UnknownOperator {
                operator: name.clone(),
            });
        }

        let field_type = self.catalog.get(&condition.field)?;
        if !field_type.allows(&condition.operator) {
            return Err(ConfigurationError::OperatorNotAllowed {
                field: condition.field.clone(),
                operator: condition.operator.to_string(),
                field_type: field_type.name().to_string(),
            });
        }
        if condition.operator.is_unary() {
            return Ok((field_type, Operand::None));
        }

        let invalid = |reason: String| ConfigurationError::InvalidValue {
            field: condition.field.clone(),
            operator: condition.operator.to_string(),
            reason,
        };
        let value = &condition.value;

        let operand = match field_type {
            FieldType::String | FieldType::Array => match condition.operator {
                Operator::In | Operator::NotIn | Operator::ContainsAll | Operator::ContainsAny => {
                    Operand::TextList(text_list(value).map_err(invalid)?)
                }
                _ => Operand::Text(text(value).map_err(invalid)?),
            },
            FieldType::Enum { values } => {
                let candidates = match condition.operator {
                    Operator::In | Operator::NotIn => text_list(value).map_err(invalid)?,
                    _ => vec![text(value).map_err(invalid)?],
                };
                for candidate in &candidates {
                    let folded = fold(candidate, condition.case_sensitive);
                    if !values
                        .iter()
                        .any(|v| fold(v, condition.case_sensitive) == folded)
                    {
                        return Err(invalid(format!(
                            "'{candidate}' is not one of [{}]",
                            values.join(", ")
                        )));
                    }
                }
                match condition.operator {
                    Operator::In | Operator::NotIn => Operand::TextList(candidates),
                    _ => Operand::Text(candidates.into_iter().next().unwrap_or_default()),
                }
            }
            FieldType::Number => match condition.operator {
                Operator::Between => {
                    let (low, high) = pair(value, AttributeValue::as_number).map_err(invalid)?;
                    if low > high {
                        return Err(invalid(format!("range {low}..{high} is empty")));
                    }
                    Operand::NumberRange(low, high)
                }
                Operator::In | Operator::NotIn => Operand::NumberList(
                    value
                        .as_list()
                        .iter()
                        .map(|item| {
                            item.as_number()
                                .ok_or_else(|| format!("'{item}' is not a number"))
                        })
                        .collect::<Result<_, _>>()
                        .map_err(invalid)?,
                ),
                _ => Operand::Number(
                    value
                        .as_number()
                        .ok_or_else(|| invalid(format!("'{value}' is not a number")))?,
                ),
            },
            FieldType::Date => {
                let as_date = |item: &AttributeValue| item.as_text().and_then(|t| parse_date(&t));
                match condition.operator {
                    Operator::Between => {
                        let (low, high) = pair(value, as_date).map_err(invalid)?;
                        if low > high {
                            return Err(invalid(format!("range {low}..{high} is empty")));
                        }
                        Operand::DateRange(low, high)
                    }
                    _ => Operand::Date(
                        as_date(value).ok_or_else(|| invalid(format!("'{value}' is not a date")))?,
                    ),
                }
            }
        };

        Ok((field_type, operand))
    }
}

fn text(value: &AttributeValue) -> Result<String, String> {
    match value {
        AttributeValue::List(_) | AttributeValue::Null => {
            Err(format!("expected a single value, got {}", value.kind()))
        }
        scalar => scalar
            .as_text()
            .ok_or_else(|| format!("expected text, got {}", scalar.kind())),
    }
}

fn text_list(value: &AttributeValue) -> Result<Vec<String>, String> {
    value.as_list().iter().map(text).collect()
}

fn pair<T>(
    value: &AttributeValue,
    coerce: impl Fn(&AttributeValue) -> Option<T>,
) -> Result<(T, T), String> {
    let items = value.as_list();
    let [low, high] = items.as_slice() else {
        return Err(format!("expected [low, high], got {value}"));
    };
    match (coerce(low), coerce(high)) {
        (Some(low), Some(high)) => Ok((low, high)),
        _ => Err(format!("bounds of {value} have the wrong type")),
    }
}

/// Applies a binary operator to a present subject value. Values that cannot
/// be coerced to the field type never match.
fn compare(
    field_type: &FieldType,
    operator: &Operator,
    operand: &Operand,
    value: &AttributeValue,
    case_sensitive: bool,
) -> bool {
    match field_type {
        FieldType::String | FieldType::Enum { .. } => {
            let Some(subject) = value.as_text().map(|t| fold(&t, case_sensitive)) else {
                return false;
            };
            match (operator, operand) {
                (Operator::Equals, Operand::Text(v)) => subject == fold(v, case_sensitive),
                (Operator::NotEquals, Operand::Text(v)) => subject != fold(v, case_sensitive),
                (Operator::Contains, Operand::Text(v)) => subject.contains(&fold(v, case_sensitive)),
                (Operator::NotContains, Operand::Text(v)) => {
                    !subject.contains(&fold(v, case_sensitive))
                }
                (Operator::StartsWith, Operand::Text(v)) => {
                    subject.starts_with(&fold(v, case_sensitive))
                }
                (Operator::EndsWith, Operand::Text(v)) => subject.ends_with(&fold(v, case_sensitive)),
                (Operator::In, Operand::TextList(vs)) => {
                    vs.iter().any(|v| fold(v, case_sensitive) == subject)
                }
                (Operator::NotIn, Operand::TextList(vs)) => {
                    !vs.iter().any(|v| fold(v, case_sensitive) == subject)
                }
                _ => false,
            }
        }
        FieldType::Number => {
            let Some(subject) = value.as_number() else {
                return false;
            };
            match (operator, operand) {
                (Operator::Equals, Operand::Number(v)) => subject == *v,
                (Operator::NotEquals, Operand::Number(v)) => subject != *v,
                (Operator::GreaterThan, Operand::Number(v)) => subject > *v,
                (Operator::GreaterThanOrEqual, Operand::Number(v)) => subject >= *v,
                (Operator::LessThan, Operand::Number(v)) => subject < *v,
                (Operator::LessThanOrEqual, Operand::Number(v)) => subject <= *v,
                (Operator::Between, Operand::NumberRange(low, high)) => {
                    *low <= subject && subject <= *high
                }
                (Operator::In, Operand::NumberList(vs)) => vs.contains(&subject),
                (Operator::NotIn, Operand::NumberList(vs)) => !vs.contains(&subject),
                _ => false,
            }
        }
        FieldType::Date => {
            let Some(subject) = value.as_text().and_then(|t| parse_date(&t)) else {
                return false;
            };
            match (operator, operand) {
                (Operator::Equals, Operand::Date(v)) => subject == *v,
                (Operator::NotEquals, Operand::Date(v)) => subject != *v,
                (Operator::Before | Operator::LessThan, Operand::Date(v)) => subject < *v,
                (Operator::After | Operator::GreaterThan, Operand::Date(v)) => subject > *v,
                (Operator::Between, Operand::DateRange(low, high)) => {
                    *low <= subject && subject <= *high
                }
                _ => false,
            }
        }
        FieldType::Array => {
            let items: Vec<String> = value
                .as_list()
                .iter()
                .filter_map(AttributeValue::as_text)
                .map(|t| fold(&t, case_sensitive))
                .collect();
            let has = |v: &String| items.contains(&fold(v, case_sensitive));
            match (operator, operand) {
                (Operator::Contains, Operand::Text(v)) => has(v),
                (Operator::NotContains, Operand::Text(v)) => !has(v),
                (Operator::ContainsAll, Operand::TextList(vs)) => vs.iter().all(has),
                (Operator::ContainsAny, Operand::TextList(vs)) => vs.iter().any(has),
                _ => false,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use warden_types::Subject;

    fn alice() -> AttributeMap {
        Subject::new("alice")
            .with_attribute("department", "Engineering")
            .with_attribute("title", "Senior Engineer")
            .with_attribute("employmentType", "full-time")
            .with_attribute("securityLevel", 3_i64)
            .with_attribute("startDate", "2023-06-01")
            .with_attribute("tags", vec!["remote", "oncall"])
            .attributes
    }

    fn eval(condition: Condition) -> Result<bool, ConfigurationError> {
        ConditionEvaluator::standard().evaluate_condition(&condition, &alice())
    }

    #[test_case(Condition::new("department", Operator::Equals, "engineering"), true; "equals ignores case")]
    #[test_case(Condition::new("department", Operator::Equals, "engineering").case_sensitive(), false; "case sensitive equals")]
    #[test_case(Condition::new("department", Operator::NotEquals, "Sales"), true; "not equals")]
    #[test_case(Condition::new("title", Operator::Contains, "engineer"), true; "contains")]
    #[test_case(Condition::new("title", Operator::NotContains, "manager"), true; "not contains")]
    #[test_case(Condition::new("title", Operator::StartsWith, "senior"), true; "starts with")]
    #[test_case(Condition::new("title", Operator::EndsWith, "lead"), false; "ends with")]
    #[test_case(Condition::new("department", Operator::In, vec!["Sales", "Engineering"]), true; "in")]
    #[test_case(Condition::new("department", Operator::NotIn, vec!["Sales"]), true; "not in")]
    #[test_case(Condition::new("employmentType", Operator::Equals, "FULL-TIME"), true; "enum equals")]
    #[test_case(Condition::new("securityLevel", Operator::GreaterThan, 2_i64), true; "greater than")]
    #[test_case(Condition::new("securityLevel", Operator::GreaterThanOrEqual, "3"), true; "numeric text operand")]
    #[test_case(Condition::new("securityLevel", Operator::LessThan, 3_i64), false; "less than")]
    #[test_case(Condition::new("securityLevel", Operator::Between, vec![1_i64, 3]), true; "between inclusive")]
    #[test_case(Condition::new("startDate", Operator::Before, "2024-01-01"), true; "before")]
    #[test_case(Condition::new("startDate", Operator::After, "2023-06-01T00:00:00Z"), false; "after is strict")]
    #[test_case(Condition::new("startDate", Operator::Between, vec!["2023-01-01", "2023-12-31"]), true; "date between")]
    #[test_case(Condition::new("tags", Operator::Contains, "REMOTE"), true; "array contains")]
    #[test_case(Condition::new("tags", Operator::ContainsAll, vec!["remote", "oncall"]), true; "contains all")]
    #[test_case(Condition::new("tags", Operator::ContainsAll, Vec::<String>::new()), true; "contains all of nothing")]
    #[test_case(Condition::new("tags", Operator::ContainsAny, vec!["vip", "oncall"]), true; "contains any")]
    #[test_case(Condition::new("tags", Operator::ContainsAny, Vec::<String>::new()), false; "contains any of nothing")]
    #[test_case(Condition::unary("tags", Operator::IsNotEmpty), true; "is not empty")]
    fn test_operators(condition: Condition, expected: bool) {
        assert_eq!(eval(condition), Ok(expected));
    }

    #[test_case(Operator::IsEmpty, true)]
    #[test_case(Operator::NotEquals, true)]
    #[test_case(Operator::NotContains, true)]
    #[test_case(Operator::Equals, false)]
    #[test_case(Operator::Contains, false)]
    #[test_case(Operator::StartsWith, false)]
    #[test_case(Operator::IsNotEmpty, false)]
    fn test_absent_field(operator: Operator, expected: bool) {
        let condition = if operator.is_unary() {
            Condition::unary("location", operator)
        } else {
            Condition::new("location", operator, "Berlin")
        };
        assert_eq!(eval(condition.clone()), Ok(expected));
        assert_eq!(eval(condition.negated()), Ok(!expected));
    }

    #[test]
    fn test_uncoercible_subject_value_never_matches() {
        let attributes = Subject::new("bob")
            .with_attribute("securityLevel", "high")
            .with_attribute("startDate", "last spring")
            .attributes;
        let evaluator = ConditionEvaluator::standard();

        for condition in [
            Condition::new("securityLevel", Operator::GreaterThan, 0_i64),
            Condition::new("securityLevel", Operator::NotEquals, 1_i64),
            Condition::new("startDate", Operator::Before, "2030-01-01"),
        ] {
            assert_eq!(evaluator.evaluate_condition(&condition, &attributes), Ok(false));
        }
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let err = eval(Condition::new("shoeSize", Operator::Equals, "44")).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownField { .. }));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let condition = Condition::new("department", Operator::Unknown("like".into()), "Eng%");
        assert_eq!(
            eval(condition),
            Err(ConfigurationError::UnknownOperator {
                operator: "like".to_string()
            })
        );
    }

    #[test]
    fn test_operator_not_allowed_for_type() {
        let err = eval(Condition::new("department", Operator::GreaterThan, "A")).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::OperatorNotAllowed {
                field: "department".to_string(),
                operator: "greaterThan".to_string(),
                field_type: "string".to_string(),
            }
        );
    }

    #[test_case(Condition::new("securityLevel", Operator::Equals, "three"); "number")]
    #[test_case(Condition::new("securityLevel", Operator::Between, vec![5_i64, 1]); "inverted range")]
    #[test_case(Condition::new("securityLevel", Operator::Between, 3_i64); "range needs two bounds")]
    #[test_case(Condition::new("startDate", Operator::Before, "soon"); "date")]
    #[test_case(Condition::new("employmentType", Operator::Equals, "volunteer"); "enum member")]
    #[test_case(Condition::new("department", Operator::Equals, AttributeValue::Null); "missing value")]
    fn test_invalid_operand(condition: Condition) {
        assert!(matches!(
            eval(condition),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_nested_groups_own_their_operator() {
        // department = Sales OR (securityLevel > 2 AND tags contains remote)
        let group = ConditionGroup::any()
            .with_condition(Condition::new("department", Operator::Equals, "Sales"))
            .with_group(
                ConditionGroup::all()
                    .with_condition(Condition::new("securityLevel", Operator::GreaterThan, 2_i64))
                    .with_condition(Condition::new("tags", Operator::Contains, "remote")),
            );
        let evaluator = ConditionEvaluator::standard();
        assert_eq!(evaluator.evaluate(&group, &alice()), Ok(true));

        let strict = ConditionGroup::all()
            .with_condition(Condition::new("department", Operator::Equals, "Sales"))
            .with_group(ConditionGroup::any());
        assert_eq!(evaluator.evaluate(&strict, &alice()), Ok(false));
    }

    #[test]
    fn test_validation_is_not_short_circuited() {
        let group = ConditionGroup::any()
            .with_condition(Condition::new("department", Operator::Equals, "Engineering"))
            .with_condition(Condition::new("shoeSize", Operator::Equals, "44"));
        let err = ConditionEvaluator::standard()
            .evaluate(&group, &alice())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownField { .. }));
    }

    #[test]
    fn test_empty_group_matches() {
        let evaluator = ConditionEvaluator::standard();
        assert_eq!(evaluator.evaluate(&ConditionGroup::all(), &AttributeMap::new()), Ok(true));
        assert_eq!(evaluator.evaluate(&ConditionGroup::any(), &alice()), Ok(true));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T10:00:00+02:00").is_some());
        assert!(parse_date("03/01/2024").is_none());
    }
}
