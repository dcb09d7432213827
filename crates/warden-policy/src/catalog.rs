//! Typed attribute catalog.
//!
//! Each field a condition may reference is declared with a [`FieldType`].
//! The type decides how values are coerced and which operators are legal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_types::ConfigurationError;

use crate::condition::Operator;

const STRING_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Contains,
    Operator::NotContains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::In,
    Operator::NotIn,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const ENUM_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::GreaterThanOrEqual,
    Operator::LessThan,
    Operator::LessThanOrEqual,
    Operator::Between,
    Operator::In,
    Operator::NotIn,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const DATE_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Before,
    Operator::After,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::Between,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const ARRAY_OPERATORS: &[Operator] = &[
    Operator::Contains,
    Operator::NotContains,
    Operator::ContainsAll,
    Operator::ContainsAny,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

/// Declared type of a catalog field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldType {
    String,
    /// A string restricted to a fixed set of values.
    Enum { values: Vec<String> },
    Number,
    /// `YYYY-MM-DD` or RFC 3339 text.
    Date,
    /// A list of strings such as tags or group names.
    Array,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Enum { .. } => "enum",
            Self::Number => "number",
            Self::Date => "date",
            Self::Array => "array",
        }
    }

    pub fn allowed_operators(&self) -> &'static [Operator] {
        match self {
            Self::String => STRING_OPERATORS,
            Self::Enum { .. } => ENUM_OPERATORS,
            Self::Number => NUMBER_OPERATORS,
            Self::Date => DATE_OPERATORS,
            Self::Array => ARRAY_OPERATORS,
        }
    }

    pub fn allows(&self, operator: &Operator) -> bool {
        self.allowed_operators().contains(operator)
    }
}

/// Field name to declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeCatalog {
    fields: BTreeMap<String, FieldType>,
}

impl AttributeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.insert(name.to_string(), field_type);
        self
    }

    /// The employment profile fields supplied by the attribute source.
    pub fn standard() -> Self {
        let enumeration = |values: &[&str]| FieldType::Enum {
            values: values.iter().map(|v| (*v).to_string()).collect(),
        };

        Self::new()
            .with_field("department", FieldType::String)
            .with_field("title", FieldType::String)
            .with_field("location", FieldType::String)
            .with_field("manager", FieldType::String)
            .with_field("costCenter", FieldType::String)
            .with_field(
                "employmentType",
                enumeration(&["full-time", "part-time", "contractor", "intern"]),
            )
            .with_field(
                "status",
                enumeration(&["active", "inactive", "on-leave", "terminated"]),
            )
            .with_field("tags", FieldType::Array)
            .with_field("groups", FieldType::Array)
            .with_field("startDate", FieldType::Date)
            .with_field("endDate", FieldType::Date)
            .with_field("securityLevel", FieldType::Number)
    }

    /// Looks up a field, failing with [`ConfigurationError::UnknownField`].
    pub fn get(&self, field: &str) -> Result<&FieldType, ConfigurationError> {
        self.fields
            .get(field)
            .ok_or_else(|| ConfigurationError::UnknownField {
                field: field.to_string(),
            })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(FieldType::String, Operator::StartsWith, true)]
    #[test_case(FieldType::String, Operator::GreaterThan, false)]
    #[test_case(FieldType::Number, Operator::Between, true)]
    #[test_case(FieldType::Number, Operator::Contains, false)]
    #[test_case(FieldType::Date, Operator::Before, true)]
    #[test_case(FieldType::Date, Operator::In, false)]
    #[test_case(FieldType::Array, Operator::ContainsAll, true)]
    #[test_case(FieldType::Array, Operator::Equals, false)]
    #[test_case(FieldType::Enum { values: vec![] }, Operator::In, true; "enum in")]
    #[test_case(FieldType::Enum { values: vec![] }, Operator::Contains, false; "enum contains")]
    fn test_operator_matrix(field_type: FieldType, operator: Operator, allowed: bool) {
        assert_eq!(field_type.allows(&operator), allowed);
    }

    #[test]
    fn test_every_type_supports_emptiness_checks() {
        for field_type in [
            FieldType::String,
            FieldType::Number,
            FieldType::Date,
            FieldType::Array,
            FieldType::Enum { values: vec![] },
        ] {
            assert!(field_type.allows(&Operator::IsEmpty));
            assert!(field_type.allows(&Operator::IsNotEmpty));
        }
    }

    #[test]
    fn test_standard_catalog() {
        let catalog = AttributeCatalog::standard();
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.get("department"), Ok(&FieldType::String));
        assert_eq!(catalog.get("startDate"), Ok(&FieldType::Date));
        assert!(matches!(catalog.get("status"), Ok(FieldType::Enum { values }) if values.len() == 4));
    }

    #[test]
    fn test_unknown_field() {
        let catalog = AttributeCatalog::standard();
        assert_eq!(
            catalog.get("shoeSize"),
            Err(ConfigurationError::UnknownField {
                field: "shoeSize".to_string()
            })
        );
    }

    #[test]
    fn test_catalog_deserializes_from_map() {
        let json = r#"{"clearance": {"type": "number"}, "region": {"type": "enum", "values": ["emea"]}}"#;
        let catalog: AttributeCatalog = serde_json::from_str(json).expect("deserialize");
        assert_eq!(catalog.get("clearance"), Ok(&FieldType::Number));
        assert!(catalog.contains("region"));
    }
}
