//! # warden-types: Core types for `warden`
//!
//! This crate contains shared types used across the `warden` engine:
//! - Entity IDs ([`SubjectId`], [`RuleId`], [`ActionId`], [`SodRuleId`])
//! - Attribute values ([`AttributeValue`], [`AttributeMap`])
//! - Subject snapshots ([`Subject`])
//! - Configuration errors ([`ConfigurationError`])
//!
//! Every type here is plain data. Evaluators receive immutable snapshots of
//! these values for the duration of one call and never hold on to them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

mod error;

pub use error::ConfigurationError;

// ============================================================================
// Entity IDs
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of the person/identity being evaluated.
    SubjectId
);

string_id!(
    /// Identifier of a lifecycle rule.
    RuleId
);

string_id!(
    /// Identifier of an action, unique within one rule's action list.
    ActionId
);

string_id!(
    /// Identifier of a Segregation-of-Duties rule.
    SodRuleId
);

// ============================================================================
// Attribute Values
// ============================================================================

/// A single attribute value as supplied by the attribute source or authored
/// in a condition.
///
/// Values are loosely typed on the wire; the attribute catalog decides how a
/// value is coerced when a condition is evaluated. Dates travel as text
/// (`2024-03-01` or RFC 3339).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Explicit absence of a value.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Returns `true` for `Null`, blank text, and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders scalar values as text. Lists and `Null` have no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::List(_) => None,
        }
    }

    /// Coerces to a number. Numeric text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Self::Null | Self::Bool(_) | Self::List(_) => None,
        }
    }

    /// Views the value as a list. A scalar becomes a one-element list and
    /// `Null` becomes an empty one.
    pub fn as_list(&self) -> Vec<AttributeValue> {
        match self {
            Self::List(items) => items.clone(),
            Self::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            scalar => f.write_str(&scalar.as_text().unwrap_or_default()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A subject's profile attributes keyed by catalog field name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

// ============================================================================
// Subject
// ============================================================================

/// Immutable snapshot of one subject: profile attributes, currently held
/// grants (role/entitlement identifiers), and normalized risk factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default)]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub grants: BTreeSet<String>,
    /// Factor name to a value in `0.0..=1.0`.
    #[serde(default)]
    pub risk_factors: BTreeMap<String, f64>,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>) -> Self {
        Self {
            id: id.into(),
            attributes: AttributeMap::new(),
            grants: BTreeSet::new(),
            risk_factors: BTreeMap::new(),
        }
    }

    /// Sets a profile attribute.
    pub fn with_attribute(mut self, field: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    /// Adds a held role or entitlement.
    pub fn with_grant(mut self, grant: &str) -> Self {
        self.grants.insert(grant.to_string());
        self
    }

    /// Sets a normalized risk factor value.
    pub fn with_risk_factor(mut self, factor: &str, value: f64) -> Self {
        self.risk_factors.insert(factor.to_string(), value);
        self
    }

    pub fn attribute(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes.get(field)
    }
}

// ============================================================================
// Tests
// ============================================================================
