//! Configuration error taxonomy shared by every evaluator.

use thiserror::Error;

/// An authored rule, condition, or action list is malformed.
///
/// Configuration errors are fatal for the rule they occur in, are surfaced
/// to the caller immediately, and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The condition references a field missing from the attribute catalog.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// The operator name is not part of the condition grammar.
    #[error("unknown operator '{operator}'")]
    UnknownOperator { operator: String },

    /// The operator exists but is not allowed for the field's declared type.
    #[error("operator '{operator}' is not allowed on {field_type} field '{field}'")]
    OperatorNotAllowed {
        field: String,
        operator: String,
        field_type: String,
    },

    /// The condition's comparison value cannot be coerced to the field type.
    #[error("invalid value for '{field}' {operator}: {reason}")]
    InvalidValue {
        field: String,
        operator: String,
        reason: String,
    },

    /// The action dependency relation contains a cycle.
    #[error("cyclic action dependency: {}", .actions.join(" -> "))]
    CyclicDependency { actions: Vec<String> },

    /// An action depends on an id that is not in the same action list.
    #[error("action '{action}' depends on unknown action '{dependency}'")]
    UnknownDependency { action: String, dependency: String },

    /// Two actions in the same list share an id.
    #[error("duplicate action id '{action}'")]
    DuplicateActionId { action: String },
}
