//! # warden-policy: Condition evaluation and rule resolution
//!
//! Decides which lifecycle rule applies to a subject.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Subject attributes (AttributeMap)    │
//! └──────────────────┬───────────────────┘
//!                    │
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │  RuleResolver                         │
//! │  ├─ filter by status (visibility)     │
//! │  ├─ stable sort by priority           │
//! │  └─ first match (or all matches)      │
//! └──────────────────┬───────────────────┘
//!                    │ per rule
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │  ConditionEvaluator                   │
//! │  ├─ validate tree against catalog     │
//! │  └─ fold groups, coerce by field type │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use warden_policy::{Condition, ConditionGroup, Operator, Rule, RuleResolver};
//! use warden_types::Subject;
//!
//! let rules = vec![
//!     Rule::new("everyone", 2),
//!     Rule::new("engineering", 1).with_conditions(
//!         ConditionGroup::all()
//!             .with_condition(Condition::new("department", Operator::Equals, "Engineering")),
//!     ),
//! ];
//!
//! let subject = Subject::new("u-1").with_attribute("department", "engineering");
//! let resolution = RuleResolver::default().resolve(&rules, &subject.attributes);
//!
//! assert_eq!(resolution.first().unwrap().id.as_str(), "engineering");
//! ```

pub mod catalog;
pub mod condition;
pub mod evaluator;
pub mod resolver;
pub mod rule;

pub use catalog::{AttributeCatalog, FieldType};
pub use condition::{Condition, ConditionGroup, LogicalOperator, Operator};
pub use evaluator::{ConditionEvaluator, parse_date};
pub use resolver::{Resolution, RuleError, RuleResolver, Visibility};
pub use rule::{Rule, RuleSet, RuleSetIssue, RuleStatus};
