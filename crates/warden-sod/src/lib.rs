//! # warden-sod: Segregation-of-Duties conflict detection
//!
//! A subject violates an SoD rule when it holds at least one grant from the
//! rule's left set and at least one from its right set, unless the subject is
//! listed as an exception.
//!
//! - [`check`]: one subject, every rule
//! - [`check_grant`]: pre-check a single grant request (block vs detect)
//! - [`check_population`]: many subjects in parallel, with derived totals
//!
//! Violations are findings, not errors: every function here returns data.

pub mod detector;
pub mod rule;

pub use detector::{GrantCheck, Violation, ViolationReport, check, check_grant, check_population};
pub use rule::{Enforcement, Severity, SodRule, SodRuleError, SodRuleType};
