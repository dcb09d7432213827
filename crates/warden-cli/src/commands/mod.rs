//! CLI command implementations.

pub mod config;
pub mod score;
pub mod simulate;
pub mod sod;
pub mod validate;

use anyhow::Result;
use serde::Serialize;

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
