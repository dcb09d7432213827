//! Terminal output: status colors, message lines and tables.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod colors;
pub mod output;
pub mod table;

pub use output::*;
pub use table::*;

static PLAIN: AtomicBool = AtomicBool::new(false);

/// Disables color for the rest of the process. The `NO_COLOR` environment
/// variable has the same effect.
pub fn set_no_color(value: bool) {
    let env = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    PLAIN.store(value || env, Ordering::Relaxed);
}

pub fn no_color() -> bool {
    PLAIN.load(Ordering::Relaxed)
}
