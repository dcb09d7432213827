//! One-line status messages.

use super::colors::SemanticStyle;

fn line(marker: String, msg: &str) {
    println!("{marker} {msg}");
}

pub fn print_success(msg: &str) {
    line("✓".success(), msg);
}

/// Written to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {msg}", "✗".error());
}

pub fn print_warn(msg: &str) {
    line("!".warning(), msg);
}

/// `  key: value`, with the key dimmed.
pub fn print_labeled(key: &str, value: &str) {
    println!("  {}: {value}", key.muted());
}

pub fn print_heading(title: &str) {
    println!("{}", title.header());
}
