//! Population-wide SoD detection.

use std::path::Path;

use anyhow::Result;
use warden::{Enforcement, Severity, check_population};

use super::print_json;
use crate::input::{SodInput, read_json};
use crate::style::{colors::SemanticStyle, info_table, print_heading, print_success, styled_table};

/// Checks every subject in the file against its SoD rules.
pub fn run(path: &Path, json: bool) -> Result<()> {
    let input: SodInput = read_json(path)?;
    let report = check_population(&input.subjects, &input.rules);

    if json {
        return print_json(&report);
    }

    print_heading("Separation of duties");
    if report.violations.is_empty() {
        print_success(&format!(
            "No violations across {} subjects",
            input.subjects.len()
        ));
        return Ok(());
    }

    let mut table = styled_table(&["Subject", "Rule", "Severity", "Enforcement", "Left", "Right"]);
    for violation in &report.violations {
        table.add_row(vec![
            violation.subject.to_string(),
            violation.rule_name.clone(),
            severity_label(violation.severity),
            match violation.enforcement {
                Enforcement::Block => "block".error(),
                Enforcement::Detect => "detect".muted(),
            },
            join(&violation.left_held),
            join(&violation.right_held),
        ]);
    }
    println!("{table}");

    let mut summary = vec![
        ("Subjects", input.subjects.len().to_string()),
        ("Violations", report.total().to_string()),
        ("Affected subjects", report.affected_subjects().to_string()),
    ];
    let by_severity = report.by_severity();
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        if let Some(count) = by_severity.get(&severity) {
            summary.push((severity_name(severity), count.to_string()));
        }
    }
    println!("{}", info_table(&summary));
    Ok(())
}

fn join<'a>(grants: impl IntoIterator<Item = &'a String>) -> String {
    grants
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

fn severity_label(severity: Severity) -> String {
    let name = severity.to_string();
    match severity {
        Severity::Critical | Severity::High => name.error(),
        Severity::Medium => name.warning(),
        Severity::Low => name.muted(),
    }
}
