//! Ad-hoc risk scoring.

use std::path::Path;

use anyhow::{Context, Result};
use warden::{EngineSettings, RiskBand};

use super::print_json;
use crate::input::{ScoreInput, read_json};
use crate::style::{colors::SemanticStyle, print_heading, print_labeled, print_warn, styled_table};

/// Scores one factor map against a weight vector.
pub fn run(path: &Path, settings: &EngineSettings, json: bool) -> Result<()> {
    let input: ScoreInput = read_json(path)?;
    let assessment = settings
        .scorer()
        .score(&input.factors, &input.weights)
        .context("Failed to score risk")?;

    if json {
        return print_json(&assessment);
    }

    print_heading("Risk assessment");
    if assessment.normalized {
        print_warn(&format!(
            "weights sum to {}; rescaled to 100",
            assessment.weight_total
        ));
    }

    let mut table = styled_table(&["Factor", "Weight", "Value", "Points"]);
    for contribution in &assessment.contributions {
        table.add_row(vec![
            contribution.label.clone(),
            format!("{:.1}", contribution.weight),
            format!("{:.2}", contribution.factor),
            format!("{:.1}", contribution.points),
        ]);
    }
    println!("{table}");

    let band = assessment.band.to_string();
    let band = match assessment.band {
        RiskBand::Low => band.success(),
        RiskBand::Medium => band.warning(),
        RiskBand::High | RiskBand::Critical => band.error(),
    };
    print_labeled("Score", &assessment.score.to_string());
    print_labeled("Band", &band);
    Ok(())
}
