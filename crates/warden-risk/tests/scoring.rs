use std::collections::BTreeMap;

use proptest::prelude::*;
use warden_risk::{RiskBand, RiskScorer, RiskWeight, score};

const LABELS: [&str; 5] = ["privileged", "dormant", "sod", "external", "orphaned"];

fn standard_weights() -> Vec<RiskWeight> {
    LABELS
        .iter()
        .zip([30.0, 25.0, 20.0, 15.0, 10.0])
        .map(|(label, value)| RiskWeight::new(label, value))
        .collect()
}

fn factor_map(values: &[f64]) -> BTreeMap<String, f64> {
    LABELS
        .iter()
        .zip(values)
        .map(|(label, value)| ((*label).to_string(), *value))
        .collect()
}

#[test]
fn single_top_factor_scores_its_weight() {
    let assessment = RiskScorer::default()
        .score(&factor_map(&[1.0, 0.0, 0.0, 0.0, 0.0]), &standard_weights())
        .expect("valid weights");

    assert_eq!(assessment.score, 30);
    assert_eq!(assessment.band, RiskBand::Medium);
    assert!(!assessment.normalized);
}

#[test]
fn assessment_serializes_for_reports() {
    let assessment = RiskScorer::default()
        .score(&factor_map(&[1.0, 0.0, 1.0, 0.0, 0.0]), &standard_weights())
        .expect("valid weights");

    let json = serde_json::to_value(&assessment).expect("serialize");
    assert_eq!(json["score"], 50);
    assert_eq!(json["band"], "high");
    assert_eq!(json["normalized"], false);
    assert_eq!(json["weightTotal"], 100.0);
    assert_eq!(json["contributions"].as_array().expect("array").len(), 5);
}

proptest! {
    #[test]
    fn prop_score_is_monotonic(
        values in proptest::collection::vec(0.0f64..=1.0, 5),
        weights in proptest::collection::vec(0.0f64..=100.0, 5),
        index in 0usize..5,
        bump in 0.0f64..=1.0,
    ) {
        let weights: Vec<RiskWeight> = LABELS
            .iter()
            .zip(&weights)
            .map(|(label, value)| RiskWeight::new(label, *value))
            .collect();
        let before = score(&factor_map(&values), &weights).expect("valid weights");

        let mut raised = values.clone();
        raised[index] = (raised[index] + bump).min(1.0);
        let after = score(&factor_map(&raised), &weights).expect("valid weights");

        prop_assert!(after >= before);
    }

    #[test]
    fn prop_score_stays_in_range(
        values in proptest::collection::vec(-2.0f64..3.0, 5),
        weights in proptest::collection::vec(0.0f64..=100.0, 5),
    ) {
        let weights: Vec<RiskWeight> = LABELS
            .iter()
            .zip(&weights)
            .map(|(label, value)| RiskWeight::new(label, *value))
            .collect();
        let result = score(&factor_map(&values), &weights).expect("valid weights");
        prop_assert!(result <= 100);
    }
}
