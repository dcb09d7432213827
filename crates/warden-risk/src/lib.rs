//! # warden-risk: Risk scoring aggregator
//!
//! Combines normalized risk factors (`0.0..=1.0`, keyed by weight label)
//! with a weight vector into a score from 0 to 100 and a fixed risk band.
//!
//! Weight vectors are expected to sum to 100. By default a vector that does
//! not is rescaled (each weight divided by the total and multiplied by 100);
//! a strict scorer rejects it instead.
//!
//! ```
//! use std::collections::BTreeMap;
//! use warden_risk::{RiskBand, RiskWeight, score, RiskScorer};
//!
//! let weights = vec![
//!     RiskWeight::new("privileged", 30.0),
//!     RiskWeight::new("dormant", 25.0),
//!     RiskWeight::new("sod", 20.0),
//!     RiskWeight::new("external", 15.0),
//!     RiskWeight::new("orphaned", 10.0),
//! ];
//! let factors = BTreeMap::from([("privileged".to_string(), 1.0)]);
//!
//! let assessment = RiskScorer::default().score(&factors, &weights).unwrap();
//! assert_eq!(assessment.score, 30);
//! assert_eq!(assessment.band, RiskBand::Medium);
//! assert_eq!(score(&factors, &weights).unwrap(), 30);
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const TOLERANCE: f64 = 1e-9;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Strict scoring only: the vector does not sum to 100.
    #[error("risk weights sum to {total}, expected 100")]
    WeightsDoNotSumTo100 { total: f64 },

    /// A weight is negative, above 100, or not a finite number.
    #[error("risk weight '{label}' has invalid value {value}")]
    InvalidWeight { label: String, value: f64 },
}

pub type Result<T> = std::result::Result<T, RiskError>;

// ============================================================================
// Weights and Bands
// ============================================================================

/// One entry of a weight vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskWeight {
    /// Factor name this weight applies to.
    pub label: String,
    /// Share of the score, 0 to 100.
    pub value: f64,
    #[serde(default)]
    pub description: String,
}

impl RiskWeight {
    pub fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Fixed partition of the 0-100 score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    /// 0-24
    Low,
    /// 25-49
    Medium,
    /// 50-74
    High,
    /// 75-100
    Critical,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => Self::Low,
            25..=49 => Self::Medium,
            50..=74 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// How much one factor added to the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub label: String,
    /// Weight after normalization.
    pub weight: f64,
    /// Factor value after clamping to `0.0..=1.0`.
    pub factor: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: u8,
    pub band: RiskBand,
    /// Whether the weights had to be rescaled to sum to 100.
    pub normalized: bool,
    /// Sum of the weights as supplied.
    pub weight_total: f64,
    pub contributions: Vec<Contribution>,
}

/// Scores factor maps against a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskScorer {
    normalize: bool,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self { normalize: true }
    }
}

impl RiskScorer {
    /// A scorer that rejects vectors not summing to 100.
    pub fn strict() -> Self {
        Self { normalize: false }
    }

    pub fn with_normalization(normalize: bool) -> Self {
        Self { normalize }
    }

    /// Scores `factors` against `weights`.
    ///
    /// Missing factors count as 0 and factor values are clamped to
    /// `0.0..=1.0`. A vector whose weights are all zero scores 0.
    pub fn score(
        &self,
        factors: &BTreeMap<String, f64>,
        weights: &[RiskWeight],
    ) -> Result<RiskAssessment> {
        for weight in weights {
            if !weight.value.is_finite() || !(0.0..=100.0).contains(&weight.value) {
                return Err(RiskError::InvalidWeight {
                    label: weight.label.clone(),
                    value: weight.value,
                });
            }
        }

        let total: f64 = weights.iter().map(|w| w.value).sum();
        let off_target = (total - 100.0).abs() > TOLERANCE;
        if off_target && !self.normalize {
            return Err(RiskError::WeightsDoNotSumTo100 { total });
        }

        let scale = if total > 0.0 { 100.0 / total } else { 0.0 };
        let contributions: Vec<Contribution> = weights
            .iter()
            .map(|weight| {
                let factor = factors
                    .get(&weight.label)
                    .copied()
                    .filter(|f| f.is_finite())
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                let normalized = weight.value * scale;
                Contribution {
                    label: weight.label.clone(),
                    weight: normalized,
                    factor,
                    points: normalized * factor,
                }
            })
            .collect();

        let raw: f64 = contributions.iter().map(|c| c.points).sum();
        let score = raw.round().clamp(0.0, 100.0) as u8;
        let band = RiskBand::from_score(score);

        debug!(score, band = %band, weight_total = total, normalized = off_target, "risk scored");

        Ok(RiskAssessment {
            score,
            band,
            normalized: off_target,
            weight_total: total,
            contributions,
        })
    }
}

/// Scores with normalization, returning only the number.
pub fn score(factors: &BTreeMap<String, f64>, weights: &[RiskWeight]) -> Result<u8> {
    RiskScorer::default()
        .score(factors, weights)
        .map(|assessment| assessment.score)
}

// ============================================================================
// Tests
// ============================================================================
