//! JSON input files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use warden::{RiskWeight, SodRule, Subject};

/// Reads and parses a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Input to `warden sod`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SodInput {
    pub rules: Vec<SodRule>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// Input to `warden score`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInput {
    pub weights: Vec<RiskWeight>,
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
}
