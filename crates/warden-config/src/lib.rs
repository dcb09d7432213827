//! Configuration management for warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Explicit file passed with `--config` (highest file precedence)
//! 2. Environment variables (`WARDEN_<SECTION>__<KEY>`)
//! 3. warden.local.toml (gitignored, local overrides)
//! 4. warden.toml (git-tracked, project config)
//! 5. ~/.config/warden/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main warden configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub executor: ExecutorConfig,
    pub simulation: SimulationConfig,
    pub risk: RiskConfig,
    pub logging: LoggingConfig,
}

/// Retry pacing and branch concurrency for the action executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Cap on any single retry delay.
    pub max_backoff_ms: u64,
    pub parallel_branches: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            parallel_branches: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Worker threads for batch and stress runs; 0 uses available parallelism.
    pub workers: usize,
    pub stress_iterations: u32,
    /// Let draft and test rules match in simulations.
    pub include_unpublished: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            stress_iterations: 100,
            include_unpublished: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Rescale weight vectors that do not sum to 100 instead of rejecting
    /// them.
    pub normalize_weights: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            normalize_weights: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Rejects combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.initial_backoff_ms > self.executor.max_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "executor.initial_backoff_ms ({}) exceeds executor.max_backoff_ms ({})",
                self.executor.initial_backoff_ms, self.executor.max_backoff_ms
            )));
        }
        if self.simulation.stress_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.stress_iterations must be at least 1".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
