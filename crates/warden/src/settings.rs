//! Runtime settings derived from [`WardenConfig`].

use std::time::Duration;

use warden_actions::ExecutorSettings;
use warden_config::WardenConfig;
use warden_risk::RiskScorer;
use warden_sim::SimulatorSettings;

/// Everything the engine and harness need from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub executor: ExecutorSettings,
    pub simulator: SimulatorSettings,
    pub normalize_weights: bool,
    pub stress_iterations: u32,
}

impl EngineSettings {
    pub fn scorer(&self) -> RiskScorer {
        RiskScorer::with_normalization(self.normalize_weights)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&WardenConfig::default())
    }
}

impl From<&WardenConfig> for EngineSettings {
    fn from(config: &WardenConfig) -> Self {
        let executor = ExecutorSettings {
            initial_backoff: Duration::from_millis(config.executor.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.executor.max_backoff_ms),
            parallel_branches: config.executor.parallel_branches,
        };
        Self {
            executor,
            simulator: SimulatorSettings {
                workers: config.simulation.workers,
                include_unpublished: config.simulation.include_unpublished,
                normalize_weights: config.risk.normalize_weights,
                executor,
            },
            normalize_weights: config.risk.normalize_weights,
            stress_iterations: config.simulation.stress_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.executor, ExecutorSettings::default());
        assert_eq!(settings.simulator, SimulatorSettings::default());
        assert_eq!(settings.stress_iterations, 100);
    }

    #[test]
    fn test_config_flows_through() {
        let mut config = WardenConfig::default();
        config.executor.initial_backoff_ms = 10;
        config.simulation.workers = 2;
        config.risk.normalize_weights = false;

        let settings = EngineSettings::from(&config);

        assert_eq!(settings.executor.initial_backoff, Duration::from_millis(10));
        assert_eq!(settings.simulator.executor.initial_backoff, Duration::from_millis(10));
        assert_eq!(settings.simulator.workers, 2);
        assert!(!settings.simulator.normalize_weights);
        assert_eq!(settings.scorer(), RiskScorer::strict());
    }
}
