//! Configuration display.

use anyhow::Result;
use clap::ValueEnum;
use warden_config::WardenConfig;

use super::print_json;
use crate::style::{info_table, print_heading};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Format {
    #[default]
    Toml,
    Json,
    Text,
}

/// Prints the effective configuration after all layers are merged.
pub fn show(config: &WardenConfig, format: Format) -> Result<()> {
    match format {
        Format::Toml => print!("{}", config.to_toml()?),
        Format::Json => print_json(config)?,
        Format::Text => {
            print_heading("Effective configuration");
            println!(
                "{}",
                info_table(&[
                    (
                        "executor.initial_backoff_ms",
                        config.executor.initial_backoff_ms.to_string()
                    ),
                    (
                        "executor.max_backoff_ms",
                        config.executor.max_backoff_ms.to_string()
                    ),
                    (
                        "executor.parallel_branches",
                        config.executor.parallel_branches.to_string()
                    ),
                    ("simulation.workers", config.simulation.workers.to_string()),
                    (
                        "simulation.stress_iterations",
                        config.simulation.stress_iterations.to_string()
                    ),
                    (
                        "simulation.include_unpublished",
                        config.simulation.include_unpublished.to_string()
                    ),
                    (
                        "risk.normalize_weights",
                        config.risk.normalize_weights.to_string()
                    ),
                    ("logging.level", config.logging.level.clone()),
                ])
            );
        }
    }
    Ok(())
}
