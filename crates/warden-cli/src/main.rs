//! Warden CLI.
//!
//! Offline tooling for identity governance policy: dry-run simulation,
//! policy validation, SoD detection and risk scoring.
//!
//! # Quick Start
//!
//! ```bash
//! # Check a policy before publishing it
//! warden validate demos/policy.json
//!
//! # See what would happen to one subject
//! warden simulate demos/scenario.json --policy demos/policy.json
//!
//! # Run a whole population in parallel
//! warden batch demos/batch.json --policy demos/policy.json
//! ```

mod commands;
mod input;
mod style;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use warden::EngineSettings;
use warden_config::{ConfigLoader, WardenConfig};

use commands::config::Format;

/// Warden - identity lifecycle policy, simulated before it runs.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file layered over the discovered ones.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one scenario against a policy.
    Simulate {
        /// Scenario file (JSON).
        scenario: PathBuf,

        /// Policy snapshot file (JSON).
        #[arg(short, long)]
        policy: PathBuf,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Simulate a list of scenarios in parallel.
    Batch {
        /// File holding a JSON array of scenarios.
        scenarios: PathBuf,

        /// Policy snapshot file (JSON).
        #[arg(short, long)]
        policy: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Repeat one scenario and check the results never vary.
    Stress {
        /// Scenario file (JSON).
        scenario: PathBuf,

        /// Policy snapshot file (JSON).
        #[arg(short, long)]
        policy: PathBuf,

        /// Number of runs (defaults to `simulation.stress_iterations`).
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check a policy snapshot for configuration errors.
    Validate {
        /// Policy snapshot file (JSON).
        policy: PathBuf,

        /// Print the findings as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Detect SoD violations across a population.
    Sod {
        /// File with `rules` and `subjects` (JSON).
        input: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Score a factor map against a weight vector.
    Score {
        /// File with `weights` and `factors` (JSON).
        input: PathBuf,

        /// Print the assessment as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "toml")]
        format: Format,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    let config = load_config(cli.config)?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = EngineSettings::from(&config);
    debug!(?settings, "configuration loaded");

    match cli.command {
        Commands::Simulate {
            scenario,
            policy,
            json,
        } => commands::simulate::run(&scenario, &policy, &settings, json),
        Commands::Batch {
            scenarios,
            policy,
            json,
        } => commands::simulate::batch(&scenarios, &policy, &settings, json),
        Commands::Stress {
            scenario,
            policy,
            iterations,
            json,
        } => commands::simulate::stress(&scenario, &policy, iterations, &settings, json),
        Commands::Validate { policy, json } => commands::validate::run(&policy, json),
        Commands::Sod { input, json } => commands::sod::run(&input, json),
        Commands::Score { input, json } => commands::score::run(&input, &settings, json),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&config, format),
        },
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<WardenConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = explicit {
        loader = loader.with_file(path);
    }
    loader.load().context("Failed to load configuration")
}
