//! Configuration loader with multi-source merging

use crate::{ConfigError, Paths, WardenConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    explicit_file: Option<PathBuf>,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a loader rooted at the current directory
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARDEN".to_string(),
            explicit_file: None,
            include_user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARDEN")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Layer a specific file above the project files. Unlike the discovered
    /// files, it must exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip ~/.config/warden/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<WardenConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = WardenConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2-4. User, project and local files
        for path in Paths::new(&self.project_dir).layers(self.include_user_config) {
            builder = builder.add_source(
                config::File::from(path)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (WARDEN_EXECUTOR__MAX_BACKOFF_MS, ...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 6. Explicit file
        if let Some(path) = self.explicit_file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path).into());
            }
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        let config = builder.build().context("Failed to build configuration")?;

        let warden_config: WardenConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        warden_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(warden_config)
    }

    /// Load configuration or return defaults if anything goes wrong
    pub fn load_or_default(self) -> WardenConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .without_user_config()
            .with_env_prefix("WARDEN_TEST_UNSET")
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, WardenConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("warden.toml"),
            r#"
[executor]
max_backoff_ms = 5000
parallel_branches = false

[simulation]
workers = 3
"#,
        )
        .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.executor.max_backoff_ms, 5000);
        assert!(!config.executor.parallel_branches);
        assert_eq!(config.executor.initial_backoff_ms, 1_000);
        assert_eq!(config.simulation.workers, 3);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("warden.toml"),
            "[logging]\nlevel = \"info\"\n",
        )
        .expect("Failed to write project config");
        fs::write(
            project_dir.join("warden.local.toml"),
            "[logging]\nlevel = \"warden=debug\"\n",
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.logging.level, "warden=debug");
    }

    #[test]
    fn test_explicit_file_wins() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();
        fs::write(
            project_dir.join("warden.toml"),
            "[risk]\nnormalize_weights = true\n",
        )
        .expect("Failed to write project config");
        let explicit = project_dir.join("strict.toml");
        fs::write(&explicit, "[risk]\nnormalize_weights = false\n")
            .expect("Failed to write explicit config");

        let config = loader(project_dir)
            .with_file(&explicit)
            .load()
            .expect("Failed to load config");

        assert!(!config.risk.normalize_weights);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let result = loader(temp_dir.path())
            .with_file(temp_dir.path().join("absent.toml"))
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("warden.toml"),
            "[simulation]\nstress_iterations = 0\n",
        )
        .expect("Failed to write config");

        let result = loader(temp_dir.path()).load();
        assert!(result.is_err());
        assert!(loader(temp_dir.path()).load_or_default() == WardenConfig::default());
    }
}
