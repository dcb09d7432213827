//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to render configuration as TOML: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}
