//! Where configuration files are looked for.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

/// Project-level file, usually committed.
pub const PROJECT_FILE: &str = "warden.toml";

/// Per-checkout override, usually gitignored.
pub const LOCAL_FILE: &str = "warden.local.toml";

const USER_FILE: &str = "config.toml";

/// Discovers the file layers for one project directory.
#[derive(Debug, Clone)]
pub struct Paths {
    project_dir: PathBuf,
}

impl Paths {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
        }
    }

    /// `~/.config/warden/config.toml` on Linux; the platform equivalent
    /// elsewhere.
    pub fn user_config_file() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("org", "Warden", "warden")
            .map(|dirs| dirs.config_dir().join(USER_FILE))
            .ok_or_else(|| ConfigError::XdgError("no home directory for user config".to_string()))
    }

    pub fn project_config_file(&self) -> PathBuf {
        self.project_dir.join(PROJECT_FILE)
    }

    pub fn local_config_file(&self) -> PathBuf {
        self.project_dir.join(LOCAL_FILE)
    }

    /// Existing files, lowest precedence first.
    pub fn layers(&self, include_user: bool) -> Vec<PathBuf> {
        let user = include_user
            .then(|| Self::user_config_file().ok())
            .flatten();

        user.into_iter()
            .chain([self.project_config_file(), self.local_config_file()])
            .filter(|path| path.is_file())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_user_file_is_namespaced() {
        // Absent on some CI sandboxes
        if let Ok(file) = Paths::user_config_file() {
            assert!(file.to_string_lossy().contains("warden"));
            assert!(file.ends_with(USER_FILE));
        }
    }

    #[test]
    fn test_layers_skip_missing_files() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        assert!(paths.layers(false).is_empty());

        fs::write(dir.path().join(LOCAL_FILE), "").unwrap();
        assert_eq!(paths.layers(false), vec![dir.path().join(LOCAL_FILE)]);
    }

    #[test]
    fn test_layers_order_project_before_local() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PROJECT_FILE), "").unwrap();
        fs::write(dir.path().join(LOCAL_FILE), "").unwrap();

        let layers = Paths::new(dir.path()).layers(false);
        assert_eq!(
            layers,
            vec![dir.path().join(PROJECT_FILE), dir.path().join(LOCAL_FILE)]
        );
    }
}
