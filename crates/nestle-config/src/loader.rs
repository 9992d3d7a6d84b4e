//! Configuration Loader
//!
//! Finds nestle.toml and applies environment overrides.

use crate::project::ProjectConfig;
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding `[build] work-dir`.
pub const WORK_DIR_ENV: &str = "NESTLE_WORK_DIR";

/// Configuration loader
///
/// Loads the project declaration and merges it with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Project config (./nestle.toml) - overrides defaults
/// 3. Environment variables (NESTLE_*) - overrides project
#[derive(Debug, Default)]
pub struct ConfigLoader;

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Project root directory (where nestle.toml was found)
    pub project_root: PathBuf,

    /// Working directory after environment overrides
    pub work_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find nestle.toml. Unlike optional
    /// tool settings, a build cannot proceed without a declaration, so a
    /// missing file is an error.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return self.load_from_file(&config_path);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(ConfigError::NotFound(start_dir.join(CONFIG_FILE_NAME))),
            }
        }
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        let project_root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let work_dir = self.apply_env_overrides(project.work_dir());

        Ok(Config {
            project,
            project_root,
            work_dir,
        })
    }

    /// Apply environment variable overrides
    ///
    /// Currently only NESTLE_WORK_DIR is recognized.
    fn apply_env_overrides(&self, work_dir: PathBuf) -> PathBuf {
        match env::var(WORK_DIR_ENV) {
            Ok(value) if !value.is_empty() => PathBuf::from(value),
            _ => work_dir,
        }
    }
}

impl Config {
    /// Absolute (root-joined) working directory
    pub fn resolved_work_dir(&self) -> PathBuf {
        self.project_root.join(&self.work_dir)
    }

    /// Resolve a project-relative path against the project root
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.project_root.join(relative)
    }

    /// Get the project name
    pub fn project_name(&self) -> &str {
        &self.project.project.name
    }
}
