//! Nestle project configuration
//!
//! Loads the `nestle.toml` project declaration that names every artifact of a
//! build graph:
//! - Project metadata (`[project]`)
//! - Build directories (`[build]`)
//! - Artifact declarations (`[[artifact]]`)
//!
//! # Configuration Hierarchy
//!
//! Values are merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project config (./nestle.toml, found by walking up from the start directory)
//! 3. Environment variables (NESTLE_*)
//!
//! # Example
//!
//! ```no_run
//! use nestle_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{} artifacts", config.project.artifacts.len());
//! ```

pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project declaration file.
pub const CONFIG_FILE_NAME: &str = "nestle.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Artifact '{0}' is declared more than once")]
    DuplicateArtifact(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader};
pub use project::{ArtifactConfig, ArtifactKindConfig, BuildSection, ProjectConfig, ProjectSection};
