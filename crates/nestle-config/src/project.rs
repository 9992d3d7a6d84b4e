//! Project Configuration (nestle.toml)
//!
//! Declares the artifacts of a build graph. Each `[[artifact]]` table maps to
//! one buildable unit; the build crate turns these declarations into its own
//! immutable artifact values.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default working directory, relative to the project root.
pub const DEFAULT_WORK_DIR: &str = "target/nestle";

/// Default suffix of source files discovered under an artifact's source roots.
pub const DEFAULT_SOURCE_SUFFIX: &str = "java";

/// Project configuration from nestle.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project metadata
    pub project: ProjectSection,

    /// Build directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// Declared artifacts, in declaration order
    #[serde(default, rename = "artifact", skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactConfig>,
}

/// `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProjectSection {
    /// Project name
    pub name: String,

    /// Suffix of source files under artifact source roots
    #[serde(default = "default_source_suffix")]
    pub source_suffix: String,
}

fn default_source_suffix() -> String {
    DEFAULT_SOURCE_SUFFIX.to_string()
}

/// `[build]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildSection {
    /// Working directory holding `build/` and `playground/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

/// Artifact kind as written in nestle.toml
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKindConfig {
    DirectoryOutput,
    SingleArchive,
    CompositeArchive,
}

impl ArtifactKindConfig {
    fn is_archive(&self) -> bool {
        !matches!(self, Self::DirectoryOutput)
    }
}

/// One `[[artifact]]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ArtifactConfig {
    /// Stable identifier, referenced by `dependencies` and `inner`
    pub id: String,

    pub kind: ArtifactKindConfig,

    /// Destination directory under the build root
    #[serde(default)]
    pub destination: PathBuf,

    /// Archive file name (archive kinds only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Source roots, relative to the project root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Artifacts embedded in a composite archive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    #[serde(default)]
    pub omit_manifest: bool,

    /// Load through the dynamic loader instead of the primary classpath
    #[serde(default)]
    pub dynamic_load: bool,

    /// Signing command; the archive path is appended as the last argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<Vec<String>>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.project.name.is_empty() {
            return Err(invalid("project.name", "name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.id.is_empty() {
                return Err(invalid("artifact.id", "id cannot be empty"));
            }
            if !seen.insert(artifact.id.as_str()) {
                return Err(ConfigError::DuplicateArtifact(artifact.id.clone()));
            }
            artifact.validate()?;
        }

        Ok(())
    }

    /// Working directory relative to the project root
    pub fn work_dir(&self) -> PathBuf {
        self.build
            .as_ref()
            .and_then(|b| b.work_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR))
    }

    /// Look up an artifact declaration by id
    pub fn artifact(&self, id: &str) -> Option<&ArtifactConfig> {
        self.artifacts.iter().find(|a| a.id == id)
    }
}

impl ArtifactConfig {
    fn validate(&self) -> ConfigResult<()> {
        let field = |name: &str| format!("artifact '{}'.{}", self.id, name);

        match (&self.output, self.kind.is_archive()) {
            (None, true) => {
                return Err(invalid(field("output"), "archive artifacts need an output name"));
            }
            (Some(output), true) if !output.ends_with(".jar") => {
                return Err(invalid(
                    field("output"),
                    format!("'{}' must end in .jar", output),
                ));
            }
            (Some(_), false) => {
                return Err(invalid(
                    field("output"),
                    "directory outputs have no archive name",
                ));
            }
            _ => {}
        }

        if !self.inner.is_empty() && self.kind != ArtifactKindConfig::CompositeArchive {
            return Err(invalid(
                field("inner"),
                "only composite archives embed inner artifacts",
            ));
        }

        if let Some(command) = &self.sign {
            if command.is_empty() {
                return Err(invalid(field("sign"), "signing command cannot be empty"));
            }
        }

        Ok(())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}
