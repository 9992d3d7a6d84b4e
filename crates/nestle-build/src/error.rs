/// Build system error types
use nestle_config::ConfigError;
use nestle_runtime::ArchiveError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Problems with the artifact graph, detected before anything is compiled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("No root artifact: every artifact requires another one")]
    NoRoot,

    #[error("Unsatisfied dependency: artifact '{0}' can never be built")]
    UnsatisfiedDependency(String),

    #[error("Unknown artifact '{id}' required by '{required_by}'")]
    UnknownDependencyId { id: String, required_by: String },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Compilation failed for unit '{unit}': {}", .diagnostics.join("; "))]
    Compilation {
        unit: String,
        diagnostics: Vec<String>,
    },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Signing failed for {archive}: {error}")]
    Signing { archive: PathBuf, error: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid artifact '{artifact}': {reason}")]
    InvalidArtifact { artifact: String, reason: String },

    #[error("Failed to build artifact '{artifact}': {source}")]
    Artifact {
        artifact: String,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a compilation error
    pub fn compilation(unit: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self::Compilation {
            unit: unit.into(),
            diagnostics,
        }
    }

    /// Create a signing error
    pub fn signing(archive: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::Signing {
            archive: archive.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_artifact(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidArtifact {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// Attach the artifact being built, unless already attached
    pub fn in_artifact(self, artifact: &str) -> Self {
        match self {
            Self::Artifact { .. } | Self::Graph(_) => self,
            other => Self::Artifact {
                artifact: artifact.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, below any artifact context
    pub fn root_cause(&self) -> &BuildError {
        match self {
            Self::Artifact { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
