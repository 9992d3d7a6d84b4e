/// Archive and loader error types
use std::path::PathBuf;
use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Malformed archive {path}: {error}")]
    Zip {
        path: PathBuf,
        error: zip::result::ZipError,
    },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid entry name: '{0}'")]
    InvalidEntryName(String),

    #[error("Duplicate archive entry: '{0}'")]
    DuplicateEntry(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ArchiveError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }

    /// Create a zip format error with path context
    pub fn zip(path: impl Into<PathBuf>, error: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            error,
        }
    }

    /// Create a not-found error for a resource address or entry name
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl LoadError {
    /// Create a unit not found error
    pub fn unit_not_found(qualified_name: impl Into<String>) -> Self {
        Self::UnitNotFound(qualified_name.into())
    }
}
