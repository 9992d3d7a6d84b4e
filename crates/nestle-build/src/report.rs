/// Build reports
use crate::artifact::ArtifactKind;
use crate::error::{BuildError, BuildResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One artifact produced by a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltArtifact {
    pub id: String,
    pub kind: ArtifactKind,
    pub output: PathBuf,
    /// Archive entries written, or compiled units for directory outputs
    pub entries: usize,
    /// SHA-256 of the archive file, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub signed: bool,
    /// Loaded through the sibling-archive loader, not the primary classpath
    pub dynamic_load: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub project: String,
    pub work_dir: PathBuf,
    /// Artifacts in the order they were built
    pub artifacts: Vec<BuiltArtifact>,
    pub elapsed_ms: u64,
}

impl BuildReport {
    pub fn artifact(&self, id: &str) -> Option<&BuiltArtifact> {
        self.artifacts.iter().find(|artifact| artifact.id == id)
    }

    /// Built ids in build order
    pub fn order(&self) -> Vec<&str> {
        self.artifacts.iter().map(|artifact| artifact.id.as_str()).collect()
    }

    /// Outputs marked for dynamic loading, in build order
    ///
    /// These are the paths handed to a sibling-archive resolver.
    pub fn dynamic_load_outputs(&self) -> Vec<&Path> {
        self.artifacts
            .iter()
            .filter(|artifact| artifact.dynamic_load)
            .map(|artifact| artifact.output.as_path())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Milliseconds, saturating
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> BuildResult<String> {
    let mut file = File::open(path).map_err(|e| BuildError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| BuildError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"abc").unwrap();
        assert_eq!(
            sha256_file(temp.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_report_json_skips_missing_digest() {
        let report = BuildReport {
            project: "demo".to_string(),
            work_dir: PathBuf::from("/w"),
            artifacts: vec![BuiltArtifact {
                id: "gen".to_string(),
                kind: ArtifactKind::DirectoryOutput,
                output: PathBuf::from("/w/build/gen"),
                entries: 2,
                sha256: None,
                signed: false,
                dynamic_load: true,
                elapsed_ms: 1,
            }],
            elapsed_ms: 3,
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["artifacts"][0]["kind"], "directory-output");
        assert!(json["artifacts"][0].get("sha256").is_none());
        assert_eq!(report.order(), vec!["gen"]);
        assert_eq!(json["artifacts"][0]["dynamic_load"], true);
        assert_eq!(report.dynamic_load_outputs(), vec![Path::new("/w/build/gen")]);
    }
}
