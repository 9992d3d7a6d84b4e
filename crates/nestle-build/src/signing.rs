//! Post-build signing hook
//!
//! Signing is opaque to the build: a signer receives the finished archive's
//! absolute path and either succeeds or fails the build.

use crate::error::{BuildError, BuildResult};
use std::fmt::Debug;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub trait ArchiveSigner: Send + Sync + Debug {
    fn sign(&self, archive: &Path) -> BuildResult<()>;
}

/// Runs an external program with the archive path appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a `[program, args...]` list; `None` when empty
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ArchiveSigner for CommandSigner {
    fn sign(&self, archive: &Path) -> BuildResult<()> {
        let archive = archive
            .canonicalize()
            .map_err(|e| BuildError::io(archive, e))?;
        debug!(program = %self.program, archive = %archive.display(), "signing");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&archive)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| BuildError::signing(&archive, format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = output
                .status
                .code()
                .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {}", c));
            return Err(BuildError::signing(
                &archive,
                format!("{} failed with {}: {}", self.program, status, stderr.trim()),
            ));
        }

        info!(archive = %archive.display(), "signed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_splits_program() {
        let signer = CommandSigner::from_command(&["jarsigner".into(), "-storepass".into(), "x".into()])
            .unwrap();
        assert_eq!(signer.program(), "jarsigner");
        assert_eq!(signer.args, vec!["-storepass", "x"]);
        assert!(CommandSigner::from_command(&[]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let signer = CommandSigner::new("false", Vec::new());
        let err = signer.sign(temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::Signing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let signer = CommandSigner::new("true", Vec::new());
        assert!(signer.sign(temp.path()).is_ok());
    }
}
