/// Artifact declarations
///
/// Artifacts are immutable once declared; every `with_*` method returns a
/// modified copy and leaves the receiver untouched.
use crate::signing::ArchiveSigner;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Loose compiled units in a directory
    DirectoryOutput,
    /// One archive of compiled units
    SingleArchive,
    /// Archive embedding other artifacts under the nested prefixes
    CompositeArchive,
}

impl ArtifactKind {
    pub fn is_archive(&self) -> bool {
        !matches!(self, Self::DirectoryOutput)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryOutput => write!(f, "directory-output"),
            Self::SingleArchive => write!(f, "single-archive"),
            Self::CompositeArchive => write!(f, "composite-archive"),
        }
    }
}

/// A qualified name and its source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub qualified_name: String,
    pub source: String,
}

impl SourceUnit {
    pub fn new(qualified_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Write no manifest into the archive
    pub omit_manifest: bool,
    /// Loaded through the sibling-archive loader rather than the classpath
    pub dynamic_load: bool,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    id: String,
    kind: ArtifactKind,
    destination: PathBuf,
    final_name: Option<String>,
    dependencies: Vec<String>,
    sources: Vec<SourceUnit>,
    inner: Vec<String>,
    options: BuildOptions,
    entry_point: Option<String>,
    signer: Option<Arc<dyn ArchiveSigner>>,
}

impl Artifact {
    fn new(
        id: impl Into<String>,
        kind: ArtifactKind,
        destination: impl Into<PathBuf>,
        final_name: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            destination: destination.into(),
            final_name,
            dependencies: Vec::new(),
            sources: Vec::new(),
            inner: Vec::new(),
            options: BuildOptions::default(),
            entry_point: None,
            signer: None,
        }
    }

    pub fn directory(id: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self::new(id, ArtifactKind::DirectoryOutput, destination, None)
    }

    pub fn single_archive(
        id: impl Into<String>,
        destination: impl Into<PathBuf>,
        final_name: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            ArtifactKind::SingleArchive,
            destination,
            Some(final_name.into()),
        )
    }

    pub fn composite_archive(
        id: impl Into<String>,
        destination: impl Into<PathBuf>,
        final_name: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            ArtifactKind::CompositeArchive,
            destination,
            Some(final_name.into()),
        )
    }

    pub fn with_dependencies<I, S>(&self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_sources(&self, sources: Vec<SourceUnit>) -> Self {
        Self {
            sources,
            ..self.clone()
        }
    }

    pub fn with_inner<I, S>(&self, inner: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: inner.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_options(&self, options: BuildOptions) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    pub fn with_entry_point(&self, entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: Some(entry_point.into()),
            ..self.clone()
        }
    }

    pub fn with_signer(&self, signer: Arc<dyn ArchiveSigner>) -> Self {
        Self {
            signer: Some(signer),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn final_name(&self) -> Option<&str> {
        self.final_name.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn sources(&self) -> &[SourceUnit] {
        &self.sources
    }

    pub fn inner(&self) -> &[String] {
        &self.inner
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    pub fn signer(&self) -> Option<&Arc<dyn ArchiveSigner>> {
        self.signer.as_ref()
    }

    /// Entry point as declared, without any fallback
    pub fn declared_entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Declared entry point, falling back to the first source unit
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point
            .as_deref()
            .or_else(|| self.sources.first().map(|unit| unit.qualified_name.as_str()))
    }

    /// Everything that must be built first: dependencies, then inner
    /// artifacts not already listed as dependencies
    pub fn requirements(&self) -> Vec<&str> {
        let mut requirements: Vec<&str> = self.dependencies.iter().map(String::as_str).collect();
        for inner in &self.inner {
            if !requirements.contains(&inner.as_str()) {
                requirements.push(inner);
            }
        }
        requirements
    }

    /// Where this artifact lands under `build_root`
    pub fn output_path(&self, build_root: &Path) -> PathBuf {
        let directory = build_root.join(&self.destination);
        match &self.final_name {
            Some(name) => directory.join(name),
            None => directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sources_copies() {
        let base = Artifact::single_archive("lib", "libs", "lib.jar");
        let modified = base.with_sources(vec![SourceUnit::new("a.A", "class A {}")]);
        assert!(base.sources().is_empty());
        assert_eq!(modified.sources().len(), 1);
        assert_eq!(modified.id(), "lib");
    }

    #[test]
    fn test_requirements_merge_inner() {
        let app = Artifact::composite_archive("app", "", "app.jar")
            .with_dependencies(["lib", "util"])
            .with_inner(["util", "extra"]);
        assert_eq!(app.requirements(), vec!["lib", "util", "extra"]);
    }

    #[test]
    fn test_entry_point_defaults_to_first_source() {
        let app = Artifact::composite_archive("app", "", "app.jar").with_sources(vec![
            SourceUnit::new("app.Main", "main"),
            SourceUnit::new("app.Other", "other"),
        ]);
        assert_eq!(app.entry_point(), Some("app.Main"));
        assert_eq!(app.with_entry_point("app.Other").entry_point(), Some("app.Other"));
    }

    #[test]
    fn test_output_path() {
        let root = Path::new("/w/build");
        assert_eq!(
            Artifact::single_archive("lib", "libs", "lib.jar").output_path(root),
            PathBuf::from("/w/build/libs/lib.jar")
        );
        assert_eq!(
            Artifact::directory("gen", "classes").output_path(root),
            PathBuf::from("/w/build/classes")
        );
    }
}
