/// A project: the set of artifacts one build works on
use crate::artifact::{Artifact, BuildOptions, SourceUnit};
use crate::error::{BuildError, BuildResult};
use crate::signing::CommandSigner;
use nestle_config::{ArtifactConfig, ArtifactKindConfig, Config};
use nestle_runtime::layout::QUALIFIER_SEPARATOR;
use std::fs;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct Project {
    name: String,
    artifacts: Vec<Artifact>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifacts: Vec::new(),
        }
    }

    /// Add an artifact; identifiers must be unique
    pub fn add(&mut self, artifact: Artifact) -> BuildResult<()> {
        if self.artifact(artifact.id()).is_some() {
            return Err(BuildError::invalid_artifact(
                artifact.id(),
                "declared more than once",
            ));
        }
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> BuildResult<Self> {
        self.add(artifact)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Artifacts in declaration order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn artifact(&self, id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.id() == id)
    }

    /// Build a project from a loaded `nestle.toml`
    ///
    /// Source files are read from each artifact's source roots; a file's
    /// qualified name is its path below the root without the suffix.
    pub fn from_config(config: &Config) -> BuildResult<Self> {
        let suffix = config.project.project.source_suffix.as_str();
        let mut project = Self::new(config.project_name());
        for declared in &config.project.artifacts {
            let mut sources = Vec::new();
            for root in &declared.sources {
                sources.extend(discover_sources(&config.resolve(root), suffix)?);
            }
            project.add(artifact_from_config(declared, sources))?;
        }
        debug!(project = project.name(), artifacts = project.artifacts.len(), "project loaded");
        Ok(project)
    }
}

fn artifact_from_config(declared: &ArtifactConfig, sources: Vec<SourceUnit>) -> Artifact {
    let output = declared.output.clone().unwrap_or_default();
    let base = match declared.kind {
        ArtifactKindConfig::DirectoryOutput => Artifact::directory(&declared.id, &declared.destination),
        ArtifactKindConfig::SingleArchive => {
            Artifact::single_archive(&declared.id, &declared.destination, output)
        }
        ArtifactKindConfig::CompositeArchive => {
            Artifact::composite_archive(&declared.id, &declared.destination, output)
        }
    };

    let mut artifact = base
        .with_dependencies(declared.dependencies.iter().cloned())
        .with_inner(declared.inner.iter().cloned())
        .with_sources(sources)
        .with_options(BuildOptions {
            omit_manifest: declared.omit_manifest,
            dynamic_load: declared.dynamic_load,
        });
    if let Some(entry_point) = &declared.entry_point {
        artifact = artifact.with_entry_point(entry_point);
    }
    if let Some(signer) = declared.sign.as_deref().and_then(CommandSigner::from_command) {
        artifact = artifact.with_signer(Arc::new(signer));
    }
    artifact
}

/// Source units below `root`, in file-name order
pub fn discover_sources(root: &Path, suffix: &str) -> BuildResult<Vec<SourceUnit>> {
    let mut units = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(suffix)
        {
            continue;
        }

        let Some(qualified_name) = qualified_name_for(root, path) else {
            continue;
        };
        let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        units.push(SourceUnit::new(qualified_name, source));
    }
    Ok(units)
}

/// `root/com/example/Main.java` becomes `com.example.Main`
fn qualified_name_for(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().map(str::to_string),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(&QUALIFIER_SEPARATOR.to_string()))
}
