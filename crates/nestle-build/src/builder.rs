//! Build orchestration
//!
//! Builds every artifact of a project in dependency order below a working
//! directory:
//!
//! ```text
//! <work_dir>/build/       reset at the start of every build
//! <work_dir>/playground/  scratch directory, reset before each archive
//! ```
//!
//! Composite archives build their embedded artifacts depth-first before their
//! own sources; an artifact is built at most once per build.

use crate::artifact::{Artifact, ArtifactKind};
use crate::build_order::topological_order;
use crate::compiler::{self, CompileOptions, CompiledUnits, CompilerService, PassthroughCompiler};
use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::report::{millis, sha256_file, BuildReport, BuiltArtifact};
use nestle_runtime::layout::{unit_entry_name, NESTED_CLASSES_PREFIX, NESTED_LIB_PREFIX};
use nestle_runtime::{ArchiveWriter, Manifest};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Directory under the working directory receiving all outputs
pub const BUILD_DIR: &str = "build";

/// Scratch directory under the working directory
pub const PLAYGROUND_DIR: &str = "playground";

pub struct Builder<'p> {
    project: &'p Project,
    compiler: Box<dyn CompilerService>,
    work_dir: PathBuf,
}

/// Artifacts finished so far in one build
#[derive(Default)]
struct BuildRun {
    built: Vec<BuiltArtifact>,
    index: HashMap<String, usize>,
}

impl BuildRun {
    fn get(&self, id: &str) -> Option<&BuiltArtifact> {
        self.index.get(id).map(|&slot| &self.built[slot])
    }

    fn record(&mut self, built: BuiltArtifact) {
        self.index.insert(built.id.clone(), self.built.len());
        self.built.push(built);
    }
}

impl<'p> Builder<'p> {
    /// Create a builder using the passthrough compiler
    pub fn new(project: &'p Project, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            project,
            compiler: Box::new(PassthroughCompiler),
            work_dir: work_dir.into(),
        }
    }

    /// Use a different compiler service
    pub fn with_compiler(mut self, compiler: impl CompilerService + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn build_dir(&self) -> PathBuf {
        self.work_dir.join(BUILD_DIR)
    }

    pub fn playground_dir(&self) -> PathBuf {
        self.work_dir.join(PLAYGROUND_DIR)
    }

    /// Execute the build
    pub fn build(&self) -> BuildResult<BuildReport> {
        let build_start = Instant::now();
        reset_dir(&self.build_dir())?;

        let order = topological_order(self.project.artifacts())?;
        info!(
            project = self.project.name(),
            artifacts = order.len(),
            "building {}",
            order.iter().map(|a| a.id()).collect::<Vec<_>>().join(" -> ")
        );

        let mut run = BuildRun::default();
        for artifact in order {
            self.build_artifact(artifact, &mut run)?;
        }

        let elapsed = build_start.elapsed();
        info!(project = self.project.name(), "build completed in {:.2}s", elapsed.as_secs_f64());

        Ok(BuildReport {
            project: self.project.name().to_string(),
            work_dir: self.work_dir.clone(),
            artifacts: run.built,
            elapsed_ms: millis(elapsed),
        })
    }

    fn build_artifact(&self, artifact: &'p Artifact, run: &mut BuildRun) -> BuildResult<()> {
        if run.get(artifact.id()).is_some() {
            return Ok(());
        }

        let start = Instant::now();
        let mut built = match artifact.kind() {
            ArtifactKind::DirectoryOutput => self.build_directory(artifact, run),
            ArtifactKind::SingleArchive => self.build_single(artifact, run),
            ArtifactKind::CompositeArchive => self.build_composite(artifact, run),
        }
        .map_err(|e| e.in_artifact(artifact.id()))?;
        built.elapsed_ms = millis(start.elapsed());

        info!(
            artifact = artifact.id(),
            kind = %artifact.kind(),
            output = %built.output.display(),
            entries = built.entries,
            "built"
        );
        run.record(built);
        Ok(())
    }

    fn build_directory(&self, artifact: &'p Artifact, run: &BuildRun) -> BuildResult<BuiltArtifact> {
        if artifact.destination().as_os_str().is_empty() {
            return Err(BuildError::invalid_artifact(
                artifact.id(),
                "directory output needs a destination",
            ));
        }

        let output = artifact.output_path(&self.build_dir());
        fs::create_dir_all(&output).map_err(|e| BuildError::io(&output, e))?;

        let requirements = self.transitive_requirements(artifact)?;
        let compiled = self.compile(artifact, classpath(artifact, &requirements, run)?)?;
        compiled.write_to_disk(&output)?;

        Ok(built(artifact, output, compiled.len()))
    }

    fn build_single(&self, artifact: &'p Artifact, run: &BuildRun) -> BuildResult<BuiltArtifact> {
        let requirements = self.transitive_requirements(artifact)?;
        let compiled = self.compile(artifact, classpath(artifact, &requirements, run)?)?;

        let playground = self.reset_playground()?;
        let written = compiled.write_to_disk(&playground)?;

        let output = self.archive_path(artifact)?;
        let mut writer = ArchiveWriter::create(&output)?;
        if !artifact.options().omit_manifest {
            writer.add_manifest(&Manifest::single(artifact.declared_entry_point()))?;
        }
        for path in &written {
            writer.add_file(&playground, path)?;
        }
        let entries = writer.entry_count();
        writer.finish()?;

        self.finish_archive(artifact, output, entries)
    }

    fn build_composite(&self, artifact: &'p Artifact, run: &mut BuildRun) -> BuildResult<BuiltArtifact> {
        let embedded = self.transitive_requirements(artifact)?;
        check_nested_names(artifact, &embedded)?;
        for &inner in &embedded {
            self.build_artifact(inner, run)?;
        }

        let compiled = self.compile(artifact, classpath(artifact, &embedded, run)?)?;
        let playground = self.reset_playground()?;
        let written = compiled.write_to_disk(&playground)?;

        let output = self.archive_path(artifact)?;
        let mut writer = ArchiveWriter::create(&output)?;
        writer.add_directory(NESTED_LIB_PREFIX)?;
        writer.add_directory(NESTED_CLASSES_PREFIX)?;

        if !artifact.options().omit_manifest {
            let entry_point = artifact.entry_point().ok_or_else(|| {
                BuildError::invalid_artifact(artifact.id(), "composite archive has no entry point")
            })?;
            writer.add_manifest(&Manifest::composite(entry_point))?;
        }

        for inner in &embedded {
            let output = &built_requirement(artifact, inner.id(), run)?.output;
            match inner.kind() {
                ArtifactKind::DirectoryOutput => {
                    writer.add_tree(output, NESTED_CLASSES_PREFIX)?;
                }
                ArtifactKind::SingleArchive | ArtifactKind::CompositeArchive => {
                    let name = inner.final_name().ok_or_else(|| {
                        BuildError::invalid_artifact(inner.id(), "archive has no final name")
                    })?;
                    writer.add_archive(&format!("{}{}", NESTED_LIB_PREFIX, name), output)?;
                }
            }
        }

        for (name, path) in compiled.names().zip(&written) {
            writer.add_file_as(
                |_| format!("{}{}", NESTED_CLASSES_PREFIX, unit_entry_name(name)),
                path,
            )?;
        }

        let entries = writer.entry_count();
        writer.finish()?;
        self.finish_archive(artifact, output, entries)
    }

    fn compile(&self, artifact: &Artifact, classpath: Option<OsString>) -> BuildResult<CompiledUnits> {
        if artifact.sources().is_empty() {
            return Ok(CompiledUnits::default());
        }
        debug!(
            artifact = artifact.id(),
            units = artifact.sources().len(),
            classpath = ?classpath,
            "compiling"
        );
        compiler::compile(
            self.compiler.as_ref(),
            artifact.sources(),
            &CompileOptions { classpath },
        )
    }

    /// Every artifact reachable through requirements, in first-seen order
    fn transitive_requirements(&self, artifact: &'p Artifact) -> BuildResult<Vec<&'p Artifact>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut found = Vec::new();
        let mut stack: Vec<&'p str> = artifact.requirements().into_iter().rev().collect();

        while let Some(id) = stack.pop() {
            if id == artifact.id() || !seen.insert(id) {
                continue;
            }
            let requirement = self.project.artifact(id).ok_or_else(|| {
                BuildError::invalid_artifact(artifact.id(), format!("unknown requirement '{}'", id))
            })?;
            found.push(requirement);
            stack.extend(requirement.requirements().into_iter().rev());
        }
        Ok(found)
    }

    /// Sign if requested, then digest
    fn finish_archive(&self, artifact: &Artifact, output: PathBuf, entries: usize) -> BuildResult<BuiltArtifact> {
        let signed = match artifact.signer() {
            Some(signer) => {
                signer.sign(&output)?;
                true
            }
            None => false,
        };

        let mut built = built(artifact, output, entries);
        built.sha256 = Some(sha256_file(&built.output)?);
        built.signed = signed;
        Ok(built)
    }

    fn archive_path(&self, artifact: &Artifact) -> BuildResult<PathBuf> {
        if artifact.final_name().is_none() {
            return Err(BuildError::invalid_artifact(artifact.id(), "archive has no final name"));
        }
        let output = artifact.output_path(&self.build_dir());
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        Ok(output)
    }

    fn reset_playground(&self) -> BuildResult<PathBuf> {
        let playground = self.playground_dir();
        reset_dir(&playground)?;
        Ok(playground)
    }
}

fn built(artifact: &Artifact, output: PathBuf, entries: usize) -> BuiltArtifact {
    BuiltArtifact {
        id: artifact.id().to_string(),
        kind: artifact.kind(),
        output,
        entries,
        sha256: None,
        signed: false,
        dynamic_load: artifact.options().dynamic_load,
        elapsed_ms: 0,
    }
}

fn built_requirement<'r>(artifact: &Artifact, id: &str, run: &'r BuildRun) -> BuildResult<&'r BuiltArtifact> {
    run.get(id).ok_or_else(|| {
        BuildError::invalid_artifact(artifact.id(), format!("requirement '{}' has not been built", id))
    })
}

/// Embedded archives land under one prefix, so their final names must differ
fn check_nested_names(artifact: &Artifact, embedded: &[&Artifact]) -> BuildResult<()> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for inner in embedded.iter().filter(|inner| inner.kind().is_archive()) {
        let Some(name) = inner.final_name() else {
            continue;
        };
        if let Some(first) = owners.insert(name, inner.id()) {
            return Err(BuildError::invalid_artifact(
                artifact.id(),
                format!(
                    "'{}' and '{}' would both be embedded as {}{}",
                    first,
                    inner.id(),
                    NESTED_LIB_PREFIX,
                    name
                ),
            ));
        }
    }
    Ok(())
}

/// Output paths of `requirements` as a platform path list
fn classpath(artifact: &Artifact, requirements: &[&Artifact], run: &BuildRun) -> BuildResult<Option<OsString>> {
    if requirements.is_empty() {
        return Ok(None);
    }
    let paths = requirements
        .iter()
        .map(|requirement| built_requirement(artifact, requirement.id(), run).map(|b| b.output.clone()))
        .collect::<BuildResult<Vec<PathBuf>>>()?;
    std::env::join_paths(paths)
        .map(Some)
        .map_err(|e| BuildError::invalid_artifact(artifact.id(), e))
}

/// Remove and recreate a directory
fn reset_dir(path: &Path) -> BuildResult<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| BuildError::io(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
}
