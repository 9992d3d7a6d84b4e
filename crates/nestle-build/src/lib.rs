//! Nestle build pipeline
//!
//! Turns a project's artifact graph into outputs on disk:
//! - Dependency ordering by fixed-point relaxation
//! - Compilation through a pluggable compiler service
//! - Directory outputs, single archives and composite archives
//! - Optional signing of finished archives
//! - Build reports with archive digests

pub mod artifact;
pub mod build_order;
pub mod builder;
pub mod compiler;
pub mod error;
pub mod project;
pub mod report;
pub mod signing;

pub use artifact::{Artifact, ArtifactKind, BuildOptions, SourceUnit};
pub use build_order::topological_order;
pub use builder::{Builder, BUILD_DIR, PLAYGROUND_DIR};
pub use compiler::{
    compile, CompileOptions, CompileOutcome, CompiledUnits, CompilerService, PassthroughCompiler,
    UnitSink,
};
pub use error::{BuildError, BuildResult, GraphError};
pub use project::Project;
pub use report::{BuildReport, BuiltArtifact};
pub use signing::{ArchiveSigner, CommandSigner};
