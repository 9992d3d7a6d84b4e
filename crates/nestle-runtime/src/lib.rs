//! Nestle runtime: archives inside archives, read in place
//!
//! Provides the run-time half of the harness:
//! - Archive layout conventions and manifest handling
//! - Archive writer used by the build pipeline
//! - Lazily built index over archives nested in an outer archive
//! - `outer!/segment!/segment` address resolution
//! - Unit resolvers for fat archives and sibling archives
//!
//! Nested archives are never extracted to disk. Their bytes are read
//! straight out of the outer archive and indexed in memory.

pub mod address;
pub mod error;
pub mod layout;
pub mod loader;
pub mod manifest;
pub mod nested;
pub mod writer;

pub use address::{AddressParseError, NestedAddress, NestedResolver, NestedResource, Resolution};
pub use error::{ArchiveError, ArchiveResult, LoadError, LoadResult};
pub use loader::fat::FatArchiveResolver;
pub use loader::sibling::SiblingArchiveResolver;
pub use loader::{LoadedUnit, ResolverChain, UnitLoader, UnitResolver};
pub use manifest::Manifest;
pub use nested::{EntryMeta, NestedArchive, NestedEntry, OuterArchive};
pub use writer::ArchiveWriter;
