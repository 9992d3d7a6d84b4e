//! Fat-archive strategy
//!
//! Units are looked up in a composite archive's loose-classes directory
//! first, then in each nested library in the order the libraries appear in
//! the archive.

use super::{LoadedUnit, UnitResolver};
use crate::address::{NestedAddress, NestedResolver, Resolution};
use crate::error::{ArchiveError, ArchiveResult, LoadResult};
use crate::layout::{is_nested_library, trim_directory, unit_entry_name, MANIFEST_PATH, NESTED_CLASSES_PREFIX};
use crate::manifest::Manifest;
use crate::nested::OuterArchive;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FatArchiveResolver {
    resolver: NestedResolver,
    start_class: Option<String>,
    search_paths: Vec<NestedAddress>,
}

impl FatArchiveResolver {
    /// Open a composite archive from disk
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::new(Arc::new(OuterArchive::open(path)?))
    }

    /// Read the manifest and register search paths
    pub fn new(archive: Arc<OuterArchive>) -> ArchiveResult<Self> {
        let start_class = match archive.read_entry(MANIFEST_PATH)? {
            Some(bytes) => Manifest::parse(&bytes)?.start_class().map(str::to_string),
            None => None,
        };

        let location = archive.location().to_string();
        let mut search_paths = Vec::new();
        let classes = trim_directory(NESTED_CLASSES_PREFIX);
        if archive.is_directory(classes) {
            search_paths.push(NestedAddress::new(&location, classes));
        }
        search_paths.extend(
            archive
                .entry_names()
                .filter(|name| is_nested_library(name))
                .map(|name| NestedAddress::new(&location, name)),
        );

        debug!(
            archive = %location,
            start_class = ?start_class,
            search_paths = search_paths.len(),
            "fat archive resolver ready"
        );

        Ok(Self {
            resolver: NestedResolver::new(archive),
            start_class,
            search_paths,
        })
    }

    /// Real entry point recorded in the manifest
    pub fn start_class(&self) -> Option<&str> {
        self.start_class.as_deref()
    }

    pub fn search_paths(&self) -> &[NestedAddress] {
        &self.search_paths
    }

    pub fn archive(&self) -> &Arc<OuterArchive> {
        self.resolver.archive()
    }

    /// Load the start class
    pub fn resolve_start_class(&self) -> LoadResult<Option<LoadedUnit>> {
        match &self.start_class {
            Some(name) => self.resolve_unit(name),
            None => Ok(None),
        }
    }

    fn probe(&self, search_path: &NestedAddress, entry: &str) -> ArchiveResult<Option<Arc<[u8]>>> {
        let address = search_path.with_member(entry);
        match self.resolver.resolve_address(&address)? {
            Resolution::Resolved(resource) if resource.exists() => match resource.bytes() {
                Ok(bytes) => Ok(Some(bytes)),
                Err(ArchiveError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            _ => Ok(None),
        }
    }
}

impl UnitResolver for FatArchiveResolver {
    fn resolve_unit(&self, qualified_name: &str) -> LoadResult<Option<LoadedUnit>> {
        let entry = unit_entry_name(qualified_name);
        for search_path in &self.search_paths {
            match self.probe(search_path, &entry) {
                Ok(Some(bytes)) => {
                    return Ok(Some(LoadedUnit {
                        name: qualified_name.to_string(),
                        bytes,
                        code_source: search_path.to_string(),
                    }))
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(search_path = %search_path, unit = qualified_name, error = %e, "search path failed");
                }
            }
        }
        Ok(None)
    }

    fn search_roots(&self) -> Vec<String> {
        self.search_paths.iter().map(ToString::to_string).collect()
    }
}
