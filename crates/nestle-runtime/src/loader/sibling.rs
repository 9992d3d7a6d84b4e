//! Sibling-archives strategy
//!
//! Loads units from an explicit list of built archives and directories.
//! Member names are collected once when the resolver is constructed; each
//! lookup is then an exact match against those sets.

use super::{LoadedUnit, UnitResolver};
use crate::error::{ArchiveError, ArchiveResult, LoadResult};
use crate::layout::unit_entry_name;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug)]
enum RootKind {
    Archive,
    Directory,
}

#[derive(Debug)]
struct SiblingRoot {
    path: PathBuf,
    kind: RootKind,
    members: HashSet<String>,
    code_source: String,
}

impl SiblingRoot {
    fn scan(path: &Path) -> ArchiveResult<Self> {
        let path = fs::canonicalize(path).map_err(|e| ArchiveError::io(path, e))?;
        let metadata = fs::metadata(&path).map_err(|e| ArchiveError::io(&path, e))?;

        let (kind, members) = if metadata.is_dir() {
            (RootKind::Directory, directory_members(&path)?)
        } else {
            (RootKind::Archive, archive_members(&path)?)
        };

        let code_source = code_source_url(&path, metadata.is_dir())?;
        debug!(root = %path.display(), members = members.len(), "scanned sibling root");

        Ok(Self {
            path,
            kind,
            members,
            code_source,
        })
    }

    fn read(&self, entry: &str) -> ArchiveResult<Option<Vec<u8>>> {
        match self.kind {
            RootKind::Directory => {
                let file = self.path.join(entry);
                match fs::read(&file) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(ArchiveError::io(file, e)),
                }
            }
            RootKind::Archive => {
                let file = File::open(&self.path).map_err(|e| ArchiveError::io(&self.path, e))?;
                let mut archive = ZipArchive::new(BufReader::new(file))
                    .map_err(|e| ArchiveError::zip(&self.path, e))?;
                let mut member = match archive.by_name(entry) {
                    Ok(member) => member,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(ArchiveError::zip(&self.path, e)),
                };
                let mut bytes = Vec::with_capacity(member.size() as usize);
                member
                    .read_to_end(&mut bytes)
                    .map_err(|e| ArchiveError::io(&self.path, e))?;
                Ok(Some(bytes))
            }
        }
    }
}

pub struct SiblingArchiveResolver {
    roots: Vec<SiblingRoot>,
}

impl SiblingArchiveResolver {
    /// Pre-scan every archive or directory in `paths`
    pub fn new<I, P>(paths: I) -> ArchiveResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = paths
            .into_iter()
            .map(|path| SiblingRoot::scan(path.as_ref()))
            .collect::<ArchiveResult<Vec<_>>>()?;
        Ok(Self { roots })
    }

    /// Whether any root holds the unit, without reading it
    pub fn contains(&self, qualified_name: &str) -> bool {
        let entry = unit_entry_name(qualified_name);
        self.roots.iter().any(|root| root.members.contains(&entry))
    }
}

impl UnitResolver for SiblingArchiveResolver {
    fn resolve_unit(&self, qualified_name: &str) -> LoadResult<Option<LoadedUnit>> {
        let entry = unit_entry_name(qualified_name);
        for root in self.roots.iter().filter(|root| root.members.contains(&entry)) {
            match root.read(&entry) {
                Ok(Some(bytes)) => {
                    return Ok(Some(LoadedUnit {
                        name: qualified_name.to_string(),
                        bytes: Arc::from(bytes),
                        code_source: root.code_source.clone(),
                    }))
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(root = %root.path.display(), unit = qualified_name, error = %e, "sibling read failed");
                }
            }
        }
        Ok(None)
    }

    fn search_roots(&self) -> Vec<String> {
        self.roots.iter().map(|root| root.code_source.clone()).collect()
    }
}

fn archive_members(path: &Path) -> ArchiveResult<HashSet<String>> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::zip(path, e))?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

fn directory_members(root: &Path) -> ArchiveResult<HashSet<String>> {
    let mut members = HashSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| ArchiveError::io(root, io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        members.insert(name);
    }
    Ok(members)
}

fn code_source_url(path: &Path, is_dir: bool) -> ArchiveResult<String> {
    let url = if is_dir {
        Url::from_directory_path(path)
    } else {
        Url::from_file_path(path)
    };
    url.map(String::from).map_err(|()| {
        ArchiveError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path is not absolute"),
        )
    })
}
