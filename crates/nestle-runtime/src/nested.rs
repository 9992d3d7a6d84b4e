//! Nested-archive index and reader
//!
//! An [`OuterArchive`] reads its central directory once at open time. The
//! first request for nested-archive data triggers a single linear scan over
//! every `.jar` entry: its raw bytes are read into memory and re-parsed as an
//! archive of its own to build a member table. The scan result is kept for
//! the lifetime of the handle.
//!
//! Directory-style nested entries (such as `BOOT-INF/classes`) need no index;
//! their members are plain prefixed lookups into the outer entry table.

use crate::error::{ArchiveError, ArchiveResult};
use crate::layout::{is_archive_name, trim_directory};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Metadata recorded for one archive entry
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub is_dir: bool,
    pub modified: zip::DateTime,
}

impl EntryMeta {
    fn from_zip(file: &zip::read::ZipFile<'_>) -> Self {
        Self {
            name: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            crc32: file.crc32(),
            is_dir: file.is_dir(),
            modified: file.last_modified(),
        }
    }
}

/// A single archive stored inside the outer archive
#[derive(Debug)]
pub struct NestedArchive {
    entry_name: String,
    raw: Arc<[u8]>,
    order: Vec<String>,
    members: HashMap<String, (EntryMeta, Arc<[u8]>)>,
}

impl NestedArchive {
    /// Parse raw archive bytes and decompress every member
    fn parse(entry_name: &str, raw: Arc<[u8]>, outer: &Path) -> ArchiveResult<Self> {
        let context = outer.join(entry_name);
        let mut archive =
            ZipArchive::new(Cursor::new(raw.clone())).map_err(|e| ArchiveError::zip(&context, e))?;

        let mut order = Vec::with_capacity(archive.len());
        let mut members = HashMap::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| ArchiveError::zip(&context, e))?;
            let meta = EntryMeta::from_zip(&file);
            let mut bytes = Vec::with_capacity(meta.size as usize);
            file.read_to_end(&mut bytes)
                .map_err(|e| ArchiveError::io(&context, e))?;
            order.push(meta.name.clone());
            members.insert(meta.name.clone(), (meta, Arc::from(bytes)));
        }

        Ok(Self {
            entry_name: entry_name.to_string(),
            raw,
            order,
            members,
        })
    }

    /// Entry name of this archive inside the outer archive
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// The nested archive exactly as stored
    pub fn raw_bytes(&self) -> Arc<[u8]> {
        self.raw.clone()
    }

    /// Member names in archive order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn member(&self, name: &str) -> Option<Arc<[u8]>> {
        self.members.get(name).map(|(_, bytes)| bytes.clone())
    }

    pub fn member_meta(&self, name: &str) -> Option<&EntryMeta> {
        self.members.get(name).map(|(meta, _)| meta)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// What a first nested segment refers to
#[derive(Debug, Clone)]
pub enum NestedEntry {
    Archive(Arc<NestedArchive>),
    /// Directory prefix without its trailing slash
    Directory(String),
}

type NestedIndex = HashMap<String, Arc<NestedArchive>>;

/// Handle over an archive on disk that may contain nested archives
pub struct OuterArchive {
    path: PathBuf,
    location: String,
    entries: HashMap<String, EntryMeta>,
    order: Vec<String>,
    reader: Mutex<ZipArchive<BufReader<File>>>,
    nested: OnceCell<NestedIndex>,
    scans: AtomicUsize,
}

impl std::fmt::Debug for OuterArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OuterArchive")
            .field("location", &self.location)
            .field("entries", &self.order.len())
            .field("scans", &self.scan_count())
            .finish()
    }
}

impl OuterArchive {
    /// Open an archive and read its entry table
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path).map_err(|e| ArchiveError::io(path, e))?;
        let file = File::open(&canonical).map_err(|e| ArchiveError::io(&canonical, e))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::zip(&canonical, e))?;

        let mut entries = HashMap::with_capacity(archive.len());
        let mut order = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index(index)
                .map_err(|e| ArchiveError::zip(&canonical, e))?;
            let meta = EntryMeta::from_zip(&file);
            order.push(meta.name.clone());
            entries.insert(meta.name.clone(), meta);
        }

        debug!(archive = %canonical.display(), entries = order.len(), "opened outer archive");

        Ok(Self {
            location: canonical_location(&canonical),
            path: canonical,
            entries,
            order,
            reader: Mutex::new(archive),
            nested: OnceCell::new(),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonical location string addresses must start with
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&EntryMeta> {
        self.entries.get(name)
    }

    /// Whether `name` is a directory: a marker entry exists, or some entry
    /// lives below it
    pub fn is_directory(&self, name: &str) -> bool {
        let prefix = format!("{}/", trim_directory(name));
        if prefix == "/" {
            return false;
        }
        self.entries.get(&prefix).is_some_and(|meta| meta.is_dir)
            || self.order.iter().any(|entry| entry.starts_with(&prefix))
    }

    /// Read and decompress one outer entry
    pub fn read_entry(&self, name: &str) -> ArchiveResult<Option<Vec<u8>>> {
        let mut reader = self.lock_reader();
        read_from(&mut reader, name, &self.path)
    }

    /// The nested-archive index, scanning on first use
    ///
    /// Concurrent first callers block until the one scan completes.
    pub fn nested_index(&self) -> ArchiveResult<&HashMap<String, Arc<NestedArchive>>> {
        self.nested.get_or_try_init(|| self.scan())
    }

    /// Nested archive stored under `entry_name`, if any
    pub fn nested_archive(&self, entry_name: &str) -> ArchiveResult<Option<Arc<NestedArchive>>> {
        Ok(self.nested_index()?.get(entry_name).cloned())
    }

    /// Resolve the first segment of a nested address
    pub fn nested_entry(&self, segment: &str) -> ArchiveResult<Option<NestedEntry>> {
        let is_plain_file = self.entries.get(segment).is_some_and(|meta| !meta.is_dir);
        if is_plain_file && is_archive_name(segment) {
            return Ok(self.nested_archive(segment)?.map(NestedEntry::Archive));
        }
        if (segment.ends_with('/') || !is_plain_file) && self.is_directory(segment) {
            return Ok(Some(NestedEntry::Directory(
                trim_directory(segment).to_string(),
            )));
        }
        Ok(None)
    }

    /// Read `prefix/member` straight from the outer archive
    pub fn read_directory_member(&self, prefix: &str, member: &str) -> ArchiveResult<Option<Vec<u8>>> {
        self.read_entry(&directory_member_name(prefix, member))
    }

    /// Uncompressed length of `prefix/member`, looked up on every call
    pub fn directory_member_length(&self, prefix: &str, member: &str) -> Option<u64> {
        self.entries
            .get(&directory_member_name(prefix, member))
            .filter(|meta| !meta.is_dir)
            .map(|meta| meta.size)
    }

    /// Names below a directory prefix, relative to it
    pub fn directory_members(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", trim_directory(prefix));
        self.order
            .iter()
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Number of nested-archive scans performed so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn scan(&self) -> ArchiveResult<NestedIndex> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let mut index = NestedIndex::new();
        let mut reader = self.lock_reader();

        for name in &self.order {
            let Some(meta) = self.entries.get(name) else {
                continue;
            };
            if meta.is_dir || !is_archive_name(name) {
                continue;
            }

            let Some(bytes) = read_from(&mut reader, name, &self.path)? else {
                continue;
            };
            match NestedArchive::parse(name, Arc::from(bytes), &self.path) {
                Ok(nested) => {
                    debug!(entry = %name, members = nested.len(), "indexed nested archive");
                    index.insert(name.clone(), Arc::new(nested));
                }
                Err(e) => warn!(entry = %name, error = %e, "skipping unreadable nested archive"),
            }
        }

        debug!(archive = %self.path.display(), nested = index.len(), "nested scan complete");
        Ok(index)
    }

    fn lock_reader(&self) -> MutexGuard<'_, ZipArchive<BufReader<File>>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Canonical location string for an already canonicalized path
pub fn canonical_location(path: &Path) -> String {
    path.display().to_string()
}

fn directory_member_name(prefix: &str, member: &str) -> String {
    format!("{}/{}", trim_directory(prefix), member.trim_start_matches('/'))
}

fn read_from<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    path: &Path,
) -> ArchiveResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ArchiveError::zip(path, e)),
    };
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| ArchiveError::io(path.join(name), e))?;
    Ok(Some(bytes))
}
