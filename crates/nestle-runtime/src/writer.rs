//! Archive writer
//!
//! Streams files and directory markers into a new archive in caller order.
//! The underlying zip stream is finalized on drop, so an early return after
//! a failed write never leaves an entry open.

use crate::error::{ArchiveError, ArchiveResult};
use crate::layout::MANIFEST_PATH;
use crate::manifest::Manifest;
use chrono::{DateTime as ChronoDateTime, Datelike, Local, Timelike};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub struct ArchiveWriter {
    path: PathBuf,
    zip: Option<ZipWriter<BufWriter<File>>>,
    entries: usize,
    names: HashSet<String>,
}

impl ArchiveWriter {
    /// Create the archive file, truncating any existing one
    pub fn create(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| ArchiveError::io(&path, e))?;
        Ok(Self {
            zip: Some(ZipWriter::new(BufWriter::new(file))),
            path,
            entries: 0,
            names: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Add `file` under its path relative to `root`
    pub fn add_file(&mut self, root: &Path, file: &Path) -> ArchiveResult<()> {
        let name = relative_entry_name(root, file)?;
        self.add_file_as(|_| name, file)
    }

    /// Add `file` under a name computed by the caller
    pub fn add_file_as<F>(&mut self, name: F, file: &Path) -> ArchiveResult<()>
    where
        F: FnOnce(&Path) -> String,
    {
        let name = name(file);
        let metadata = fs::metadata(file).map_err(|e| ArchiveError::io(file, e))?;
        let options = deflated().last_modified_time(zip_time(metadata.modified().ok()));

        let mut source = File::open(file).map_err(|e| ArchiveError::io(file, e))?;
        self.start_entry(&name, options)?;
        let zip = self.stream()?;
        io::copy(&mut source, zip).map_err(|e| ArchiveError::io(file, e))?;
        Ok(())
    }

    /// Add an in-memory entry
    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> ArchiveResult<()> {
        let options = deflated().last_modified_time(zip_time(Some(SystemTime::now())));
        self.start_entry(name, options)?;
        let path = self.path.clone();
        self.stream()?
            .write_all(bytes)
            .map_err(|e| ArchiveError::io(path, e))
    }

    /// Copy another archive in verbatim, uncompressed
    ///
    /// Storing rather than deflating keeps the nested bytes identical to the
    /// source file.
    pub fn add_archive(&mut self, name: &str, archive: &Path) -> ArchiveResult<()> {
        let metadata = fs::metadata(archive).map_err(|e| ArchiveError::io(archive, e))?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(metadata.len() >= u32::MAX as u64)
            .last_modified_time(zip_time(metadata.modified().ok()));

        let mut source = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
        self.start_entry(name, options)?;
        io::copy(&mut source, self.stream()?).map_err(|e| ArchiveError::io(archive, e))?;
        Ok(())
    }

    /// Write a zero-length directory marker
    pub fn add_directory(&mut self, name: &str) -> ArchiveResult<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.claim(&name)?;
        let path = self.path.clone();
        self.stream()?
            .add_directory(name.clone(), FileOptions::default())
            .map_err(|e| ArchiveError::zip(path, e))?;
        self.entries += 1;
        debug!(archive = %self.path.display(), entry = %name, "directory marker");
        Ok(())
    }

    pub fn add_manifest(&mut self, manifest: &Manifest) -> ArchiveResult<()> {
        self.add_bytes(MANIFEST_PATH, &manifest.to_bytes())
    }

    /// Add every file under `root`, named `prefix` + relative path
    ///
    /// Files are visited in file-name order so archives are reproducible.
    pub fn add_tree(&mut self, root: &Path, prefix: &str) -> ArchiveResult<usize> {
        let mut added = 0;
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                ArchiveError::io(path, io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_entry_name(root, entry.path())?;
            self.add_file_as(|_| format!("{}{}", prefix, relative), entry.path())?;
            added += 1;
        }
        Ok(added)
    }

    /// Finalize the central directory and close the file
    pub fn finish(mut self) -> ArchiveResult<PathBuf> {
        if let Some(mut zip) = self.zip.take() {
            let mut inner = zip
                .finish()
                .map_err(|e| ArchiveError::zip(&self.path, e))?;
            inner.flush().map_err(|e| ArchiveError::io(&self.path, e))?;
        }
        Ok(self.path.clone())
    }

    fn start_entry(&mut self, name: &str, options: FileOptions) -> ArchiveResult<()> {
        if name.is_empty() || name.starts_with('/') {
            return Err(ArchiveError::InvalidEntryName(name.to_string()));
        }
        self.claim(name)?;
        let path = self.path.clone();
        self.stream()?
            .start_file(name, options)
            .map_err(|e| ArchiveError::zip(path, e))?;
        self.entries += 1;
        debug!(archive = %self.path.display(), entry = %name, "file entry");
        Ok(())
    }

    /// Reserve an entry name; each name may be written once
    fn claim(&mut self, name: &str) -> ArchiveResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    fn stream(&mut self) -> ArchiveResult<&mut ZipWriter<BufWriter<File>>> {
        let path = &self.path;
        self.zip.as_mut().ok_or_else(|| {
            ArchiveError::io(
                path,
                io::Error::new(io::ErrorKind::BrokenPipe, "archive already finished"),
            )
        })
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if let Some(mut zip) = self.zip.take() {
            if let Err(e) = zip.finish() {
                debug!(archive = %self.path.display(), error = %e, "finalizing abandoned archive failed");
            }
        }
    }
}

fn deflated() -> FileOptions {
    FileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Entry name of `file` relative to `root`, with forward slashes
fn relative_entry_name(root: &Path, file: &Path) -> ArchiveResult<String> {
    let relative = file
        .strip_prefix(root)
        .map_err(|_| ArchiveError::InvalidEntryName(file.display().to_string()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(ArchiveError::InvalidEntryName(file.display().to_string())),
        }
    }

    if parts.is_empty() {
        return Err(ArchiveError::InvalidEntryName(file.display().to_string()));
    }
    Ok(parts.join("/"))
}

/// Convert a file time to the archive's DOS timestamp, in local time
fn zip_time(time: Option<SystemTime>) -> DateTime {
    let Some(time) = time else {
        return DateTime::default();
    };
    let local: ChronoDateTime<Local> = time.into();
    u16::try_from(local.year())
        .ok()
        .and_then(|year| {
            DateTime::from_date_and_time(
                year,
                local.month() as u8,
                local.day() as u8,
                local.hour() as u8,
                local.minute() as u8,
                local.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}
