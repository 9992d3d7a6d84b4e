//! Archive inspection commands: cat, ls, find

use anyhow::{bail, Context, Result};
use nestle_runtime::{
    FatArchiveResolver, NestedAddress, NestedResolver, OuterArchive, Resolution, UnitLoader,
};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Write the contents at `address` to stdout
///
/// Whole directories print their member names instead of bytes.
pub fn cat(address: &str) -> Result<()> {
    let parsed = NestedAddress::parse(address)?;
    let archive = Arc::new(
        OuterArchive::open(parsed.outer())
            .with_context(|| format!("Failed to open {}", parsed.outer()))?,
    );

    // the outer part may be any spelling of the path; the resolver wants its own
    let mut canonical = NestedAddress::new(archive.location(), parsed.segment());
    if let Some(member) = parsed.member() {
        canonical = canonical.with_member(member);
    }

    let resolver = NestedResolver::new(archive);
    let resource = match resolver.resolve_address(&canonical)? {
        Resolution::Resolved(resource) => resource,
        Resolution::NotFound | Resolution::Unhandled => bail!("Nothing at {}", address),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if resource.is_directory() {
        for name in resource.member_names() {
            writeln!(out, "{}", name)?;
        }
    } else {
        let mut reader = resource.open()?;
        io::copy(&mut reader, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

/// List outer entries, each nested archive followed by its members
pub fn ls(path: &Path) -> Result<()> {
    let archive = OuterArchive::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let nested = archive.nested_index()?;

    for name in archive.entry_names() {
        let size = archive.entry(name).map(|meta| meta.size).unwrap_or(0);
        println!("{:>10}  {}", size, name);
        if let Some(inner) = nested.get(name) {
            for member in inner.member_names() {
                let size = inner.member_meta(member).map(|meta| meta.size).unwrap_or(0);
                println!("{:>10}    {}", size, member);
            }
        }
    }
    Ok(())
}

/// Resolve `name` the way a fat-archive launch would
pub fn find(path: &Path, name: &str) -> Result<()> {
    let resolver = FatArchiveResolver::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let loader = UnitLoader::new(resolver);
    let unit = loader.load(name)?;
    println!("{}  {} bytes", unit.code_source, unit.bytes.len());
    Ok(())
}
