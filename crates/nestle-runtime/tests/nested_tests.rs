//! Integration tests for archive writing, nested indexing and address resolution

use nestle_runtime::{
    ArchiveWriter, Manifest, NestedEntry, NestedResolver, OuterArchive, Resolution,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

/// Write a single archive holding the given entries
fn write_single(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let mut writer = ArchiveWriter::create(path).unwrap();
    writer.add_manifest(&Manifest::single(None)).unwrap();
    for (name, text) in entries {
        writer.add_bytes(name, text.as_bytes()).unwrap();
    }
    writer.finish().unwrap()
}

/// Composite archive with one nested library and one loose class
fn write_composite(dir: &Path) -> (PathBuf, PathBuf) {
    let lib = write_single(
        &dir.join("lib.jar"),
        &[("a/A.class", "bytes of A"), ("a/Helper.class", "helper")],
    );

    let app = dir.join("app.jar");
    let mut writer = ArchiveWriter::create(&app).unwrap();
    writer.add_directory("BOOT-INF/lib/").unwrap();
    writer.add_directory("BOOT-INF/classes/").unwrap();
    writer
        .add_manifest(&Manifest::composite("app.Main"))
        .unwrap();
    writer.add_archive("BOOT-INF/lib/lib.jar", &lib).unwrap();
    writer
        .add_bytes("BOOT-INF/classes/app/Main.class", b"bytes of Main")
        .unwrap();
    writer.finish().unwrap();
    (app, lib)
}

fn open(path: &Path) -> Arc<OuterArchive> {
    Arc::new(OuterArchive::open(path).unwrap())
}

#[test]
fn test_writer_preserves_insertion_order() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());

    let archive = OuterArchive::open(&app).unwrap();
    let names: Vec<&str> = archive.entry_names().collect();
    assert_eq!(
        names,
        vec![
            "BOOT-INF/lib/",
            "BOOT-INF/classes/",
            "META-INF/MANIFEST.MF",
            "BOOT-INF/lib/lib.jar",
            "BOOT-INF/classes/app/Main.class",
        ]
    );
    assert!(archive.entry("BOOT-INF/lib/").unwrap().is_dir);
    assert_eq!(archive.entry("BOOT-INF/lib/").unwrap().size, 0);
}

#[test]
fn test_add_tree_and_add_file_use_relative_names() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("out");
    fs::create_dir_all(root.join("b")).unwrap();
    fs::create_dir_all(root.join("a")).unwrap();
    fs::write(root.join("b/B.class"), b"B").unwrap();
    fs::write(root.join("a/A.class"), b"A").unwrap();

    let path = temp.path().join("tree.jar");
    let mut writer = ArchiveWriter::create(&path).unwrap();
    assert_eq!(writer.add_tree(&root, "BOOT-INF/classes/").unwrap(), 2);
    writer.add_file(&root, &root.join("a/A.class")).unwrap();
    assert_eq!(writer.entry_count(), 3);
    writer.finish().unwrap();

    let archive = OuterArchive::open(&path).unwrap();
    let names: Vec<&str> = archive.entry_names().collect();
    assert_eq!(
        names,
        vec!["BOOT-INF/classes/a/A.class", "BOOT-INF/classes/b/B.class", "a/A.class"]
    );
    assert_eq!(archive.read_entry("a/A.class").unwrap().unwrap(), b"A");
}

#[test]
fn test_dropped_writer_still_produces_readable_archive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("partial.jar");
    {
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer.add_bytes("a/A.class", b"A").unwrap();
        assert!(writer
            .add_file(temp.path(), &temp.path().join("missing.class"))
            .is_err());
    }

    let archive = OuterArchive::open(&path).unwrap();
    assert_eq!(archive.entry_names().collect::<Vec<_>>(), vec!["a/A.class"]);
}

#[cfg(unix)]
#[test]
fn test_failure_inside_open_entry_leaves_it_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("partial.jar");
    let not_a_file = temp.path().join("d");
    fs::create_dir(&not_a_file).unwrap();
    {
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer.add_bytes("a/A.class", b"A").unwrap();
        // opening a directory succeeds, copying from it does not
        assert!(writer.add_file(temp.path(), &not_a_file).is_err());
    }

    let archive = OuterArchive::open(&path).unwrap();
    assert_eq!(archive.entry_names().collect::<Vec<_>>(), vec!["a/A.class", "d"]);
    assert_eq!(archive.entry("d").unwrap().size, 0);
    assert_eq!(archive.read_entry("a/A.class").unwrap().unwrap(), b"A");
}

#[test]
fn test_nested_archive_bytes_are_verbatim() {
    let temp = TempDir::new().unwrap();
    let (app, lib) = write_composite(temp.path());
    let resolver = NestedResolver::new(open(&app));
    let location = resolver.archive().location().to_string();

    let whole = resolver
        .resolve(&format!("{}!/BOOT-INF/lib/lib.jar", location))
        .unwrap()
        .resource()
        .unwrap();
    let original = fs::read(&lib).unwrap();
    assert_eq!(&*whole.bytes().unwrap(), original.as_slice());
    assert_eq!(whole.content_length().unwrap(), original.len() as u64);
    assert_eq!(
        whole.member_names(),
        vec!["META-INF/MANIFEST.MF", "a/A.class", "a/Helper.class"]
    );
}

#[test]
fn test_member_of_nested_archive() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let resolver = NestedResolver::new(open(&app));
    let location = resolver.archive().location().to_string();

    let resource = resolver
        .resolve(&format!("{}!/BOOT-INF/lib/lib.jar!/a/A.class", location))
        .unwrap()
        .resource()
        .unwrap();
    assert!(resource.exists());
    assert_eq!(resource.content_length().unwrap(), 10);

    let mut text = String::new();
    resource.open().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "bytes of A");
}

#[test]
fn test_directory_case_reads_from_outer_archive() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let archive = open(&app);
    let resolver = NestedResolver::new(archive.clone());
    let location = archive.location().to_string();

    let resource = resolver
        .resolve(&format!("{}!/BOOT-INF/classes!/app/Main.class", location))
        .unwrap()
        .resource()
        .unwrap();
    assert_eq!(&*resource.bytes().unwrap(), b"bytes of Main");
    assert_eq!(resource.content_length().unwrap(), 13);

    let directory = resolver
        .resolve(&format!("{}!/BOOT-INF/classes/", location))
        .unwrap()
        .resource()
        .unwrap();
    assert!(directory.is_directory());
    assert_eq!(directory.content_length().unwrap(), 0);
    assert_eq!(directory.member_names(), vec!["app/Main.class"]);

    // directory reads never need the nested index
    assert_eq!(archive.scan_count(), 0);
}

#[test]
fn test_absent_member_fails_at_read_time() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let resolver = NestedResolver::new(open(&app));
    let location = resolver.archive().location().to_string();

    for address in [
        format!("{}!/BOOT-INF/lib/lib.jar!/a/Missing.class", location),
        format!("{}!/BOOT-INF/classes!/app/Missing.class", location),
    ] {
        let resource = resolver.resolve(&address).unwrap().resource().unwrap();
        assert!(!resource.exists());
        assert!(resource.bytes().unwrap_err().is_not_found());
        assert!(resource.open().is_err());
    }
}

#[test]
fn test_unknown_segment_and_foreign_addresses() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let resolver = NestedResolver::new(open(&app));
    let location = resolver.archive().location().to_string();

    assert!(matches!(
        resolver
            .resolve(&format!("{}!/BOOT-INF/lib/other.jar", location))
            .unwrap(),
        Resolution::NotFound
    ));
    assert!(matches!(
        resolver.resolve("/elsewhere/app.jar!/BOOT-INF/lib/lib.jar").unwrap(),
        Resolution::Unhandled
    ));
    assert!(matches!(
        resolver.resolve(&location).unwrap(),
        Resolution::Unhandled
    ));
}

#[test]
fn test_nested_entry_kinds() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let archive = OuterArchive::open(&app).unwrap();

    assert!(matches!(
        archive.nested_entry("BOOT-INF/lib/lib.jar").unwrap(),
        Some(NestedEntry::Archive(_))
    ));
    assert!(matches!(
        archive.nested_entry("BOOT-INF/classes").unwrap(),
        Some(NestedEntry::Directory(prefix)) if prefix == "BOOT-INF/classes"
    ));
    assert!(archive.nested_entry("META-INF/MANIFEST.MF").unwrap().is_none());

    let nested = archive.nested_archive("BOOT-INF/lib/lib.jar").unwrap().unwrap();
    assert!(nested.member("a/Nope.class").is_none());
    assert_eq!(archive.scan_count(), 1);
}

#[test]
fn test_concurrent_first_requests_scan_once() {
    let temp = TempDir::new().unwrap();
    let (app, _) = write_composite(temp.path());
    let archive = OuterArchive::open(&app).unwrap();

    const THREADS: usize = 8;
    let barrier = Barrier::new(THREADS);
    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                let nested = archive
                    .nested_archive("BOOT-INF/lib/lib.jar")
                    .unwrap()
                    .unwrap();
                assert_eq!(&*nested.member("a/A.class").unwrap(), b"bytes of A");
            });
        }
    });

    assert_eq!(archive.scan_count(), 1);
}
