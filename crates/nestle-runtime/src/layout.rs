//! Archive layout conventions
//!
//! Composite archives carry two fixed virtual directories: one holding inner
//! single archives verbatim and one holding loose compiled units. Both the
//! writer and the nested index depend on these names matching exactly.

/// Suffix of archive files, including nested ones
pub const ARCHIVE_SUFFIX: &str = ".jar";

/// Suffix of compiled-unit entries
pub const UNIT_SUFFIX: &str = ".class";

/// Separator between qualifiers in a qualified name
pub const QUALIFIER_SEPARATOR: char = '.';

/// Virtual directory holding nested single archives
pub const NESTED_LIB_PREFIX: &str = "BOOT-INF/lib/";

/// Virtual directory holding loose compiled units of a composite archive
pub const NESTED_CLASSES_PREFIX: &str = "BOOT-INF/classes/";

/// Location of the manifest inside an archive
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Entry point written into composite archives; it hands control to the
/// unit named by the `Start-Class` attribute
pub const TRAMPOLINE_ENTRY_POINT: &str = "nestle.launch.Trampoline";

/// Entry name of the compiled unit for a qualified name
///
/// `com.example.Main` becomes `com/example/Main.class`.
pub fn unit_entry_name(qualified_name: &str) -> String {
    let mut name = qualified_name.replace(QUALIFIER_SEPARATOR, "/");
    name.push_str(UNIT_SUFFIX);
    name
}

/// Qualified name for a compiled-unit entry name, if it is one
pub fn qualified_name_of(entry_name: &str) -> Option<String> {
    let stem = entry_name.strip_suffix(UNIT_SUFFIX)?;
    if stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    Some(stem.replace('/', &QUALIFIER_SEPARATOR.to_string()))
}

/// Whether an entry name denotes an archive
pub fn is_archive_name(entry_name: &str) -> bool {
    !entry_name.ends_with('/') && entry_name.ends_with(ARCHIVE_SUFFIX)
}

/// Whether an entry lives directly in the nested-libraries directory
pub fn is_nested_library(entry_name: &str) -> bool {
    match entry_name.strip_prefix(NESTED_LIB_PREFIX) {
        Some(rest) => !rest.contains('/') && is_archive_name(rest),
        None => false,
    }
}

/// Strip one trailing slash from a directory name
pub fn trim_directory(name: &str) -> &str {
    name.strip_suffix('/').unwrap_or(name)
}
