//! Manifest attribute block
//!
//! Only the main section is modelled. Attribute names compare
//! case-insensitively and keep insertion order when written.

use crate::error::{ArchiveError, ArchiveResult};
use crate::layout::{NESTED_CLASSES_PREFIX, NESTED_LIB_PREFIX, TRAMPOLINE_ENTRY_POINT};

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const MAIN_CLASS: &str = "Main-Class";
/// Real entry point of a composite archive
pub const START_CLASS: &str = "Start-Class";
pub const NESTLE_LIB: &str = "Nestle-Lib";
pub const NESTLE_CLASSES: &str = "Nestle-Classes";

/// Maximum line length in bytes, excluding the line break
const MAX_LINE_BYTES: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// Create a manifest carrying only the version attribute
    pub fn new() -> Self {
        let mut manifest = Self {
            attributes: Vec::new(),
        };
        manifest.set(MANIFEST_VERSION, "1.0");
        manifest
    }

    /// Manifest for a single archive, optionally naming its entry point
    pub fn single(entry_point: Option<&str>) -> Self {
        let mut manifest = Self::new();
        if let Some(entry_point) = entry_point {
            manifest.set(MAIN_CLASS, entry_point);
        }
        manifest
    }

    /// Manifest for a composite archive
    ///
    /// `Main-Class` names the trampoline; `Start-Class` names the unit the
    /// trampoline hands control to.
    pub fn composite(entry_point: &str) -> Self {
        let mut manifest = Self::new();
        manifest.set(MAIN_CLASS, TRAMPOLINE_ENTRY_POINT);
        manifest.set(START_CLASS, entry_point);
        manifest.set(NESTLE_CLASSES, NESTED_CLASSES_PREFIX);
        manifest.set(NESTLE_LIB, NESTED_LIB_PREFIX);
        manifest
    }

    /// Set an attribute, replacing any existing value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The real entry point of a composite archive
    pub fn start_class(&self) -> Option<&str> {
        self.get(START_CLASS)
    }

    pub fn main_class(&self) -> Option<&str> {
        self.get(MAIN_CLASS)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Serialize to the wrapped `Name: value` form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, value) in &self.attributes {
            write_wrapped(&mut out, &format!("{}: {}", name, value));
        }
        out.push_str("\r\n");
        out.into_bytes()
    }

    /// Parse the main section of a manifest
    pub fn parse(bytes: &[u8]) -> ArchiveResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ArchiveError::InvalidManifest(format!("not UTF-8: {}", e)))?;

        let mut attributes: Vec<(String, String)> = Vec::new();
        for (index, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                match attributes.last_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(ArchiveError::InvalidManifest(format!(
                            "line {} continues nothing",
                            index + 1
                        )))
                    }
                }
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| {
                ArchiveError::InvalidManifest(format!("line {} has no ':'", index + 1))
            })?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            attributes.push((name.trim().to_string(), value.to_string()));
        }

        Ok(Self { attributes })
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Append one logical line, wrapping at `MAX_LINE_BYTES`
fn write_wrapped(out: &mut String, line: &str) {
    let mut budget = MAX_LINE_BYTES;
    let mut used = 0;
    for ch in line.chars() {
        if used + ch.len_utf8() > budget {
            out.push_str("\r\n ");
            // continuation lines spend one byte on the leading space
            budget = MAX_LINE_BYTES - 1;
            used = 0;
        }
        out.push(ch);
        used += ch.len_utf8();
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest_has_version() {
        let manifest = Manifest::new();
        assert_eq!(manifest.get("Manifest-Version"), Some("1.0"));
        assert_eq!(manifest.main_class(), None);
    }

    #[test]
    fn test_composite_manifest_attributes() {
        let manifest = Manifest::composite("com.example.Main");
        assert_eq!(manifest.main_class(), Some(TRAMPOLINE_ENTRY_POINT));
        assert_eq!(manifest.start_class(), Some("com.example.Main"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut manifest = Manifest::new();
        manifest.set("start-class", "A");
        manifest.set("Start-Class", "B");
        assert_eq!(manifest.start_class(), Some("B"));
        assert_eq!(manifest.attributes().count(), 2);
    }

    #[test]
    fn test_long_values_wrap_and_parse_back() {
        let long = format!("com.example.{}", "deeply.nested.package.".repeat(8));
        let mut manifest = Manifest::new();
        manifest.set(START_CLASS, long.clone());

        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.lines().all(|l| l.trim_end_matches('\r').len() <= 72));

        let parsed = Manifest::parse(&bytes).unwrap();
        assert_eq!(parsed.start_class(), Some(long.as_str()));
    }

    #[test]
    fn test_parse_stops_at_first_section() {
        let text = "Manifest-Version: 1.0\r\nMain-Class: A\r\n\r\nName: a/B.class\r\nX: y\r\n";
        let parsed = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(parsed.main_class(), Some("A"));
        assert_eq!(parsed.get("Name"), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Manifest::parse(b"no colon here\n").is_err());
        assert!(Manifest::parse(b" orphan continuation\n").is_err());
    }
}
