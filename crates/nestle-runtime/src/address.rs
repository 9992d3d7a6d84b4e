//! Nested addresses: `outer!/segment[!/segment]`
//!
//! The first segment names a nested archive or a directory prefix inside the
//! outer archive; the optional second segment names a member of it. A member
//! that does not exist still resolves to a resource, which fails with
//! not-found when read.

use crate::error::{ArchiveError, ArchiveResult};
use crate::nested::{NestedEntry, OuterArchive};
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Delimiter between the outer location and each nested segment
pub const SEGMENT_SEPARATOR: &str = "!/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address '{0}' has no nested segment")]
    MissingSeparator(String),

    #[error("address '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("address '{address}' has {count} nested segments, at most 2 are allowed")]
    TooManySegments { address: String, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedAddress {
    outer: String,
    segment: String,
    member: Option<String>,
}

impl NestedAddress {
    pub fn new(outer: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            outer: outer.into(),
            segment: segment.into(),
            member: None,
        }
    }

    /// Copy of this address pointing at `member` inside its segment
    pub fn with_member(&self, member: impl Into<String>) -> Self {
        Self {
            member: Some(member.into()),
            ..self.clone()
        }
    }

    pub fn parse(address: &str) -> Result<Self, AddressParseError> {
        let parts: Vec<&str> = address.split(SEGMENT_SEPARATOR).collect();
        match parts.as_slice() {
            [_] => Err(AddressParseError::MissingSeparator(address.to_string())),
            parts if parts.iter().any(|part| part.is_empty()) => {
                Err(AddressParseError::EmptySegment(address.to_string()))
            }
            [outer, segment] => Ok(Self::new(*outer, *segment)),
            [outer, segment, member] => Ok(Self::new(*outer, *segment).with_member(*member)),
            parts => Err(AddressParseError::TooManySegments {
                address: address.to_string(),
                count: parts.len() - 1,
            }),
        }
    }

    pub fn outer(&self) -> &str {
        &self.outer
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }
}

impl fmt::Display for NestedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.outer, SEGMENT_SEPARATOR, self.segment)?;
        if let Some(member) = &self.member {
            write!(f, "{}{}", SEGMENT_SEPARATOR, member)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for NestedAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Outcome of resolving an address against one outer archive
#[derive(Debug)]
pub enum Resolution {
    Resolved(NestedResource),
    /// The first segment names nothing in the outer archive
    NotFound,
    /// Malformed, or addressed to a different outer archive
    Unhandled,
}

impl Resolution {
    pub fn resource(self) -> Option<NestedResource> {
        match self {
            Self::Resolved(resource) => Some(resource),
            Self::NotFound | Self::Unhandled => None,
        }
    }
}

/// Resolves addresses whose outer location is one particular archive
#[derive(Debug, Clone)]
pub struct NestedResolver {
    archive: Arc<OuterArchive>,
}

impl NestedResolver {
    pub fn new(archive: Arc<OuterArchive>) -> Self {
        Self { archive }
    }

    pub fn archive(&self) -> &Arc<OuterArchive> {
        &self.archive
    }

    /// Parse and resolve an address string
    pub fn resolve(&self, address: &str) -> ArchiveResult<Resolution> {
        match NestedAddress::parse(address) {
            Ok(parsed) => self.resolve_address(&parsed),
            Err(e) => {
                debug!(error = %e, "unhandled address");
                Ok(Resolution::Unhandled)
            }
        }
    }

    pub fn resolve_address(&self, address: &NestedAddress) -> ArchiveResult<Resolution> {
        if address.outer() != self.archive.location() {
            debug!(%address, expected = self.archive.location(), "address for another archive");
            return Ok(Resolution::Unhandled);
        }

        let Some(target) = self.archive.nested_entry(address.segment())? else {
            return Ok(Resolution::NotFound);
        };

        Ok(Resolution::Resolved(NestedResource {
            address: address.to_string(),
            archive: self.archive.clone(),
            target,
            member: address.member().map(str::to_string),
        }))
    }
}

/// A readable handle produced by [`NestedResolver`]
#[derive(Debug, Clone)]
pub struct NestedResource {
    address: String,
    archive: Arc<OuterArchive>,
    target: NestedEntry,
    member: Option<String>,
}

impl NestedResource {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_directory(&self) -> bool {
        self.member.is_none() && matches!(self.target, NestedEntry::Directory(_))
    }

    /// Whether reading will succeed
    pub fn exists(&self) -> bool {
        match (&self.target, &self.member) {
            (_, None) => true,
            (NestedEntry::Archive(nested), Some(member)) => nested.contains(member),
            (NestedEntry::Directory(prefix), Some(member)) => {
                self.archive.directory_member_length(prefix, member).is_some()
            }
        }
    }

    /// Uncompressed length; whole directories report zero
    pub fn content_length(&self) -> ArchiveResult<u64> {
        match (&self.target, &self.member) {
            (NestedEntry::Archive(nested), None) => Ok(nested.raw_bytes().len() as u64),
            (NestedEntry::Directory(_), None) => Ok(0),
            (NestedEntry::Archive(nested), Some(member)) => nested
                .member_meta(member)
                .map(|meta| meta.size)
                .ok_or_else(|| ArchiveError::not_found(&self.address)),
            (NestedEntry::Directory(prefix), Some(member)) => self
                .archive
                .directory_member_length(prefix, member)
                .ok_or_else(|| ArchiveError::not_found(&self.address)),
        }
    }

    /// Full contents
    pub fn bytes(&self) -> ArchiveResult<Arc<[u8]>> {
        match (&self.target, &self.member) {
            (NestedEntry::Archive(nested), None) => Ok(nested.raw_bytes()),
            (NestedEntry::Directory(_), None) => Ok(Arc::from(Vec::new())),
            (NestedEntry::Archive(nested), Some(member)) => nested
                .member(member)
                .ok_or_else(|| ArchiveError::not_found(&self.address)),
            (NestedEntry::Directory(prefix), Some(member)) => self
                .archive
                .read_directory_member(prefix, member)?
                .map(Arc::from)
                .ok_or_else(|| ArchiveError::not_found(&self.address)),
        }
    }

    /// Open a stream over the contents
    pub fn open(&self) -> ArchiveResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes()?)))
    }

    /// Names inside a whole-archive or whole-directory handle
    pub fn member_names(&self) -> Vec<String> {
        if self.member.is_some() {
            return Vec::new();
        }
        match &self.target {
            NestedEntry::Archive(nested) => nested.member_names().map(str::to_string).collect(),
            NestedEntry::Directory(prefix) => self.archive.directory_members(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_two_segments() {
        let address = NestedAddress::parse("/w/app.jar!/BOOT-INF/lib/lib.jar!/A.class").unwrap();
        assert_eq!(address.outer(), "/w/app.jar");
        assert_eq!(address.segment(), "BOOT-INF/lib/lib.jar");
        assert_eq!(address.member(), Some("A.class"));
        assert_eq!(
            address.to_string(),
            "/w/app.jar!/BOOT-INF/lib/lib.jar!/A.class"
        );
    }

    #[test]
    fn test_with_member_keeps_segment() {
        let base = NestedAddress::new("/w/app.jar", "BOOT-INF/classes");
        let member = base.with_member("a/B.class");
        assert_eq!(member.segment(), "BOOT-INF/classes");
        assert_eq!(base.member(), None);
    }

    #[rstest]
    #[case("/w/app.jar")]
    #[case("/w/app.jar!/")]
    #[case("!/lib.jar")]
    #[case("/w/app.jar!/lib.jar!/")]
    #[case("/w/app.jar!/a.jar!/b.jar!/C.class")]
    fn test_malformed_addresses(#[case] address: &str) {
        assert!(NestedAddress::parse(address).is_err());
    }

    #[test]
    fn test_too_many_segments_counts_them() {
        let err = NestedAddress::parse("o!/a!/b!/c").unwrap_err();
        assert_eq!(
            err,
            AddressParseError::TooManySegments {
                address: "o!/a!/b!/c".to_string(),
                count: 3,
            }
        );
    }
}
