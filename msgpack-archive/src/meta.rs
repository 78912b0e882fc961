//! Protocol bookkeeping values and the table deciding what reaches the wire.
//!
//! Object graphs emit version numbers, object ids, class ids and tracking flags
//! alongside real data. None of them are needed to rebuild values from this
//! format, so by default both archives drop them. [`MetadataKind::elision`] is
//! the single decision point: the output archive writes a payload exactly when
//! the input archive reads one.

use std::fmt;

#[cfg(feature = "reader")]
use crate::de::InputArchive;
#[cfg(feature = "reader")]
use crate::error::DecodeError;
#[cfg(feature = "writer")]
use crate::error::EncodeError;
#[cfg(feature = "writer")]
use crate::ser::{OutputArchive, Save};

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MetadataKind {
    Version,
    ObjectId,
    ObjectReference,
    ClassId,
    ClassIdOptional,
    ClassIdReference,
    ClassName,
    Tracking,
    ItemVersion,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 9] = [
        MetadataKind::Version,
        MetadataKind::ObjectId,
        MetadataKind::ObjectReference,
        MetadataKind::ClassId,
        MetadataKind::ClassIdOptional,
        MetadataKind::ClassIdReference,
        MetadataKind::ClassName,
        MetadataKind::Tracking,
        MetadataKind::ItemVersion,
    ];

    pub(crate) const fn bit(self) -> u16 {
        1 << self as u8
    }

    /// Whether values of this kind are dropped or carried under `options`.
    pub fn elision(self, options: &ArchiveOptions) -> Elision {
        if options.carried & self.bit() != 0 {
            Elision::Carry
        } else {
            Elision::Elide
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MetadataKind::*;

        let s = match self {
            Version => "version",
            ObjectId => "object id",
            ObjectReference => "object reference",
            ClassId => "class id",
            ClassIdOptional => "optional class id",
            ClassIdReference => "class id reference",
            ClassName => "class name",
            Tracking => "tracking flag",
            ItemVersion => "item version",
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// What both archives do with one kind of metadata.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Elision {
    /// Nothing is written and nothing is read.
    Elide,
    /// The payload is written as one scalar token and read back as one.
    Carry,
}

/// A metadata value together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    Version(u32),
    ObjectId(u32),
    ObjectReference(u32),
    ClassId(i16),
    ClassIdOptional(i16),
    ClassIdReference(i16),
    ClassName(String),
    Tracking(bool),
    ItemVersion(u32),
}

impl Metadata {
    pub fn kind(&self) -> MetadataKind {
        match self {
            Metadata::Version(_) => MetadataKind::Version,
            Metadata::ObjectId(_) => MetadataKind::ObjectId,
            Metadata::ObjectReference(_) => MetadataKind::ObjectReference,
            Metadata::ClassId(_) => MetadataKind::ClassId,
            Metadata::ClassIdOptional(_) => MetadataKind::ClassIdOptional,
            Metadata::ClassIdReference(_) => MetadataKind::ClassIdReference,
            Metadata::ClassName(_) => MetadataKind::ClassName,
            Metadata::Tracking(_) => MetadataKind::Tracking,
            Metadata::ItemVersion(_) => MetadataKind::ItemVersion,
        }
    }

    #[cfg(feature = "reader")]
    pub(crate) fn load_payload(
        kind: MetadataKind,
        ar: &mut InputArchive,
    ) -> Result<Metadata, DecodeError> {
        Ok(match kind {
            MetadataKind::Version => Metadata::Version(ar.load()?),
            MetadataKind::ObjectId => Metadata::ObjectId(ar.load()?),
            MetadataKind::ObjectReference => Metadata::ObjectReference(ar.load()?),
            MetadataKind::ClassId => Metadata::ClassId(ar.load()?),
            MetadataKind::ClassIdOptional => Metadata::ClassIdOptional(ar.load()?),
            MetadataKind::ClassIdReference => Metadata::ClassIdReference(ar.load()?),
            MetadataKind::ClassName => Metadata::ClassName(ar.load()?),
            MetadataKind::Tracking => Metadata::Tracking(ar.load()?),
            MetadataKind::ItemVersion => Metadata::ItemVersion(ar.load()?),
        })
    }
}

#[cfg(feature = "writer")]
impl Save for Metadata {
    fn save<W: std::io::Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        let kind = self.kind();
        if kind.elision(ar.options()) == Elision::Elide {
            tracing::debug!(%kind, "metadata elided on write");
            return Ok(());
        }

        match self {
            Metadata::Version(v)
            | Metadata::ObjectId(v)
            | Metadata::ObjectReference(v)
            | Metadata::ItemVersion(v) => ar.save(v),
            Metadata::ClassId(id)
            | Metadata::ClassIdOptional(id)
            | Metadata::ClassIdReference(id) => ar.save(id),
            Metadata::ClassName(name) => ar.save(name.as_str()),
            Metadata::Tracking(flag) => ar.save(flag),
        }
    }
}

/// What `load_binary` does when a stored raw block is larger than the
/// destination.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum RawBlockPolicy {
    /// Fail with a bounds error and copy nothing.
    #[default]
    Reject,
    /// Copy as much as fits and report the stored size.
    Truncate,
}

/// Options shared by an output archive and the input archive that reads its
/// bytes back. Both sides must agree on the carried metadata kinds.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ArchiveOptions {
    carried: u16,
    pub raw_block_policy: RawBlockPolicy,
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write and read `kind` as a real token instead of dropping it.
    pub fn carry(mut self, kind: MetadataKind) -> Self {
        self.carried |= kind.bit();
        self
    }

    pub fn with_raw_block_policy(mut self, policy: RawBlockPolicy) -> Self {
        self.raw_block_policy = policy;
        self
    }

    /// Shorthand for `kind.elision(self) == Elision::Carry`.
    pub fn is_carried(&self, kind: MetadataKind) -> bool {
        kind.elision(self) == Elision::Carry
    }
}
