//! Container header: magic, version tags, and the fixed header fields.
//!
//! Three header versions are recognized.  They share every field name and
//! ordering; only the serialized widths of `unk1` and `unk5` differ, so the
//! in-memory header holds each at its widest and the [`HeaderVersion`] tag
//! supplies the width at (de)serialization time.  None of the `unk*` fields
//! have documented semantics — they are carried through untouched.

use serde::{Deserialize, Serialize};

use crate::container::ParserError;

/// File magic: `T P D C`.
pub const MAGIC: [u8; 4] = *b"TPDC";

/// Recognized `header_version` values and the field widths they imply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum HeaderVersion {
    /// 0x0100 — 2-byte `unk1`, 4-byte `unk5`.
    V1,
    /// 0x0200 — 4-byte `unk1`, 4-byte `unk5`.
    V2,
    /// 0x0300 — 4-byte `unk1`, 8-byte `unk5`.
    V3,
}

impl HeaderVersion {
    /// Map an on-wire version value to a tag.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x0100 => Some(HeaderVersion::V1),
            0x0200 => Some(HeaderVersion::V2),
            0x0300 => Some(HeaderVersion::V3),
            _ => None,
        }
    }

    /// The on-wire version value.
    pub fn raw(self) -> u16 {
        match self {
            HeaderVersion::V1 => 0x0100,
            HeaderVersion::V2 => 0x0200,
            HeaderVersion::V3 => 0x0300,
        }
    }

    /// Serialized width of `unk1` in bytes.
    pub fn unk1_width(self) -> usize {
        match self {
            HeaderVersion::V1 => 2,
            HeaderVersion::V2 | HeaderVersion::V3 => 4,
        }
    }

    /// Serialized width of `unk5` in bytes.
    pub fn unk5_width(self) -> usize {
        match self {
            HeaderVersion::V1 | HeaderVersion::V2 => 4,
            HeaderVersion::V3 => 8,
        }
    }

    /// Size of the fixed header counted from file offset 0, excluding the
    /// variable `thing` array: magic (4) + version (2) + data offset (4) +
    /// the fixed fields.
    pub fn fixed_header_len(self) -> usize {
        28 + self.unk1_width() + self.unk5_width()
    }
}

impl From<HeaderVersion> for u16 {
    fn from(version: HeaderVersion) -> u16 {
        version.raw()
    }
}

impl TryFrom<u16> for HeaderVersion {
    type Error = ParserError;

    fn try_from(raw: u16) -> Result<Self, ParserError> {
        HeaderVersion::from_raw(raw).ok_or(ParserError::UnsupportedVersion { version: raw })
    }
}

/// One `(lower, upper)` entry of the header's `thing` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingRange {
    pub lower: u16,
    pub upper: u16,
}

/// The fixed header fields, width-normalized.
///
/// `num_thing` is not stored; it is the length of [`TdcHeader::thing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdcHeader {
    pub unk0: u16,
    pub unk1: u32,
    /// Unix seconds at which the capture was saved.
    pub capture_save_time: u32,
    pub data_version: u16,
    pub unk3: u32,
    pub unk4: u32,
    pub unk5: u64,
    pub thing: Vec<ThingRange>,
}
