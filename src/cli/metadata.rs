//! The `metadata.json` sidecar written by `unpack` and consumed by `pack`.
//!
//! The sidecar carries everything needed to reproduce the container header:
//! the raw header version, the data offset, and the header fields themselves
//! (opaque values included).  `num_thing` is implied by the `thing` array.

use std::fs;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::container::{TdcFile, TdcHeader};

/// Sidecar file name inside an unpacked directory.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub header_version: u16,
    pub data_offset: u32,
    pub header: TdcHeader,
}

impl Metadata {
    pub fn from_container(file: &TdcFile) -> Self {
        Metadata {
            header_version: file.header_version.raw(),
            data_offset: file.data_offset,
            header: file.header.clone(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read \"{}\"", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse \"{}\"", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize metadata")?;
        fs::write(path, text).with_context(|| format!("failed to write \"{}\"", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ThingRange;

    #[test]
    fn json_round_trip() {
        let metadata = Metadata {
            header_version: 0x0200,
            data_offset: 0x80,
            header: TdcHeader {
                unk0: 1,
                unk1: 2,
                capture_save_time: 1_700_000_000,
                data_version: 0x010A,
                unk3: 3,
                unk4: 4,
                unk5: 5,
                thing: vec![ThingRange { lower: 6, upper: 7 }],
            },
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn schema_field_names() {
        let metadata = Metadata {
            header_version: 0x0100,
            data_offset: 0x40,
            header: TdcHeader::default(),
        };
        let value: serde_json::Value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["header_version"], 256);
        assert_eq!(value["data_offset"], 64);
        assert!(value["header"]["capture_save_time"].is_number());
        assert!(value["header"]["thing"].is_array());
    }
}
