//! The TDC container: a versioned `TPDC` header followed by block records.
//!
//! A record is `{len_field: u32 LE, crc32: u32 LE, body}` where the upper 24
//! bits of `len_field` give the compressed body length and the CRC covers the
//! *decompressed* payload.  End of file terminates the record sequence.

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::block::{self, DecompressionError};
use crate::crc32::crc32;

pub mod header;
pub mod read;
pub mod write;

pub use header::{HeaderVersion, TdcHeader, ThingRange, MAGIC};
pub use read::read_container;
pub use write::{write_container, write_header, write_records};

/// Container-level framing errors.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The file does not start with `TPDC`.
    #[error("bad magic {found:02x?}: not a TPDC container")]
    BadMagic { found: [u8; 4] },
    /// The header version is not one of the recognized values.
    #[error("unsupported header version {version:#06x}")]
    UnsupportedVersion { version: u16 },
    /// The fixed header extends past `data_offset` (negative padding).
    #[error("header ends at offset {header_end}, past the data offset {data_offset:#x}")]
    HeaderOverrun { header_end: usize, data_offset: u32 },
    /// The input ended inside the header region.
    #[error("container data incomplete at offset {offset}: requested {requested}, but only {remaining} remaining")]
    Truncated {
        offset: usize,
        requested: usize,
        remaining: usize,
    },
    /// The input ended inside a block record.
    #[error("truncated block record at offset {offset}: requested {requested}, but only {remaining} remaining")]
    TruncatedRecord {
        offset: usize,
        requested: usize,
        remaining: usize,
    },
    /// A decompressed payload does not hash to its stored CRC.
    #[error("block {index}: CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        index: usize,
        stored: u32,
        computed: u32,
    },
    /// A compressed body is too large for the 24-bit length field.
    #[error("block {index}: compressed body of {len} bytes does not fit the 24-bit length field")]
    BlockTooLarge { index: usize, len: usize },
    /// A header field value does not fit its serialized width.
    #[error("header field {field} value {value:#x} does not fit in {width} bytes")]
    FieldWidth {
        field: &'static str,
        value: u64,
        width: usize,
    },
    /// A block failed to decompress.
    #[error("block {index}: {source}")]
    Block {
        index: usize,
        #[source]
        source: DecompressionError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Manual impl because the `Io` variant's source is not comparable; two I/O
// errors never compare equal.
impl PartialEq for ParserError {
    fn eq(&self, other: &Self) -> bool {
        use ParserError::*;
        match (self, other) {
            (BadMagic { found: a }, BadMagic { found: b }) => a == b,
            (UnsupportedVersion { version: a }, UnsupportedVersion { version: b }) => a == b,
            (
                HeaderOverrun { header_end: a1, data_offset: a2 },
                HeaderOverrun { header_end: b1, data_offset: b2 },
            ) => (a1, a2) == (b1, b2),
            (
                Truncated { offset: a1, requested: a2, remaining: a3 },
                Truncated { offset: b1, requested: b2, remaining: b3 },
            )
            | (
                TruncatedRecord { offset: a1, requested: a2, remaining: a3 },
                TruncatedRecord { offset: b1, requested: b2, remaining: b3 },
            ) => (a1, a2, a3) == (b1, b2, b3),
            (
                CrcMismatch { index: a1, stored: a2, computed: a3 },
                CrcMismatch { index: b1, stored: b2, computed: b3 },
            ) => (a1, a2, a3) == (b1, b2, b3),
            (BlockTooLarge { index: a1, len: a2 }, BlockTooLarge { index: b1, len: b2 }) => {
                (a1, a2) == (b1, b2)
            }
            (
                FieldWidth { field: a1, value: a2, width: a3 },
                FieldWidth { field: b1, value: b2, width: b3 },
            ) => (a1, a2, a3) == (b1, b2, b3),
            (Block { index: a1, source: a2 }, Block { index: b1, source: b2 }) => {
                (a1, a2) == (b1, b2)
            }
            _ => false,
        }
    }
}

/// One block record as stored on disk: the CRC of the decompressed payload
/// and the still-compressed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub crc32: u32,
    pub data: Vec<u8>,
}

/// A parsed container.
#[derive(Debug, Clone, PartialEq)]
pub struct TdcFile {
    pub header_version: HeaderVersion,
    pub data_offset: u32,
    pub header: TdcHeader,
    pub blocks: Vec<BlockRecord>,
}

impl TdcFile {
    /// Read and parse a container file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        let bytes = std::fs::read(path)?;
        read_container(&bytes)
    }

    /// Serialize back to bytes without touching the compressed bodies.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ParserError> {
        write_records(self.header_version, self.data_offset, &self.header, &self.blocks)
    }
}

/// Decompress every block and verify its stored CRC.
///
/// Blocks are independent, so the work fans out on the rayon pool; results
/// come back in block order and the first failing block (in that order) is
/// the error reported.
pub fn decompress_blocks(file: &TdcFile) -> Result<Vec<Vec<u8>>, ParserError> {
    let results: Vec<Result<Vec<u8>, ParserError>> = file
        .blocks
        .par_iter()
        .enumerate()
        .map(|(index, record)| {
            let payload = block::decompress(&record.data)
                .map_err(|source| ParserError::Block { index, source })?;
            let computed = crc32(&payload);
            if computed != record.crc32 {
                return Err(ParserError::CrcMismatch {
                    index,
                    stored: record.crc32,
                    computed,
                });
            }
            Ok(payload)
        })
        .collect();
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_with_payloads(payloads: &[Vec<u8>]) -> TdcFile {
        let bytes =
            write_container(HeaderVersion::V2, 0x60, &TdcHeader::default(), payloads).unwrap();
        read_container(&bytes).unwrap()
    }

    #[test]
    fn decompress_blocks_round_trips() {
        let payloads = vec![b"first payload".to_vec(), vec![0x5A; 4096], Vec::new()];
        let file = container_with_payloads(&payloads);
        assert_eq!(decompress_blocks(&file).unwrap(), payloads);
    }

    #[test]
    fn crc_mismatch_is_fatal() {
        let mut file = container_with_payloads(&[b"payload".to_vec()]);
        file.blocks[0].crc32 ^= 1;
        assert!(matches!(
            decompress_blocks(&file),
            Err(ParserError::CrcMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn first_bad_block_in_order_is_reported() {
        let mut file = container_with_payloads(&[
            b"one".to_vec(),
            b"two".to_vec(),
            b"three".to_vec(),
        ]);
        file.blocks[1].crc32 ^= 1;
        file.blocks[2].crc32 ^= 1;
        assert!(matches!(
            decompress_blocks(&file),
            Err(ParserError::CrcMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn corrupt_body_surfaces_block_error() {
        let mut file = container_with_payloads(&[b"a payload long enough to corrupt".to_vec()]);
        file.blocks[0].data = vec![0xE0, 0x00];
        assert!(matches!(
            decompress_blocks(&file),
            Err(ParserError::Block { index: 0, .. })
        ));
    }

    #[test]
    fn to_bytes_reproduces_parsed_form() {
        let file = container_with_payloads(&[b"alpha".to_vec(), b"beta".to_vec()]);
        let rewritten = file.to_bytes().unwrap();
        assert_eq!(read_container(&rewritten).unwrap(), file);
    }
}
