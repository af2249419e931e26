//! Container write path: serialize a header and block records to bytes.

use rayon::prelude::*;

use crate::block;
use crate::container::header::{HeaderVersion, TdcHeader, MAGIC};
use crate::container::{BlockRecord, ParserError};
use crate::crc32::crc32;

/// Serialize the header region: magic, version, data offset, fixed fields,
/// `thing` array, then zero padding up to `data_offset`.
pub fn write_header(
    version: HeaderVersion,
    data_offset: u32,
    header: &TdcHeader,
) -> Result<Vec<u8>, ParserError> {
    let mut out = Vec::with_capacity(data_offset as usize);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&version.raw().to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());

    out.extend_from_slice(&header.unk0.to_le_bytes());
    write_uint_le(&mut out, "unk1", u64::from(header.unk1), version.unk1_width())?;
    out.extend_from_slice(&header.capture_save_time.to_le_bytes());
    out.extend_from_slice(&header.data_version.to_le_bytes());
    out.extend_from_slice(&header.unk3.to_le_bytes());
    out.extend_from_slice(&header.unk4.to_le_bytes());
    write_uint_le(&mut out, "unk5", header.unk5, version.unk5_width())?;

    if header.thing.len() > usize::from(u16::MAX) {
        return Err(ParserError::FieldWidth {
            field: "num_thing",
            value: header.thing.len() as u64,
            width: 2,
        });
    }
    out.extend_from_slice(&(header.thing.len() as u16).to_le_bytes());
    for entry in &header.thing {
        out.extend_from_slice(&entry.lower.to_le_bytes());
        out.extend_from_slice(&entry.upper.to_le_bytes());
    }

    if out.len() > data_offset as usize {
        return Err(ParserError::HeaderOverrun {
            header_end: out.len(),
            data_offset,
        });
    }
    out.resize(data_offset as usize, 0);
    Ok(out)
}

fn write_uint_le(
    out: &mut Vec<u8>,
    field: &'static str,
    value: u64,
    width: usize,
) -> Result<(), ParserError> {
    debug_assert!(matches!(width, 2 | 4 | 8));
    if width < 8 && value >> (8 * width) != 0 {
        return Err(ParserError::FieldWidth { field, value, width });
    }
    out.extend_from_slice(&value.to_le_bytes()[..width]);
    Ok(())
}

/// Compress `payloads` and frame them behind a fresh header.
///
/// Each record stores the payload's CRC-32 and the compressed body behind a
/// `compressed_len << 8` length field (low byte reserved, zero).  Blocks are
/// compressed on the rayon pool; record order matches payload order.
pub fn write_container(
    version: HeaderVersion,
    data_offset: u32,
    header: &TdcHeader,
    payloads: &[Vec<u8>],
) -> Result<Vec<u8>, ParserError> {
    let records: Vec<BlockRecord> = payloads
        .par_iter()
        .map(|payload| BlockRecord {
            crc32: crc32(payload),
            data: block::compress(payload),
        })
        .collect();
    write_records(version, data_offset, header, &records)
}

/// Frame already-compressed records behind a fresh header.
///
/// This is the re-serialization path: a parsed container written back with
/// unchanged fields reproduces its header region byte for byte.
pub fn write_records(
    version: HeaderVersion,
    data_offset: u32,
    header: &TdcHeader,
    records: &[BlockRecord],
) -> Result<Vec<u8>, ParserError> {
    let mut out = write_header(version, data_offset, header)?;
    for (index, record) in records.iter().enumerate() {
        if record.data.len() >= 1 << 24 {
            return Err(ParserError::BlockTooLarge {
                index,
                len: record.data.len(),
            });
        }
        out.extend_from_slice(&((record.data.len() as u32) << 8).to_le_bytes());
        out.extend_from_slice(&record.crc32.to_le_bytes());
        out.extend_from_slice(&record.data);
    }
    Ok(out)
}
