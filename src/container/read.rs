//! Container read path: parse a `.tdc` byte buffer into a [`TdcFile`].

use crate::container::header::{HeaderVersion, TdcHeader, ThingRange, MAGIC};
use crate::container::{BlockRecord, ParserError, TdcFile};

/// Bounds-checked cursor over the container bytes.
pub(crate) struct Data<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Data<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Data { bytes, pos: 0 }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn underflow(&self, requested: usize) -> ParserError {
        ParserError::Truncated {
            offset: self.pos,
            requested,
            remaining: self.remaining(),
        }
    }

    pub(crate) fn take_n(&mut self, count: usize) -> Result<&'a [u8], ParserError> {
        if self.remaining() < count {
            return Err(self.underflow(count));
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub(crate) fn take_u16_le(&mut self) -> Result<u16, ParserError> {
        let bytes = self.take_n(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn take_u32_le(&mut self) -> Result<u32, ParserError> {
        let bytes = self.take_n(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian unsigned integer of 2, 4, or 8 bytes.
    pub(crate) fn take_uint_le(&mut self, width: usize) -> Result<u64, ParserError> {
        debug_assert!(matches!(width, 2 | 4 | 8));
        let bytes = self.take_n(width)?;
        let mut value = 0u64;
        for (shift, &byte) in bytes.iter().enumerate() {
            value |= u64::from(byte) << (8 * shift);
        }
        Ok(value)
    }

    /// Jump to an absolute offset at or after the current position.
    pub(crate) fn seek_to(&mut self, offset: usize) -> Result<(), ParserError> {
        if offset > self.bytes.len() {
            return Err(self.underflow(offset - self.pos));
        }
        self.pos = offset;
        Ok(())
    }
}

/// Parse a full container from a byte buffer.
///
/// The header region is validated (magic, version, data-offset invariant),
/// then block records are read until end of input.  Block bodies are kept
/// compressed; see [`crate::container::decompress_blocks`].
pub fn read_container(bytes: &[u8]) -> Result<TdcFile, ParserError> {
    let mut data = Data::new(bytes);

    let magic = data.take_n(4)?;
    if magic != MAGIC {
        return Err(ParserError::BadMagic {
            found: [magic[0], magic[1], magic[2], magic[3]],
        });
    }

    let raw_version = data.take_u16_le()?;
    let version = HeaderVersion::from_raw(raw_version)
        .ok_or(ParserError::UnsupportedVersion { version: raw_version })?;
    let data_offset = data.take_u32_le()?;

    let header = read_header_fields(&mut data, version)?;

    // Everything between the end of the fixed header and data_offset is
    // padding; it must not be negative.
    if data.position() > data_offset as usize {
        return Err(ParserError::HeaderOverrun {
            header_end: data.position(),
            data_offset,
        });
    }
    data.seek_to(data_offset as usize)?;

    let blocks = read_records(&mut data)?;

    Ok(TdcFile {
        header_version: version,
        data_offset,
        header,
        blocks,
    })
}

fn read_header_fields(data: &mut Data<'_>, version: HeaderVersion) -> Result<TdcHeader, ParserError> {
    let unk0 = data.take_u16_le()?;
    let unk1 = data.take_uint_le(version.unk1_width())? as u32;
    let capture_save_time = data.take_u32_le()?;
    let data_version = data.take_u16_le()?;
    let unk3 = data.take_u32_le()?;
    let unk4 = data.take_u32_le()?;
    let unk5 = data.take_uint_le(version.unk5_width())?;
    let num_thing = data.take_u16_le()?;

    let mut thing = Vec::with_capacity(num_thing as usize);
    for _ in 0..num_thing {
        let lower = data.take_u16_le()?;
        let upper = data.take_u16_le()?;
        thing.push(ThingRange { lower, upper });
    }

    Ok(TdcHeader {
        unk0,
        unk1,
        capture_save_time,
        data_version,
        unk3,
        unk4,
        unk5,
        thing,
    })
}

/// Read `{len_field, crc, body}` records until end of input.
///
/// End of input on a record boundary is the terminator; anything shorter
/// than a full record is an error.  The low byte of the length field is
/// reserved and ignored.
fn read_records(data: &mut Data<'_>) -> Result<Vec<BlockRecord>, ParserError> {
    let mut blocks = Vec::new();
    while data.remaining() > 0 {
        let framing_offset = data.position();
        if data.remaining() < 8 {
            return Err(ParserError::TruncatedRecord {
                offset: framing_offset,
                requested: 8,
                remaining: data.remaining(),
            });
        }
        let len_field = data.take_u32_le()?;
        let stored_crc = data.take_u32_le()?;
        let compressed_len = (len_field >> 8) as usize;
        if data.remaining() < compressed_len {
            return Err(ParserError::TruncatedRecord {
                offset: data.position(),
                requested: compressed_len,
                remaining: data.remaining(),
            });
        }
        let body = data.take_n(compressed_len)?;
        blocks.push(BlockRecord {
            crc32: stored_crc,
            data: body.to_vec(),
        });
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::write::write_records;

    fn sample_header() -> TdcHeader {
        TdcHeader {
            unk0: 0x0102,
            unk1: 0xA1A2,
            capture_save_time: 0x6578_0000,
            data_version: 0x010A,
            unk3: 0xDEAD_BEEF,
            unk4: 0x0BAD_F00D,
            unk5: 0x1122_3344,
            thing: vec![
                ThingRange { lower: 1, upper: 2 },
                ThingRange { lower: 3, upper: 9 },
            ],
        }
    }

    fn sample_records() -> Vec<BlockRecord> {
        vec![
            BlockRecord {
                crc32: 0x1111_2222,
                data: vec![0xAA; 5],
            },
            BlockRecord {
                crc32: 0x3333_4444,
                data: vec![0xBB; 3],
            },
        ]
    }

    #[test]
    fn round_trips_through_writer() {
        let header = sample_header();
        let records = sample_records();
        let bytes = write_records(HeaderVersion::V2, 0x60, &header, &records).unwrap();

        let parsed = read_container(&bytes).unwrap();
        assert_eq!(parsed.header_version, HeaderVersion::V2);
        assert_eq!(parsed.data_offset, 0x60);
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.blocks, records);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            read_container(b"TDPCxxxxxxxxxx"),
            Err(ParserError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&0x0400u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            read_container(&bytes),
            Err(ParserError::UnsupportedVersion { version: 0x0400 })
        );
    }

    #[test]
    fn rejects_data_offset_inside_header() {
        // data_offset points into the fixed header region.
        let mut bytes = write_records(HeaderVersion::V1, 0x40, &sample_header(), &[]).unwrap();
        bytes[6..10].copy_from_slice(&0x10u32.to_le_bytes());
        assert!(matches!(
            read_container(&bytes),
            Err(ParserError::HeaderOverrun { .. })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = write_records(HeaderVersion::V3, 0x60, &sample_header(), &[]).unwrap();
        assert!(matches!(
            read_container(&bytes[..20]),
            Err(ParserError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_partial_record_framing() {
        let mut bytes = write_records(HeaderVersion::V2, 0x60, &sample_header(), &[]).unwrap();
        bytes.extend_from_slice(&[0x00, 0x01, 0x00]); // 3 of the 8 framing bytes
        assert!(matches!(
            read_container(&bytes),
            Err(ParserError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn rejects_short_record_body() {
        let mut bytes = write_records(HeaderVersion::V2, 0x60, &sample_header(), &[]).unwrap();
        bytes.extend_from_slice(&(16u32 << 8).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[0xCC; 4]); // body claims 16, provides 4
        assert!(matches!(
            read_container(&bytes),
            Err(ParserError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn low_length_byte_is_ignored() {
        let header = sample_header();
        let mut bytes = write_records(HeaderVersion::V2, 0x60, &header, &sample_records()).unwrap();
        // Stomp the reserved low byte of the first record's length field.
        let first_record = 0x60;
        bytes[first_record] = 0x5A;
        let parsed = read_container(&bytes).unwrap();
        assert_eq!(parsed.blocks, sample_records());
    }

    #[test]
    fn empty_record_area_is_valid() {
        let parsed =
            read_container(&write_records(HeaderVersion::V1, 0x80, &sample_header(), &[]).unwrap())
                .unwrap();
        assert!(parsed.blocks.is_empty());
    }
}
