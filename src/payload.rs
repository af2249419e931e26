//! Parser for the decompressed payload byte stream.
//!
//! A decompressed block is a sequence of tagged data blocks.  Each starts
//! with one header byte whose low nibble is the block type (the high nibble
//! is opaque).  Three types are recognized:
//!
//! - type 0 — an event record list: a block index, an opaque word, then
//!   tag/value records to the end of the block,
//! - type 5 — capture information: timestamps, sample count, sample rate,
//!   plus trailing fields gated on the container's `data_version`,
//! - type 6 — the captured protocol and an opaque body.
//!
//! Anything else fails; the stream carries no lengths that would allow
//! skipping an unknown block type.

use std::fmt;

use thiserror::Error;

/// Errors produced while parsing a decompressed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload data incomplete at offset {offset}: requested {requested}, but only {remaining} remaining")]
    Truncated {
        offset: usize,
        requested: usize,
        remaining: usize,
    },
    #[error("unsupported data block type {block_type:#03x} at offset {offset}")]
    UnsupportedBlockType { block_type: u8, offset: usize },
    /// An event block's size field does not cover its own framing.
    #[error("event block size {size} at offset {offset} is smaller than its framing")]
    InvalidBlockLength { size: u32, offset: usize },
    /// An event record's size field does not cover its own framing.  The
    /// value length is `size - 6`, so anything below 6 would wrap.
    #[error("event record size {size} at offset {offset} is smaller than its framing")]
    InvalidRecordLength { size: u32, offset: usize },
}

struct Data<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Data<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Data { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take_n(&mut self, count: usize) -> Result<&'a [u8], PayloadError> {
        if self.remaining() < count {
            return Err(PayloadError::Truncated {
                offset: self.pos,
                requested: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, PayloadError> {
        Ok(self.take_n(1)?[0])
    }

    fn take_u16_le(&mut self) -> Result<u16, PayloadError> {
        let b = self.take_n(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u24_le(&mut self) -> Result<u32, PayloadError> {
        let b = self.take_n(3)?;
        Ok(u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
    }

    fn take_u32_le(&mut self) -> Result<u32, PayloadError> {
        let b = self.take_n(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_u64_le(&mut self) -> Result<u64, PayloadError> {
        let b = self.take_n(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// Captured bus protocol (type-6 block).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    I2c,
    Spi,
    Usb,
    Can,
    Espi,
    UsbPd,
    Unknown(u32),
}

impl Protocol {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Protocol::I2c,
            2 => Protocol::Spi,
            3 => Protocol::Usb,
            4 => Protocol::Can,
            5 => Protocol::Espi,
            6 => Protocol::UsbPd,
            other => Protocol::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Protocol::I2c => 1,
            Protocol::Spi => 2,
            Protocol::Usb => 3,
            Protocol::Can => 4,
            Protocol::Espi => 5,
            Protocol::UsbPd => 6,
            Protocol::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Protocol::I2c => "I2C",
            Protocol::Spi => "SPI",
            Protocol::Usb => "USB",
            Protocol::Can => "CAN",
            Protocol::Espi => "eSPI",
            Protocol::UsbPd => "USB-PD",
            Protocol::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// One tag/value record inside an event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvRecord {
    pub tag: u16,
    pub value: Vec<u8>,
}

/// Sample-domain timing carried by a tag-0 record with a 14-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub unk5: u16,
    pub timestamp_samples: u64,
    pub length_samples: u32,
}

impl TvRecord {
    /// Decode the timing layout, when this record carries one.
    pub fn timing(&self) -> Option<Timing> {
        if self.tag != 0x0000 || self.value.len() != 14 {
            return None;
        }
        let v = &self.value;
        Some(Timing {
            unk5: u16::from_le_bytes([v[0], v[1]]),
            timestamp_samples: u64::from_le_bytes([
                v[2], v[3], v[4], v[5], v[6], v[7], v[8], v[9],
            ]),
            length_samples: u32::from_le_bytes([v[10], v[11], v[12], v[13]]),
        })
    }
}

/// Type-0 block: an indexed list of tag/value event records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsBlock {
    pub index: u32,
    pub unk2: u16,
    pub records: Vec<TvRecord>,
}

/// Type-5 block: capture-session information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInfo {
    pub unk1: u32,
    pub unk2: u32,
    /// Unix seconds.
    pub capture_start_time: u32,
    /// Unix seconds.
    pub capture_end_time: u32,
    pub capture_samples: u64,
    pub sample_rate_sps: u32,
    pub unk7: u8,
    pub unk8: u32,
    pub unk9: u32,
    /// Present when `data_version >= 0x0103`.
    pub unk10: Option<u32>,
    /// Present when `data_version >= 0x0104`.
    pub unk11: Option<u8>,
    /// Present when `data_version >= 0x0108`.
    pub unk12: Option<u8>,
    /// Present when `data_version >= 0x010A`.
    pub unk13: Option<u8>,
}

/// Type-6 block: captured protocol plus an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub protocol: Protocol,
    pub data: Vec<u8>,
}

/// One parsed data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataBlock {
    Events(EventsBlock),
    CaptureInfo(CaptureInfo),
    ProtocolInfo(ProtocolInfo),
}

impl DataBlock {
    /// One human-readable line for this block.  `sample_rate_sps` (from a
    /// preceding capture-info block) turns sample counts into wall-clock
    /// offsets; without it they print as unknown.
    pub fn describe(&self, sample_rate_sps: Option<u32>) -> String {
        match self {
            DataBlock::Events(events) => describe_events(events, sample_rate_sps),
            DataBlock::CaptureInfo(info) => describe_capture_info(info),
            DataBlock::ProtocolInfo(info) => format!("Protocol info: Protocol: {}", info.protocol),
        }
    }
}

fn describe_events(events: &EventsBlock, sample_rate_sps: Option<u32>) -> String {
    let mut line = format!("Events: Index: {}, Unk2: {:#06x}, Records: [", events.index, events.unk2);
    for (i, record) in events.records.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        line.push_str(&format!("(Tag: {:#06x}", record.tag));
        if let Some(timing) = record.timing() {
            line.push_str(&format!(", Unk5: {:#06x}", timing.unk5));
            match sample_rate_sps {
                Some(rate) if rate > 0 => {
                    let timestamp_ns =
                        u128::from(timing.timestamp_samples) * 1_000_000_000 / u128::from(rate);
                    let length_ns =
                        u128::from(timing.length_samples) * 1_000_000_000 / u128::from(rate);
                    line.push_str(&format!(
                        ", Timestamp: {}, Length: {}",
                        format_timestamp(timestamp_ns),
                        format_timestamp(length_ns)
                    ));
                }
                _ => line.push_str(", Timestamp: Unknown, Length: Unknown"),
            }
        } else if !record.value.is_empty() {
            line.push_str(", Value: ");
            for byte in &record.value {
                line.push_str(&format!("{byte:02x}"));
            }
        }
        line.push(')');
    }
    line.push(']');
    line
}

fn describe_capture_info(info: &CaptureInfo) -> String {
    let mut line = format!(
        "Capture info: Unk1: {:#010x}, Unk2: {:#010x}, CaptureStartTime: {}, CaptureEndTime: {}, \
         CaptureSamples: {}, SampleRateSps: {}, Unk7: {:#04x}, Unk8: {:#010x}, Unk9: {:#010x}",
        info.unk1,
        info.unk2,
        info.capture_start_time,
        info.capture_end_time,
        info.capture_samples,
        info.sample_rate_sps,
        info.unk7,
        info.unk8,
        info.unk9
    );
    if let Some(unk10) = info.unk10 {
        line.push_str(&format!(", Unk10: {unk10:#010x}"));
    }
    if let Some(unk11) = info.unk11 {
        line.push_str(&format!(", Unk11: {unk11:#04x}"));
    }
    if let Some(unk12) = info.unk12 {
        line.push_str(&format!(", Unk12: {unk12:#04x}"));
    }
    if let Some(unk13) = info.unk13 {
        line.push_str(&format!(", Unk13: {unk13:#04x}"));
    }
    line
}

/// Render a nanosecond offset as `HH:MM:SS.mmm.uuu.nnn`.
pub fn format_timestamp(nanoseconds: u128) -> String {
    let total_seconds = nanoseconds / 1_000_000_000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let remaining_ns = nanoseconds % 1_000_000_000;
    let millis = remaining_ns / 1_000_000;
    let micros = (remaining_ns % 1_000_000) / 1_000;
    let nanos = remaining_ns % 1_000;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}.{micros:03}.{nanos:03}")
}

/// Parse a decompressed payload into data blocks.
///
/// `data_version` is the container header's `data_version` field; it gates
/// the trailing fields of capture-info blocks.
pub fn parse(data_version: u16, bytes: &[u8]) -> Result<Vec<DataBlock>, PayloadError> {
    let mut data = Data::new(bytes);
    let mut blocks = Vec::new();
    while data.remaining() > 0 {
        let header_offset = data.position();
        let header = data.take_u8()?;
        let block_type = header & 0x0F;
        match block_type {
            0 => {
                let size = data.take_u24_le()?;
                // The size counts the header byte and itself.
                if size < 4 {
                    return Err(PayloadError::InvalidBlockLength {
                        size,
                        offset: header_offset,
                    });
                }
                let body = data.take_n(size as usize - 4)?;
                blocks.push(DataBlock::Events(parse_events(body)?));
            }
            5 => {
                let mut body_len = 37usize;
                if data_version >= 0x0103 {
                    body_len += 4;
                }
                if data_version >= 0x0104 {
                    body_len += 1;
                }
                if data_version >= 0x0108 {
                    body_len += 1;
                }
                if data_version >= 0x010A {
                    body_len += 1;
                }
                let body = data.take_n(body_len)?;
                blocks.push(DataBlock::CaptureInfo(parse_capture_info(data_version, body)?));
            }
            6 => {
                let protocol = Protocol::from_code(data.take_u32_le()?);
                let size = data.take_u32_le()?;
                let body = data.take_n(size as usize)?;
                blocks.push(DataBlock::ProtocolInfo(ProtocolInfo {
                    protocol,
                    data: body.to_vec(),
                }));
            }
            other => {
                return Err(PayloadError::UnsupportedBlockType {
                    block_type: other,
                    offset: data.position(),
                });
            }
        }
    }
    Ok(blocks)
}

fn parse_events(body: &[u8]) -> Result<EventsBlock, PayloadError> {
    let mut data = Data::new(body);
    let index = data.take_u32_le()?;
    let unk2 = data.take_u16_le()?;

    let mut records = Vec::new();
    while data.remaining() > 0 {
        let tag = data.take_u16_le()?;
        let size_offset = data.position();
        let size = data.take_u32_le()?;
        // The size counts the tag and itself.
        if size < 6 {
            return Err(PayloadError::InvalidRecordLength {
                size,
                offset: size_offset,
            });
        }
        let value = data.take_n(size as usize - 6)?;
        records.push(TvRecord {
            tag,
            value: value.to_vec(),
        });
    }

    Ok(EventsBlock { index, unk2, records })
}

fn parse_capture_info(data_version: u16, body: &[u8]) -> Result<CaptureInfo, PayloadError> {
    let mut data = Data::new(body);
    let unk1 = data.take_u32_le()?;
    let unk2 = data.take_u32_le()?;
    let capture_start_time = data.take_u32_le()?;
    let capture_end_time = data.take_u32_le()?;
    let capture_samples = data.take_u64_le()?;
    let sample_rate_sps = data.take_u32_le()?;
    let unk7 = data.take_u8()?;
    let unk8 = data.take_u32_le()?;
    let unk9 = data.take_u32_le()?;

    let unk10 = if data_version >= 0x0103 {
        Some(data.take_u32_le()?)
    } else {
        None
    };
    let unk11 = if data_version >= 0x0104 {
        Some(data.take_u8()?)
    } else {
        None
    };
    let unk12 = if data_version >= 0x0108 {
        Some(data.take_u8()?)
    } else {
        None
    };
    let unk13 = if data_version >= 0x010A {
        Some(data.take_u8()?)
    } else {
        None
    };

    Ok(CaptureInfo {
        unk1,
        unk2,
        capture_start_time,
        capture_end_time,
        capture_samples,
        sample_rate_sps,
        unk7,
        unk8,
        unk9,
        unk10,
        unk11,
        unk12,
        unk13,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_record(tag: u16, value: &[u8]) -> Vec<u8> {
        let mut out = tag.to_le_bytes().to_vec();
        out.extend_from_slice(&((value.len() as u32) + 6).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn events_block(index: u32, unk2: u16, records: &[Vec<u8>]) -> Vec<u8> {
        let mut body = index.to_le_bytes().to_vec();
        body.extend_from_slice(&unk2.to_le_bytes());
        for record in records {
            body.extend_from_slice(record);
        }
        let size = (body.len() + 4) as u32;
        let mut out = vec![0x00];
        out.extend_from_slice(&size.to_le_bytes()[..3]);
        out.extend_from_slice(&body);
        out
    }

    fn capture_info_block(data_version: u16) -> Vec<u8> {
        let mut out = vec![0x05];
        out.extend_from_slice(&0x0101_0101u32.to_le_bytes()); // unk1
        out.extend_from_slice(&0x0202_0202u32.to_le_bytes()); // unk2
        out.extend_from_slice(&1_700_000_000u32.to_le_bytes()); // start
        out.extend_from_slice(&1_700_000_060u32.to_le_bytes()); // end
        out.extend_from_slice(&48_000_000u64.to_le_bytes()); // samples
        out.extend_from_slice(&800_000u32.to_le_bytes()); // sample rate
        out.push(0x07); // unk7
        out.extend_from_slice(&0x0808_0808u32.to_le_bytes()); // unk8
        out.extend_from_slice(&0x0909_0909u32.to_le_bytes()); // unk9
        if data_version >= 0x0103 {
            out.extend_from_slice(&0x0A0A_0A0Au32.to_le_bytes());
        }
        if data_version >= 0x0104 {
            out.push(0x0B);
        }
        if data_version >= 0x0108 {
            out.push(0x0C);
        }
        if data_version >= 0x010A {
            out.push(0x0D);
        }
        out
    }

    #[test]
    fn parses_events_block() {
        let mut timing_value = 0x1234u16.to_le_bytes().to_vec();
        timing_value.extend_from_slice(&800_000u64.to_le_bytes());
        timing_value.extend_from_slice(&160u32.to_le_bytes());

        let bytes = events_block(
            7,
            0x0001,
            &[event_record(0x0000, &timing_value), event_record(0x0002, &[0xAB, 0xCD])],
        );
        let blocks = parse(0x010A, &bytes).unwrap();
        assert_eq!(blocks.len(), 1);
        let DataBlock::Events(events) = &blocks[0] else {
            panic!("expected events block");
        };
        assert_eq!(events.index, 7);
        assert_eq!(events.unk2, 0x0001);
        assert_eq!(events.records.len(), 2);

        let timing = events.records[0].timing().unwrap();
        assert_eq!(timing.unk5, 0x1234);
        assert_eq!(timing.timestamp_samples, 800_000);
        assert_eq!(timing.length_samples, 160);
        assert_eq!(events.records[1].timing(), None);
    }

    #[test]
    fn rejects_undersized_event_record() {
        let mut bad_record = 0x0000u16.to_le_bytes().to_vec();
        bad_record.extend_from_slice(&5u32.to_le_bytes()); // size < 6
        let bytes = events_block(0, 0, &[bad_record]);
        assert!(matches!(
            parse(0x010A, &bytes),
            Err(PayloadError::InvalidRecordLength { size: 5, .. })
        ));
    }

    #[test]
    fn rejects_undersized_event_block() {
        let bytes = [0x00, 0x03, 0x00, 0x00]; // size 3 < framing
        assert!(matches!(
            parse(0x010A, &bytes),
            Err(PayloadError::InvalidBlockLength { size: 3, .. })
        ));
    }

    #[test]
    fn parses_capture_info_across_versions() {
        for (data_version, unk10, unk11, unk12, unk13) in [
            (0x0100u16, None, None, None, None),
            (0x0103, Some(0x0A0A_0A0A), None, None, None),
            (0x0104, Some(0x0A0A_0A0A), Some(0x0B), None, None),
            (0x0108, Some(0x0A0A_0A0A), Some(0x0B), Some(0x0C), None),
            (0x010A, Some(0x0A0A_0A0A), Some(0x0B), Some(0x0C), Some(0x0D)),
        ] {
            let blocks = parse(data_version, &capture_info_block(data_version)).unwrap();
            let DataBlock::CaptureInfo(info) = &blocks[0] else {
                panic!("expected capture info");
            };
            assert_eq!(info.sample_rate_sps, 800_000);
            assert_eq!(info.unk10, unk10, "data_version {data_version:#06x}");
            assert_eq!(info.unk11, unk11);
            assert_eq!(info.unk12, unk12);
            assert_eq!(info.unk13, unk13);
        }
    }

    #[test]
    fn parses_protocol_block() {
        let mut bytes = vec![0x06];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xEE, 0xFF]);
        let blocks = parse(0x010A, &bytes).unwrap();
        let DataBlock::ProtocolInfo(info) = &blocks[0] else {
            panic!("expected protocol info");
        };
        assert_eq!(info.protocol, Protocol::Usb);
        assert_eq!(info.data, vec![0xEE, 0xFF]);
        assert_eq!(info.protocol.to_string(), "USB (3)");
    }

    #[test]
    fn unknown_protocol_code() {
        assert_eq!(Protocol::from_code(99), Protocol::Unknown(99));
        assert_eq!(Protocol::from_code(99).to_string(), "unknown (99)");
    }

    #[test]
    fn rejects_unknown_block_type() {
        assert!(matches!(
            parse(0x010A, &[0x09]),
            Err(PayloadError::UnsupportedBlockType { block_type: 9, .. })
        ));
    }

    #[test]
    fn high_nibble_of_block_header_is_opaque() {
        // 0xF5 still selects type 5.
        let mut bytes = capture_info_block(0x0100);
        bytes[0] = 0xF5;
        assert!(matches!(
            parse(0x0100, &bytes).unwrap()[0],
            DataBlock::CaptureInfo(_)
        ));
    }

    #[test]
    fn multiple_blocks_in_sequence() {
        let mut bytes = capture_info_block(0x010A);
        bytes.extend_from_slice(&events_block(1, 0, &[event_record(0x0003, &[0x01])]));
        let blocks = parse(0x010A, &bytes).unwrap();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(0), "00:00:00.000.000.000");
        assert_eq!(format_timestamp(1_000_000_000), "00:00:01.000.000.000");
        assert_eq!(
            format_timestamp(3_661_000_000_123 + 456_789_000),
            "01:01:01.456.789.123"
        );
    }

    #[test]
    fn describe_uses_sample_rate() {
        let mut timing_value = 0u16.to_le_bytes().to_vec();
        timing_value.extend_from_slice(&1_000_000u64.to_le_bytes());
        timing_value.extend_from_slice(&500_000u32.to_le_bytes());
        let bytes = events_block(0, 0, &[event_record(0x0000, &timing_value)]);
        let blocks = parse(0x010A, &bytes).unwrap();

        let line = blocks[0].describe(Some(1_000_000));
        assert!(line.contains("Timestamp: 00:00:01.000.000.000"), "{line}");
        assert!(line.contains("Length: 00:00:00.500.000.000"), "{line}");

        let line = blocks[0].describe(None);
        assert!(line.contains("Timestamp: Unknown"), "{line}");
    }
}
