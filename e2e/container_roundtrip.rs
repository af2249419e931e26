// Library-level round-trip tests over the container API.

use rand::RngCore;

use tdc::container::{
    decompress_blocks, read_container, write_container, write_records, HeaderVersion, TdcHeader,
    ThingRange,
};
use tdc::crc32::crc32;

fn sample_header() -> TdcHeader {
    TdcHeader {
        unk0: 0x0007,
        unk1: 0x0102_0304,
        capture_save_time: 1_721_000_000,
        data_version: 0x010A,
        unk3: 0x1111_1111,
        unk4: 0x2222_2222,
        unk5: 0x3333_3333,
        thing: vec![ThingRange { lower: 0, upper: 4 }],
    }
}

#[test]
fn two_random_4kib_blocks() {
    let mut rng = rand::thread_rng();
    let mut payloads = vec![vec![0u8; 4096], vec![0u8; 4096]];
    for payload in &mut payloads {
        rng.fill_bytes(payload);
    }

    let bytes = write_container(HeaderVersion::V2, 0x80, &sample_header(), &payloads).unwrap();
    let parsed = read_container(&bytes).unwrap();

    assert_eq!(parsed.header_version, HeaderVersion::V2);
    assert_eq!(parsed.data_offset, 0x80);
    assert_eq!(parsed.header, sample_header());
    assert_eq!(parsed.blocks.len(), 2);
    for (record, payload) in parsed.blocks.iter().zip(&payloads) {
        assert_eq!(record.crc32, crc32(payload));
    }
    assert_eq!(decompress_blocks(&parsed).unwrap(), payloads);
}

#[test]
fn parsed_container_round_trips_field_for_field() {
    let payloads = vec![b"hello".to_vec(), vec![0x77; 1000], Vec::new()];
    let bytes = write_container(HeaderVersion::V3, 0x100, &sample_header(), &payloads).unwrap();
    let parsed = read_container(&bytes).unwrap();

    let rewritten = parsed.to_bytes().unwrap();
    assert_eq!(rewritten, bytes);
    assert_eq!(read_container(&rewritten).unwrap(), parsed);
}

#[test]
fn header_region_is_stable_across_round_trip() {
    for (version, data_offset) in [
        (HeaderVersion::V1, 0x40u32),
        (HeaderVersion::V2, 0x80),
        (HeaderVersion::V3, 0x80),
    ] {
        let mut header = sample_header();
        if version == HeaderVersion::V1 {
            header.unk1 = 0xBEEF; // must fit the two-byte field
        }
        let bytes = write_records(version, data_offset, &header, &[]).unwrap();
        let parsed = read_container(&bytes).unwrap();
        let rewritten = write_records(
            parsed.header_version,
            parsed.data_offset,
            &parsed.header,
            &parsed.blocks,
        )
        .unwrap();
        assert_eq!(
            &rewritten[..data_offset as usize],
            &bytes[..data_offset as usize]
        );
    }
}

#[test]
fn all_versions_carry_their_field_widths() {
    for version in [HeaderVersion::V1, HeaderVersion::V2, HeaderVersion::V3] {
        let mut header = sample_header();
        if version == HeaderVersion::V1 {
            header.unk1 = 0xBEEF; // must fit two bytes
        }
        if version == HeaderVersion::V3 {
            header.unk5 = 0xAAAA_BBBB_CCCC; // needs all eight bytes
        }
        let bytes = write_container(version, 0x100, &header, &[b"payload".to_vec()]).unwrap();
        let parsed = read_container(&bytes).unwrap();
        assert_eq!(parsed.header, header, "{version:?}");
    }
}
