// Black-box tests of the `tdc` binary via std::process::Command.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use tdc::container::{write_container, HeaderVersion, TdcHeader, ThingRange};

fn tdc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tdc"))
}

fn sample_header() -> TdcHeader {
    TdcHeader {
        unk0: 3,
        unk1: 0x1234,
        capture_save_time: 1_721_000_000,
        data_version: 0x010A,
        unk3: 0,
        unk4: 0,
        unk5: 42,
        thing: vec![ThingRange { lower: 1, upper: 2 }],
    }
}

/// Write a small two-block capture file under `dir` and return its path
/// together with the raw payloads.
fn make_capture(dir: &Path) -> (PathBuf, Vec<Vec<u8>>) {
    let payloads = vec![
        b"first payload: abcabcabcabcabc".to_vec(),
        vec![0x5A; 4096],
    ];
    let bytes = write_container(HeaderVersion::V2, 0x80, &sample_header(), &payloads).unwrap();
    let path = dir.join("capture.tdc");
    fs::write(&path, bytes).unwrap();
    (path, payloads)
}

#[test]
fn unpack_then_pack_round_trips() {
    let dir = TempDir::new().unwrap();
    let (capture, payloads) = make_capture(dir.path());
    let unpacked = dir.path().join("unpacked");
    let repacked = dir.path().join("repacked.tdc");

    let status = Command::new(tdc_bin())
        .args(["unpack", capture.to_str().unwrap(), "-o", unpacked.to_str().unwrap()])
        .status()
        .expect("failed to run tdc unpack");
    assert!(status.success(), "unpack should exit 0");

    assert!(unpacked.join("metadata.json").is_file());
    for (i, payload) in payloads.iter().enumerate() {
        let block = fs::read(unpacked.join(format!("block_{i}.bin"))).unwrap();
        assert_eq!(&block, payload, "block {i}");
    }
    assert!(!unpacked.join(format!("block_{}.bin", payloads.len())).exists());

    let status = Command::new(tdc_bin())
        .args(["pack", unpacked.to_str().unwrap(), "-o", repacked.to_str().unwrap()])
        .status()
        .expect("failed to run tdc pack");
    assert!(status.success(), "pack should exit 0");

    // The repacked container decodes to the same payloads behind the same
    // header bytes (the encoder may choose different compressed bodies).
    let original = tdc::read_container(&fs::read(&capture).unwrap()).unwrap();
    let round_trip = tdc::read_container(&fs::read(&repacked).unwrap()).unwrap();
    assert_eq!(round_trip.header_version, original.header_version);
    assert_eq!(round_trip.data_offset, original.data_offset);
    assert_eq!(round_trip.header, original.header);
    assert_eq!(tdc::decompress_blocks(&round_trip).unwrap(), payloads);
}

#[test]
fn process_concatenates_blocks() {
    let dir = TempDir::new().unwrap();
    let (capture, payloads) = make_capture(dir.path());
    let out = dir.path().join("out.bin");

    let status = Command::new(tdc_bin())
        .args(["process", capture.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .status()
        .expect("failed to run tdc process");
    assert!(status.success(), "process should exit 0");

    let expected: Vec<u8> = payloads.concat();
    assert_eq!(fs::read(&out).unwrap(), expected);
}

#[test]
fn process_dump_records_handles_record_streams() {
    let dir = TempDir::new().unwrap();

    // One block whose payload is a protocol-info data block.
    let mut payload = vec![0x06];
    payload.extend_from_slice(&3u32.to_le_bytes());
    payload.extend_from_slice(&4u32.to_le_bytes());
    payload.extend_from_slice(&[1, 2, 3, 4]);
    let bytes =
        write_container(HeaderVersion::V2, 0x80, &sample_header(), &[payload.clone()]).unwrap();
    let capture = dir.path().join("records.tdc");
    fs::write(&capture, bytes).unwrap();
    let out = dir.path().join("out.bin");

    let output = Command::new(tdc_bin())
        .args([
            "process",
            capture.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--dump-records",
        ])
        .output()
        .expect("failed to run tdc process");
    assert!(output.status.success(), "process should exit 0");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("USB (3)"), "stderr was: {stderr}");
    assert_eq!(fs::read(&out).unwrap(), payload);
}

#[test]
fn missing_input_exits_one() {
    let dir = TempDir::new().unwrap();
    let status = Command::new(tdc_bin())
        .args(["process", dir.path().join("nope.tdc").to_str().unwrap()])
        .status()
        .expect("failed to run tdc process");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn corrupted_crc_exits_one() {
    let dir = TempDir::new().unwrap();
    let (capture, _) = make_capture(dir.path());
    let mut bytes = fs::read(&capture).unwrap();
    // Flip a bit in the first record's stored CRC.
    bytes[0x80 + 4] ^= 1;
    fs::write(&capture, &bytes).unwrap();

    let status = Command::new(tdc_bin())
        .args([
            "process",
            capture.to_str().unwrap(),
            "-o",
            dir.path().join("out.bin").to_str().unwrap(),
        ])
        .status()
        .expect("failed to run tdc process");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn unpack_refuses_existing_directory() {
    let dir = TempDir::new().unwrap();
    let (capture, _) = make_capture(dir.path());
    let unpacked = dir.path().join("already-there");
    fs::create_dir(&unpacked).unwrap();

    let status = Command::new(tdc_bin())
        .args(["unpack", capture.to_str().unwrap(), "-o", unpacked.to_str().unwrap()])
        .status()
        .expect("failed to run tdc unpack");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn quiet_mode_suppresses_progress() {
    let dir = TempDir::new().unwrap();
    let (capture, _) = make_capture(dir.path());
    let out = dir.path().join("out.bin");

    let output = Command::new(tdc_bin())
        .args([
            "-q",
            "process",
            capture.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run tdc process");
    assert!(output.status.success());
    assert!(output.stderr.is_empty(), "expected no progress output");
}
