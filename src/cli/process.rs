//! `tdc process` — decompress every block of a container into one file.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::block::decompress;
use crate::container::{ParserError, TdcFile};
use crate::crc32::crc32;
use crate::displaylevel;
use crate::payload::{self, DataBlock};

/// Default output path: `<name>.decompressed.bin` inside a kept temporary
/// directory, so repeated runs never clobber each other.
fn default_output_path(file: &Path) -> anyhow::Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix("tdc-decompressed-file-")
        .tempdir()
        .context("failed to create output directory")?
        .keep();
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_owned());
    Ok(dir.join(format!("{name}.decompressed.bin")))
}

/// Decompress `file` block by block into the output file, verifying each
/// stored CRC.  With `dump_records`, each payload is additionally parsed as
/// a record stream and described one line per data block.
pub fn run(file: &Path, output: Option<&Path>, dump_records: bool) -> anyhow::Result<()> {
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(file)?,
    };

    let tdc = TdcFile::from_file(file)
        .with_context(|| format!("failed to parse \"{}\"", file.display()))?;

    let mut out = File::create(&output_path)
        .with_context(|| format!("failed to create \"{}\"", output_path.display()))?;

    let mut compressed_total: u64 = 0;
    let mut decompressed_total: u64 = 0;
    let mut sample_rate: Option<u32> = None;

    for (index, record) in tdc.blocks.iter().enumerate() {
        compressed_total += record.data.len() as u64;

        let raw = decompress(&record.data).map_err(|source| ParserError::Block { index, source })?;
        let computed = crc32(&raw);
        if computed != record.crc32 {
            return Err(ParserError::CrcMismatch {
                index,
                stored: record.crc32,
                computed,
            }
            .into());
        }

        out.write_all(&raw)?;
        decompressed_total += raw.len() as u64;
        displaylevel!(
            2,
            "Wrote {} decompressed bytes to \"{}\"\n",
            raw.len(),
            output_path.display()
        );

        if dump_records {
            for data_block in payload::parse(tdc.header.data_version, &raw)
                .with_context(|| format!("failed to parse records of block {index}"))?
            {
                if let DataBlock::CaptureInfo(info) = &data_block {
                    sample_rate = Some(info.sample_rate_sps);
                }
                displaylevel!(2, "{}\n", data_block.describe(sample_rate));
            }
        }
    }

    out.flush()?;
    displaylevel!(
        2,
        "Finished writing {} decompressed bytes to \"{}\"\n",
        decompressed_total,
        output_path.display()
    );
    if decompressed_total > 0 {
        displaylevel!(
            2,
            "Decompressed {} bytes from {} compressed bytes (compression ratio: {:.2}%)\n",
            decompressed_total,
            compressed_total,
            compressed_total as f64 * 100.0 / decompressed_total as f64
        );
    }
    Ok(())
}
