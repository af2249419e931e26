//! `tdc pack` — rebuild a container from an unpacked directory.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context as _};

use crate::cli::metadata::{Metadata, METADATA_FILE};
use crate::container::{write_container, HeaderVersion};
use crate::displaylevel;

/// Pack `<input_dir>/metadata.json` plus `block_0.bin`, `block_1.bin`, …
/// (consecutive from zero) into `output`.
pub fn run(input_dir: &Path, output: &Path) -> anyhow::Result<()> {
    if !input_dir.is_dir() {
        bail!(
            "directory \"{}\" does not exist or is not a directory",
            input_dir.display()
        );
    }

    let metadata_path = input_dir.join(METADATA_FILE);
    if !metadata_path.is_file() {
        bail!("missing {} in \"{}\"", METADATA_FILE, input_dir.display());
    }
    let metadata = Metadata::load(&metadata_path)?;
    let version = HeaderVersion::from_raw(metadata.header_version).with_context(|| {
        format!("unsupported header version {:#06x}", metadata.header_version)
    })?;

    let mut payloads = Vec::new();
    loop {
        let block_path = input_dir.join(format!("block_{}.bin", payloads.len()));
        if !block_path.is_file() {
            break;
        }
        let payload = fs::read(&block_path)
            .with_context(|| format!("failed to read \"{}\"", block_path.display()))?;
        payloads.push(payload);
    }

    let bytes = write_container(version, metadata.data_offset, &metadata.header, &payloads)?;
    fs::write(output, bytes)
        .with_context(|| format!("failed to write \"{}\"", output.display()))?;

    displaylevel!(
        2,
        "Packed {} blocks into \"{}\"\n",
        payloads.len(),
        output.display()
    );
    Ok(())
}
