//! `tdc unpack` — expand a container into a directory of decompressed blocks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};

use crate::cli::metadata::{Metadata, METADATA_FILE};
use crate::container::{decompress_blocks, TdcFile};
use crate::displaylevel;

/// Default output directory for `file`: `<file>.unpacked` next to it.
fn default_output_dir(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_owned());
    file.with_file_name(format!("{name}.unpacked"))
}

/// Unpack `file` into `output` (default `<file>.unpacked`).  The directory
/// must not already exist; every block's stored CRC is verified.
pub fn run(file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("file \"{}\" does not exist", file.display());
    }
    let output_dir = output.map_or_else(|| default_output_dir(file), Path::to_path_buf);
    if output_dir.exists() {
        bail!("output directory \"{}\" already exists", output_dir.display());
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create \"{}\"", output_dir.display()))?;

    let tdc = TdcFile::from_file(file)
        .with_context(|| format!("failed to parse \"{}\"", file.display()))?;

    Metadata::from_container(&tdc).save(&output_dir.join(METADATA_FILE))?;

    let payloads = decompress_blocks(&tdc)?;
    for (i, payload) in payloads.iter().enumerate() {
        let block_path = output_dir.join(format!("block_{i}.bin"));
        fs::write(&block_path, payload)
            .with_context(|| format!("failed to write \"{}\"", block_path.display()))?;
        displaylevel!(
            2,
            "Wrote {} bytes to \"{}\"\n",
            payload.len(),
            block_path.display()
        );
    }

    displaylevel!(
        2,
        "Unpacked {} blocks into \"{}\"\n",
        payloads.len(),
        output_dir.display()
    );
    Ok(())
}
