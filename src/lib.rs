//! Reader, writer, and round-trip tools for TPDC protocol-analyzer captures.
//!
//! A `.tdc` file is a versioned header followed by block records, each
//! holding a CRC-32 of its decompressed payload and a body compressed with a
//! FastLZ-family codec.  This crate provides the codec, the CRC engine, the
//! container framer, a parser for the decompressed record streams, and the
//! subcommand bodies of the `tdc` binary.

pub mod block;
pub mod cli;
pub mod container;
pub mod crc32;
pub mod payload;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot block compression.
pub use block::compress;
/// One-shot block decompression.
pub use block::decompress;
/// Error type for block decompression.
pub use block::DecompressionError;
/// Worst-case compressed size for a given input size.
pub use block::compress_bound;

/// CRC-32 (BZIP2 variant) over a byte slice.
pub use crc32::crc32;

/// Parse a container from bytes.
pub use container::read_container;
/// Compress payloads and serialize a container.
pub use container::write_container;
/// Decompress and CRC-verify every block of a parsed container.
pub use container::decompress_blocks;
/// Error type for container framing.
pub use container::ParserError;
/// A parsed container.
pub use container::TdcFile;
