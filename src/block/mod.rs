//! The FastLZ-family block codec used for TDC payloads.
//!
//! Each container block is compressed independently.  The first byte of a
//! compressed block selects one of two variants (short or long) that differ
//! only in how match-length and match-offset overflow is encoded; everything
//! after it is a stream of literal-run and backreference opcodes.

pub mod compress;
pub mod decompress;
pub mod types;

pub use compress::{compress, compress_bound};
pub use decompress::{decompress, DecompressionError};
pub use types::Variant;
