//! Block decompression.
//!
//! A compressed block is decoded front to back: the first byte selects the
//! codec variant and doubles as the first literal opcode, every following
//! control byte is either a literal run (copied verbatim from the input) or
//! a backreference into the bytes already produced.  Backreference copies
//! are performed byte at a time because the source window may overlap the
//! destination — an offset smaller than the match length replicates the
//! trailing pattern, which is how runs are encoded.
//!
//! A single bit error desynchronizes everything that follows, so every read
//! is bounds-checked and failures carry the compressed-input offset at which
//! decoding stopped.

use thiserror::Error;

use crate::block::types::{
    split_control, Variant, LEN_CODE_EXTENDED, LONG_OFFSET_ESCAPE, MAX_DECODED_LEN,
};

/// Errors produced while decoding a compressed block.
///
/// All variants carry the compressed-input cursor offset for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressionError {
    /// The input ended in the middle of an opcode, literal run, or extension.
    #[error("compressed data incomplete at offset {offset}: requested {requested}, but only {remaining} remaining")]
    Truncated {
        offset: usize,
        requested: usize,
        remaining: usize,
    },
    /// The first byte's top three bits name no known variant.
    #[error("unsupported header byte {byte:#04x} at offset {offset}")]
    UnsupportedHeader { byte: u8, offset: usize },
    /// A backreference points before the start of the output.
    #[error("decompressed data of length {available} is not long enough to look back {lookback} bytes (opcode ending at offset {offset})")]
    LookbackTooFar {
        offset: usize,
        lookback: usize,
        available: usize,
    },
    /// The decoded output would exceed the safety cap.
    #[error("decompressed output would exceed the {cap}-byte cap (opcode ending at offset {offset})")]
    OutputCapExceeded { offset: usize, cap: usize },
}

/// Bounds-checked cursor over the compressed input.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    fn take_one(&mut self) -> Result<u8, DecompressionError> {
        if self.remaining() < 1 {
            return Err(DecompressionError::Truncated {
                offset: self.pos,
                requested: 1,
                remaining: 0,
            });
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    #[inline]
    fn take_two_be(&mut self) -> Result<u16, DecompressionError> {
        if self.remaining() < 2 {
            return Err(DecompressionError::Truncated {
                offset: self.pos,
                requested: 2,
                remaining: self.remaining(),
            });
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    #[inline]
    fn take_n(&mut self, count: usize) -> Result<&'a [u8], DecompressionError> {
        if self.remaining() < count {
            return Err(DecompressionError::Truncated {
                offset: self.pos,
                requested: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }
}

/// Decompress one block.
///
/// The empty input decodes to the empty output.  On failure the partial
/// output is discarded and the error names the input offset at which
/// decoding stopped; when the `TDC_DUMP_ON_ERROR` environment variable is
/// set, the input and the partial output are additionally written to a kept
/// temporary directory for post-mortem inspection.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>, DecompressionError> {
    let mut cursor = Cursor::new(compressed);
    let mut out = Vec::new();
    match decompress_loop(&mut cursor, &mut out) {
        Ok(()) => Ok(out),
        Err(err) => {
            dump_on_error(compressed, &out);
            Err(err)
        }
    }
}

fn decompress_loop(cursor: &mut Cursor<'_>, out: &mut Vec<u8>) -> Result<(), DecompressionError> {
    if cursor.remaining() == 0 {
        return Ok(());
    }

    let header = cursor.take_one()?;
    let (high3, low5) = split_control(header);
    let variant = Variant::from_header_bits(high3).ok_or(DecompressionError::UnsupportedHeader {
        byte: header,
        offset: cursor.position(),
    })?;

    // The header byte is itself a literal opcode; its match-length bits only
    // carry the variant selection.
    copy_literals(cursor, out, low5 as usize + 1)?;

    while cursor.remaining() > 0 {
        let control = cursor.take_one()?;
        let (len_code, low5) = split_control(control);

        if len_code == 0 {
            copy_literals(cursor, out, low5 as usize + 1)?;
            continue;
        }

        let mut match_len = len_code as usize;
        if len_code == LEN_CODE_EXTENDED {
            match variant {
                Variant::Short => {
                    match_len += cursor.take_one()? as usize;
                }
                Variant::Long => loop {
                    // Inclusive chain: every byte adds to the length, a
                    // non-0xFF byte terminates it.
                    let extra = cursor.take_one()?;
                    match_len += extra as usize;
                    if extra != 0xFF {
                        break;
                    }
                },
            }
        }

        let mut offset = ((low5 as usize) << 8) | cursor.take_one()? as usize;
        if variant == Variant::Long && offset == LONG_OFFSET_ESCAPE {
            offset += cursor.take_two_be()? as usize;
        }

        copy_match(out, 1 + offset, 2 + match_len, cursor.position())?;
    }

    Ok(())
}

fn copy_literals(
    cursor: &mut Cursor<'_>,
    out: &mut Vec<u8>,
    count: usize,
) -> Result<(), DecompressionError> {
    let literals = cursor.take_n(count)?;
    if out.len() + count > MAX_DECODED_LEN {
        return Err(DecompressionError::OutputCapExceeded {
            offset: cursor.position(),
            cap: MAX_DECODED_LEN,
        });
    }
    out.extend_from_slice(literals);
    Ok(())
}

/// Append `count` bytes copied from `out.len() - lookback` onward.
///
/// The copy advances one byte at a time on purpose: when `lookback < count`
/// the source runs into bytes this very copy produced, repeating the
/// trailing `lookback`-byte pattern.
fn copy_match(
    out: &mut Vec<u8>,
    lookback: usize,
    count: usize,
    offset: usize,
) -> Result<(), DecompressionError> {
    if lookback > out.len() {
        return Err(DecompressionError::LookbackTooFar {
            offset,
            lookback,
            available: out.len(),
        });
    }
    if out.len() + count > MAX_DECODED_LEN {
        return Err(DecompressionError::OutputCapExceeded {
            offset,
            cap: MAX_DECODED_LEN,
        });
    }
    let mut src = out.len() - lookback;
    out.reserve(count);
    for _ in 0..count {
        let byte = out[src];
        out.push(byte);
        src += 1;
    }
    Ok(())
}

/// Write the compressed input and the partial output to a kept temporary
/// directory so a failing block can be inspected offline.  Only runs on the
/// error path, and only when `TDC_DUMP_ON_ERROR` is set.
#[cold]
fn dump_on_error(compressed: &[u8], partial: &[u8]) {
    if std::env::var_os("TDC_DUMP_ON_ERROR").is_none() {
        return;
    }
    let dir = match tempfile::Builder::new()
        .prefix("tdc-decompression-error-")
        .tempdir()
    {
        Ok(dir) => dir.keep(),
        Err(err) => {
            crate::displaylevel!(1, "failed to create error-dump directory: {}\n", err);
            return;
        }
    };
    for (name, bytes) in [
        ("compressed.bad_decompress.bin", compressed),
        ("decompressed.bad_decompress.bin", partial),
    ] {
        let path = dir.join(name);
        match std::fs::write(&path, bytes) {
            Ok(()) => crate::displaylevel!(2, "Dumped data to \"{}\"\n", path.display()),
            Err(err) => crate::displaylevel!(1, "failed to write \"{}\": {}\n", path.display(), err),
        }
    }
}
