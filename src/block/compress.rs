//! Block compression.
//!
//! The encoder is deliberately conservative: a greedy LZ77 matcher over a
//! small position hash table, emitting the short codec variant only.  It
//! never needs the long variant's extension chains — matches are capped at
//! the short variant's maximum length and the 13-bit offset field covers the
//! whole search window.  Output always begins with a literal opcode, which
//! doubles as the variant header.

use crate::block::types::{MAX_LITERAL_RUN, MAX_LOOKBACK, MAX_MATCH, MIN_MATCH};

/// Log2 of the position hash-table size.
const HASH_LOG: u32 = 12;

/// Number of slots in the position hash table.
const TABLE_SIZE: usize = 1 << HASH_LOG;

/// Knuth multiplicative hash over a 3-byte sequence.
#[inline]
fn hash_sequence(input: &[u8], pos: usize) -> usize {
    let sequence = u32::from(input[pos])
        | u32::from(input[pos + 1]) << 8
        | u32::from(input[pos + 2]) << 16;
    (sequence.wrapping_mul(2_654_435_761) >> (32 - HASH_LOG)) as usize
}

/// Worst-case compressed size for `len` input bytes: one control byte per
/// 32-byte literal run, no matches.
pub const fn compress_bound(len: usize) -> usize {
    len + (len + MAX_LITERAL_RUN - 1) / MAX_LITERAL_RUN
}

/// Compress one block.
///
/// The empty input compresses to the empty output.  Output is guaranteed to
/// decode back to `raw` via [`crate::block::decompress`]; no particular bit
/// pattern is promised beyond that.
pub fn compress(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(compress_bound(raw.len()).min(raw.len() + 64));
    if raw.is_empty() {
        return out;
    }

    // Slots store position + 1; zero means empty.
    let mut table = vec![0u32; TABLE_SIZE];

    let mut literal_start = 0usize;
    let mut pos = 0usize;
    while pos + MIN_MATCH <= raw.len() {
        let slot = hash_sequence(raw, pos);
        let candidate = table[slot] as usize;
        table[slot] = (pos + 1) as u32;

        if candidate > 0 {
            let candidate = candidate - 1;
            let distance = pos - candidate;
            if distance <= MAX_LOOKBACK && raw[candidate..candidate + MIN_MATCH] == raw[pos..pos + MIN_MATCH]
            {
                let limit = (raw.len() - pos).min(MAX_MATCH);
                let mut len = MIN_MATCH;
                while len < limit && raw[candidate + len] == raw[pos + len] {
                    len += 1;
                }
                // A match can never open the stream: position 0 has no
                // candidate, so the first opcode below is a literal run and
                // its high bits select the short variant.
                emit_literals(&mut out, &raw[literal_start..pos]);
                emit_match(&mut out, distance - 1, len);
                pos += len;
                literal_start = pos;
                continue;
            }
        }
        pos += 1;
    }

    emit_literals(&mut out, &raw[literal_start..]);
    out
}

fn emit_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_LITERAL_RUN) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
}

/// Emit a backreference opcode.  `offset` is lookback minus one and must fit
/// 13 bits; `len` must lie in `MIN_MATCH..=MAX_MATCH`.
fn emit_match(out: &mut Vec<u8>, offset: usize, len: usize) {
    debug_assert!(offset < MAX_LOOKBACK);
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));
    let len_code = len - 2;
    let offset_high = (offset >> 8) as u8;
    if len_code < 7 {
        out.push((len_code as u8) << 5 | offset_high);
    } else {
        out.push(7 << 5 | offset_high);
        out.push((len_code - 7) as u8);
    }
    out.push((offset & 0xFF) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decompress::decompress;

    fn round_trip(data: &[u8]) {
        let compressed = compress(data);
        assert_eq!(decompress(&compressed).unwrap(), data, "round-trip failed");
    }

    #[test]
    fn empty() {
        assert_eq!(compress(&[]), Vec::<u8>::new());
        round_trip(&[]);
    }

    #[test]
    fn single_byte() {
        assert_eq!(compress(&[0x42]), vec![0x00, 0x42]);
        round_trip(&[0x42]);
    }

    #[test]
    fn exactly_32_bytes() {
        let data: Vec<u8> = (0u8..32).collect();
        round_trip(&data);
    }

    #[test]
    fn multiple_of_32_bytes() {
        let data: Vec<u8> = (0u8..=255).collect();
        round_trip(&data);
    }

    #[test]
    fn run_of_equal_bytes_compresses() {
        let data = vec![b'A'; 16 * 1024];
        let compressed = compress(&data);
        assert!(compressed.len() < data.len() / 16);
        round_trip(&data);
    }

    #[test]
    fn compressible_text() {
        let data = b"the quick brown fox jumps over the quick brown dog; \
                     the quick brown fox naps."
            .repeat(50);
        let compressed = compress(&data);
        assert!(compressed.len() < data.len());
        round_trip(&data);
    }

    #[test]
    fn random_16_kib() {
        use rand::RngCore;
        let mut data = vec![0u8; 16 * 1024];
        rand::thread_rng().fill_bytes(&mut data);
        round_trip(&data);
    }

    #[test]
    fn long_period_pattern() {
        // Period longer than the maximum match length.
        let unit: Vec<u8> = (0u8..=255).cycle().take(300).collect();
        let data: Vec<u8> = unit.iter().copied().cycle().take(6000).collect();
        round_trip(&data);
    }

    #[test]
    fn matches_beyond_window_fall_back_to_literals() {
        // Repetition with a period just past the search window.
        let mut data = vec![0u8; MAX_LOOKBACK + 1];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.extend(std::iter::repeat(0u8).take(MAX_LOOKBACK + 1));
        round_trip(&data);
    }

    #[test]
    fn bound_holds_for_incompressible_input() {
        use rand::RngCore;
        let mut data = vec![0u8; 4096];
        rand::thread_rng().fill_bytes(&mut data);
        assert!(compress(&data).len() <= compress_bound(data.len()));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trips(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
                let compressed = compress(&data);
                prop_assert_eq!(decompress(&compressed).unwrap(), data);
            }

            #[test]
            fn output_within_bound(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
                prop_assert!(compress(&data).len() <= compress_bound(data.len()));
            }
        }
    }
}
