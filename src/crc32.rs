//! CRC-32 engine for TDC block records.
//!
//! TDC stores one CRC-32 per block record, computed over the *decompressed*
//! payload.  The parameterization is the BZIP2 variant: polynomial
//! 0x04C11DB7, initial register 0xFFFFFFFF, MSB-first processing with no
//! input or output reflection, and a final XOR of 0xFFFFFFFF.  This differs
//! from the far more common reflected CRC-32 (zlib/PNG), so the usual crates
//! do not apply.

/// Generator polynomial (MSB-first form).
pub const CRC32_POLY: u32 = 0x04C1_1DB7;

/// 256-entry lookup table for byte-at-a-time MSB-first CRC updates.
///
/// Entry `i` is the register contribution of shifting byte `i` through the
/// polynomial division eight bits at a time.
static CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-32 (BZIP2 variant) of `data`.
///
/// Equivalent to feeding each input byte into the high byte of the register
/// and clocking the register eight times, XORing in the polynomial whenever
/// the shifted-out bit is set.
pub fn crc32(data: &[u8]) -> u32 {
    let mut reg: u32 = 0xFFFF_FFFF;
    for &byte in data {
        let index = ((reg >> 24) as u8 ^ byte) as usize;
        reg = (reg << 8) ^ CRC32_TABLE[index];
    }
    !reg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        s.as_bytes()
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
            .collect()
    }

    #[test]
    fn all_byte_values() {
        let data: Vec<u8> = (0u8..=255).collect();
        assert_eq!(crc32(&data), 0xB6B5_EE95);
    }

    #[test]
    fn random_16_bytes_a() {
        assert_eq!(crc32(&hex("c57198c7add891b93d3948dbf3d659b3")), 0x67F0_FED5);
    }

    #[test]
    fn random_16_bytes_b() {
        assert_eq!(crc32(&hex("ec275b295d53743d43638984fb4b6772")), 0x98B5_0D4C);
    }

    #[test]
    fn random_32_bytes() {
        assert_eq!(
            crc32(&hex(
                "40a97ee33dc971be93d50169b2d2635121e32d2f0553b2c5b4b2eb59ddacdb0b"
            )),
            0x4B0A_823E
        );
    }

    #[test]
    fn repeated_byte_ramp() {
        let ramp: Vec<u8> = (0u8..=255).collect();
        let mut data = Vec::with_capacity(ramp.len() * 1023);
        for _ in 0..1023 {
            data.extend_from_slice(&ramp);
        }
        assert_eq!(crc32(&data), 0x00B0_6B15);
    }

    #[test]
    fn short_ramp() {
        let data: Vec<u8> = (0u8..0x20).collect();
        assert_eq!(crc32(&data), 0x707E_66AF);
    }

    #[test]
    fn empty_input() {
        // Initial register XORed straight back out.
        assert_eq!(crc32(&[]), 0);
    }
}
