//! MSB-first bit packing of sensor samples.
//!
//! Rows always start on a byte boundary, matching the TIFF layout for
//! uncompressed strips whose BitsPerSample is not a multiple of eight.

/// Number of bytes one packed row of `width` samples occupies.
pub fn packed_row_bytes(width: usize, bits: u16) -> usize {
    (width * bits as usize).div_ceil(8)
}

fn low_mask(bits: u16) -> u32 {
    (1u32 << bits) - 1
}

/// Packs `samples` (row-major, `width` samples per row) at `bits` per sample.
///
/// Only the low `bits` bits of every sample are kept.
pub fn pack_msb(samples: &[u16], bits: u16, width: usize) -> Vec<u8> {
    debug_assert!((1..=16).contains(&bits));
    if width == 0 {
        return Vec::new();
    }
    let rows = samples.len().div_ceil(width);
    let mut out = Vec::with_capacity(packed_row_bytes(width, bits) * rows);
    let mask = low_mask(bits);

    for row in samples.chunks(width) {
        let mut acc: u32 = 0;
        let mut filled: u32 = 0;
        for &sample in row {
            acc = (acc << bits) | (u32::from(sample) & mask);
            filled += u32::from(bits);
            while filled >= 8 {
                filled -= 8;
                out.push((acc >> filled) as u8);
            }
            acc &= (1u32 << filled) - 1;
        }
        if filled > 0 {
            out.push((acc << (8 - filled)) as u8);
        }
    }
    out
}

/// Unpacks complete rows from `data`; a trailing partial row is ignored.
pub fn unpack_msb(data: &[u8], bits: u16, width: usize) -> Vec<u16> {
    debug_assert!((1..=16).contains(&bits));
    let row_bytes = packed_row_bytes(width, bits);
    if row_bytes == 0 {
        return Vec::new();
    }
    let mask = low_mask(bits);
    let mut out = Vec::with_capacity(data.len() / row_bytes * width);

    for row in data.chunks_exact(row_bytes) {
        let mut bytes = row.iter();
        let mut acc: u32 = 0;
        let mut filled: u32 = 0;
        for _ in 0..width {
            while filled < u32::from(bits) {
                let Some(&byte) = bytes.next() else { break };
                acc = (acc << 8) | u32::from(byte);
                filled += 8;
            }
            filled -= u32::from(bits);
            out.push(((acc >> filled) & mask) as u16);
            acc &= (1u32 << filled) - 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_bit_pairs_pack_into_three_bytes() {
        let packed = pack_msb(&[0xABC, 0x123], 12, 2);
        assert_eq!(packed, vec![0xAB, 0xC1, 0x23]);
        assert_eq!(unpack_msb(&packed, 12, 2), vec![0xABC, 0x123]);
    }

    #[test]
    fn test_rows_are_padded_to_a_byte() {
        // 3 x 10-bit = 30 bits -> 4 bytes per row
        assert_eq!(packed_row_bytes(3, 10), 4);
        let samples = [0x3FF, 0x000, 0x3FF, 0x001, 0x002, 0x003];
        let packed = pack_msb(&samples, 10, 3);
        assert_eq!(packed.len(), 8);
        assert_eq!(packed[3] & 0b11, 0);
        assert_eq!(unpack_msb(&packed, 10, 3), samples.to_vec());
    }

    #[test]
    fn test_high_bits_are_masked() {
        let packed = pack_msb(&[0xFFFF], 4, 1);
        assert_eq!(packed, vec![0xF0]);
    }

    #[test]
    fn test_partial_trailing_row_is_dropped() {
        let packed = pack_msb(&[1, 2, 3, 4], 12, 2);
        assert_eq!(packed.len(), 6);
        assert_eq!(unpack_msb(&packed[..5], 12, 2), vec![1, 2]);
    }

    #[test]
    fn test_sixteen_bit_is_big_endian_bytes() {
        assert_eq!(pack_msb(&[0x1234], 16, 1), vec![0x12, 0x34]);
    }
}
