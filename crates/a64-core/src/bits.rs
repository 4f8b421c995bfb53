//! Range extraction, masking and merging over fixed-width unsigned words.
//!
//! Ranges are half-open `[lo, hi)` and counted from bit 0. Every helper is
//! total: widths of zero or of the full word are valid and never shift out of
//! range.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

/// Returns a mask with the low `width` bits set. Widths of 64 or more yield
/// all ones.
#[must_use]
pub const fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Returns the in-place mask of `[lo, hi)` within a 32-bit word.
///
/// Ranges with `hi > 32` are clipped to the word, and an inverted range
/// yields an empty mask.
#[must_use]
pub const fn range_mask(lo: u32, hi: u32) -> u32 {
    if lo >= hi || lo >= 32 {
        return 0;
    }
    let hi = if hi > 32 { 32 } else { hi };
    ((low_mask(hi - lo) as u32) as u64).wrapping_shl(lo) as u32
}

/// Extracts `[lo, hi)` from `word`, right-aligned.
#[must_use]
pub const fn extract(word: u32, lo: u32, hi: u32) -> u32 {
    if lo >= hi || lo >= 32 {
        return 0;
    }
    (word & range_mask(lo, hi)) >> lo
}

/// Replaces `[lo, hi)` in `word` with the low bits of `value`.
#[must_use]
pub const fn insert(word: u32, lo: u32, hi: u32, value: u32) -> u32 {
    let mask = range_mask(lo, hi);
    if mask == 0 {
        return word;
    }
    (word & !mask) | ((value << lo) & mask)
}

/// Returns bit `index` of `word`.
#[must_use]
pub const fn bit(word: u32, index: u32) -> bool {
    index < 32 && (word >> index) & 1 == 1
}

/// Keeps the low `width` bits of `value`.
#[must_use]
pub const fn truncate(value: u64, width: u32) -> u64 {
    value & low_mask(width)
}

/// Sign-extends the low `width` bits of `value` to a full `i64`.
#[must_use]
pub const fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

/// Concatenates `(value, width)` fragments into one value.
///
/// Fragments are given least-significant first, in declaration order.
#[must_use]
pub fn concat(fragments: &[(u32, u32)]) -> u64 {
    let mut shift = 0u32;
    let mut result = 0u64;
    for &(value, width) in fragments {
        if shift < 64 {
            result |= (u64::from(value) & low_mask(width)) << shift;
        }
        shift += width;
    }
    result
}

/// Splits `value` into fragments of the given widths, least-significant
/// first. The inverse of [`concat`] up to the total width.
#[must_use]
pub fn divide(value: u64, widths: &[u32]) -> Vec<u32> {
    let mut shift = 0u32;
    widths
        .iter()
        .map(|&width| {
            let fragment = if shift >= 64 {
                0
            } else {
                (value >> shift) & low_mask(width)
            };
            shift += width;
            fragment as u32
        })
        .collect()
}

/// Rotates the low `size` bits of `value` right by `amount`.
#[must_use]
pub const fn rotate_right(value: u64, amount: u32, size: u32) -> u64 {
    let mask = low_mask(size);
    let value = value & mask;
    if size == 0 {
        return 0;
    }
    let amount = amount % size;
    if amount == 0 {
        return value;
    }
    ((value >> amount) | (value << (size - amount))) & mask
}

/// Copies the element in the low `size` bits of `value` across 64 bits.
#[must_use]
pub const fn replicate(value: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    let mut result = value & low_mask(size);
    let mut filled = size;
    while filled < 64 {
        result |= result << filled;
        filled *= 2;
    }
    result
}

/// Decodes an A64 logical immediate from its `N:immr:imms` fields.
///
/// Returns `None` for reserved encodings: all-ones elements, element sizes
/// that need `N = 1` in 32-bit mode, and an empty `N:NOT(imms)` length.
#[must_use]
pub const fn decode_bitmask(width: u32, n: u32, immr: u32, imms: u32) -> Option<u64> {
    let combined = (n << 6) | (!imms & 0x3F);
    if combined == 0 {
        return None;
    }
    if width == 32 && n != 0 {
        return None;
    }
    let length = 31 - combined.leading_zeros();
    let size = 1u32 << length;
    let levels = size - 1;
    let s = imms & levels;
    let r = immr & levels;
    if s == levels {
        return None;
    }
    let element = low_mask(s + 1);
    let value = replicate(rotate_right(element, r, size), size);
    Some(truncate(value, width))
}

/// Encodes `value` as an A64 logical immediate for a `width`-bit operation.
///
/// Returns `(n, immr, imms)`, or `None` when the value is not a replicated
/// rotated run of ones (zero and all-ones included).
#[must_use]
pub fn encode_bitmask(value: u64, width: u32) -> Option<(u32, u32, u32)> {
    let value = if width == 32 {
        replicate(value, 32)
    } else {
        value
    };
    if value == 0 || value == u64::MAX {
        return None;
    }

    let mut size = 64u32;
    while size > 2 {
        let half = size / 2;
        let mask = low_mask(half);
        if value & mask != (value >> half) & mask {
            break;
        }
        size = half;
    }

    let element = value & low_mask(size);
    let ones = element.count_ones();
    let run = low_mask(ones);
    let rotation = (0..size).find(|&r| rotate_right(element, size - r, size) == run)?;

    let n = u32::from(size == 64);
    let imms = ((!(size - 1) << 1) & 0x3F) | (ones - 1);
    if width == 32 && n == 1 {
        return None;
    }
    Some((n, rotation, imms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_and_insert_are_inverse_over_the_range() {
        let word = 0xD280_00A0;
        assert_eq!(extract(word, 5, 21), 5);
        assert_eq!(extract(word, 23, 29), 0b10_0101);
        assert_eq!(insert(0, 5, 21, 5) | insert(0, 23, 29, 0b10_0101), 0x1280_00A0);
    }

    #[test]
    fn range_mask_handles_edges() {
        assert_eq!(range_mask(0, 32), u32::MAX);
        assert_eq!(range_mask(31, 32), 0x8000_0000);
        assert_eq!(range_mask(4, 4), 0);
        assert_eq!(range_mask(8, 4), 0);
    }

    #[test]
    fn sign_extension_respects_width() {
        assert_eq!(sign_extend(0x1FF, 9), -1);
        assert_eq!(sign_extend(0x0FF, 9), 255);
        assert_eq!(sign_extend(0x4_0000, 19), -262_144);
        assert_eq!(sign_extend(5, 0), 0);
    }

    #[test]
    fn concat_orders_fragments_least_significant_first() {
        let joined = concat(&[(0b11, 2), (0x1_2345, 19)]);
        assert_eq!(joined, (0x1_2345 << 2) | 0b11);
        assert_eq!(divide(joined, &[2, 19]), vec![0b11, 0x1_2345]);
    }

    #[test]
    fn bitmask_known_values() {
        assert_eq!(decode_bitmask(64, 1, 0, 0), Some(1));
        assert_eq!(decode_bitmask(32, 0, 0, 0b00_0111), Some(0xFF));
        assert_eq!(decode_bitmask(64, 0, 0, 0b11_1100), Some(0x5555_5555_5555_5555));
        assert_eq!(decode_bitmask(32, 1, 0, 0), None);
        assert_eq!(decode_bitmask(64, 1, 0, 0b11_1111), None);
    }

    #[test]
    fn bitmask_encoding_inverts_decoding() {
        for value in [1u64, 0xFF, 0xFFFF_0000, 0x5555_5555_5555_5555, 0x8000_0000_0000_0001] {
            let (n, immr, imms) = encode_bitmask(value, 64).expect("encodable");
            assert_eq!(decode_bitmask(64, n, immr, imms), Some(value));
        }
        let (n, immr, imms) = encode_bitmask(0xF000_000F, 32).expect("encodable");
        assert_eq!(decode_bitmask(32, n, immr, imms), Some(0xF000_000F));
        assert_eq!(encode_bitmask(0, 64), None);
        assert_eq!(encode_bitmask(u64::MAX, 64), None);
        assert_eq!(encode_bitmask(0b101, 64), None);
    }
}
