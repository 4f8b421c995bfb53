//! Pure arithmetic and logic shared by the instruction handlers.
//!
//! Every function takes its operands as `u64` plus the operation [`Width`]
//! and returns results masked to that width. Nothing here touches a
//! delegate.

use crate::bits;
use crate::condition::Condition;
use crate::flags::ConditionFlags;
use crate::operand::ShiftKind;
use crate::register::Width;

const fn nz(result: u64, width: Width) -> ConditionFlags {
    ConditionFlags {
        n: result & width.sign_bit() != 0,
        z: result == 0,
        c: false,
        v: false,
    }
}

/// `x + y + carry` with the full NZCV outcome. Subtraction is
/// `add_with_carry(x, !y, true)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn add_with_carry(x: u64, y: u64, carry: bool, width: Width) -> (u64, ConditionFlags) {
    let mask = width.mask();
    let size = width.bits();
    let x = x & mask;
    let y = y & mask;
    let carry_in = carry as u128;
    let unsigned_sum = x as u128 + y as u128 + carry_in;
    let result = unsigned_sum as u64 & mask;
    let signed_sum = bits::sign_extend(x, size) as i128
        + bits::sign_extend(y, size) as i128
        + carry_in as i128;
    let flags = ConditionFlags {
        n: result & width.sign_bit() != 0,
        z: result == 0,
        c: unsigned_sum > mask as u128,
        v: bits::sign_extend(result, size) as i128 != signed_sum,
    };
    (result, flags)
}

/// `x & y`; N and Z from the result, C and V cleared.
#[must_use]
pub const fn and(x: u64, y: u64, width: Width) -> (u64, ConditionFlags) {
    let result = x & y & width.mask();
    (result, nz(result, width))
}

/// `x | y`; N and Z from the result, C and V cleared.
#[must_use]
pub const fn or(x: u64, y: u64, width: Width) -> (u64, ConditionFlags) {
    let result = (x | y) & width.mask();
    (result, nz(result, width))
}

/// `x ^ y`; N and Z from the result, C and V cleared.
#[must_use]
pub const fn eor(x: u64, y: u64, width: Width) -> (u64, ConditionFlags) {
    let result = (x ^ y) & width.mask();
    (result, nz(result, width))
}

/// Shifts `value` by `amount` modulo the width.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const fn shift(value: u64, kind: ShiftKind, amount: u32, width: Width) -> u64 {
    let size = width.bits();
    let amount = amount % size;
    let value = value & width.mask();
    let result = match kind {
        ShiftKind::Lsl => value << amount,
        ShiftKind::Lsr => value >> amount,
        ShiftKind::Asr => (bits::sign_extend(value, size) >> amount) as u64,
        ShiftKind::Ror => bits::rotate_right(value, amount, size),
    };
    result & width.mask()
}

/// Whether `condition` passes for `flags`. `NV` never passes.
#[must_use]
pub const fn condition_holds(condition: Condition, flags: ConditionFlags) -> bool {
    condition.holds(flags)
}

/// Two's-complement negation within the width.
#[must_use]
pub const fn negate(value: u64, width: Width) -> u64 {
    value.wrapping_neg() & width.mask()
}

/// Bitwise complement within the width.
#[must_use]
pub const fn invert(value: u64, width: Width) -> u64 {
    !value & width.mask()
}

/// Which bitfield instruction is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitfieldKind {
    /// `SBFM`: sign-extend above the field, zero below.
    Signed,
    /// `UBFM`: zero outside the field.
    Unsigned,
    /// `BFM`: keep the destination outside the field.
    Insert,
}

/// `SBFM`/`UBFM`/`BFM` with rotate `immr` and top bit `imms`.
///
/// When `imms >= immr` the field `src[imms:immr]` lands at bit 0, otherwise
/// `src[imms:0]` lands at bit `width - immr`. `destination` is only read for
/// [`BitfieldKind::Insert`].
#[must_use]
pub const fn bitfield(
    kind: BitfieldKind,
    destination: u64,
    source: u64,
    immr: u32,
    imms: u32,
    width: Width,
) -> u64 {
    let size = width.bits();
    let (from, length, to) = if imms >= immr {
        (immr, imms - immr + 1, 0)
    } else {
        (0, imms + 1, size - immr)
    };
    let field_mask = bits::low_mask(length) << to;
    let placed = ((source >> from) & bits::low_mask(length)) << to;
    let result = match kind {
        BitfieldKind::Unsigned => placed,
        #[allow(clippy::cast_sign_loss)]
        BitfieldKind::Signed => bits::sign_extend(placed, to + length) as u64,
        BitfieldKind::Insert => (destination & !field_mask) | placed,
    };
    result & width.mask()
}

/// `EXTR`: bits `[lsb + width - 1 : lsb]` of `high:low`.
#[must_use]
pub const fn extract(high: u64, low: u64, lsb: u32, width: Width) -> u64 {
    let size = width.bits();
    let high = high & width.mask();
    let low = low & width.mask();
    if lsb == 0 {
        return low;
    }
    ((low >> lsb) | (high << (size - lsb))) & width.mask()
}

/// `RBIT`.
#[must_use]
pub const fn reverse_bits(value: u64, width: Width) -> u64 {
    value.reverse_bits() >> (64 - width.bits())
}

/// Reverses the bytes inside each `container`-byte lane.
#[must_use]
pub const fn reverse_bytes(value: u64, container: u32, width: Width) -> u64 {
    let lane_bits = container * 8;
    let lanes = width.bits() / lane_bits;
    let mut result = 0;
    let mut lane = 0;
    while lane < lanes {
        let shift = lane * lane_bits;
        let part = (value >> shift) & bits::low_mask(lane_bits);
        let reversed = part.swap_bytes() >> (64 - lane_bits);
        result |= reversed << shift;
        lane += 1;
    }
    result
}

/// `CLZ`.
#[must_use]
pub const fn count_leading_zeros(value: u64, width: Width) -> u64 {
    let value = value & width.mask();
    (value.leading_zeros() - (64 - width.bits())) as u64
}

/// `CLS`: leading bits equal to the sign bit, excluding the sign bit.
#[must_use]
pub const fn count_leading_sign_bits(value: u64, width: Width) -> u64 {
    let value = value & width.mask();
    let spread = (value ^ (value >> 1)) & (width.mask() >> 1);
    count_leading_zeros(spread, width) - 1
}

/// `UDIV`; division by zero yields zero.
#[must_use]
pub const fn unsigned_divide(x: u64, y: u64, width: Width) -> u64 {
    let x = x & width.mask();
    let y = y & width.mask();
    if y == 0 {
        0
    } else {
        x / y
    }
}

/// `SDIV`; division by zero yields zero and `MIN / -1` wraps to `MIN`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn signed_divide(x: u64, y: u64, width: Width) -> u64 {
    let size = width.bits();
    let x = bits::sign_extend(x & width.mask(), size);
    let y = bits::sign_extend(y & width.mask(), size);
    if y == 0 {
        return 0;
    }
    (x.wrapping_div(y) as u64) & width.mask()
}

/// High 64 bits of the signed 128-bit product.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn signed_multiply_high(x: u64, y: u64) -> u64 {
    ((x as i64 as i128 * y as i64 as i128) >> 64) as u64
}

/// High 64 bits of the unsigned 128-bit product.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn unsigned_multiply_high(x: u64, y: u64) -> u64 {
    ((x as u128 * y as u128) >> 64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn add_with_carry_signed_overflow() {
        let (result, flags) = add_with_carry(0x7FFF_FFFF, 1, false, Width::W32);
        assert_eq!(result, 0x8000_0000);
        assert!(flags.v && flags.n && !flags.z && !flags.c);
    }

    #[test]
    fn add_with_carry_unsigned_wrap() {
        let (result, flags) = add_with_carry(0xFFFF_FFFF, 1, false, Width::W32);
        assert_eq!(result, 0);
        assert!(flags.c && flags.z && !flags.n && !flags.v);
    }

    #[test]
    fn subtraction_sets_carry_when_no_borrow() {
        let (result, flags) = add_with_carry(5, !3, true, Width::X64);
        assert_eq!(result, 2);
        assert!(flags.c);
        let (result, flags) = add_with_carry(3, !5, true, Width::X64);
        assert_eq!(result, 2_u64.wrapping_neg());
        assert!(!flags.c && flags.n);
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let (result, flags) = and(0xF0, 0x0F, Width::X64);
        assert_eq!(result, 0);
        assert_eq!(flags, ConditionFlags { n: false, z: true, c: false, v: false });
        let (result, flags) = or(0x8000_0000, 0, Width::W32);
        assert_eq!(result, 0x8000_0000);
        assert!(flags.n);
        assert_eq!(eor(0xFF, 0x0F, Width::X64).0, 0xF0);
    }

    #[rstest]
    #[case(ShiftKind::Lsl, 0x1, 4, Width::X64, 0x10)]
    #[case(ShiftKind::Lsl, 0x1, 33, Width::W32, 0x2)]
    #[case(ShiftKind::Lsr, 0x8000_0000, 31, Width::W32, 0x1)]
    #[case(ShiftKind::Asr, 0x8000_0000, 4, Width::W32, 0xF800_0000)]
    #[case(ShiftKind::Ror, 0x1, 1, Width::X64, 0x8000_0000_0000_0000)]
    fn shifts_mask_amount_to_width(
        #[case] kind: ShiftKind,
        #[case] value: u64,
        #[case] amount: u32,
        #[case] width: Width,
        #[case] expected: u64,
    ) {
        assert_eq!(shift(value, kind, amount, width), expected);
    }

    #[test]
    fn bitfield_extracts_and_inserts() {
        // UBFX x0, x1, #4, #8 == UBFM #4, #11
        assert_eq!(
            bitfield(BitfieldKind::Unsigned, 0, 0xABCD, 4, 11, Width::X64),
            0xBC
        );
        // SBFX sign-extends the field
        assert_eq!(
            bitfield(BitfieldKind::Signed, 0, 0x80, 0, 7, Width::W32),
            0xFFFF_FF80
        );
        // LSL x0, x1, #3 == UBFM #61, #60
        assert_eq!(
            bitfield(BitfieldKind::Unsigned, 0, 0x3, 61, 60, Width::X64),
            0x18
        );
        // BFI w0, w1, #8, #4 == BFM #24, #3
        assert_eq!(
            bitfield(BitfieldKind::Insert, 0xFFFF_FFFF, 0x5, 24, 3, Width::W32),
            0xFFFF_F5FF
        );
    }

    #[test]
    fn extract_joins_registers() {
        assert_eq!(extract(0x1, 0x0, 1, Width::X64), 0x8000_0000_0000_0000);
        assert_eq!(extract(0xAB, 0xCD, 0, Width::W32), 0xCD);
        assert_eq!(extract(0x1234_5678, 0x9ABC_DEF0, 16, Width::W32), 0x5678_9ABC);
    }

    #[test]
    fn byte_and_bit_reversal() {
        assert_eq!(reverse_bits(1, Width::W32), 0x8000_0000);
        assert_eq!(reverse_bytes(0x1122_3344, 4, Width::W32), 0x4433_2211);
        assert_eq!(reverse_bytes(0x1122_3344, 2, Width::W32), 0x2211_4433);
        assert_eq!(
            reverse_bytes(0x0102_0304_0506_0708, 4, Width::X64),
            0x0403_0201_0807_0605
        );
    }

    #[test]
    fn leading_counts() {
        assert_eq!(count_leading_zeros(1, Width::W32), 31);
        assert_eq!(count_leading_zeros(0, Width::X64), 64);
        assert_eq!(count_leading_sign_bits(0, Width::X64), 63);
        assert_eq!(count_leading_sign_bits(0xFFFF_FFFF, Width::W32), 31);
        assert_eq!(count_leading_sign_bits(0x4000_0000, Width::W32), 0);
    }

    #[test]
    fn division_edge_cases() {
        assert_eq!(unsigned_divide(10, 0, Width::X64), 0);
        assert_eq!(signed_divide(0x8000_0000, 0xFFFF_FFFF, Width::W32), 0x8000_0000);
        assert_eq!(signed_divide(7_u64.wrapping_neg(), 2, Width::X64), 3_u64.wrapping_neg());
    }

    #[test]
    fn multiply_high_halves() {
        assert_eq!(unsigned_multiply_high(u64::MAX, 2), 1);
        assert_eq!(signed_multiply_high(u64::MAX, 2), u64::MAX);
    }
}
