//! Register views and address arithmetic for the handlers.

use crate::bits;
use crate::error::{DelegateError, ExecuteError};
use crate::execute::ExecutionDelegate;
use crate::operand::IndexMode;
use crate::register::{Register, Width};

/// The 64-bit view a delegate stores `register` under.
#[must_use]
pub const fn architectural(register: Register) -> Register {
    register.with_width(Width::X64)
}

/// Reads `register` in its own width; zero registers read as 0 without
/// consulting the delegate.
///
/// # Errors
///
/// Propagates the delegate's refusal.
pub fn read_register(
    delegate: &dyn ExecutionDelegate,
    register: Register,
) -> Result<u64, ExecuteError> {
    if register.is_zero() {
        return Ok(0);
    }
    let value = delegate.register(architectural(register))?;
    Ok(value & register.width().mask())
}

/// Returns `(access, writeback)` for a base, signed offset and index mode.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn effective_address(base: u64, offset: i64, mode: IndexMode) -> (u64, Option<u64>) {
    let updated = base.wrapping_add(offset as u64);
    match mode {
        IndexMode::Offset => (updated, None),
        IndexMode::PreIndex => (updated, Some(updated)),
        IndexMode::PostIndex => (base, Some(updated)),
    }
}

/// Zero-extending read of `size` bytes.
///
/// # Errors
///
/// Propagates the delegate's refusal; sizes other than 1, 2, 4 and 8 are
/// [`DelegateError::UnsupportedAccess`].
pub fn load(delegate: &dyn ExecutionDelegate, address: u64, size: u64) -> Result<u64, DelegateError> {
    match size {
        1 => delegate.read_byte(address).map(u64::from),
        2 => delegate.read_halfword(address).map(u64::from),
        4 => delegate.read_word(address).map(u64::from),
        8 => delegate.read_doubleword(address),
        _ => Err(DelegateError::UnsupportedAccess { size }),
    }
}

/// Writes the low `size` bytes of `value`.
///
/// # Errors
///
/// As [`load`].
#[allow(clippy::cast_possible_truncation)]
pub fn store(
    delegate: &mut dyn ExecutionDelegate,
    address: u64,
    size: u64,
    value: u64,
) -> Result<(), DelegateError> {
    match size {
        1 => delegate.write_byte(address, value as u8),
        2 => delegate.write_halfword(address, value as u16),
        4 => delegate.write_word(address, value as u32),
        8 => delegate.write_doubleword(address, value),
        _ => Err(DelegateError::UnsupportedAccess { size }),
    }
}

/// Sign-extends a `size`-byte loaded value into `width`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn sign_extend_load(value: u64, size: u64, width: Width) -> u64 {
    bits::sign_extend(value, (size * 8) as u32) as u64 & width.mask()
}

#[cfg(test)]
mod tests {
    use super::{effective_address, sign_extend_load};
    use crate::operand::IndexMode;
    use crate::register::Width;

    #[test]
    fn index_modes_pick_access_and_writeback() {
        assert_eq!(effective_address(0x1000, 16, IndexMode::Offset), (0x1010, None));
        assert_eq!(
            effective_address(0x1000, -16, IndexMode::PreIndex),
            (0x0FF0, Some(0x0FF0))
        );
        assert_eq!(
            effective_address(0x1000, 8, IndexMode::PostIndex),
            (0x1000, Some(0x1008))
        );
    }

    #[test]
    fn signed_loads_fill_the_destination_width() {
        assert_eq!(sign_extend_load(0x80, 1, Width::W32), 0xFFFF_FF80);
        assert_eq!(sign_extend_load(0x8000_0000, 4, Width::X64), 0xFFFF_FFFF_8000_0000);
        assert_eq!(sign_extend_load(0x7F, 1, Width::X64), 0x7F);
    }
}
