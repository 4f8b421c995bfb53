//! General-purpose register model.
//!
//! A64 exposes two parallel views of the same 31 registers (`W0..W30` and
//! `X0..X30`). Encoding 31 has no fixed meaning: depending on the operand it
//! names the stack pointer or the zero register, so callers always pass an
//! [`IndexContext`] when turning a 5-bit field into a [`Register`].

use std::fmt;

/// Operand width of an instruction or register view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Width {
    /// 32-bit operation on `W` registers.
    W32,
    /// 64-bit operation on `X` registers.
    #[default]
    X64,
}

impl Width {
    /// Maps the `sf` bit to a width.
    #[must_use]
    pub const fn from_sf(sf: bool) -> Self {
        if sf {
            Self::X64
        } else {
            Self::W32
        }
    }

    /// Returns the `sf` bit for this width.
    #[must_use]
    pub const fn sf(self) -> bool {
        matches!(self, Self::X64)
    }

    /// Number of bits in the view.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::W32 => 32,
            Self::X64 => 64,
        }
    }

    /// Number of bytes in the view.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::W32 => 4,
            Self::X64 => 8,
        }
    }

    /// Mask covering the view.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::W32 => 0xFFFF_FFFF,
            Self::X64 => u64::MAX,
        }
    }

    /// Most significant bit of the view.
    #[must_use]
    pub const fn sign_bit(self) -> u64 {
        match self {
            Self::W32 => 1 << 31,
            Self::X64 => 1 << 63,
        }
    }
}

/// How register encoding 31 is interpreted for one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexContext {
    /// Encoding 31 names `SP`/`WSP`.
    StackPointer,
    /// Encoding 31 names `XZR`/`WZR`.
    ZeroRegister,
}

/// Architectural identity of a general-purpose register view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Register {
    /// 32-bit view of general register `n` (0..=30).
    W(u8),
    /// 64-bit view of general register `n` (0..=30).
    X(u8),
    /// 32-bit stack pointer view.
    Wsp,
    /// 64-bit stack pointer.
    Sp,
    /// 32-bit zero register.
    Wzr,
    /// 64-bit zero register.
    Xzr,
}

impl Register {
    /// Link register used by `BL`, `BLR` and `RET`.
    pub const LINK: Self = Self::X(30);
    /// Frame pointer by convention.
    pub const FRAME: Self = Self::X(29);
    /// Register holding the system call number for `SVC`.
    pub const SYSCALL_NUMBER: Self = Self::X(16);

    /// Resolves a 5-bit encoding. Returns `None` for encodings above 31.
    #[must_use]
    pub const fn from_index(index: u8, width: Width, context: IndexContext) -> Option<Self> {
        match (index, width, context) {
            (0..=30, Width::W32, _) => Some(Self::W(index)),
            (0..=30, Width::X64, _) => Some(Self::X(index)),
            (31, Width::W32, IndexContext::StackPointer) => Some(Self::Wsp),
            (31, Width::X64, IndexContext::StackPointer) => Some(Self::Sp),
            (31, Width::W32, IndexContext::ZeroRegister) => Some(Self::Wzr),
            (31, Width::X64, IndexContext::ZeroRegister) => Some(Self::Xzr),
            _ => None,
        }
    }

    /// Resolves the low five bits of a raw field value. Total, unlike
    /// [`Register::from_index`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_field(raw: u32, width: Width, context: IndexContext) -> Self {
        match ((raw & 0x1F) as u8, width, context) {
            (31, Width::W32, IndexContext::StackPointer) => Self::Wsp,
            (31, Width::X64, IndexContext::StackPointer) => Self::Sp,
            (31, Width::W32, IndexContext::ZeroRegister) => Self::Wzr,
            (31, Width::X64, IndexContext::ZeroRegister) => Self::Xzr,
            (n, Width::W32, _) => Self::W(n),
            (n, Width::X64, _) => Self::X(n),
        }
    }

    /// `Xn`, with 31 meaning `XZR`. Indices are taken modulo 32.
    #[must_use]
    pub const fn x(index: u8) -> Self {
        match index & 0x1F {
            31 => Self::Xzr,
            n => Self::X(n),
        }
    }

    /// `Wn`, with 31 meaning `WZR`. Indices are taken modulo 32.
    #[must_use]
    pub const fn w(index: u8) -> Self {
        match index & 0x1F {
            31 => Self::Wzr,
            n => Self::W(n),
        }
    }

    /// 5-bit encoding of this register.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::W(n) | Self::X(n) => n & 0x1F,
            Self::Wsp | Self::Sp | Self::Wzr | Self::Xzr => 31,
        }
    }

    /// Width of the view.
    #[must_use]
    pub const fn width(self) -> Width {
        match self {
            Self::W(_) | Self::Wsp | Self::Wzr => Width::W32,
            Self::X(_) | Self::Sp | Self::Xzr => Width::X64,
        }
    }

    /// Returns `true` for `SP`/`WSP`.
    #[must_use]
    pub const fn is_stack_pointer(self) -> bool {
        matches!(self, Self::Sp | Self::Wsp)
    }

    /// Returns `true` for `XZR`/`WZR`.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        matches!(self, Self::Xzr | Self::Wzr)
    }

    /// Same register in the other view width.
    #[must_use]
    pub const fn with_width(self, width: Width) -> Self {
        match (self, width) {
            (Self::W(n) | Self::X(n), Width::W32) => Self::W(n),
            (Self::W(n) | Self::X(n), Width::X64) => Self::X(n),
            (Self::Wsp | Self::Sp, Width::W32) => Self::Wsp,
            (Self::Wsp | Self::Sp, Width::X64) => Self::Sp,
            (Self::Wzr | Self::Xzr, Width::W32) => Self::Wzr,
            (Self::Wzr | Self::Xzr, Width::X64) => Self::Xzr,
        }
    }

    /// Context in which this register's encoding must be read back.
    #[must_use]
    pub const fn context(self) -> IndexContext {
        if self.is_stack_pointer() {
            IndexContext::StackPointer
        } else {
            IndexContext::ZeroRegister
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::W(n) => write!(f, "w{n}"),
            Self::X(n) => write!(f, "x{n}"),
            Self::Wsp => f.write_str("wsp"),
            Self::Sp => f.write_str("sp"),
            Self::Wzr => f.write_str("wzr"),
            Self::Xzr => f.write_str("xzr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexContext, Register, Width};

    #[test]
    fn index_31_depends_on_context() {
        assert_eq!(
            Register::from_index(31, Width::X64, IndexContext::StackPointer),
            Some(Register::Sp)
        );
        assert_eq!(
            Register::from_index(31, Width::X64, IndexContext::ZeroRegister),
            Some(Register::Xzr)
        );
        assert_eq!(
            Register::from_index(31, Width::W32, IndexContext::StackPointer),
            Some(Register::Wsp)
        );
        assert_eq!(
            Register::from_index(31, Width::W32, IndexContext::ZeroRegister),
            Some(Register::Wzr)
        );
        assert_eq!(
            Register::from_index(32, Width::X64, IndexContext::ZeroRegister),
            None
        );
    }

    #[test]
    fn ordinary_indices_ignore_context() {
        for index in 0..=30 {
            let sp = Register::from_index(index, Width::X64, IndexContext::StackPointer);
            let zr = Register::from_index(index, Width::X64, IndexContext::ZeroRegister);
            assert_eq!(sp, zr);
            assert_eq!(sp.map(Register::index), Some(index));
        }
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Register::X(3).to_string(), "x3");
        assert_eq!(Register::W(30).to_string(), "w30");
        assert_eq!(Register::Sp.to_string(), "sp");
        assert_eq!(Register::Wzr.to_string(), "wzr");
    }

    #[test]
    fn width_conversion_keeps_identity() {
        assert_eq!(Register::X(7).with_width(Width::W32), Register::W(7));
        assert_eq!(Register::Wsp.with_width(Width::X64), Register::Sp);
        assert_eq!(Register::Xzr.with_width(Width::W32), Register::Wzr);
        assert_eq!(Register::x(31), Register::Xzr);
    }
}
