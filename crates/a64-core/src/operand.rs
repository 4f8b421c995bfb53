//! Shift, extend and indexing modifiers shared by decode, build and execute.

use std::fmt;

use crate::register::Width;

/// Shift applied to a register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ShiftKind {
    /// Logical shift left.
    Lsl,
    /// Logical shift right.
    Lsr,
    /// Arithmetic shift right.
    Asr,
    /// Rotate right.
    Ror,
}

impl ShiftKind {
    /// Converts a 2-bit `shift` field.
    #[must_use]
    pub const fn from_u2(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Lsl),
            1 => Some(Self::Lsr),
            2 => Some(Self::Asr),
            3 => Some(Self::Ror),
            _ => None,
        }
    }

    /// 2-bit encoding.
    #[must_use]
    pub const fn as_u2(self) -> u8 {
        match self {
            Self::Lsl => 0,
            Self::Lsr => 1,
            Self::Asr => 2,
            Self::Ror => 3,
        }
    }

    /// Upper-case assembler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lsl => "LSL",
            Self::Lsr => "LSR",
            Self::Asr => "ASR",
            Self::Ror => "ROR",
        }
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extension applied to a register operand before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExtendKind {
    /// Zero-extend byte.
    Uxtb,
    /// Zero-extend halfword.
    Uxth,
    /// Zero-extend word.
    Uxtw,
    /// Zero-extend doubleword (no-op).
    Uxtx,
    /// Sign-extend byte.
    Sxtb,
    /// Sign-extend halfword.
    Sxth,
    /// Sign-extend word.
    Sxtw,
    /// Sign-extend doubleword (no-op).
    Sxtx,
}

impl ExtendKind {
    /// Converts a 3-bit `option` field.
    #[must_use]
    pub const fn from_u3(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uxtb),
            1 => Some(Self::Uxth),
            2 => Some(Self::Uxtw),
            3 => Some(Self::Uxtx),
            4 => Some(Self::Sxtb),
            5 => Some(Self::Sxth),
            6 => Some(Self::Sxtw),
            7 => Some(Self::Sxtx),
            _ => None,
        }
    }

    /// 3-bit encoding.
    #[must_use]
    pub const fn as_u3(self) -> u8 {
        match self {
            Self::Uxtb => 0,
            Self::Uxth => 1,
            Self::Uxtw => 2,
            Self::Uxtx => 3,
            Self::Sxtb => 4,
            Self::Sxth => 5,
            Self::Sxtw => 6,
            Self::Sxtx => 7,
        }
    }

    /// Width of the source register the extension reads: `X` only for the
    /// doubleword forms.
    #[must_use]
    pub const fn source_width(self) -> Width {
        match self {
            Self::Uxtx | Self::Sxtx => Width::X64,
            _ => Width::W32,
        }
    }

    /// Applies the extension to `value`, producing a 64-bit result.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub const fn apply(self, value: u64) -> u64 {
        match self {
            Self::Uxtb => value & 0xFF,
            Self::Uxth => value & 0xFFFF,
            Self::Uxtw => value & 0xFFFF_FFFF,
            Self::Uxtx | Self::Sxtx => value,
            Self::Sxtb => value as u8 as i8 as i64 as u64,
            Self::Sxth => value as u16 as i16 as i64 as u64,
            Self::Sxtw => value as u32 as i32 as i64 as u64,
        }
    }

    /// Upper-case assembler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uxtb => "UXTB",
            Self::Uxth => "UXTH",
            Self::Uxtw => "UXTW",
            Self::Uxtx => "UXTX",
            Self::Sxtb => "SXTB",
            Self::Sxth => "SXTH",
            Self::Sxtw => "SXTW",
            Self::Sxtx => "SXTX",
        }
    }

    /// Parses an extend name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        (0..8).filter_map(Self::from_u3).find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ExtendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base-register update behaviour of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IndexMode {
    /// Access at `base + offset`; base unchanged.
    Offset,
    /// Base updated to `base + offset`, access at the new base.
    PreIndex,
    /// Access at `base`, then base updated to `base + offset`.
    PostIndex,
}
