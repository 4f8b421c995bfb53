//! NZCV condition flags.

/// One of the four condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Flag {
    /// Negative.
    N,
    /// Zero.
    Z,
    /// Carry.
    C,
    /// Overflow.
    V,
}

impl Flag {
    /// All flags, most significant NZCV bit first.
    pub const ALL: [Self; 4] = [Self::N, Self::Z, Self::C, Self::V];
}

/// Snapshot of the NZCV flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct ConditionFlags {
    /// Negative.
    pub n: bool,
    /// Zero.
    pub z: bool,
    /// Carry.
    pub c: bool,
    /// Overflow.
    pub v: bool,
}

impl ConditionFlags {
    /// Builds flags from a 4-bit `NZCV` nibble (N in bit 3).
    #[must_use]
    pub const fn from_nzcv(nibble: u8) -> Self {
        Self {
            n: nibble & 0b1000 != 0,
            z: nibble & 0b0100 != 0,
            c: nibble & 0b0010 != 0,
            v: nibble & 0b0001 != 0,
        }
    }

    /// Packs the flags into a 4-bit `NZCV` nibble.
    #[must_use]
    pub fn to_nzcv(self) -> u8 {
        (u8::from(self.n) << 3) | (u8::from(self.z) << 2) | (u8::from(self.c) << 1) | u8::from(self.v)
    }

    /// Reads one flag.
    #[must_use]
    pub const fn get(self, flag: Flag) -> bool {
        match flag {
            Flag::N => self.n,
            Flag::Z => self.z,
            Flag::C => self.c,
            Flag::V => self.v,
        }
    }

    /// Writes one flag.
    pub fn set(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::N => self.n = value,
            Flag::Z => self.z = value,
            Flag::C => self.c = value,
            Flag::V => self.v = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConditionFlags, Flag};

    #[test]
    fn nzcv_nibble_round_trips() {
        for nibble in 0..16u8 {
            assert_eq!(ConditionFlags::from_nzcv(nibble).to_nzcv(), nibble);
        }
        let flags = ConditionFlags::from_nzcv(0b1010);
        assert!(flags.get(Flag::N));
        assert!(!flags.get(Flag::Z));
        assert!(flags.get(Flag::C));
        assert!(!flags.get(Flag::V));
    }
}
