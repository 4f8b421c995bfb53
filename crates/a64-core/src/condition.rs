//! Condition codes and their evaluation over NZCV.

use std::fmt;

use crate::flags::ConditionFlags;

/// The sixteen A64 condition codes in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Condition {
    /// Equal (`Z`).
    Eq = 0x0,
    /// Not equal (`!Z`).
    Ne = 0x1,
    /// Carry set / unsigned higher or same (`C`).
    Cs = 0x2,
    /// Carry clear / unsigned lower (`!C`).
    Cc = 0x3,
    /// Minus (`N`).
    Mi = 0x4,
    /// Plus or zero (`!N`).
    Pl = 0x5,
    /// Overflow (`V`).
    Vs = 0x6,
    /// No overflow (`!V`).
    Vc = 0x7,
    /// Unsigned higher (`C && !Z`).
    Hi = 0x8,
    /// Unsigned lower or same (`!C || Z`).
    Ls = 0x9,
    /// Signed greater or equal (`N == V`).
    Ge = 0xA,
    /// Signed less than (`N != V`).
    Lt = 0xB,
    /// Signed greater than (`!Z && N == V`).
    Gt = 0xC,
    /// Signed less or equal (`Z || N != V`).
    Le = 0xD,
    /// Always.
    Al = 0xE,
    /// Never. The hardware treats this encoding like `AL`; the model
    /// evaluates it as false.
    Nv = 0xF,
}

impl Condition {
    /// All conditions in encoding order.
    pub const ALL: [Self; 16] = [
        Self::Eq,
        Self::Ne,
        Self::Cs,
        Self::Cc,
        Self::Mi,
        Self::Pl,
        Self::Vs,
        Self::Vc,
        Self::Hi,
        Self::Ls,
        Self::Ge,
        Self::Lt,
        Self::Gt,
        Self::Le,
        Self::Al,
        Self::Nv,
    ];

    /// Converts a 4-bit encoding.
    #[must_use]
    pub const fn from_u4(value: u8) -> Option<Self> {
        if value < 16 {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// 4-bit encoding.
    #[must_use]
    pub const fn as_u4(self) -> u8 {
        self as u8
    }

    /// Logical negation, flipping the low encoding bit.
    #[must_use]
    pub const fn invert(self) -> Self {
        Self::ALL[(self.as_u4() ^ 1) as usize]
    }

    /// Returns `true` for `AL` and `NV`, which aliases never invert.
    #[must_use]
    pub const fn is_always(self) -> bool {
        matches!(self, Self::Al | Self::Nv)
    }

    /// Evaluates the condition against `flags`.
    #[must_use]
    pub const fn holds(self, flags: ConditionFlags) -> bool {
        let ConditionFlags { n, z, c, v } = flags;
        match self {
            Self::Eq => z,
            Self::Ne => !z,
            Self::Cs => c,
            Self::Cc => !c,
            Self::Mi => n,
            Self::Pl => !n,
            Self::Vs => v,
            Self::Vc => !v,
            Self::Hi => c && !z,
            Self::Ls => !c || z,
            Self::Ge => n == v,
            Self::Lt => n != v,
            Self::Gt => !z && n == v,
            Self::Le => z || n != v,
            Self::Al => true,
            Self::Nv => false,
        }
    }

    /// Upper-case assembler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Cs => "CS",
            Self::Cc => "CC",
            Self::Mi => "MI",
            Self::Pl => "PL",
            Self::Vs => "VS",
            Self::Vc => "VC",
            Self::Hi => "HI",
            Self::Ls => "LS",
            Self::Ge => "GE",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
            Self::Al => "AL",
            Self::Nv => "NV",
        }
    }

    /// Parses a condition name, accepting `HS`/`LO` as `CS`/`CC`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "HS" => Some(Self::Cs),
            "LO" => Some(Self::Cc),
            other => Self::ALL.into_iter().find(|cond| cond.name() == other),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::Condition;

    #[test]
    fn inversion_pairs_conditions() {
        assert_eq!(Condition::Eq.invert(), Condition::Ne);
        assert_eq!(Condition::Ge.invert(), Condition::Lt);
        assert_eq!(Condition::Hi.invert(), Condition::Ls);
        for cond in Condition::ALL {
            assert_eq!(cond.invert().invert(), cond);
        }
    }

    #[test]
    fn names_round_trip() {
        for cond in Condition::ALL {
            assert_eq!(Condition::from_name(cond.name()), Some(cond));
        }
        assert_eq!(Condition::from_name("hs"), Some(Condition::Cs));
        assert_eq!(Condition::from_name("lo"), Some(Condition::Cc));
        assert_eq!(Condition::from_name("xx"), None);
    }
}
