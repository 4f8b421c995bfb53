//! Operation tags: the decoded identity of an instruction.
//!
//! An operation is what the execution engine dispatches on. It is distinct
//! from the display mnemonic, which may be an alias (see [`crate::alias`]).

use std::fmt;

/// Every operation the decoder can produce or the builder can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    /// Form PC-relative address.
    Adr,
    /// Form PC-relative 4 KiB page address.
    Adrp,
    /// Add.
    Add,
    /// Add, setting flags.
    Adds,
    /// Subtract.
    Sub,
    /// Subtract, setting flags.
    Subs,
    /// Bitwise AND.
    And,
    /// Bitwise inclusive OR.
    Orr,
    /// Bitwise exclusive OR.
    Eor,
    /// Bitwise AND, setting flags.
    Ands,
    /// Bitwise bit clear.
    Bic,
    /// Bitwise OR NOT.
    Orn,
    /// Bitwise exclusive OR NOT.
    Eon,
    /// Bitwise bit clear, setting flags.
    Bics,
    /// Move wide with NOT.
    Movn,
    /// Move wide with zero.
    Movz,
    /// Move wide with keep.
    Movk,
    /// Signed bitfield move.
    Sbfm,
    /// Bitfield move.
    Bfm,
    /// Unsigned bitfield move.
    Ubfm,
    /// Extract register.
    Extr,
    /// Conditional branch.
    BCond,
    /// Supervisor call.
    Svc,
    /// Hypervisor call.
    Hvc,
    /// Secure monitor call.
    Smc,
    /// Breakpoint.
    Brk,
    /// Halt.
    Hlt,
    /// No operation.
    Nop,
    /// Yield hint.
    Yield,
    /// Wait for event.
    Wfe,
    /// Wait for interrupt.
    Wfi,
    /// Send event.
    Sev,
    /// Send event local.
    Sevl,
    /// Unallocated hint.
    Hint,
    /// Clear exclusive monitor.
    Clrex,
    /// Data synchronization barrier.
    Dsb,
    /// Data memory barrier.
    Dmb,
    /// Instruction synchronization barrier.
    Isb,
    /// Speculation barrier.
    Sb,
    /// Move system register to general register.
    Mrs,
    /// Move general register to system register.
    Msr,
    /// Branch to register.
    Br,
    /// Branch with link to register.
    Blr,
    /// Return from subroutine.
    Ret,
    /// Unconditional branch.
    B,
    /// Branch with link.
    Bl,
    /// Compare and branch on zero.
    Cbz,
    /// Compare and branch on non-zero.
    Cbnz,
    /// Test bit and branch if zero.
    Tbz,
    /// Test bit and branch if non-zero.
    Tbnz,
    /// Load register.
    Ldr,
    /// Load signed word.
    Ldrsw,
    /// Store register.
    Str,
    /// Store byte.
    Strb,
    /// Load byte.
    Ldrb,
    /// Load signed byte.
    Ldrsb,
    /// Store halfword.
    Strh,
    /// Load halfword.
    Ldrh,
    /// Load signed halfword.
    Ldrsh,
    /// Store register, unscaled offset.
    Stur,
    /// Load register, unscaled offset.
    Ldur,
    /// Store byte, unscaled offset.
    Sturb,
    /// Load byte, unscaled offset.
    Ldurb,
    /// Load signed byte, unscaled offset.
    Ldursb,
    /// Store halfword, unscaled offset.
    Sturh,
    /// Load halfword, unscaled offset.
    Ldurh,
    /// Load signed halfword, unscaled offset.
    Ldursh,
    /// Load signed word, unscaled offset.
    Ldursw,
    /// Store pair.
    Stp,
    /// Load pair.
    Ldp,
    /// Load pair of signed words.
    Ldpsw,
    /// Store pair, non-temporal.
    Stnp,
    /// Load pair, non-temporal.
    Ldnp,
    /// Add with carry.
    Adc,
    /// Add with carry, setting flags.
    Adcs,
    /// Subtract with carry.
    Sbc,
    /// Subtract with carry, setting flags.
    Sbcs,
    /// Conditional compare negative.
    Ccmn,
    /// Conditional compare.
    Ccmp,
    /// Conditional select.
    Csel,
    /// Conditional select increment.
    Csinc,
    /// Conditional select invert.
    Csinv,
    /// Conditional select negate.
    Csneg,
    /// Reverse bits.
    Rbit,
    /// Reverse bytes in halfwords.
    Rev16,
    /// Reverse bytes in words.
    Rev32,
    /// Reverse bytes.
    Rev,
    /// Count leading zeros.
    Clz,
    /// Count leading sign bits.
    Cls,
    /// Unsigned divide.
    Udiv,
    /// Signed divide.
    Sdiv,
    /// Logical shift left variable.
    Lslv,
    /// Logical shift right variable.
    Lsrv,
    /// Arithmetic shift right variable.
    Asrv,
    /// Rotate right variable.
    Rorv,
    /// Multiply-add.
    Madd,
    /// Multiply-subtract.
    Msub,
    /// Signed multiply-add long.
    Smaddl,
    /// Signed multiply-subtract long.
    Smsubl,
    /// Signed multiply high.
    Smulh,
    /// Unsigned multiply-add long.
    Umaddl,
    /// Unsigned multiply-subtract long.
    Umsubl,
    /// Unsigned multiply high.
    Umulh,
}

impl Operation {
    /// All operations in declaration order.
    pub const ALL: [Self; 103] = [
        Self::Adr,
        Self::Adrp,
        Self::Add,
        Self::Adds,
        Self::Sub,
        Self::Subs,
        Self::And,
        Self::Orr,
        Self::Eor,
        Self::Ands,
        Self::Bic,
        Self::Orn,
        Self::Eon,
        Self::Bics,
        Self::Movn,
        Self::Movz,
        Self::Movk,
        Self::Sbfm,
        Self::Bfm,
        Self::Ubfm,
        Self::Extr,
        Self::BCond,
        Self::Svc,
        Self::Hvc,
        Self::Smc,
        Self::Brk,
        Self::Hlt,
        Self::Nop,
        Self::Yield,
        Self::Wfe,
        Self::Wfi,
        Self::Sev,
        Self::Sevl,
        Self::Hint,
        Self::Clrex,
        Self::Dsb,
        Self::Dmb,
        Self::Isb,
        Self::Sb,
        Self::Mrs,
        Self::Msr,
        Self::Br,
        Self::Blr,
        Self::Ret,
        Self::B,
        Self::Bl,
        Self::Cbz,
        Self::Cbnz,
        Self::Tbz,
        Self::Tbnz,
        Self::Ldr,
        Self::Ldrsw,
        Self::Str,
        Self::Strb,
        Self::Ldrb,
        Self::Ldrsb,
        Self::Strh,
        Self::Ldrh,
        Self::Ldrsh,
        Self::Stur,
        Self::Ldur,
        Self::Sturb,
        Self::Ldurb,
        Self::Ldursb,
        Self::Sturh,
        Self::Ldurh,
        Self::Ldursh,
        Self::Ldursw,
        Self::Stp,
        Self::Ldp,
        Self::Ldpsw,
        Self::Stnp,
        Self::Ldnp,
        Self::Adc,
        Self::Adcs,
        Self::Sbc,
        Self::Sbcs,
        Self::Ccmn,
        Self::Ccmp,
        Self::Csel,
        Self::Csinc,
        Self::Csinv,
        Self::Csneg,
        Self::Rbit,
        Self::Rev16,
        Self::Rev32,
        Self::Rev,
        Self::Clz,
        Self::Cls,
        Self::Udiv,
        Self::Sdiv,
        Self::Lslv,
        Self::Lsrv,
        Self::Asrv,
        Self::Rorv,
        Self::Madd,
        Self::Msub,
        Self::Smaddl,
        Self::Smsubl,
        Self::Smulh,
        Self::Umaddl,
        Self::Umsubl,
        Self::Umulh,
    ];

    /// Upper-case architectural mnemonic, without condition suffix.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Adr => "ADR",
            Self::Adrp => "ADRP",
            Self::Add => "ADD",
            Self::Adds => "ADDS",
            Self::Sub => "SUB",
            Self::Subs => "SUBS",
            Self::And => "AND",
            Self::Orr => "ORR",
            Self::Eor => "EOR",
            Self::Ands => "ANDS",
            Self::Bic => "BIC",
            Self::Orn => "ORN",
            Self::Eon => "EON",
            Self::Bics => "BICS",
            Self::Movn => "MOVN",
            Self::Movz => "MOVZ",
            Self::Movk => "MOVK",
            Self::Sbfm => "SBFM",
            Self::Bfm => "BFM",
            Self::Ubfm => "UBFM",
            Self::Extr => "EXTR",
            Self::BCond => "B",
            Self::Svc => "SVC",
            Self::Hvc => "HVC",
            Self::Smc => "SMC",
            Self::Brk => "BRK",
            Self::Hlt => "HLT",
            Self::Nop => "NOP",
            Self::Yield => "YIELD",
            Self::Wfe => "WFE",
            Self::Wfi => "WFI",
            Self::Sev => "SEV",
            Self::Sevl => "SEVL",
            Self::Hint => "HINT",
            Self::Clrex => "CLREX",
            Self::Dsb => "DSB",
            Self::Dmb => "DMB",
            Self::Isb => "ISB",
            Self::Sb => "SB",
            Self::Mrs => "MRS",
            Self::Msr => "MSR",
            Self::Br => "BR",
            Self::Blr => "BLR",
            Self::Ret => "RET",
            Self::B => "B",
            Self::Bl => "BL",
            Self::Cbz => "CBZ",
            Self::Cbnz => "CBNZ",
            Self::Tbz => "TBZ",
            Self::Tbnz => "TBNZ",
            Self::Ldr => "LDR",
            Self::Ldrsw => "LDRSW",
            Self::Str => "STR",
            Self::Strb => "STRB",
            Self::Ldrb => "LDRB",
            Self::Ldrsb => "LDRSB",
            Self::Strh => "STRH",
            Self::Ldrh => "LDRH",
            Self::Ldrsh => "LDRSH",
            Self::Stur => "STUR",
            Self::Ldur => "LDUR",
            Self::Sturb => "STURB",
            Self::Ldurb => "LDURB",
            Self::Ldursb => "LDURSB",
            Self::Sturh => "STURH",
            Self::Ldurh => "LDURH",
            Self::Ldursh => "LDURSH",
            Self::Ldursw => "LDURSW",
            Self::Stp => "STP",
            Self::Ldp => "LDP",
            Self::Ldpsw => "LDPSW",
            Self::Stnp => "STNP",
            Self::Ldnp => "LDNP",
            Self::Adc => "ADC",
            Self::Adcs => "ADCS",
            Self::Sbc => "SBC",
            Self::Sbcs => "SBCS",
            Self::Ccmn => "CCMN",
            Self::Ccmp => "CCMP",
            Self::Csel => "CSEL",
            Self::Csinc => "CSINC",
            Self::Csinv => "CSINV",
            Self::Csneg => "CSNEG",
            Self::Rbit => "RBIT",
            Self::Rev16 => "REV16",
            Self::Rev32 => "REV32",
            Self::Rev => "REV",
            Self::Clz => "CLZ",
            Self::Cls => "CLS",
            Self::Udiv => "UDIV",
            Self::Sdiv => "SDIV",
            Self::Lslv => "LSLV",
            Self::Lsrv => "LSRV",
            Self::Asrv => "ASRV",
            Self::Rorv => "RORV",
            Self::Madd => "MADD",
            Self::Msub => "MSUB",
            Self::Smaddl => "SMADDL",
            Self::Smsubl => "SMSUBL",
            Self::Smulh => "SMULH",
            Self::Umaddl => "UMADDL",
            Self::Umsubl => "UMSUBL",
            Self::Umulh => "UMULH",
        }
    }

    /// Looks up an operation by mnemonic, ignoring case.
    ///
    /// `B` resolves to the unconditional branch; conditional branches are
    /// spelled `B.<cond>` and handled by the caller.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| *op != Self::BCond && op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }

    /// Returns `true` when the operation's immediate is relative to the
    /// instruction's own address.
    #[must_use]
    pub const fn is_pc_relative(self) -> bool {
        matches!(
            self,
            Self::Adr
                | Self::Adrp
                | Self::B
                | Self::Bl
                | Self::BCond
                | Self::Cbz
                | Self::Cbnz
                | Self::Tbz
                | Self::Tbnz
        )
    }

    /// Returns `true` when the operation can transfer control.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::B
                | Self::Bl
                | Self::BCond
                | Self::Br
                | Self::Blr
                | Self::Ret
                | Self::Cbz
                | Self::Cbnz
                | Self::Tbz
                | Self::Tbnz
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::Operation;

    #[test]
    fn mnemonics_are_unique_except_conditional_branch() {
        for (index, op) in Operation::ALL.iter().enumerate() {
            for other in &Operation::ALL[index + 1..] {
                if *op != Operation::BCond && *other != Operation::BCond {
                    assert_ne!(op.mnemonic(), other.mnemonic(), "{op:?} vs {other:?}");
                }
            }
        }
    }

    #[test]
    fn lookup_by_mnemonic_ignores_case() {
        assert_eq!(Operation::from_mnemonic("add"), Some(Operation::Add));
        assert_eq!(Operation::from_mnemonic("LdRsW"), Some(Operation::Ldrsw));
        assert_eq!(Operation::from_mnemonic("b"), Some(Operation::B));
        assert_eq!(Operation::from_mnemonic("mov"), None);
    }
}
