//! Preferred disassembly aliases.
//!
//! An alias is derived from an instruction's decoded fields and only changes
//! how it is printed. The operation used for execution is never affected.

use crate::operand::ShiftKind;
use crate::operation::Operation;
use crate::register::Width;
use crate::shape::{
    AddSubCarry, AddSubExtended, AddSubImmediate, AddSubShifted, Bitfield, ConditionalSelect,
    DataImmediateShape, DataProcessing3Source, DataRegisterShape, Extract,
    Instruction, LogicalImmediate, LogicalShifted, MoveWide, Shape,
};

/// Display alias of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Alias {
    Mov,
    Cmp,
    Cmn,
    Tst,
    Neg,
    Negs,
    Mvn,
    Mul,
    Mneg,
    Smull,
    Smnegl,
    Umull,
    Umnegl,
    Lsl,
    Lsr,
    Asr,
    Ror,
    Sbfx,
    Ubfx,
    Sbfiz,
    Ubfiz,
    Bfi,
    Bfc,
    Bfxil,
    Sxtb,
    Sxth,
    Sxtw,
    Uxtb,
    Uxth,
    Cset,
    Csetm,
    Cinc,
    Cinv,
    Cneg,
    Ngc,
    Ngcs,
}

impl Alias {
    /// Upper-case mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Mov => "MOV",
            Self::Cmp => "CMP",
            Self::Cmn => "CMN",
            Self::Tst => "TST",
            Self::Neg => "NEG",
            Self::Negs => "NEGS",
            Self::Mvn => "MVN",
            Self::Mul => "MUL",
            Self::Mneg => "MNEG",
            Self::Smull => "SMULL",
            Self::Smnegl => "SMNEGL",
            Self::Umull => "UMULL",
            Self::Umnegl => "UMNEGL",
            Self::Lsl => "LSL",
            Self::Lsr => "LSR",
            Self::Asr => "ASR",
            Self::Ror => "ROR",
            Self::Sbfx => "SBFX",
            Self::Ubfx => "UBFX",
            Self::Sbfiz => "SBFIZ",
            Self::Ubfiz => "UBFIZ",
            Self::Bfi => "BFI",
            Self::Bfc => "BFC",
            Self::Bfxil => "BFXIL",
            Self::Sxtb => "SXTB",
            Self::Sxth => "SXTH",
            Self::Sxtw => "SXTW",
            Self::Uxtb => "UXTB",
            Self::Uxth => "UXTH",
            Self::Cset => "CSET",
            Self::Csetm => "CSETM",
            Self::Cinc => "CINC",
            Self::Cinv => "CINV",
            Self::Cneg => "CNEG",
            Self::Ngc => "NGC",
            Self::Ngcs => "NGCS",
        }
    }
}

/// Preferred alias of `instruction`, if any.
#[must_use]
pub fn alias(instruction: &Instruction) -> Option<Alias> {
    let operation = instruction.operation();
    match instruction.shape() {
        Shape::DataImmediate(shape) => match shape {
            DataImmediateShape::AddSubImmediate(s) => add_sub_immediate(operation, s),
            DataImmediateShape::LogicalImmediate(s) => logical_immediate(operation, s),
            DataImmediateShape::MoveWide(s) => move_wide(operation, s),
            DataImmediateShape::Bitfield(s) => bitfield(operation, s),
            DataImmediateShape::Extract(s) => extract(s),
            DataImmediateShape::PcRelative(_) => None,
        },
        Shape::DataRegister(shape) => match shape {
            DataRegisterShape::LogicalShifted(s) => logical_shifted(operation, s),
            DataRegisterShape::AddSubShifted(s) => add_sub_shifted(operation, s),
            DataRegisterShape::AddSubExtended(s) => add_sub_extended(operation, s),
            DataRegisterShape::AddSubCarry(s) => add_sub_carry(operation, s),
            DataRegisterShape::ConditionalSelect(s) => conditional_select(operation, s),
            DataRegisterShape::DataProcessing2Source(_) => variable_shift(operation),
            DataRegisterShape::DataProcessing3Source(s) => multiply(operation, s),
            DataRegisterShape::ConditionalCompareRegister(_)
            | DataRegisterShape::ConditionalCompareImmediate(_)
            | DataRegisterShape::DataProcessing1Source(_) => None,
        },
        Shape::Branch(_) | Shape::LoadStore(_) => None,
    }
}

fn add_sub_immediate(operation: Operation, s: &AddSubImmediate) -> Option<Alias> {
    match operation {
        Operation::Add
            if s.immediate() == 0 && (s.rd().is_stack_pointer() || s.rn().is_stack_pointer()) =>
        {
            Some(Alias::Mov)
        }
        Operation::Adds if s.rd().is_zero() => Some(Alias::Cmn),
        Operation::Subs if s.rd().is_zero() => Some(Alias::Cmp),
        _ => None,
    }
}

/// Whether `MOVZ` or `MOVN` alone can produce `value` at `width`.
fn move_wide_encodable(value: u64, width: Width) -> bool {
    let mask = width.mask();
    let single_chunk = |v: u64| {
        (0..width.bits())
            .step_by(16)
            .any(|shift| v & !(0xFFFF_u64 << shift) == 0)
    };
    single_chunk(value & mask) || single_chunk(!value & mask)
}

// ORR into MOV only when no move-wide form produces the same value.
fn logical_immediate(operation: Operation, s: &LogicalImmediate) -> Option<Alias> {
    match operation {
        Operation::Orr
            if s.rn().is_zero()
                && s.bitmask().is_some_and(|value| !move_wide_encodable(value, s.width())) =>
        {
            Some(Alias::Mov)
        }
        Operation::Ands if s.rd().is_zero() => Some(Alias::Tst),
        _ => None,
    }
}

fn move_wide(operation: Operation, s: &MoveWide) -> Option<Alias> {
    let zero_payload_shifted = s.payload() == 0 && s.shift() != 0;
    match operation {
        Operation::Movz if !zero_payload_shifted => Some(Alias::Mov),
        Operation::Movn
            if !zero_payload_shifted && !(s.width() == Width::W32 && s.payload() == 0xFFFF) =>
        {
            Some(Alias::Mov)
        }
        _ => None,
    }
}

fn bitfield(operation: Operation, s: &Bitfield) -> Option<Alias> {
    let top = s.width().bits() - 1;
    let (immr, imms) = (s.immr(), s.imms());
    let alias = match operation {
        Operation::Sbfm => {
            if imms == top {
                Alias::Asr
            } else if imms < immr {
                Alias::Sbfiz
            } else if immr == 0 && imms == 7 {
                Alias::Sxtb
            } else if immr == 0 && imms == 15 {
                Alias::Sxth
            } else if immr == 0 && imms == 31 {
                Alias::Sxtw
            } else {
                Alias::Sbfx
            }
        }
        Operation::Ubfm => {
            if imms != top && imms + 1 == immr {
                Alias::Lsl
            } else if imms == top {
                Alias::Lsr
            } else if imms < immr {
                Alias::Ubfiz
            } else if immr == 0 && imms == 7 && s.width() == Width::W32 {
                Alias::Uxtb
            } else if immr == 0 && imms == 15 && s.width() == Width::W32 {
                Alias::Uxth
            } else {
                Alias::Ubfx
            }
        }
        Operation::Bfm if imms < immr && s.rn().is_zero() => Alias::Bfc,
        Operation::Bfm if imms < immr => Alias::Bfi,
        Operation::Bfm => Alias::Bfxil,
        _ => return None,
    };
    Some(alias)
}

fn extract(s: &Extract) -> Option<Alias> {
    (s.rn() == s.rm()).then_some(Alias::Ror)
}

fn logical_shifted(operation: Operation, s: &LogicalShifted) -> Option<Alias> {
    match operation {
        Operation::Orr
            if s.rn().is_zero() && s.amount() == 0 && s.shift() == Some(ShiftKind::Lsl) =>
        {
            Some(Alias::Mov)
        }
        Operation::Orn if s.rn().is_zero() => Some(Alias::Mvn),
        Operation::Ands if s.rd().is_zero() => Some(Alias::Tst),
        _ => None,
    }
}

const fn add_sub_shifted(operation: Operation, s: &AddSubShifted) -> Option<Alias> {
    match operation {
        Operation::Adds if s.rd().is_zero() => Some(Alias::Cmn),
        Operation::Subs if s.rd().is_zero() => Some(Alias::Cmp),
        Operation::Sub if s.rn().is_zero() => Some(Alias::Neg),
        Operation::Subs if s.rn().is_zero() => Some(Alias::Negs),
        _ => None,
    }
}

const fn add_sub_extended(operation: Operation, s: &AddSubExtended) -> Option<Alias> {
    match operation {
        Operation::Adds if s.rd().is_zero() => Some(Alias::Cmn),
        Operation::Subs if s.rd().is_zero() => Some(Alias::Cmp),
        _ => None,
    }
}

const fn add_sub_carry(operation: Operation, s: &AddSubCarry) -> Option<Alias> {
    match operation {
        Operation::Sbc if s.rn().is_zero() => Some(Alias::Ngc),
        Operation::Sbcs if s.rn().is_zero() => Some(Alias::Ngcs),
        _ => None,
    }
}

fn conditional_select(operation: Operation, s: &ConditionalSelect) -> Option<Alias> {
    let invertible = s.condition().is_some_and(|cond| !cond.is_always());
    if !invertible || s.rn() != s.rm() {
        return None;
    }
    let both_zero = s.rn().is_zero();
    match operation {
        Operation::Csinc if both_zero => Some(Alias::Cset),
        Operation::Csinc => Some(Alias::Cinc),
        Operation::Csinv if both_zero => Some(Alias::Csetm),
        Operation::Csinv => Some(Alias::Cinv),
        Operation::Csneg => Some(Alias::Cneg),
        _ => None,
    }
}

const fn variable_shift(operation: Operation) -> Option<Alias> {
    match operation {
        Operation::Lslv => Some(Alias::Lsl),
        Operation::Lsrv => Some(Alias::Lsr),
        Operation::Asrv => Some(Alias::Asr),
        Operation::Rorv => Some(Alias::Ror),
        _ => None,
    }
}

const fn multiply(operation: Operation, s: &DataProcessing3Source) -> Option<Alias> {
    if !s.ra().is_zero() {
        return None;
    }
    match operation {
        Operation::Madd => Some(Alias::Mul),
        Operation::Msub => Some(Alias::Mneg),
        Operation::Smaddl => Some(Alias::Smull),
        Operation::Smsubl => Some(Alias::Smnegl),
        Operation::Umaddl => Some(Alias::Umull),
        Operation::Umsubl => Some(Alias::Umnegl),
        _ => None,
    }
}

impl Instruction {
    /// Preferred alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<Alias> {
        alias(self)
    }

    /// Mnemonic to print: the preferred alias when one applies, the
    /// operation's own mnemonic otherwise.
    #[must_use]
    pub fn display_mnemonic(&self) -> &'static str {
        self.alias()
            .map_or_else(|| self.operation().mnemonic(), Alias::mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::Alias;
    use crate::decoder::decode;
    use crate::operation::Operation;
    use rstest::rstest;

    #[rstest]
    #[case(0x9100_03E0, Alias::Mov)] // ADD x0, sp, #0
    #[case(0xAA01_03E0, Alias::Mov)] // ORR x0, xzr, x1
    #[case(0xD280_00A0, Alias::Mov)] // MOVZ x0, #5
    #[case(0xEB01_001F, Alias::Cmp)] // SUBS xzr, x0, x1
    #[case(0xF100_041F, Alias::Cmp)] // SUBS xzr, x0, #1
    #[case(0xCB01_03E0, Alias::Neg)] // SUB x0, xzr, x1
    #[case(0xAA21_03E0, Alias::Mvn)] // ORN x0, xzr, x1
    #[case(0x9B02_7C20, Alias::Mul)] // MADD x0, x1, x2, xzr
    #[case(0xD37D_F020, Alias::Lsl)] // UBFM x0, x1, #61, #60
    #[case(0xD344_FC20, Alias::Lsr)] // UBFM x0, x1, #4, #63
    #[case(0x9344_FC20, Alias::Asr)] // SBFM x0, x1, #4, #63
    #[case(0x9340_1C20, Alias::Sxtb)] // SBFM x0, x1, #0, #7
    #[case(0x5300_1C20, Alias::Uxtb)] // UBFM w0, w1, #0, #7
    #[case(0x9A9F_17E0, Alias::Cset)] // CSINC x0, xzr, xzr, NE
    #[case(0x9AC2_2020, Alias::Lsl)] // LSLV x0, x1, x2
    #[case(0x93C1_1020, Alias::Ror)] // EXTR x0, x1, x1, #4
    fn preferred_alias(#[case] word: u32, #[case] expected: Alias) {
        let instruction = decode(word).expect("decodes");
        assert_eq!(instruction.alias(), Some(expected));
        assert_eq!(instruction.display_mnemonic(), expected.mnemonic());
    }

    #[test]
    fn alias_never_changes_the_operation() {
        let instruction = decode(0x9100_03E0).expect("ADD decodes");
        assert_eq!(instruction.operation(), Operation::Add);
        assert_eq!(instruction.display_mnemonic(), "MOV");
    }

    #[test]
    fn plain_forms_keep_their_mnemonic() {
        // ADD x0, x1, #1 / MOVZ x0, #0, LSL #16
        for word in [0x9100_0420, 0xD2A0_0000] {
            let instruction = decode(word).expect("decodes");
            assert_eq!(instruction.alias(), None);
        }
        assert_eq!(decode(0xD2A0_0000).map(|i| i.display_mnemonic()), Ok("MOVZ"));
    }

    #[test]
    fn orr_keeps_its_mnemonic_when_a_move_wide_fits() {
        // ORR w5, wzr, #0xff0
        let orr = decode(0x321C_1FE5).expect("decodes");
        assert_eq!(orr.operation(), Operation::Orr);
        assert_eq!(orr.alias(), None);
        assert_eq!(orr.display_mnemonic(), "ORR");
        // ORR x0, xzr, #0x5555555555555555
        let mov = decode(0xB200_F3E0).expect("decodes");
        assert_eq!(mov.alias(), Some(Alias::Mov));
    }

    #[test]
    fn cset_requires_an_invertible_condition() {
        // CSINC x0, xzr, xzr, AL
        let instruction = decode(0x9A9F_E7E0).expect("decodes");
        assert_eq!(instruction.alias(), None);
    }
}
