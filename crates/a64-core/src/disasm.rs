//! Text rendering of decoded instructions.
//!
//! Output follows `MNEMONIC[.SUFFIX] arg, arg`: upper-case mnemonics, shift
//! names and condition names, lower-case registers, decimal immediates.
//! Preferred aliases pick both the mnemonic and the operand list.

use std::fmt;

use crate::alias::Alias;
use crate::bits;
use crate::condition::Condition;
use crate::decoder::{decode, INSTRUCTION_BYTES};
use crate::execute::alu;
use crate::operand::{ExtendKind, IndexMode, ShiftKind};
use crate::operation::Operation;
use crate::register::{Register, Width};
use crate::shape::{
    barrier_option_name, AddSubExtended, BranchShape, DataImmediateShape, DataRegisterShape,
    Instruction, LoadStoreShape, Shape,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Assembles one line of disassembly from its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassemblyBuilder {
    mnemonic: String,
    suffix: Option<String>,
    items: Vec<String>,
}

impl DisassemblyBuilder {
    /// Starts a line with `mnemonic` and no operands.
    #[must_use]
    pub fn new(mnemonic: &str) -> Self {
        Self {
            mnemonic: mnemonic.to_owned(),
            suffix: None,
            items: Vec::new(),
        }
    }

    /// Appends `.suffix` to the mnemonic.
    #[must_use]
    pub fn suffix(mut self, suffix: impl fmt::Display) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }

    /// Adds a required operand.
    #[must_use]
    pub fn item(mut self, item: impl fmt::Display) -> Self {
        self.items.push(item.to_string());
        self
    }

    /// Adds an operand only when present.
    #[must_use]
    pub fn optional(self, item: Option<impl fmt::Display>) -> Self {
        match item {
            Some(item) => self.item(item),
            None => self,
        }
    }

    /// Adds `#value`.
    #[must_use]
    pub fn immediate(self, value: impl fmt::Display) -> Self {
        self.item(format_args!("#{value}"))
    }

    /// Adds a memory operand in `mode`, which takes two items for
    /// post-indexing.
    #[must_use]
    pub fn memory(self, base: Register, offset: i64, mode: IndexMode) -> Self {
        match mode {
            IndexMode::Offset if offset == 0 => self.item(format_args!("[{base}]")),
            IndexMode::Offset => self.item(format_args!("[{base}, #{offset}]")),
            IndexMode::PreIndex => self.item(format_args!("[{base}, #{offset}]!")),
            IndexMode::PostIndex => self.item(format_args!("[{base}]")).immediate(offset),
        }
    }

    /// Renders the line.
    #[must_use]
    pub fn finish(self) -> String {
        let mut line = self.mnemonic;
        if let Some(suffix) = self.suffix {
            line.push('.');
            line.push_str(&suffix);
        }
        if !self.items.is_empty() {
            line.push(' ');
            line.push_str(&self.items.join(", "));
        }
        line
    }
}

/// Renders `instruction` as one line of assembly.
#[must_use]
pub fn disassemble(instruction: &Instruction) -> String {
    let builder = DisassemblyBuilder::new(instruction.display_mnemonic());
    let operation = instruction.operation();
    let alias = instruction.alias();
    match instruction.shape() {
        Shape::DataImmediate(shape) => data_immediate(builder, operation, alias, shape),
        Shape::DataRegister(shape) => data_register(builder, operation, alias, shape),
        Shape::Branch(shape) => branch(builder, operation, shape),
        Shape::LoadStore(shape) => load_store(builder, shape),
    }
    .finish()
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&disassemble(self))
    }
}

/// A single disassembled word.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the word.
    pub address: u64,
    /// Raw instruction word.
    pub word: u32,
    /// Rendered instruction, or a `.word` directive for undecodable words.
    pub text: String,
    /// Whether the word failed to decode.
    pub is_illegal: bool,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}: {:08x}  {}", self.address, self.word, self.text)
    }
}

/// Disassembles the word at `address`.
#[must_use]
pub fn disassemble_word(address: u64, word: u32) -> DisassemblyRow {
    match decode(word) {
        Ok(instruction) => DisassemblyRow {
            address,
            word,
            text: disassemble(&instruction),
            is_illegal: false,
        },
        Err(error) => {
            let reason = if error.is_unsupported() {
                "UNSUPPORTED"
            } else {
                "ILLEGAL"
            };
            DisassemblyRow {
                address,
                word,
                text: format!(".word {word:#010x} ; {reason}"),
                is_illegal: true,
            }
        }
    }
}

/// Disassembles consecutive words starting at `base`.
#[must_use]
pub fn disassemble_listing(base: u64, words: &[u32]) -> Vec<DisassemblyRow> {
    words
        .iter()
        .zip((0u64..).map(|index| base.wrapping_add(index * INSTRUCTION_BYTES as u64)))
        .map(|(&word, address)| disassemble_word(address, word))
        .collect()
}

fn shifted(kind: Option<ShiftKind>, amount: u32) -> Option<String> {
    match kind {
        Some(ShiftKind::Lsl) if amount == 0 => None,
        Some(kind) => Some(format!("{kind} #{amount}")),
        None => None,
    }
}

fn lsl(amount: u32) -> Option<String> {
    (amount != 0).then(|| format!("LSL #{amount}"))
}

/// `UXTX`/`UXTW` next to SP is written as `LSL`, and dropped when unshifted.
fn extended(shape: &AddSubExtended) -> Option<String> {
    let extend = shape.extend()?;
    let amount = shape.amount();
    let default = match shape.width() {
        Width::X64 => ExtendKind::Uxtx,
        Width::W32 => ExtendKind::Uxtw,
    };
    if extend == default && (shape.rd().is_stack_pointer() || shape.rn().is_stack_pointer()) {
        return lsl(amount);
    }
    Some(if amount == 0 {
        extend.to_string()
    } else {
        format!("{extend} #{amount}")
    })
}

fn data_immediate(
    b: DisassemblyBuilder,
    operation: Operation,
    alias: Option<Alias>,
    shape: &DataImmediateShape,
) -> DisassemblyBuilder {
    match shape {
        DataImmediateShape::PcRelative(s) => b.item(s.rd()).immediate(s.byte_offset()),
        DataImmediateShape::AddSubImmediate(s) => {
            let imm12 = s.immediate() >> s.shift();
            match alias {
                Some(Alias::Mov) => b.item(s.rd()).item(s.rn()),
                Some(Alias::Cmp | Alias::Cmn) => {
                    b.item(s.rn()).immediate(imm12).optional(lsl(s.shift()))
                }
                _ => b
                    .item(s.rd())
                    .item(s.rn())
                    .immediate(imm12)
                    .optional(lsl(s.shift())),
            }
        }
        DataImmediateShape::LogicalImmediate(s) => {
            let mask = s.bitmask().unwrap_or_default();
            match alias {
                Some(Alias::Mov) => b.item(s.rd()).immediate(mask),
                Some(Alias::Tst) => b.item(s.rn()).immediate(mask),
                _ => b.item(s.rd()).item(s.rn()).immediate(mask),
            }
        }
        DataImmediateShape::MoveWide(s) => {
            let placed = u64::from(s.payload()) << s.shift();
            match (alias, operation) {
                (Some(Alias::Mov), Operation::Movn) => {
                    let width = s.width();
                    let value = bits::sign_extend(alu::invert(placed, width), width.bits());
                    b.item(s.rd()).immediate(value)
                }
                (Some(Alias::Mov), _) => b.item(s.rd()).immediate(placed),
                _ => b
                    .item(s.rd())
                    .immediate(s.payload())
                    .optional(lsl(s.shift())),
            }
        }
        DataImmediateShape::Bitfield(s) => {
            let size = s.width().bits();
            let (immr, imms) = (s.immr(), s.imms());
            let b = b.item(s.rd());
            match alias {
                Some(Alias::Asr | Alias::Lsr) => b.item(s.rn()).immediate(immr),
                Some(Alias::Lsl) => b.item(s.rn()).immediate(size - 1 - imms),
                Some(Alias::Sbfiz | Alias::Ubfiz | Alias::Bfi) => b
                    .item(s.rn())
                    .immediate((size - immr) % size)
                    .immediate(imms + 1),
                Some(Alias::Bfc) => b.immediate((size - immr) % size).immediate(imms + 1),
                Some(Alias::Sbfx | Alias::Ubfx | Alias::Bfxil) => {
                    b.item(s.rn()).immediate(immr).immediate(imms + 1 - immr)
                }
                Some(Alias::Sxtb | Alias::Sxth | Alias::Sxtw | Alias::Uxtb | Alias::Uxth) => {
                    b.item(s.rn().with_width(Width::W32))
                }
                _ => b.item(s.rn()).immediate(immr).immediate(imms),
            }
        }
        DataImmediateShape::Extract(s) => match alias {
            Some(Alias::Ror) => b.item(s.rd()).item(s.rn()).immediate(s.lsb()),
            _ => b.item(s.rd()).item(s.rn()).item(s.rm()).immediate(s.lsb()),
        },
    }
}

fn data_register(
    b: DisassemblyBuilder,
    operation: Operation,
    alias: Option<Alias>,
    shape: &DataRegisterShape,
) -> DisassemblyBuilder {
    match shape {
        DataRegisterShape::LogicalShifted(s) => {
            let shift = shifted(s.shift(), s.amount());
            match alias {
                Some(Alias::Mov) => b.item(s.rd()).item(s.rm()),
                Some(Alias::Mvn) => b.item(s.rd()).item(s.rm()).optional(shift),
                Some(Alias::Tst) => b.item(s.rn()).item(s.rm()).optional(shift),
                _ => b.item(s.rd()).item(s.rn()).item(s.rm()).optional(shift),
            }
        }
        DataRegisterShape::AddSubShifted(s) => {
            let shift = shifted(s.shift(), s.amount());
            match alias {
                Some(Alias::Cmp | Alias::Cmn) => b.item(s.rn()).item(s.rm()).optional(shift),
                Some(Alias::Neg | Alias::Negs) => b.item(s.rd()).item(s.rm()).optional(shift),
                _ => b.item(s.rd()).item(s.rn()).item(s.rm()).optional(shift),
            }
        }
        DataRegisterShape::AddSubExtended(s) => match alias {
            Some(Alias::Cmp | Alias::Cmn) => b.item(s.rn()).item(s.rm()).optional(extended(s)),
            _ => b.item(s.rd()).item(s.rn()).item(s.rm()).optional(extended(s)),
        },
        DataRegisterShape::AddSubCarry(s) => match alias {
            Some(Alias::Ngc | Alias::Ngcs) => b.item(s.rd()).item(s.rm()),
            _ => b.item(s.rd()).item(s.rn()).item(s.rm()),
        },
        DataRegisterShape::ConditionalCompareRegister(s) => b
            .item(s.compare.rn())
            .item(s.rm())
            .immediate(s.compare.nzcv.raw())
            .optional(s.compare.condition()),
        DataRegisterShape::ConditionalCompareImmediate(s) => b
            .item(s.compare.rn())
            .immediate(s.immediate())
            .immediate(s.compare.nzcv.raw())
            .optional(s.compare.condition()),
        DataRegisterShape::ConditionalSelect(s) => {
            let condition = s.condition();
            match alias {
                Some(Alias::Cset | Alias::Csetm) => {
                    b.item(s.rd()).optional(condition.map(Condition::invert))
                }
                Some(Alias::Cinc | Alias::Cinv | Alias::Cneg) => b
                    .item(s.rd())
                    .item(s.rn())
                    .optional(condition.map(Condition::invert)),
                _ => b.item(s.rd()).item(s.rn()).item(s.rm()).optional(condition),
            }
        }
        DataRegisterShape::DataProcessing1Source(s) => b.item(s.rd()).item(s.rn()),
        DataRegisterShape::DataProcessing2Source(s) => b.item(s.rd()).item(s.rn()).item(s.rm()),
        DataRegisterShape::DataProcessing3Source(s) => {
            let b = b.item(s.rd()).item(s.rn()).item(s.rm());
            if alias.is_some() || matches!(operation, Operation::Smulh | Operation::Umulh) {
                b
            } else {
                b.item(s.ra())
            }
        }
    }
}

fn branch(b: DisassemblyBuilder, operation: Operation, shape: &BranchShape) -> DisassemblyBuilder {
    match shape {
        BranchShape::ConditionalBranch(s) => {
            let b = match s.condition() {
                Some(condition) => b.suffix(condition),
                None => b,
            };
            b.immediate(s.offset())
        }
        BranchShape::ExceptionGeneration(s) => b.immediate(s.payload()),
        BranchShape::Hint(s) => match operation {
            Operation::Hint => b.immediate(s.number()),
            _ => b,
        },
        BranchShape::Barrier(s) => match (operation, barrier_option_name(s.option())) {
            (Operation::Dsb | Operation::Dmb, Some(name)) => b.item(name),
            (Operation::Dsb | Operation::Dmb, None) => b.immediate(s.option()),
            (Operation::Isb | Operation::Clrex, _) if s.option() != 0b1111 => {
                b.immediate(s.option())
            }
            _ => b,
        },
        BranchShape::SystemRegisterMove(s) => match operation {
            Operation::Msr => b.item(s.system_register()).item(s.rt()),
            _ => b.item(s.rt()).item(s.system_register()),
        },
        BranchShape::BranchRegister(s) => {
            if operation == Operation::Ret && s.rn() == Register::LINK {
                b
            } else {
                b.item(s.rn())
            }
        }
        BranchShape::UnconditionalImmediate(s) => b.immediate(s.offset()),
        BranchShape::CompareBranch(s) => b.item(s.rt()).immediate(s.offset()),
        BranchShape::TestBranch(s) => b
            .item(s.rt())
            .immediate(s.bit_number())
            .immediate(s.offset()),
    }
}

fn load_store(b: DisassemblyBuilder, shape: &LoadStoreShape) -> DisassemblyBuilder {
    match shape {
        LoadStoreShape::LoadLiteral(s) => b.item(s.rt()).immediate(s.offset()),
        LoadStoreShape::LoadStoreUnscaled(s) => {
            b.item(s.rt()).memory(s.rn(), s.offset(), s.index_mode())
        }
        LoadStoreShape::LoadStorePreIndexed(s) => {
            b.item(s.rt()).memory(s.rn(), s.offset(), s.index_mode())
        }
        LoadStoreShape::LoadStorePostIndexed(s) => {
            b.item(s.rt()).memory(s.rn(), s.offset(), s.index_mode())
        }
        LoadStoreShape::LoadStoreUnsignedOffset(s) => {
            let base = s.rn();
            match s.offset() {
                0 => b.item(s.rt()).item(format_args!("[{base}]")),
                offset => b.item(s.rt()).item(format_args!("[{base}, #{offset}]")),
            }
        }
        LoadStoreShape::LoadStoreRegisterOffset(s) => {
            let amount = s.shift_amount();
            let modifier = match s.extend() {
                Some(ExtendKind::Uxtx) if s.is_scaled() => Some(format!("LSL #{amount}")),
                Some(ExtendKind::Uxtx) | None => None,
                Some(kind) if s.is_scaled() => Some(format!("{kind} #{amount}")),
                Some(kind) => Some(kind.to_string()),
            };
            let (base, index) = (s.rn(), s.rm());
            let address = match modifier {
                Some(modifier) => format!("[{base}, {index}, {modifier}]"),
                None => format!("[{base}, {index}]"),
            };
            b.item(s.rt()).item(address)
        }
        LoadStoreShape::LoadStorePair(s) => b
            .item(s.rt())
            .item(s.rt2())
            .memory(s.rn(), s.offset(), s.index_mode()),
    }
}

#[cfg(test)]
mod tests {
    use super::{disassemble, disassemble_listing, DisassemblyBuilder};
    use crate::decoder::decode;
    use rstest::rstest;

    fn text(word: u32) -> String {
        disassemble(&decode(word).expect("word decodes"))
    }

    #[test]
    fn builder_joins_items_and_suffix() {
        let line = DisassemblyBuilder::new("B")
            .suffix("NE")
            .immediate(-8)
            .optional(None::<&str>)
            .finish();
        assert_eq!(line, "B.NE #-8");
        assert_eq!(DisassemblyBuilder::new("NOP").finish(), "NOP");
    }

    #[rstest]
    #[case(0xD280_00A0, "MOV x0, #5")]
    #[case(0x9100_03E0, "MOV x0, sp")]
    #[case(0x9100_403F, "ADD sp, x1, #16")]
    #[case(0x8B00_0000, "ADD x0, x0, x0")]
    #[case(0xAA01_03E0, "MOV x0, x1")]
    #[case(0xEB01_001F, "CMP x0, x1")]
    #[case(0xF100_041F, "CMP x0, #1")]
    #[case(0xCB01_03E0, "NEG x0, x1")]
    #[case(0x9B02_7C20, "MUL x0, x1, x2")]
    #[case(0xD37D_F020, "LSL x0, x1, #3")]
    #[case(0xD344_FC20, "LSR x0, x1, #4")]
    #[case(0x9340_1C20, "SXTB x0, w1")]
    #[case(0x9A9F_17E0, "CSET x0, EQ")]
    #[case(0x9AC2_2020, "LSL x0, x1, x2")]
    #[case(0xDAC0_0C20, "REV x0, x1")]
    #[case(0xD400_0001, "SVC #0")]
    #[case(0xD503_201F, "NOP")]
    #[case(0xD65F_03C0, "RET")]
    #[case(0x17FF_FFFE, "B #-8")]
    #[case(0x5400_0041, "B.NE #8")]
    #[case(0xF940_0420, "LDR x0, [x1, #8]")]
    #[case(0xF85F_8020, "LDUR x0, [x1, #-8]")]
    #[case(0xA9BF_7BFD, "STP x29, x30, [sp, #-16]!")]
    #[case(0xA8C1_7BFD, "LDP x29, x30, [sp], #16")]
    #[case(0xF862_7820, "LDR x0, [x1, x2, LSL #3]")]
    fn renders_preferred_forms(#[case] word: u32, #[case] expected: &str) {
        assert_eq!(text(word), expected);
    }

    #[test]
    fn listing_marks_unknown_words() {
        let rows = disassemble_listing(0x1000, &[0xD503_201F, 0x0000_0000]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, 0x1000);
        assert_eq!(rows[0].text, "NOP");
        assert!(!rows[0].is_illegal);
        assert_eq!(rows[1].address, 0x1004);
        assert!(rows[1].is_illegal);
        assert!(rows[1].text.starts_with(".word 0x00000000"));
    }

    #[test]
    fn row_display_includes_address_and_word() {
        let rows = disassemble_listing(0x1_0000, &[0xD65F_03C0]);
        assert_eq!(rows[0].to_string(), "0x00010000: d65f03c0  RET");
    }
}
