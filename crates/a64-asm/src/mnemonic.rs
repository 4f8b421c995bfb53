//! Mnemonic resolution: assembler spellings to builder calls.
//!
//! Plain operation mnemonics go through [`build_linkable`] so label operands
//! can wait for pass 2. Alias spellings (`MOV`, `CMP`, `SBFX`, ...) are the
//! same set the disassembler prints; they are rewritten to their underlying
//! operation and need concrete operands.

use a64_core::builder::{asr, cset, lsl, lsr, mov, ror};
use a64_core::shape::{barrier_option_from_name, SystemRegister};
use a64_core::{
    build, build_linkable, Alias, BuildError, Condition, IndexMode, Instruction, LinkOperand,
    Linkable, MemoryOffset, Operand, Operation, Register, Width,
};

use crate::parser::ParsedOperand;

/// Every alias spelling the assembler accepts.
const ALIASES: [Alias; 36] = [
    Alias::Mov,
    Alias::Cmp,
    Alias::Cmn,
    Alias::Tst,
    Alias::Neg,
    Alias::Negs,
    Alias::Mvn,
    Alias::Mul,
    Alias::Mneg,
    Alias::Smull,
    Alias::Smnegl,
    Alias::Umull,
    Alias::Umnegl,
    Alias::Lsl,
    Alias::Lsr,
    Alias::Asr,
    Alias::Ror,
    Alias::Sbfx,
    Alias::Ubfx,
    Alias::Sbfiz,
    Alias::Ubfiz,
    Alias::Bfi,
    Alias::Bfc,
    Alias::Bfxil,
    Alias::Sxtb,
    Alias::Sxth,
    Alias::Sxtw,
    Alias::Uxtb,
    Alias::Uxth,
    Alias::Cset,
    Alias::Csetm,
    Alias::Cinc,
    Alias::Cinv,
    Alias::Cneg,
    Alias::Ngc,
    Alias::Ngcs,
];

/// Operation an alias assembles to.
#[must_use]
pub const fn alias_operation(alias: Alias) -> Operation {
    match alias {
        Alias::Mov => Operation::Orr,
        Alias::Cmp | Alias::Negs => Operation::Subs,
        Alias::Cmn => Operation::Adds,
        Alias::Tst => Operation::Ands,
        Alias::Neg => Operation::Sub,
        Alias::Mvn => Operation::Orn,
        Alias::Mul => Operation::Madd,
        Alias::Mneg => Operation::Msub,
        Alias::Smull => Operation::Smaddl,
        Alias::Smnegl => Operation::Smsubl,
        Alias::Umull => Operation::Umaddl,
        Alias::Umnegl => Operation::Umsubl,
        Alias::Lsl | Alias::Lsr | Alias::Ubfx | Alias::Ubfiz | Alias::Uxtb | Alias::Uxth => {
            Operation::Ubfm
        }
        Alias::Asr | Alias::Sbfx | Alias::Sbfiz | Alias::Sxtb | Alias::Sxth | Alias::Sxtw => {
            Operation::Sbfm
        }
        Alias::Bfi | Alias::Bfc | Alias::Bfxil => Operation::Bfm,
        Alias::Ror => Operation::Extr,
        Alias::Cset | Alias::Cinc => Operation::Csinc,
        Alias::Csetm | Alias::Cinv => Operation::Csinv,
        Alias::Cneg => Operation::Csneg,
        Alias::Ngc => Operation::Sbc,
        Alias::Ngcs => Operation::Sbcs,
    }
}

/// Lookup result for a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    /// An operation spelled by its own mnemonic.
    Operation(Operation),
    /// `B.<cond>`.
    Conditional(Condition),
    /// An alias spelling.
    Alias(Alias),
}

/// Resolves a mnemonic, ignoring case.
#[must_use]
pub fn resolve_mnemonic(text: &str) -> Option<Mnemonic> {
    let upper = text.to_ascii_uppercase();
    if let Some(condition) = upper.strip_prefix("B.") {
        return Condition::from_name(condition).map(Mnemonic::Conditional);
    }
    if let Some(alias) = ALIASES.iter().find(|alias| alias.mnemonic() == upper) {
        return Some(Mnemonic::Alias(*alias));
    }
    Operation::from_mnemonic(&upper).map(Mnemonic::Operation)
}

const fn takes_condition(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Csel
            | Operation::Csinc
            | Operation::Csinv
            | Operation::Csneg
            | Operation::Ccmp
            | Operation::Ccmn
    )
}

const fn is_pair(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Stp | Operation::Ldp | Operation::Ldpsw | Operation::Stnp | Operation::Ldnp
    )
}

/// Width of the first register operand, or 64 bits when there is none.
fn operand_width(operands: &[ParsedOperand]) -> Width {
    operands
        .iter()
        .find_map(|operand| match operand {
            ParsedOperand::Register(register) => Some(register.width()),
            _ => None,
        })
        .unwrap_or(Width::X64)
}

fn link_operand(operation: Operation, operand: &ParsedOperand) -> LinkOperand {
    match operand {
        ParsedOperand::Register(register) => Operand::Register(*register).into(),
        ParsedOperand::Immediate(value) => Operand::Immediate(*value).into(),
        ParsedOperand::Shift(kind, amount) => Operand::Shift(*kind, *amount).into(),
        ParsedOperand::Extend(kind, amount) => Operand::Extend(*kind, *amount).into(),
        ParsedOperand::Memory { base, offset, mode } => Operand::Memory {
            base: *base,
            offset: *offset,
            mode: *mode,
        }
        .into(),
        ParsedOperand::Identifier(name) => {
            if takes_condition(operation) {
                if let Some(condition) = Condition::from_name(name) {
                    return Operand::Condition(condition).into();
                }
            }
            if matches!(operation, Operation::Mrs | Operation::Msr) {
                if let Some(register) = SystemRegister::from_name(name) {
                    return Operand::System(register).into();
                }
            }
            if matches!(operation, Operation::Dmb | Operation::Dsb | Operation::Isb) {
                if let Some(option) = barrier_option_from_name(name) {
                    return Operand::Immediate(i64::from(option)).into();
                }
            }
            LinkOperand::Symbol(name.clone())
        }
    }
}

/// Rejects single-register immediate offsets outside the signed 9-bit range
/// of the writeback and unscaled forms.
fn check_memory_offsets(operation: Operation, operands: &[ParsedOperand]) -> Result<(), BuildError> {
    if is_pair(operation) {
        return Ok(());
    }
    for operand in operands {
        if let ParsedOperand::Memory {
            offset: MemoryOffset::Immediate(value),
            mode,
            ..
        } = operand
        {
            let imm9 = *mode != IndexMode::Offset || *value < 0;
            if imm9 && !(-256..=255).contains(value) {
                return Err(BuildError::UnencodableImmediate {
                    operation,
                    value: *value,
                });
            }
        }
    }
    Ok(())
}

/// `ADD`/`SUB` (and their flag-setting forms) with a negative immediate are
/// assembled as the opposite operation with the magnitude.
fn fold_negative_immediate(
    operation: Operation,
    operands: &[ParsedOperand],
) -> (Operation, Vec<ParsedOperand>) {
    let opposite = match operation {
        Operation::Add => Operation::Sub,
        Operation::Sub => Operation::Add,
        Operation::Adds => Operation::Subs,
        Operation::Subs => Operation::Adds,
        _ => return (operation, operands.to_vec()),
    };
    match operands.get(2) {
        Some(ParsedOperand::Immediate(value)) if *value < 0 && *value != i64::MIN => {
            let mut folded = operands.to_vec();
            folded[2] = ParsedOperand::Immediate(-*value);
            (opposite, folded)
        }
        _ => (operation, operands.to_vec()),
    }
}

/// Lowers a parsed instruction to a built or deferred instruction.
///
/// # Errors
///
/// Any [`BuildError`] for operands with no encoding. Alias spellings report
/// [`BuildError::UnresolvedSymbol`] for label operands.
pub fn lower(resolution: Mnemonic, operands: &[ParsedOperand]) -> Result<Linkable, BuildError> {
    match resolution {
        Mnemonic::Operation(operation) => {
            check_memory_offsets(operation, operands)?;
            let (operation, operands) = fold_negative_immediate(operation, operands);
            build_linkable(
                operation,
                operand_width(&operands),
                operands
                    .iter()
                    .map(|operand| link_operand(operation, operand))
                    .collect(),
            )
        }
        Mnemonic::Conditional(condition) => {
            let mut items = vec![LinkOperand::Value(Operand::Condition(condition))];
            items.extend(
                operands
                    .iter()
                    .map(|operand| link_operand(Operation::BCond, operand)),
            );
            build_linkable(Operation::BCond, Width::X64, items)
        }
        Mnemonic::Alias(alias) => lower_alias(alias, operands).map(Linkable::Ready),
    }
}

/// Concrete operands of an alias spelling.
struct AliasOperands {
    operation: Operation,
    width: Width,
    values: Vec<Operand>,
}

impl AliasOperands {
    fn count(&self, min: usize, max: usize) -> Result<(), BuildError> {
        if (min..=max).contains(&self.values.len()) {
            return Ok(());
        }
        Err(BuildError::OperandCount {
            operation: self.operation,
            expected: match (min, max) {
                (2, 2) => "2",
                (3, 3) => "3",
                (4, 4) => "4",
                (2, 3) => "2 or 3",
                _ => "3 or 4",
            },
            found: self.values.len(),
        })
    }

    const fn kind(&self, position: usize, expected: &'static str) -> BuildError {
        BuildError::OperandKind {
            operation: self.operation,
            position,
            expected,
        }
    }

    fn register(&self, position: usize) -> Result<Register, BuildError> {
        match self.values.get(position) {
            Some(Operand::Register(register)) => Ok(*register),
            _ => Err(self.kind(position, "register")),
        }
    }

    fn immediate(&self, position: usize) -> Result<i64, BuildError> {
        match self.values.get(position) {
            Some(Operand::Immediate(value)) => Ok(*value),
            _ => Err(self.kind(position, "immediate")),
        }
    }

    fn condition(&self, position: usize) -> Result<Condition, BuildError> {
        match self.values.get(position) {
            Some(Operand::Condition(condition)) => Ok(*condition),
            _ => Err(self.kind(position, "condition")),
        }
    }

    fn zero(&self) -> Operand {
        Register::Xzr.with_width(self.width).into()
    }

    /// Builds the underlying operation from explicit operands.
    fn build(&self, operands: &[Operand]) -> Result<Instruction, BuildError> {
        build(self.operation, self.width, operands)
    }

    /// `lsb, width` to the rotate amount of an insert-style bitfield.
    fn insert_bounds(&self, position: usize) -> Result<(Operand, Operand), BuildError> {
        let lsb = self.immediate(position)?;
        let field = self.immediate(position + 1)?;
        let size = i64::from(self.width.bits());
        Ok((
            Operand::Immediate(lsb.wrapping_neg().rem_euclid(size)),
            Operand::Immediate(field.saturating_sub(1)),
        ))
    }
}

fn lower_alias(alias: Alias, operands: &[ParsedOperand]) -> Result<Instruction, BuildError> {
    let operation = alias_operation(alias);
    let values = operands
        .iter()
        .map(|operand| match link_operand(operation, operand) {
            LinkOperand::Value(value) => Ok(value),
            LinkOperand::Symbol(name) => Err(BuildError::UnresolvedSymbol(name)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let ops = AliasOperands {
        operation,
        width: operand_width(operands),
        values,
    };
    let v = &ops.values;

    match alias {
        Alias::Mov => {
            ops.count(2, 2)?;
            mov(ops.register(0)?, v[1])
        }
        Alias::Cmp | Alias::Cmn | Alias::Tst => {
            ops.count(2, 3)?;
            let mut items = vec![ops.zero()];
            items.extend_from_slice(v);
            if let (Some(Operand::Immediate(value)), Alias::Cmp | Alias::Cmn) = (v.get(1), alias) {
                if *value < 0 && *value != i64::MIN {
                    let flipped = if alias == Alias::Cmp {
                        Operation::Adds
                    } else {
                        Operation::Subs
                    };
                    items[2] = Operand::Immediate(-*value);
                    return build(flipped, ops.width, &items);
                }
            }
            ops.build(&items)
        }
        Alias::Neg | Alias::Negs | Alias::Mvn => {
            ops.count(2, 3)?;
            let mut items = vec![v[0], ops.zero()];
            items.extend_from_slice(&v[1..]);
            ops.build(&items)
        }
        Alias::Ngc | Alias::Ngcs => {
            ops.count(2, 2)?;
            ops.build(&[v[0], ops.zero(), v[1]])
        }
        Alias::Mul | Alias::Mneg | Alias::Smull | Alias::Smnegl | Alias::Umull | Alias::Umnegl => {
            ops.count(3, 3)?;
            ops.build(&[v[0], v[1], v[2], ops.zero()])
        }
        Alias::Lsl | Alias::Lsr | Alias::Asr | Alias::Ror => {
            ops.count(3, 3)?;
            let builder = match alias {
                Alias::Lsl => lsl,
                Alias::Lsr => lsr,
                Alias::Asr => asr,
                _ => ror,
            };
            builder(ops.register(0)?, ops.register(1)?, v[2])
        }
        Alias::Sbfx | Alias::Ubfx | Alias::Bfxil => {
            ops.count(4, 4)?;
            let lsb = ops.immediate(2)?;
            let last = lsb.saturating_add(ops.immediate(3)?).saturating_sub(1);
            ops.build(&[v[0], v[1], Operand::Immediate(lsb), Operand::Immediate(last)])
        }
        Alias::Sbfiz | Alias::Ubfiz | Alias::Bfi => {
            ops.count(4, 4)?;
            let (immr, imms) = ops.insert_bounds(2)?;
            ops.build(&[v[0], v[1], immr, imms])
        }
        Alias::Bfc => {
            ops.count(3, 3)?;
            let (immr, imms) = ops.insert_bounds(1)?;
            ops.build(&[v[0], ops.zero(), immr, imms])
        }
        Alias::Sxtb | Alias::Sxth | Alias::Sxtw | Alias::Uxtb | Alias::Uxth => {
            ops.count(2, 2)?;
            let last = match alias {
                Alias::Sxtb | Alias::Uxtb => 7,
                Alias::Sxth | Alias::Uxth => 15,
                _ => 31,
            };
            // The source is written as a W register whatever the destination.
            let source = ops.register(1)?.with_width(ops.width);
            ops.build(&[v[0], source.into(), Operand::Immediate(0), Operand::Immediate(last)])
        }
        Alias::Cset => {
            ops.count(2, 2)?;
            cset(ops.register(0)?, ops.condition(1)?)
        }
        Alias::Csetm => {
            ops.count(2, 2)?;
            let inverted = ops.condition(1)?.invert();
            ops.build(&[v[0], ops.zero(), ops.zero(), inverted.into()])
        }
        Alias::Cinc | Alias::Cinv | Alias::Cneg => {
            ops.count(3, 3)?;
            let inverted = ops.condition(2)?.invert();
            ops.build(&[v[0], v[1], v[1], inverted.into()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_line, ParsedLine};
    use a64_core::disasm::disassemble_word;
    use a64_core::ExtendKind;

    fn ready_word(resolution: Mnemonic, operands: &[ParsedOperand]) -> u32 {
        match lower(resolution, operands).expect("lowers") {
            Linkable::Ready(instruction) => instruction.encode().expect("encodes"),
            Linkable::Deferred(_) => panic!("expected a ready instruction"),
        }
    }

    fn assemble_line(text: &str) -> Result<Linkable, BuildError> {
        let parsed = parse_line(text, 1).expect("line parses");
        let [ParsedLine::Instruction { instruction }] = parsed.as_slice() else {
            panic!("expected one instruction in {text:?}");
        };
        lower(instruction.resolution, &instruction.operands)
    }

    fn assemble_word(text: &str) -> u32 {
        match assemble_line(text).expect("lowers") {
            Linkable::Ready(instruction) => instruction.encode().expect("encodes"),
            Linkable::Deferred(_) => panic!("expected a ready instruction for {text:?}"),
        }
    }

    #[test]
    fn disassembly_reassembles_to_the_same_word() {
        let words = [
            0x9340_1C20, // SXTB x0, w1
            0x9340_7C20, // SXTW x0, w1
            0x5300_1C20, // UXTB w0, w1
            0x5300_3C20, // UXTH w0, w1
            0x9344_2C20, // SBFX x0, x1, #4, #8
            0x5304_2C20, // UBFX w0, w1, #4, #8
            0x937C_1C20, // SBFIZ x0, x1, #4, #8
            0x331C_0C20, // BFI w0, w1, #4, #4
            0x331C_0FE0, // BFC w0, #4, #4
            0x9344_FC20, // ASR x0, x1, #4
            0xD37D_F020, // LSL x0, x1, #3
            0x93C1_1020, // ROR x0, x1, #4
            0x9A9F_17E0, // CSET x0, EQ
            0x5A9F_A3E0, // CSETM w0, LT
            0x9A81_1420, // CINC x0, x1, EQ
            0xDA81_5420, // CNEG x0, x1, MI
            0xCB01_03E0, // NEG x0, x1
            0x6B01_0BE0, // NEGS w0, w1, LSL #2
            0xAA21_03E0, // MVN x0, x1
            0x9B02_FC20, // MNEG x0, x1, x2
            0x9B22_7C20, // SMULL x0, w1, w2
            0x9BA2_7C20, // UMULL x0, w1, w2
            0xDA01_03E0, // NGC x0, x1
            0xF100_041F, // CMP x0, #1
            0xF240_001F, // TST x0, #1
            0xD503_3BBF, // DMB ISH
            0xD503_3F9F, // DSB SY
            0xD503_3FDF, // ISB
        ];
        for word in words {
            let text = disassemble_word(0, word).text;
            assert_eq!(assemble_word(&text), word, "{text}");
        }
    }

    #[test]
    fn negative_add_sub_immediates_flip_the_operation() {
        // SUB x0, x1, #4
        assert_eq!(assemble_word("add x0, x1, #-4"), 0xD100_1020);
        // ADD x0, x1, #4
        assert_eq!(assemble_word("sub x0, x1, #-4"), 0x9100_1020);
        // CMN x0, #1
        assert_eq!(assemble_word("cmp x0, #-1"), 0xB100_041F);
    }

    #[test]
    fn out_of_range_unscaled_offsets_are_rejected() {
        assert_eq!(
            assemble_line("str w0, [x1, #-257]").map(|_| ()),
            Err(BuildError::UnencodableImmediate {
                operation: Operation::Str,
                value: -257
            })
        );
        assert!(assemble_line("ldr x0, [x1], #256").is_err());
        // LDUR x0, [x1, #-256]
        assert_eq!(assemble_word("ldr x0, [x1, #-256]"), 0xF850_0020);
    }

    #[test]
    fn resolves_operations_aliases_and_conditions() {
        assert_eq!(resolve_mnemonic("add"), Some(Mnemonic::Operation(Operation::Add)));
        assert_eq!(resolve_mnemonic("MOV"), Some(Mnemonic::Alias(Alias::Mov)));
        assert_eq!(resolve_mnemonic("b.hs"), Some(Mnemonic::Conditional(Condition::Cs)));
        assert_eq!(resolve_mnemonic("b"), Some(Mnemonic::Operation(Operation::B)));
        assert_eq!(resolve_mnemonic("b.xx"), None);
        assert_eq!(resolve_mnemonic("sbfx"), Some(Mnemonic::Alias(Alias::Sbfx)));
        assert_eq!(resolve_mnemonic("push"), None);
    }

    #[test]
    fn lowers_plain_operations() {
        let word = ready_word(
            Mnemonic::Operation(Operation::Movz),
            &[ParsedOperand::Register(Register::X(0)), ParsedOperand::Immediate(5)],
        );
        assert_eq!(word, 0xD280_00A0);

        let word = ready_word(
            Mnemonic::Operation(Operation::Ldr),
            &[
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Memory {
                    base: Register::X(1),
                    offset: MemoryOffset::Register {
                        index: Register::X(2),
                        extend: ExtendKind::Uxtx,
                        amount: 3,
                    },
                    mode: IndexMode::Offset,
                },
            ],
        );
        assert_eq!(word, 0xF862_7820);
    }

    #[test]
    fn lowers_aliases() {
        let word = ready_word(
            Mnemonic::Alias(Alias::Mov),
            &[ParsedOperand::Register(Register::X(0)), ParsedOperand::Immediate(5)],
        );
        assert_eq!(word, 0xD280_00A0);

        let word = ready_word(
            Mnemonic::Alias(Alias::Cmp),
            &[
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Register(Register::X(1)),
            ],
        );
        assert_eq!(word, 0xEB01_001F);

        let word = ready_word(
            Mnemonic::Alias(Alias::Cset),
            &[
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Identifier("eq".into()),
            ],
        );
        assert_eq!(word, 0x9A9F_17E0);
    }

    #[test]
    fn condition_identifiers_become_conditions() {
        let word = ready_word(
            Mnemonic::Operation(Operation::Csel),
            &[
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Register(Register::X(1)),
                ParsedOperand::Register(Register::X(2)),
                ParsedOperand::Identifier("ne".into()),
            ],
        );
        assert_eq!(word, 0x9A82_1020);
    }

    #[test]
    fn nzcv_identifier_becomes_system_register() {
        let word = ready_word(
            Mnemonic::Operation(Operation::Mrs),
            &[
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Identifier("nzcv".into()),
            ],
        );
        assert_eq!(word, 0xD53B_4200);
    }

    #[test]
    fn labels_defer_plain_operations() {
        let linkable = lower(
            Mnemonic::Conditional(Condition::Ne),
            &[ParsedOperand::Identifier("loop".into())],
        )
        .expect("lowers");
        let Linkable::Deferred(deferred) = linkable else {
            panic!("expected deferred");
        };
        assert_eq!(deferred.operation(), Operation::BCond);
        assert!(deferred.symbols().contains("loop"));
    }

    #[test]
    fn aliases_reject_labels_and_bad_counts() {
        assert_eq!(
            lower(
                Mnemonic::Alias(Alias::Mov),
                &[
                    ParsedOperand::Register(Register::X(0)),
                    ParsedOperand::Identifier("data".into()),
                ],
            ),
            Err(BuildError::UnresolvedSymbol("data".into()))
        );
        assert!(matches!(
            lower(
                Mnemonic::Alias(Alias::Mul),
                &[ParsedOperand::Register(Register::X(0))],
            ),
            Err(BuildError::OperandCount { found: 1, .. })
        ));
    }
}
