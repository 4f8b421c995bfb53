//! Instruction builder: operation, width and typed operands to
//! [`Instruction`].
//!
//! The builder selects a shape from the operand kinds, reads the shape's
//! discriminator table backwards to find the opcode key for the operation,
//! and stages every operand through the field descriptors. Immediates that
//! do not fit a plain field are truncated to the field width; immediates
//! that must be derived (logical bitmasks, scaled offsets) are rejected when
//! no encoding exists.

use std::collections::BTreeSet;

use crate::condition::Condition;
use crate::error::BuildError;
use crate::operand::{ExtendKind, IndexMode, ShiftKind};
use crate::operation::Operation;
use crate::register::{IndexContext, Register, Width};
use crate::shape::{
    lookup_key, AddSubCarry, AddSubExtended, AddSubImmediate, AddSubShifted, Barrier, Bitfield,
    BranchRegister, CompareBranch, ConditionalBranch, ConditionalCompareImmediate,
    ConditionalCompareRegister, ConditionalSelect, DataProcessing1Source, DataProcessing2Source,
    DataProcessing3Source, ExceptionGeneration, Extract, Hint, Instruction, LoadLiteral,
    LoadStorePair, LoadStorePostIndexed, LoadStorePreIndexed, LoadStoreRegisterOffset,
    LoadStoreUnscaled, LoadStoreUnsignedOffset, LogicalImmediate, LogicalShifted, MoveWide,
    PcRelative, SystemRegister, SystemRegisterMove, Terminal, TestBranch,
    UnconditionalImmediate,
};

/// Offset part of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOffset {
    /// Byte offset.
    Immediate(i64),
    /// Index register, extended and shifted left by `amount`.
    Register {
        /// Index register.
        index: Register,
        /// Extension applied to the index; `UXTX` is printed as `LSL`.
        extend: ExtendKind,
        /// Left shift after extension.
        amount: u32,
    },
}

/// A typed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// General-purpose register, `SP` or zero register.
    Register(Register),
    /// Immediate value; PC-relative operations take a byte offset.
    Immediate(i64),
    /// Shift applied to the preceding register operand.
    Shift(ShiftKind, u32),
    /// Extension applied to the preceding register operand.
    Extend(ExtendKind, u32),
    /// Condition code.
    Condition(Condition),
    /// System register for `MRS`/`MSR`.
    System(SystemRegister),
    /// Memory operand.
    Memory {
        /// Base register.
        base: Register,
        /// Offset from the base.
        offset: MemoryOffset,
        /// Writeback behaviour.
        mode: IndexMode,
    },
}

impl Operand {
    /// `[base, #offset]` without writeback.
    #[must_use]
    pub const fn memory(base: Register, offset: i64) -> Self {
        Self::Memory {
            base,
            offset: MemoryOffset::Immediate(offset),
            mode: IndexMode::Offset,
        }
    }
}

impl From<Register> for Operand {
    fn from(register: Register) -> Self {
        Self::Register(register)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Immediate(value)
    }
}

impl From<Condition> for Operand {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

/// Builds one instruction.
///
/// # Errors
///
/// Any [`BuildError`] describing why the operands have no encoding.
pub fn build(
    operation: Operation,
    width: Width,
    operands: &[Operand],
) -> Result<Instruction, BuildError> {
    let ops = Operands {
        operation,
        width,
        items: operands,
    };
    match operation {
        Operation::Adr | Operation::Adrp => pc_relative(&ops),
        Operation::Add | Operation::Adds | Operation::Sub | Operation::Subs => add_sub(&ops),
        Operation::And | Operation::Orr | Operation::Eor | Operation::Ands => {
            if matches!(ops.get(2), Some(Operand::Immediate(_))) {
                logical_immediate(&ops)
            } else {
                logical_shifted(&ops)
            }
        }
        Operation::Bic | Operation::Orn | Operation::Eon | Operation::Bics => logical_shifted(&ops),
        Operation::Movn | Operation::Movz | Operation::Movk => move_wide(&ops),
        Operation::Sbfm | Operation::Bfm | Operation::Ubfm => bitfield(&ops),
        Operation::Extr => extract(&ops),
        Operation::BCond => conditional_branch(&ops),
        Operation::Svc | Operation::Hvc | Operation::Smc | Operation::Brk | Operation::Hlt => {
            exception(&ops)
        }
        Operation::Nop
        | Operation::Yield
        | Operation::Wfe
        | Operation::Wfi
        | Operation::Sev
        | Operation::Sevl
        | Operation::Hint => hint(&ops),
        Operation::Clrex | Operation::Dsb | Operation::Dmb | Operation::Isb | Operation::Sb => {
            barrier(&ops)
        }
        Operation::Mrs | Operation::Msr => system_register_move(&ops),
        Operation::Br | Operation::Blr | Operation::Ret => branch_register(&ops),
        Operation::B | Operation::Bl => unconditional(&ops),
        Operation::Cbz | Operation::Cbnz => compare_branch(&ops),
        Operation::Tbz | Operation::Tbnz => test_branch(&ops),
        Operation::Ldr
        | Operation::Ldrsw
        | Operation::Str
        | Operation::Strb
        | Operation::Ldrb
        | Operation::Ldrsb
        | Operation::Strh
        | Operation::Ldrh
        | Operation::Ldrsh => single_transfer(&ops),
        Operation::Stur
        | Operation::Ldur
        | Operation::Sturb
        | Operation::Ldurb
        | Operation::Ldursb
        | Operation::Sturh
        | Operation::Ldurh
        | Operation::Ldursh
        | Operation::Ldursw => unscaled_transfer(&ops),
        Operation::Stp | Operation::Ldp | Operation::Ldpsw | Operation::Stnp | Operation::Ldnp => {
            pair_transfer(&ops)
        }
        Operation::Adc | Operation::Adcs | Operation::Sbc | Operation::Sbcs => carry(&ops),
        Operation::Ccmn | Operation::Ccmp => conditional_compare(&ops),
        Operation::Csel | Operation::Csinc | Operation::Csinv | Operation::Csneg => {
            conditional_select(&ops)
        }
        Operation::Rbit
        | Operation::Rev16
        | Operation::Rev32
        | Operation::Rev
        | Operation::Clz
        | Operation::Cls => one_source(&ops),
        Operation::Udiv
        | Operation::Sdiv
        | Operation::Lslv
        | Operation::Lsrv
        | Operation::Asrv
        | Operation::Rorv => two_source(&ops),
        Operation::Madd
        | Operation::Msub
        | Operation::Smaddl
        | Operation::Smsubl
        | Operation::Smulh
        | Operation::Umaddl
        | Operation::Umsubl
        | Operation::Umulh => three_source(&ops),
    }
}

/// Low 32 bits of an immediate; fields truncate further on staging.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn low_bits(value: i64) -> u32 {
    value as u64 as u32
}

fn register_bits(register: Register) -> u32 {
    u32::from(register.index())
}

struct Operands<'a> {
    operation: Operation,
    width: Width,
    items: &'a [Operand],
}

impl Operands<'_> {
    fn get(&self, position: usize) -> Option<&Operand> {
        self.items.get(position)
    }

    fn count(&self, min: usize, max: usize, expected: &'static str) -> Result<(), BuildError> {
        if (min..=max).contains(&self.items.len()) {
            Ok(())
        } else {
            Err(BuildError::OperandCount {
                operation: self.operation,
                expected,
                found: self.items.len(),
            })
        }
    }

    const fn kind(&self, position: usize, expected: &'static str) -> BuildError {
        BuildError::OperandKind {
            operation: self.operation,
            position,
            expected,
        }
    }

    const fn unsupported(&self) -> BuildError {
        BuildError::UnsupportedOperation {
            operation: self.operation,
            width: self.width,
        }
    }

    const fn unencodable(&self, value: i64) -> BuildError {
        BuildError::UnencodableImmediate {
            operation: self.operation,
            value,
        }
    }

    fn require_width(&self, width: Width) -> Result<(), BuildError> {
        if self.width == width {
            Ok(())
        } else {
            Err(self.unsupported())
        }
    }

    /// Register at `position` in the operation's own width.
    fn register(&self, position: usize, context: IndexContext) -> Result<Register, BuildError> {
        self.register_of(position, self.width, context)
    }

    /// Register at `position` in an explicit width. Index 31 must be
    /// spelled the way `context` reads it back.
    fn register_of(
        &self,
        position: usize,
        width: Width,
        context: IndexContext,
    ) -> Result<Register, BuildError> {
        let Some(Operand::Register(register)) = self.get(position) else {
            return Err(self.kind(position, "register"));
        };
        let register = *register;
        match context {
            IndexContext::ZeroRegister if register.is_stack_pointer() => {
                return Err(self.kind(position, "general-purpose or zero register"));
            }
            IndexContext::StackPointer if register.is_zero() => {
                return Err(self.kind(position, "general-purpose register or SP"));
            }
            _ => {}
        }
        if register.width() == width {
            Ok(register)
        } else {
            Err(BuildError::MixedWidth { width, register })
        }
    }

    fn immediate(&self, position: usize) -> Result<i64, BuildError> {
        match self.get(position) {
            Some(Operand::Immediate(value)) => Ok(*value),
            _ => Err(self.kind(position, "immediate")),
        }
    }

    fn optional_immediate(&self, position: usize, default: i64) -> Result<i64, BuildError> {
        match self.get(position) {
            None => Ok(default),
            Some(_) => self.immediate(position),
        }
    }

    fn condition(&self, position: usize) -> Result<Condition, BuildError> {
        match self.get(position) {
            Some(Operand::Condition(condition)) => Ok(*condition),
            _ => Err(self.kind(position, "condition")),
        }
    }

    fn memory(&self, position: usize) -> Result<(Register, MemoryOffset, IndexMode), BuildError> {
        match self.get(position) {
            Some(Operand::Memory { base, offset, mode }) => {
                if base.is_zero() || base.width() != Width::X64 {
                    return Err(self.kind(position, "memory operand with an X or SP base"));
                }
                Ok((*base, *offset, *mode))
            }
            _ => Err(self.kind(position, "memory operand")),
        }
    }

    /// Returns `offset` when it is a multiple of `scale`.
    fn aligned(&self, offset: i64, scale: u64) -> Result<i64, BuildError> {
        let divisor = i64::try_from(scale).map_err(|_| self.unencodable(offset))?;
        if offset % divisor == 0 {
            Ok(offset)
        } else {
            Err(BuildError::MisalignedOffset {
                operation: self.operation,
                offset,
                scale,
            })
        }
    }

    /// Applies the discriminator row for the operation and wraps the shape.
    fn finish<S: Terminal>(&self, mut shape: S, width: Option<Width>) -> Result<Instruction, BuildError> {
        let entry = lookup_key(S::OPCODES, self.operation, width).ok_or_else(|| self.unsupported())?;
        shape.set_opcode_key(entry.key);
        Ok(Instruction::new(self.operation, shape))
    }
}

fn pc_relative(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    ops.require_width(Width::X64)?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let offset = ops.immediate(1)?;
    let mut shape = PcRelative::default();
    shape.rd.set_raw(register_bits(rd));
    if ops.operation == Operation::Adrp {
        shape.set_immediate(ops.aligned(offset, 4096)? >> 12);
    } else {
        shape.set_immediate(offset);
    }
    ops.finish(shape, None)
}

const fn sets_flags(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Adds | Operation::Subs | Operation::Ands | Operation::Bics
    )
}

fn add_sub(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 4, "3 or 4")?;
    let touches_sp = ops.items[..2]
        .iter()
        .any(|operand| matches!(operand, Operand::Register(register) if register.is_stack_pointer()));
    match (ops.get(2), ops.get(3)) {
        (Some(Operand::Immediate(value)), _) => add_sub_immediate(ops, *value),
        (Some(Operand::Register(_)), Some(Operand::Extend(..))) => add_sub_extended(ops),
        (Some(Operand::Register(_)), None | Some(Operand::Shift(ShiftKind::Lsl, _)))
            if touches_sp =>
        {
            add_sub_extended(ops)
        }
        (Some(Operand::Register(_)), _) => add_sub_shifted(ops),
        _ => Err(ops.kind(2, "register or immediate")),
    }
}

fn add_sub_immediate(ops: &Operands<'_>, value: i64) -> Result<Instruction, BuildError> {
    let rd_context = if sets_flags(ops.operation) {
        IndexContext::ZeroRegister
    } else {
        IndexContext::StackPointer
    };
    let rd = ops.register(0, rd_context)?;
    let rn = ops.register(1, IndexContext::StackPointer)?;
    let (imm12, shifted) = match ops.get(3) {
        None if (0..0x1000).contains(&value) => (value, false),
        None if value & 0xFFF == 0 && (0..0x100_0000).contains(&value) => (value >> 12, true),
        None | Some(Operand::Shift(ShiftKind::Lsl, 0)) => (value, false),
        Some(Operand::Shift(ShiftKind::Lsl, 12)) => (value, true),
        Some(_) => return Err(ops.kind(3, "LSL #0 or LSL #12")),
    };
    let mut shape = AddSubImmediate::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.imm12.set_raw(low_bits(imm12));
    shape.sh.set_raw(u32::from(shifted));
    ops.finish(shape, None)
}

fn add_sub_shifted(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let (kind, amount) = match ops.get(3) {
        None => (ShiftKind::Lsl, 0),
        Some(Operand::Shift(ShiftKind::Ror, _)) => return Err(ops.kind(3, "LSL, LSR or ASR shift")),
        Some(Operand::Shift(kind, amount)) => (*kind, *amount),
        Some(_) => return Err(ops.kind(3, "shift")),
    };
    let mut shape = AddSubShifted::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.shift.set(kind)?;
    shape.imm6.set_raw(amount);
    ops.finish(shape, None)
}

fn add_sub_extended(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    let rd_context = if sets_flags(ops.operation) {
        IndexContext::ZeroRegister
    } else {
        IndexContext::StackPointer
    };
    let rd = ops.register(0, rd_context)?;
    let rn = ops.register(1, IndexContext::StackPointer)?;
    let default_extend = match ops.width {
        Width::W32 => ExtendKind::Uxtw,
        Width::X64 => ExtendKind::Uxtx,
    };
    let (extend, amount) = match ops.get(3) {
        None => (default_extend, 0),
        Some(Operand::Shift(ShiftKind::Lsl, amount)) => (default_extend, *amount),
        Some(Operand::Extend(kind, amount)) => (*kind, *amount),
        Some(_) => return Err(ops.kind(3, "extend")),
    };
    if amount > 4 {
        return Err(ops.unencodable(i64::from(amount)));
    }
    let rm_width = match ops.width {
        Width::X64 => extend.source_width(),
        Width::W32 => Width::W32,
    };
    let rm = ops.register_of(2, rm_width, IndexContext::ZeroRegister)?;
    let mut shape = AddSubExtended::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.option.set(extend)?;
    shape.imm3.set_raw(amount);
    ops.finish(shape, None)
}

fn logical_immediate(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 3, "3")?;
    let rd_context = if sets_flags(ops.operation) {
        IndexContext::ZeroRegister
    } else {
        IndexContext::StackPointer
    };
    let rd = ops.register(0, rd_context)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let value = ops.immediate(2)?;
    let mut shape = LogicalImmediate::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    #[allow(clippy::cast_sign_loss)]
    let pattern = value as u64 & ops.width.mask();
    if !shape.set_bitmask(pattern) {
        return Err(ops.unencodable(value));
    }
    ops.finish(shape, None)
}

fn logical_shifted(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 4, "3 or 4")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let (kind, amount) = match ops.get(3) {
        None => (ShiftKind::Lsl, 0),
        Some(Operand::Shift(kind, amount)) => (*kind, *amount),
        Some(_) => return Err(ops.kind(3, "shift")),
    };
    let mut shape = LogicalShifted::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.shift.set(kind)?;
    shape.imm6.set_raw(amount);
    ops.finish(shape, None)
}

fn move_wide(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 3, "2 or 3")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let payload = ops.immediate(1)?;
    let shift = match ops.get(2) {
        None => 0,
        Some(Operand::Shift(ShiftKind::Lsl, amount)) => *amount,
        Some(_) => return Err(ops.kind(2, "LSL shift")),
    };
    if shift % 16 != 0 || shift >= ops.width.bits() {
        return Err(ops.unencodable(i64::from(shift)));
    }
    let mut shape = MoveWide::default();
    shape.sf.set_raw(u32::from(ops.width.sf()));
    shape.rd.set_raw(register_bits(rd));
    shape.imm16.set_raw(low_bits(payload));
    shape.hw.set_raw(shift / 16);
    ops.finish(shape, None)
}

fn bitfield(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(4, 4, "4")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let immr = ops.immediate(2)?;
    let imms = ops.immediate(3)?;
    let limit = i64::from(ops.width.bits());
    for value in [immr, imms] {
        if !(0..limit).contains(&value) {
            return Err(ops.unencodable(value));
        }
    }
    let mut shape = Bitfield::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.set_bounds(low_bits(immr), low_bits(imms));
    ops.finish(shape, None)
}

fn extract(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(4, 4, "4")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let lsb = ops.immediate(3)?;
    if !(0..i64::from(ops.width.bits())).contains(&lsb) {
        return Err(ops.unencodable(lsb));
    }
    let mut shape = Extract::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.n.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.imms.set_raw(low_bits(lsb));
    ops.finish(shape, None)
}

fn conditional_branch(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let condition = ops.condition(0)?;
    let offset = ops.aligned(ops.immediate(1)?, 4)?;
    let mut shape = ConditionalBranch::default();
    shape.cond.set(condition)?;
    shape.imm19.set(offset)?;
    ops.finish(shape, None)
}

fn exception(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(0, 1, "0 or 1")?;
    let payload = ops.optional_immediate(0, 0)?;
    let mut shape = ExceptionGeneration::default();
    shape.imm16.set_raw(low_bits(payload));
    ops.finish(shape, None)
}

fn hint(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    let mut shape = Hint::default();
    if ops.operation == Operation::Hint {
        ops.count(1, 1, "1")?;
        let number = ops.immediate(0)?;
        if !(0..0x80).contains(&number) {
            return Err(ops.unencodable(number));
        }
        shape.set_opcode_key(low_bits(number));
        return Ok(Instruction::new(Operation::Hint, shape));
    }
    ops.count(0, 0, "0")?;
    ops.finish(shape, None)
}

fn barrier(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(0, 1, "0 or 1")?;
    // SY, or the full CRm for CLREX.
    let option = ops.optional_immediate(0, 0b1111)?;
    let mut shape = Barrier::default();
    shape.crm.set_raw(low_bits(option));
    ops.finish(shape, None)
}

fn system_register_move(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let (register_position, system_position) = if ops.operation == Operation::Mrs {
        (0, 1)
    } else {
        (1, 0)
    };
    let rt = ops.register_of(register_position, Width::X64, IndexContext::ZeroRegister)?;
    let Some(Operand::System(system)) = ops.get(system_position) else {
        return Err(ops.kind(system_position, "system register"));
    };
    if !matches!(system.op0, 2 | 3) {
        return Err(ops.kind(system_position, "system register with op0 of 2 or 3"));
    }
    let mut shape = SystemRegisterMove::default();
    shape.rt.set_raw(register_bits(rt));
    shape.set_system_register(*system);
    ops.finish(shape, None)
}

fn branch_register(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    let rn = if ops.operation == Operation::Ret && ops.items.is_empty() {
        Register::LINK
    } else {
        ops.count(1, 1, "1")?;
        ops.register_of(0, Width::X64, IndexContext::ZeroRegister)?
    };
    let mut shape = BranchRegister::default();
    shape.rn.set_raw(register_bits(rn));
    ops.finish(shape, None)
}

fn unconditional(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(1, 1, "1")?;
    let offset = ops.aligned(ops.immediate(0)?, 4)?;
    let mut shape = UnconditionalImmediate::default();
    shape.imm26.set(offset)?;
    ops.finish(shape, None)
}

fn compare_branch(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let rt = ops.register(0, IndexContext::ZeroRegister)?;
    let offset = ops.aligned(ops.immediate(1)?, 4)?;
    let mut shape = CompareBranch::default();
    shape.sf.set_raw(u32::from(ops.width.sf()));
    shape.rt.set_raw(register_bits(rt));
    shape.imm19.set(offset)?;
    ops.finish(shape, None)
}

fn test_branch(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 3, "3")?;
    let rt = ops.register(0, IndexContext::ZeroRegister)?;
    let bit = ops.immediate(1)?;
    if !(0..i64::from(ops.width.bits())).contains(&bit) {
        return Err(ops.unencodable(bit));
    }
    let offset = ops.aligned(ops.immediate(2)?, 4)?;
    let mut shape = TestBranch::default();
    shape.rt.set_raw(register_bits(rt));
    shape.set_bit_number(low_bits(bit));
    shape.imm14.set(offset)?;
    ops.finish(shape, None)
}

/// Unscaled counterpart of a scaled single-register transfer.
const fn unscaled_counterpart(operation: Operation) -> Option<Operation> {
    match operation {
        Operation::Ldr => Some(Operation::Ldur),
        Operation::Ldrsw => Some(Operation::Ldursw),
        Operation::Str => Some(Operation::Stur),
        Operation::Strb => Some(Operation::Sturb),
        Operation::Ldrb => Some(Operation::Ldurb),
        Operation::Ldrsb => Some(Operation::Ldursb),
        Operation::Strh => Some(Operation::Sturh),
        Operation::Ldrh => Some(Operation::Ldurh),
        Operation::Ldrsh => Some(Operation::Ldursh),
        _ => None,
    }
}

/// Bytes moved by a single-register transfer at `width`.
const fn transfer_size(operation: Operation, width: Width) -> u64 {
    match operation {
        Operation::Strb
        | Operation::Ldrb
        | Operation::Ldrsb
        | Operation::Sturb
        | Operation::Ldurb
        | Operation::Ldursb => 1,
        Operation::Strh
        | Operation::Ldrh
        | Operation::Ldrsh
        | Operation::Sturh
        | Operation::Ldurh
        | Operation::Ldursh => 2,
        Operation::Ldrsw | Operation::Ldursw => 4,
        _ => width.bytes(),
    }
}

fn single_transfer(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let rt = ops.register(0, IndexContext::ZeroRegister)?;
    if let Some(Operand::Immediate(offset)) = ops.get(1) {
        return load_literal(ops, rt, *offset);
    }
    let (base, offset, mode) = ops.memory(1)?;
    let size = transfer_size(ops.operation, ops.width);
    match (offset, mode) {
        (MemoryOffset::Immediate(offset), IndexMode::Offset) => {
            if offset < 0 {
                let unscaled = unscaled_counterpart(ops.operation).ok_or_else(|| ops.unsupported())?;
                let counterpart = Operands {
                    operation: unscaled,
                    width: ops.width,
                    items: ops.items,
                };
                return unscaled_transfer(&counterpart);
            }
            let offset = ops.aligned(offset, size)?;
            let mut shape = LoadStoreUnsignedOffset::default();
            shape.single.rt.set_raw(register_bits(rt));
            shape.single.rn.set_raw(register_bits(base));
            #[allow(clippy::cast_possible_wrap)]
            shape.imm12.set_raw(low_bits(offset / size as i64));
            ops.finish(shape, Some(ops.width))
        }
        (MemoryOffset::Immediate(offset), IndexMode::PreIndex) => {
            let mut shape = LoadStorePreIndexed::default();
            shape.single.rt.set_raw(register_bits(rt));
            shape.single.rn.set_raw(register_bits(base));
            shape.index.imm9.set(offset)?;
            ops.finish(shape, Some(ops.width))
        }
        (MemoryOffset::Immediate(offset), IndexMode::PostIndex) => {
            let mut shape = LoadStorePostIndexed::default();
            shape.single.rt.set_raw(register_bits(rt));
            shape.single.rn.set_raw(register_bits(base));
            shape.index.imm9.set(offset)?;
            ops.finish(shape, Some(ops.width))
        }
        (
            MemoryOffset::Register {
                index,
                extend,
                amount,
            },
            IndexMode::Offset,
        ) => {
            if index.is_stack_pointer() || index.width() != extend.source_width() {
                return Err(ops.kind(1, "index register matching its extend"));
            }
            if !matches!(extend, ExtendKind::Uxtw | ExtendKind::Uxtx | ExtendKind::Sxtw | ExtendKind::Sxtx) {
                return Err(ops.kind(1, "UXTW, LSL, SXTW or SXTX index"));
            }
            let scaled = match amount {
                0 => false,
                _ if amount == size.trailing_zeros() => true,
                _ => return Err(ops.unencodable(i64::from(amount))),
            };
            let mut shape = LoadStoreRegisterOffset::default();
            shape.single.rt.set_raw(register_bits(rt));
            shape.single.rn.set_raw(register_bits(base));
            shape.rm.set_raw(register_bits(index));
            shape.option.set(extend)?;
            shape.s.set_raw(u32::from(scaled));
            ops.finish(shape, Some(ops.width))
        }
        (MemoryOffset::Register { .. }, _) => Err(ops.kind(1, "register offset without writeback")),
    }
}

fn load_literal(ops: &Operands<'_>, rt: Register, offset: i64) -> Result<Instruction, BuildError> {
    let offset = ops.aligned(offset, 4)?;
    let mut shape = LoadLiteral::default();
    shape.rt.set_raw(register_bits(rt));
    shape.imm19.set(offset)?;
    ops.finish(shape, Some(ops.width))
}

fn unscaled_transfer(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let rt = ops.register(0, IndexContext::ZeroRegister)?;
    let (base, offset, mode) = ops.memory(1)?;
    let (MemoryOffset::Immediate(offset), IndexMode::Offset) = (offset, mode) else {
        return Err(ops.kind(1, "immediate offset without writeback"));
    };
    let mut shape = LoadStoreUnscaled::default();
    shape.single.rt.set_raw(register_bits(rt));
    shape.single.rn.set_raw(register_bits(base));
    shape.index.imm9.set(offset)?;
    ops.finish(shape, Some(ops.width))
}

fn pair_transfer(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 3, "3")?;
    let rt = ops.register(0, IndexContext::ZeroRegister)?;
    let rt2 = ops.register(1, IndexContext::ZeroRegister)?;
    let (base, offset, mode) = ops.memory(2)?;
    let MemoryOffset::Immediate(offset) = offset else {
        return Err(ops.kind(2, "immediate offset"));
    };
    let non_temporal = matches!(ops.operation, Operation::Stnp | Operation::Ldnp);
    if non_temporal && mode != IndexMode::Offset {
        return Err(ops.kind(2, "offset without writeback"));
    }
    let size = match ops.operation {
        Operation::Ldpsw => 4,
        _ => ops.width.bytes(),
    };
    let offset = ops.aligned(offset, size)?;
    let mut shape = LoadStorePair::default();
    shape.rt.set_raw(register_bits(rt));
    shape.rt2.set_raw(register_bits(rt2));
    shape.rn.set_raw(register_bits(base));
    #[allow(clippy::cast_possible_wrap)]
    shape.imm7.set(offset / size as i64)?;
    // Leave the non-temporal encoding so the mode sticks; the opcode key
    // restores it for STNP/LDNP.
    shape.index.set_raw(0b10);
    shape.set_index_mode(mode);
    ops.finish(shape, Some(ops.width))
}

fn carry(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 3, "3")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let mut shape = AddSubCarry::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    ops.finish(shape, None)
}

fn conditional_compare(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(4, 4, "4")?;
    let rn = ops.register(0, IndexContext::ZeroRegister)?;
    let nzcv = ops.immediate(2)?;
    let condition = ops.condition(3)?;
    if !(0..16).contains(&nzcv) {
        return Err(ops.unencodable(nzcv));
    }
    if let Some(Operand::Immediate(value)) = ops.get(1) {
        if !(0..32).contains(value) {
            return Err(ops.unencodable(*value));
        }
        let mut shape = ConditionalCompareImmediate::default();
        shape.compare.sf.set_raw(u32::from(ops.width.sf()));
        shape.compare.rn.set_raw(register_bits(rn));
        shape.compare.cond.set(condition)?;
        shape.compare.nzcv.set_raw(low_bits(nzcv));
        shape.imm5.set_raw(low_bits(*value));
        return ops.finish(shape, None);
    }
    let rm = ops.register(1, IndexContext::ZeroRegister)?;
    let mut shape = ConditionalCompareRegister::default();
    shape.compare.sf.set_raw(u32::from(ops.width.sf()));
    shape.compare.rn.set_raw(register_bits(rn));
    shape.compare.cond.set(condition)?;
    shape.compare.nzcv.set_raw(low_bits(nzcv));
    shape.rm.set_raw(register_bits(rm));
    ops.finish(shape, None)
}

fn conditional_select(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(4, 4, "4")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let condition = ops.condition(3)?;
    let mut shape = ConditionalSelect::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.cond.set(condition)?;
    ops.finish(shape, None)
}

fn one_source(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(2, 2, "2")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let mut shape = DataProcessing1Source::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    ops.finish(shape, Some(ops.width))
}

fn two_source(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    ops.count(3, 3, "3")?;
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register(1, IndexContext::ZeroRegister)?;
    let rm = ops.register(2, IndexContext::ZeroRegister)?;
    let mut shape = DataProcessing2Source::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    ops.finish(shape, None)
}

fn three_source(ops: &Operands<'_>) -> Result<Instruction, BuildError> {
    let high_half = matches!(ops.operation, Operation::Smulh | Operation::Umulh);
    let widening = matches!(
        ops.operation,
        Operation::Smaddl | Operation::Smsubl | Operation::Umaddl | Operation::Umsubl
    );
    if high_half {
        ops.count(3, 3, "3")?;
    } else {
        ops.count(4, 4, "4")?;
    }
    if high_half || widening {
        ops.require_width(Width::X64)?;
    }
    let source_width = if widening { Width::W32 } else { ops.width };
    let rd = ops.register(0, IndexContext::ZeroRegister)?;
    let rn = ops.register_of(1, source_width, IndexContext::ZeroRegister)?;
    let rm = ops.register_of(2, source_width, IndexContext::ZeroRegister)?;
    let ra = if high_half {
        Register::Xzr
    } else {
        ops.register(3, IndexContext::ZeroRegister)?
    };
    let mut shape = DataProcessing3Source::default();
    shape.operands.sf.set_raw(u32::from(ops.width.sf()));
    shape.operands.rd.set_raw(register_bits(rd));
    shape.operands.rn.set_raw(register_bits(rn));
    shape.rm.set_raw(register_bits(rm));
    shape.ra.set_raw(register_bits(ra));
    ops.finish(shape, Some(ops.width))
}

/// `MOV`: register copy (through `ADD #0` when `SP` is involved), or an
/// immediate through `MOVZ`, `MOVN` or a logical bitmask, in that order.
///
/// # Errors
///
/// [`BuildError::UnencodableImmediate`] when no form encodes the value.
pub fn mov(rd: Register, source: Operand) -> Result<Instruction, BuildError> {
    let width = rd.width();
    let zero = Register::Xzr.with_width(width);
    match source {
        Operand::Register(rm) if rd.is_stack_pointer() || rm.is_stack_pointer() => build(
            Operation::Add,
            width,
            &[rd.into(), rm.into(), Operand::Immediate(0)],
        ),
        Operand::Register(rm) => build(Operation::Orr, width, &[rd.into(), zero.into(), rm.into()]),
        Operand::Immediate(value) => mov_immediate(rd, value),
        _ => Err(BuildError::OperandKind {
            operation: Operation::Orr,
            position: 1,
            expected: "register or immediate",
        }),
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn mov_immediate(rd: Register, value: i64) -> Result<Instruction, BuildError> {
    let width = rd.width();
    let pattern = value as u64 & width.mask();
    let inverted = !pattern & width.mask();
    for shift in (0..width.bits()).step_by(16) {
        let chunk = 0xFFFF_u64 << shift;
        if pattern & !chunk == 0 {
            return build(
                Operation::Movz,
                width,
                &[rd.into(), Operand::Immediate((pattern >> shift) as i64), Operand::Shift(ShiftKind::Lsl, shift)],
            );
        }
        if inverted & !chunk == 0 {
            return build(
                Operation::Movn,
                width,
                &[rd.into(), Operand::Immediate((inverted >> shift) as i64), Operand::Shift(ShiftKind::Lsl, shift)],
            );
        }
    }
    let zero = Register::Xzr.with_width(width);
    build(Operation::Orr, width, &[rd.into(), zero.into(), Operand::Immediate(value)]).map_err(|_| {
        BuildError::UnencodableImmediate {
            operation: Operation::Movz,
            value,
        }
    })
}

fn compare_into_zero(operation: Operation, rn: Register, source: Operand) -> Result<Instruction, BuildError> {
    let width = rn.width();
    let zero = Register::Xzr.with_width(width);
    build(operation, width, &[zero.into(), rn.into(), source])
}

/// `CMP rn, source`: `SUBS` into the zero register.
///
/// # Errors
///
/// As [`build`].
pub fn cmp(rn: Register, source: Operand) -> Result<Instruction, BuildError> {
    compare_into_zero(Operation::Subs, rn, source)
}

/// `CMN rn, source`: `ADDS` into the zero register.
///
/// # Errors
///
/// As [`build`].
pub fn cmn(rn: Register, source: Operand) -> Result<Instruction, BuildError> {
    compare_into_zero(Operation::Adds, rn, source)
}

/// `TST rn, source`: `ANDS` into the zero register.
///
/// # Errors
///
/// As [`build`].
pub fn tst(rn: Register, source: Operand) -> Result<Instruction, BuildError> {
    compare_into_zero(Operation::Ands, rn, source)
}

/// `NEG rd, rm`: `SUB rd, zr, rm`.
///
/// # Errors
///
/// As [`build`].
pub fn neg(rd: Register, rm: Register) -> Result<Instruction, BuildError> {
    let zero = Register::Xzr.with_width(rd.width());
    build(Operation::Sub, rd.width(), &[rd.into(), zero.into(), rm.into()])
}

/// `MVN rd, rm`: `ORN rd, zr, rm`.
///
/// # Errors
///
/// As [`build`].
pub fn mvn(rd: Register, rm: Register) -> Result<Instruction, BuildError> {
    let zero = Register::Xzr.with_width(rd.width());
    build(Operation::Orn, rd.width(), &[rd.into(), zero.into(), rm.into()])
}

/// `MUL rd, rn, rm`: `MADD` with a zero addend.
///
/// # Errors
///
/// As [`build`].
pub fn mul(rd: Register, rn: Register, rm: Register) -> Result<Instruction, BuildError> {
    let zero = Register::Xzr.with_width(rd.width());
    build(Operation::Madd, rd.width(), &[rd.into(), rn.into(), rm.into(), zero.into()])
}

fn shift_by(
    kind: ShiftKind,
    rd: Register,
    rn: Register,
    amount: Operand,
) -> Result<Instruction, BuildError> {
    let width = rd.width();
    let variable = match kind {
        ShiftKind::Lsl => Operation::Lslv,
        ShiftKind::Lsr => Operation::Lsrv,
        ShiftKind::Asr => Operation::Asrv,
        ShiftKind::Ror => Operation::Rorv,
    };
    let Operand::Immediate(shift) = amount else {
        return build(variable, width, &[rd.into(), rn.into(), amount]);
    };
    let size = i64::from(width.bits());
    let shift = shift.rem_euclid(size);
    match kind {
        ShiftKind::Lsl => build(
            Operation::Ubfm,
            width,
            &[rd.into(), rn.into(), Operand::Immediate((size - shift) % size), Operand::Immediate(size - 1 - shift)],
        ),
        ShiftKind::Lsr => build(
            Operation::Ubfm,
            width,
            &[rd.into(), rn.into(), Operand::Immediate(shift), Operand::Immediate(size - 1)],
        ),
        ShiftKind::Asr => build(
            Operation::Sbfm,
            width,
            &[rd.into(), rn.into(), Operand::Immediate(shift), Operand::Immediate(size - 1)],
        ),
        ShiftKind::Ror => build(
            Operation::Extr,
            width,
            &[rd.into(), rn.into(), rn.into(), Operand::Immediate(shift)],
        ),
    }
}

/// `LSL rd, rn, amount` by immediate (`UBFM`) or register (`LSLV`).
///
/// # Errors
///
/// As [`build`].
pub fn lsl(rd: Register, rn: Register, amount: Operand) -> Result<Instruction, BuildError> {
    shift_by(ShiftKind::Lsl, rd, rn, amount)
}

/// `LSR rd, rn, amount` by immediate (`UBFM`) or register (`LSRV`).
///
/// # Errors
///
/// As [`build`].
pub fn lsr(rd: Register, rn: Register, amount: Operand) -> Result<Instruction, BuildError> {
    shift_by(ShiftKind::Lsr, rd, rn, amount)
}

/// `ASR rd, rn, amount` by immediate (`SBFM`) or register (`ASRV`).
///
/// # Errors
///
/// As [`build`].
pub fn asr(rd: Register, rn: Register, amount: Operand) -> Result<Instruction, BuildError> {
    shift_by(ShiftKind::Asr, rd, rn, amount)
}

/// `ROR rd, rn, amount` by immediate (`EXTR`) or register (`RORV`).
///
/// # Errors
///
/// As [`build`].
pub fn ror(rd: Register, rn: Register, amount: Operand) -> Result<Instruction, BuildError> {
    shift_by(ShiftKind::Ror, rd, rn, amount)
}

/// `CSET rd, condition`: `CSINC rd, zr, zr, !condition`.
///
/// # Errors
///
/// [`BuildError::OperandKind`] for `AL`/`NV`, which have no inverse.
pub fn cset(rd: Register, condition: Condition) -> Result<Instruction, BuildError> {
    if condition.is_always() {
        return Err(BuildError::OperandKind {
            operation: Operation::Csinc,
            position: 1,
            expected: "condition other than AL or NV",
        });
    }
    let zero = Register::Xzr.with_width(rd.width());
    build(
        Operation::Csinc,
        rd.width(),
        &[rd.into(), zero.into(), zero.into(), condition.invert().into()],
    )
}

/// `RET` through the link register.
///
/// # Errors
///
/// Never fails in practice; kept fallible like every other builder.
pub fn ret() -> Result<Instruction, BuildError> {
    build(Operation::Ret, Width::X64, &[])
}

/// An operand that may still name a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOperand {
    /// Concrete operand.
    Value(Operand),
    /// Symbol whose value becomes an [`Operand::Immediate`].
    Symbol(String),
}

impl From<Operand> for LinkOperand {
    fn from(operand: Operand) -> Self {
        Self::Value(operand)
    }
}

/// Result of building with possibly symbolic operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkable {
    /// Every operand was concrete.
    Ready(Instruction),
    /// At least one operand awaits symbol resolution.
    Deferred(Deferred),
}

/// An instruction waiting for symbol values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    operation: Operation,
    width: Width,
    operands: Vec<LinkOperand>,
}

impl Deferred {
    /// Operation to build once resolved.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Names of the unresolved symbols, sorted and deduplicated.
    #[must_use]
    pub fn symbols(&self) -> BTreeSet<&str> {
        self.operands
            .iter()
            .filter_map(|operand| match operand {
                LinkOperand::Symbol(name) => Some(name.as_str()),
                LinkOperand::Value(_) => None,
            })
            .collect()
    }

    /// Substitutes every symbol with `lookup(name)` and builds.
    ///
    /// # Errors
    ///
    /// [`BuildError::UnresolvedSymbol`] for the first name `lookup` does not
    /// know, otherwise as [`build`].
    pub fn resolve<F>(&self, mut lookup: F) -> Result<Instruction, BuildError>
    where
        F: FnMut(&str) -> Option<i64>,
    {
        let operands = self
            .operands
            .iter()
            .map(|operand| match operand {
                LinkOperand::Value(value) => Ok(*value),
                LinkOperand::Symbol(name) => lookup(name)
                    .map(Operand::Immediate)
                    .ok_or_else(|| BuildError::UnresolvedSymbol(name.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        build(self.operation, self.width, &operands)
    }
}

/// Builds immediately when every operand is concrete, otherwise checks the
/// shape with placeholder zeros and defers.
///
/// # Errors
///
/// As [`build`], for errors independent of the symbol values.
pub fn build_linkable(
    operation: Operation,
    width: Width,
    operands: Vec<LinkOperand>,
) -> Result<Linkable, BuildError> {
    let placeholders: Vec<Operand> = operands
        .iter()
        .map(|operand| match operand {
            LinkOperand::Value(value) => *value,
            LinkOperand::Symbol(_) => Operand::Immediate(0),
        })
        .collect();
    let instruction = build(operation, width, &placeholders)?;
    if operands
        .iter()
        .all(|operand| matches!(operand, LinkOperand::Value(_)))
    {
        return Ok(Linkable::Ready(instruction));
    }
    Ok(Linkable::Deferred(Deferred {
        operation,
        width,
        operands,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::shape::ShapeKind;
    use rstest::rstest;

    fn word(instruction: Result<Instruction, BuildError>) -> u32 {
        instruction
            .expect("builds")
            .encode()
            .expect("encodes")
    }

    #[rstest]
    #[case(Operation::Movz, Width::X64, vec![Register::X(0).into(), Operand::Immediate(5)], 0xD280_00A0)]
    #[case(Operation::Add, Width::X64, vec![Register::X(0).into(), Register::X(0).into(), Register::X(0).into()], 0x8B00_0000)]
    #[case(Operation::Svc, Width::X64, vec![Operand::Immediate(0)], 0xD400_0001)]
    #[case(Operation::Add, Width::X64, vec![Register::Sp.into(), Register::X(1).into(), Operand::Immediate(16)], 0x9100_403F)]
    #[case(Operation::Ldr, Width::X64, vec![Register::X(0).into(), Operand::memory(Register::X(1), 8)], 0xF940_0420)]
    #[case(Operation::Ret, Width::X64, vec![], 0xD65F_03C0)]
    #[case(Operation::Rev, Width::X64, vec![Register::X(0).into(), Register::X(1).into()], 0xDAC0_0C20)]
    fn builds_known_words(
        #[case] operation: Operation,
        #[case] width: Width,
        #[case] operands: Vec<Operand>,
        #[case] expected: u32,
    ) {
        assert_eq!(word(build(operation, width, &operands)), expected);
    }

    fn x(n: u8) -> Operand {
        Register::X(n).into()
    }

    fn w(n: u8) -> Operand {
        Register::W(n).into()
    }

    fn imm(value: i64) -> Operand {
        Operand::Immediate(value)
    }

    fn indexed(base: Register, offset: i64, mode: IndexMode) -> Operand {
        Operand::Memory {
            base,
            offset: MemoryOffset::Immediate(offset),
            mode,
        }
    }

    #[rstest]
    #[case(ShapeKind::PcRelative, Operation::Adr, Width::X64, vec![x(0), imm(-4)])]
    #[case(ShapeKind::PcRelative, Operation::Adrp, Width::X64, vec![x(1), imm(0x3000)])]
    #[case(ShapeKind::AddSubImmediate, Operation::Subs, Width::W32, vec![w(0), w(1), imm(4095)])]
    #[case(ShapeKind::AddSubImmediate, Operation::Add, Width::X64, vec![x(0), x(1), imm(1), Operand::Shift(ShiftKind::Lsl, 12)])]
    #[case(ShapeKind::LogicalImmediate, Operation::Eor, Width::W32, vec![w(3), w(4), imm(0x5555_5555)])]
    #[case(ShapeKind::MoveWide, Operation::Movk, Width::X64, vec![x(0), imm(0xBEEF), Operand::Shift(ShiftKind::Lsl, 32)])]
    #[case(ShapeKind::Bitfield, Operation::Sbfm, Width::X64, vec![x(0), x(1), imm(4), imm(11)])]
    #[case(ShapeKind::Bitfield, Operation::Bfm, Width::W32, vec![w(0), w(1), imm(28), imm(3)])]
    #[case(ShapeKind::Extract, Operation::Extr, Width::X64, vec![x(0), x(1), x(2), imm(8)])]
    #[case(ShapeKind::ConditionalBranch, Operation::BCond, Width::X64, vec![Condition::Ge.into(), imm(-16)])]
    #[case(ShapeKind::ExceptionGeneration, Operation::Brk, Width::X64, vec![imm(1000)])]
    #[case(ShapeKind::Hint, Operation::Yield, Width::X64, vec![])]
    #[case(ShapeKind::Barrier, Operation::Dmb, Width::X64, vec![imm(0b1011)])]
    #[case(ShapeKind::Barrier, Operation::Isb, Width::X64, vec![])]
    #[case(ShapeKind::SystemRegisterMove, Operation::Mrs, Width::X64, vec![x(0), Operand::System(SystemRegister::NZCV)])]
    #[case(ShapeKind::SystemRegisterMove, Operation::Msr, Width::X64, vec![Operand::System(SystemRegister::NZCV), x(1)])]
    #[case(ShapeKind::BranchRegister, Operation::Blr, Width::X64, vec![x(3)])]
    #[case(ShapeKind::UnconditionalImmediate, Operation::Bl, Width::X64, vec![imm(1024)])]
    #[case(ShapeKind::CompareBranch, Operation::Cbnz, Width::W32, vec![w(5), imm(-8)])]
    #[case(ShapeKind::TestBranch, Operation::Tbz, Width::X64, vec![x(0), imm(40), imm(32)])]
    #[case(ShapeKind::TestBranch, Operation::Tbnz, Width::W32, vec![w(1), imm(3), imm(-4)])]
    #[case(ShapeKind::LoadLiteral, Operation::Ldr, Width::X64, vec![x(2), imm(8)])]
    #[case(ShapeKind::LoadLiteral, Operation::Ldrsw, Width::X64, vec![x(2), imm(-12)])]
    #[case(ShapeKind::LoadStorePair, Operation::Ldp, Width::X64, vec![x(29), x(30), indexed(Register::Sp, 16, IndexMode::PostIndex)])]
    #[case(ShapeKind::LoadStorePair, Operation::Stnp, Width::W32, vec![w(1), w(2), Operand::memory(Register::X(3), 8)])]
    #[case(ShapeKind::LoadStoreUnscaled, Operation::Ldur, Width::X64, vec![x(0), Operand::memory(Register::X(1), -8)])]
    #[case(ShapeKind::LoadStoreUnscaled, Operation::Ldursb, Width::W32, vec![w(0), Operand::memory(Register::X(1), 3)])]
    #[case(ShapeKind::LoadStorePostIndexed, Operation::Ldr, Width::W32, vec![w(0), indexed(Register::X(1), 4, IndexMode::PostIndex)])]
    #[case(ShapeKind::LoadStorePreIndexed, Operation::Str, Width::X64, vec![x(0), indexed(Register::Sp, -16, IndexMode::PreIndex)])]
    #[case(ShapeKind::LoadStoreUnsignedOffset, Operation::Ldrb, Width::W32, vec![w(0), Operand::memory(Register::X(1), 3)])]
    #[case(ShapeKind::LoadStoreRegisterOffset, Operation::Ldr, Width::X64, vec![x(0), Operand::Memory { base: Register::X(1), offset: MemoryOffset::Register { index: Register::X(2), extend: ExtendKind::Uxtx, amount: 3 }, mode: IndexMode::Offset }])]
    #[case(ShapeKind::LogicalShifted, Operation::Bics, Width::X64, vec![x(0), x(1), x(2), Operand::Shift(ShiftKind::Ror, 7)])]
    #[case(ShapeKind::AddSubShifted, Operation::Sub, Width::X64, vec![x(0), x(1), x(2), Operand::Shift(ShiftKind::Asr, 3)])]
    #[case(ShapeKind::AddSubExtended, Operation::Add, Width::X64, vec![x(0), x(1), w(2), Operand::Extend(ExtendKind::Sxtw, 2)])]
    #[case(ShapeKind::AddSubCarry, Operation::Sbcs, Width::W32, vec![w(0), w(1), w(2)])]
    #[case(ShapeKind::ConditionalCompareRegister, Operation::Ccmp, Width::X64, vec![x(1), x(2), imm(4), Condition::Ne.into()])]
    #[case(ShapeKind::ConditionalCompareImmediate, Operation::Ccmn, Width::W32, vec![w(1), imm(5), imm(2), Condition::Lt.into()])]
    #[case(ShapeKind::ConditionalSelect, Operation::Csneg, Width::X64, vec![x(0), x(1), x(2), Condition::Gt.into()])]
    #[case(ShapeKind::DataProcessing1Source, Operation::Clz, Width::W32, vec![w(0), w(1)])]
    #[case(ShapeKind::DataProcessing1Source, Operation::Rev32, Width::X64, vec![x(0), x(1)])]
    #[case(ShapeKind::DataProcessing2Source, Operation::Lsrv, Width::X64, vec![x(0), x(1), x(2)])]
    #[case(ShapeKind::DataProcessing2Source, Operation::Udiv, Width::W32, vec![w(0), w(1), w(2)])]
    #[case(ShapeKind::DataProcessing3Source, Operation::Umaddl, Width::X64, vec![x(0), w(1), w(2), x(3)])]
    #[case(ShapeKind::DataProcessing3Source, Operation::Smulh, Width::X64, vec![x(0), x(1), x(2)])]
    #[case(ShapeKind::DataProcessing3Source, Operation::Msub, Width::W32, vec![w(0), w(1), w(2), w(3)])]
    fn built_instructions_decode_back(
        #[case] kind: ShapeKind,
        #[case] operation: Operation,
        #[case] width: Width,
        #[case] operands: Vec<Operand>,
    ) {
        let instruction = build(operation, width, &operands).expect("builds");
        assert_eq!(instruction.kind(), kind);
        assert_eq!(instruction.operation(), operation);
        let word = instruction.encode().expect("encodes");
        assert_eq!(decode(word), Ok(instruction), "{word:#010x}");
    }

    #[test]
    fn mixed_widths_are_rejected() {
        let result = build(
            Operation::Add,
            Width::X64,
            &[Register::X(0).into(), Register::W(1).into(), Register::X(2).into()],
        );
        assert_eq!(
            result,
            Err(BuildError::MixedWidth {
                width: Width::X64,
                register: Register::W(1)
            })
        );
    }

    #[test]
    fn logical_immediates_must_be_bitmasks() {
        let ok = build(
            Operation::And,
            Width::X64,
            &[Register::X(0).into(), Register::X(1).into(), Operand::Immediate(0xFF)],
        );
        assert_eq!(ok.map(|i| i.operation()), Ok(Operation::And));
        let bad = build(
            Operation::And,
            Width::X64,
            &[Register::X(0).into(), Register::X(1).into(), Operand::Immediate(0x1234)],
        );
        assert_eq!(
            bad,
            Err(BuildError::UnencodableImmediate {
                operation: Operation::And,
                value: 0x1234
            })
        );
    }

    #[test]
    fn misaligned_scaled_offsets_are_rejected() {
        let result = build(
            Operation::Ldr,
            Width::X64,
            &[Register::X(0).into(), Operand::memory(Register::X(1), 12)],
        );
        assert_eq!(
            result,
            Err(BuildError::MisalignedOffset {
                operation: Operation::Ldr,
                offset: 12,
                scale: 8
            })
        );
    }

    #[test]
    fn negative_offsets_fall_back_to_unscaled() {
        let instruction = build(
            Operation::Ldr,
            Width::X64,
            &[Register::X(0).into(), Operand::memory(Register::X(1), -8)],
        )
        .expect("LDUR builds");
        assert_eq!(instruction.operation(), Operation::Ldur);
        assert_eq!(instruction.encode(), Ok(0xF85F_8020));
    }

    #[test]
    fn pair_pre_index_round_trips() {
        // STP x29, x30, [sp, #-16]!
        let instruction = build(
            Operation::Stp,
            Width::X64,
            &[
                Register::X(29).into(),
                Register::X(30).into(),
                Operand::Memory {
                    base: Register::Sp,
                    offset: MemoryOffset::Immediate(-16),
                    mode: IndexMode::PreIndex,
                },
            ],
        )
        .expect("STP builds");
        assert_eq!(instruction.encode(), Ok(0xA9BF_7BFD));
    }

    #[test]
    fn mov_picks_the_cheapest_form() {
        assert_eq!(word(mov(Register::X(0), Operand::Immediate(5))), 0xD280_00A0);
        assert_eq!(word(mov(Register::X(0), Register::X(1).into())), 0xAA01_03E0);
        let movn = mov(Register::X(0), Operand::Immediate(-1)).expect("MOVN builds");
        assert_eq!(movn.operation(), Operation::Movn);
        let sp = mov(Register::Sp, Register::X(1).into()).expect("ADD builds");
        assert_eq!(sp.operation(), Operation::Add);
        assert_eq!(sp.display_mnemonic(), "MOV");
    }

    #[test]
    fn convenience_builders_produce_aliases() {
        let cases = [
            (cmp(Register::X(0), Register::X(1).into()), "CMP"),
            (cmn(Register::X(0), Operand::Immediate(1)), "CMN"),
            (tst(Register::X(0), Operand::Immediate(1)), "TST"),
            (neg(Register::X(0), Register::X(1)), "NEG"),
            (mvn(Register::X(0), Register::X(1)), "MVN"),
            (mul(Register::X(0), Register::X(1), Register::X(2)), "MUL"),
            (lsl(Register::X(0), Register::X(1), Operand::Immediate(3)), "LSL"),
            (lsr(Register::X(0), Register::X(1), Operand::Immediate(3)), "LSR"),
            (asr(Register::X(0), Register::X(1), Register::X(2).into()), "ASR"),
            (cset(Register::W(0), Condition::Eq), "CSET"),
            (ret(), "RET"),
        ];
        for (instruction, mnemonic) in cases {
            let instruction = instruction.expect("builds");
            assert_eq!(instruction.display_mnemonic(), mnemonic);
            let word = instruction.encode().expect("encodes");
            assert_eq!(decode(word), Ok(instruction), "{mnemonic} round trips");
        }
    }

    #[test]
    fn lsl_immediate_matches_ubfm_encoding() {
        // LSL x0, x1, #3 == UBFM x0, x1, #61, #60
        assert_eq!(
            word(lsl(Register::X(0), Register::X(1), Operand::Immediate(3))),
            0xD37D_F020
        );
    }

    #[test]
    fn deferred_instructions_resolve_symbols() {
        let linkable = build_linkable(
            Operation::B,
            Width::X64,
            vec![LinkOperand::Symbol("loop".into())],
        )
        .expect("shape is valid");
        let Linkable::Deferred(deferred) = linkable else {
            panic!("symbolic operand must defer");
        };
        assert_eq!(deferred.symbols().into_iter().collect::<Vec<_>>(), vec!["loop"]);
        assert_eq!(
            deferred.resolve(|_| None),
            Err(BuildError::UnresolvedSymbol("loop".into()))
        );
        let instruction = deferred.resolve(|_| Some(-8)).expect("resolves");
        assert_eq!(instruction.encode(), Ok(0x17FF_FFFE));
    }

    #[test]
    fn concrete_operands_are_ready() {
        let linkable = build_linkable(Operation::Nop, Width::X64, vec![]).expect("NOP builds");
        assert!(matches!(linkable, Linkable::Ready(i) if i.operation() == Operation::Nop));
    }
}
