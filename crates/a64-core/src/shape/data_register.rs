//! Data processing (register): bits 27:25 = `101`.
//!
//! Resolution uses `op1` (bit 28), `op2` (bits 24:21) and, for the
//! add-with-carry group, `op3` (bits 15:10):
//!
//! | op1 | op2    | shape                                  |
//! |-----|--------|----------------------------------------|
//! | 0   | `0xxx` | logical (shifted register)             |
//! | 0   | `1xx0` | add/subtract (shifted register)        |
//! | 0   | `1xx1` | add/subtract (extended register)       |
//! | 1   | `0000` | add/subtract with carry                |
//! | 1   | `0010` | conditional compare (register/imm)     |
//! | 1   | `0100` | conditional select                     |
//! | 1   | `0110` | data processing, one or two sources    |
//! | 1   | `1xxx` | data processing, three sources         |

#![allow(missing_docs)]

use crate::bits;
use crate::condition::Condition;
use crate::error::DecodeError;
use crate::field::{layout, FieldDescriptor, Layout, CONDITION, EXTEND, FLAG, SHIFT, UNSIGNED};
use crate::flags::ConditionFlags;
use crate::operand::{ExtendKind, ShiftKind};
use crate::operation::Operation;
use crate::register::{IndexContext, Register, Width};
use crate::shape::{shape_family, Family, OpcodeEntry, ShapeKind, Terminal};

/// Type resolution inside the family.
///
/// # Errors
///
/// [`DecodeError::Unsupported`] for flag manipulation (`RMIF`, `SETF*`),
/// [`DecodeError::Unrecognized`] for unallocated `op2` values.
pub fn resolve(word: u32) -> Result<ShapeKind, DecodeError> {
    let op2 = bits::extract(word, 21, 25);
    if !bits::bit(word, 28) {
        return Ok(if op2 & 0b1000 == 0 {
            ShapeKind::LogicalShifted
        } else if op2 & 0b0001 == 0 {
            ShapeKind::AddSubShifted
        } else {
            ShapeKind::AddSubExtended
        });
    }
    let op3 = bits::extract(word, 10, 16);
    match op2 {
        0b0000 => match op3 {
            0 => Ok(ShapeKind::AddSubCarry),
            _ if op3 & 0b01_1111 == 0b00_0001 || op3 & 0b00_1111 == 0b00_0010 => {
                Err(DecodeError::Unsupported {
                    word,
                    family: Family::DataRegister,
                })
            }
            _ => Err(DecodeError::Unrecognized { word }),
        },
        0b0010 if bits::bit(word, 11) => Ok(ShapeKind::ConditionalCompareImmediate),
        0b0010 => Ok(ShapeKind::ConditionalCompareRegister),
        0b0100 => Ok(ShapeKind::ConditionalSelect),
        0b0110 if bits::bit(word, 30) => Ok(ShapeKind::DataProcessing1Source),
        0b0110 => Ok(ShapeKind::DataProcessing2Source),
        _ if op2 & 0b1000 != 0 => Ok(ShapeKind::DataProcessing3Source),
        _ => Err(DecodeError::Unrecognized { word }),
    }
}

layout! {
    /// Family selector shared by every shape below.
    pub struct DataRegisterRoot {
        op0: u32 = FieldDescriptor::enforced("op0", 25, 28, 0b101, UNSIGNED);
    }
}

layout! {
    /// `sf`, `Rn` and `Rd` shared by most register shapes.
    pub struct RegisterOperands {
        @parent root: DataRegisterRoot = DataRegisterRoot::default();
        sf: bool = FieldDescriptor::new("sf", 31, 32, FLAG);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        rd: u32 = FieldDescriptor::new("Rd", 0, 5, UNSIGNED);
    }
}

impl RegisterOperands {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.sf.raw() != 0)
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        Register::from_field(self.rd.raw(), self.width(), IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(self.rn.raw(), self.width(), IndexContext::ZeroRegister)
    }

    const fn zr(&self, field: &FieldDescriptor<u32>) -> Register {
        Register::from_field(field.raw(), self.width(), IndexContext::ZeroRegister)
    }
}

layout! {
    /// `AND`, `BIC`, `ORR`, `ORN`, `EOR`, `EON`, `ANDS`, `BICS` with a shifted
    /// second operand.
    pub struct LogicalShifted {
        @parent operands: RegisterOperands = RegisterOperands::default();
        opc: u32 = FieldDescriptor::new("opc", 29, 31, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 0, UNSIGNED);
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 0, UNSIGNED);
        shift: ShiftKind = FieldDescriptor::new("shift", 22, 24, SHIFT);
        n: u32 = FieldDescriptor::new("N", 21, 22, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        imm6: u32 = FieldDescriptor::new("imm6", 10, 16, UNSIGNED);
    }
}

impl LogicalShifted {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.zr(&self.rm)
    }

    #[must_use]
    pub fn shift(&self) -> Option<ShiftKind> {
        self.shift.value()
    }

    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.imm6.raw()
    }
}

impl Terminal for LogicalShifted {
    const KIND: ShapeKind = ShapeKind::LogicalShifted;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b000, Operation::And),
        OpcodeEntry::any(0b001, Operation::Bic),
        OpcodeEntry::any(0b010, Operation::Orr),
        OpcodeEntry::any(0b011, Operation::Orn),
        OpcodeEntry::any(0b100, Operation::Eor),
        OpcodeEntry::any(0b101, Operation::Eon),
        OpcodeEntry::any(0b110, Operation::Ands),
        OpcodeEntry::any(0b111, Operation::Bics),
    ];

    fn opcode_key(&self) -> u32 {
        (self.opc.raw() << 1) | self.n.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key >> 1);
        self.n.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.width() == Width::W32 && self.amount() >= 32
    }
}

layout! {
    /// `ADD`, `ADDS`, `SUB`, `SUBS` with a shifted second operand.
    pub struct AddSubShifted {
        @parent operands: RegisterOperands = RegisterOperands::default();
        op: u32 = FieldDescriptor::new("op", 30, 31, UNSIGNED);
        s: u32 = FieldDescriptor::new("S", 29, 30, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 0, UNSIGNED);
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 1, UNSIGNED);
        shift: ShiftKind = FieldDescriptor::new("shift", 22, 24, SHIFT);
        bit21: u32 = FieldDescriptor::enforced("bit21", 21, 22, 0, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        imm6: u32 = FieldDescriptor::new("imm6", 10, 16, UNSIGNED);
    }
}

impl AddSubShifted {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn sets_flags(&self) -> bool {
        self.s.raw() != 0
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.zr(&self.rm)
    }

    #[must_use]
    pub fn shift(&self) -> Option<ShiftKind> {
        self.shift.value()
    }

    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.imm6.raw()
    }
}

impl Terminal for AddSubShifted {
    const KIND: ShapeKind = ShapeKind::AddSubShifted;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00, Operation::Add),
        OpcodeEntry::any(0b01, Operation::Adds),
        OpcodeEntry::any(0b10, Operation::Sub),
        OpcodeEntry::any(0b11, Operation::Subs),
    ];

    fn opcode_key(&self) -> u32 {
        (self.op.raw() << 1) | self.s.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key >> 1);
        self.s.set_raw(key);
    }

    // ROR is not an add/subtract shift.
    fn is_reserved(&self) -> bool {
        self.shift.raw() == 0b11 || (self.width() == Width::W32 && self.amount() >= 32)
    }
}

layout! {
    /// `ADD`, `ADDS`, `SUB`, `SUBS` with an extended, optionally shifted,
    /// second operand. The only register form that accepts `SP`.
    pub struct AddSubExtended {
        @parent operands: RegisterOperands = RegisterOperands::default();
        op: u32 = FieldDescriptor::new("op", 30, 31, UNSIGNED);
        s: u32 = FieldDescriptor::new("S", 29, 30, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 0, UNSIGNED);
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 1, UNSIGNED);
        opt: u32 = FieldDescriptor::enforced("opt", 22, 24, 0b00, UNSIGNED);
        bit21: u32 = FieldDescriptor::enforced("bit21", 21, 22, 1, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        option: ExtendKind = FieldDescriptor::new("option", 13, 16, EXTEND);
        imm3: u32 = FieldDescriptor::new("imm3", 10, 13, UNSIGNED);
    }
}

impl AddSubExtended {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn sets_flags(&self) -> bool {
        self.s.raw() != 0
    }

    /// Destination: `SP` unless flags are set.
    #[must_use]
    pub const fn rd(&self) -> Register {
        let context = if self.sets_flags() {
            IndexContext::ZeroRegister
        } else {
            IndexContext::StackPointer
        };
        Register::from_field(self.operands.rd.raw(), self.width(), context)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(
            self.operands.rn.raw(),
            self.width(),
            IndexContext::StackPointer,
        )
    }

    /// Second source: `X` only for the doubleword extends of a 64-bit
    /// operation.
    #[must_use]
    pub const fn rm(&self) -> Register {
        let doubleword = self.option.raw() & 0b011 == 0b011;
        let width = match self.width() {
            Width::X64 if doubleword => Width::X64,
            _ => Width::W32,
        };
        Register::from_field(self.rm.raw(), width, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub fn extend(&self) -> Option<ExtendKind> {
        self.option.value()
    }

    /// Left shift after extension, 0 to 4.
    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.imm3.raw()
    }
}

impl Terminal for AddSubExtended {
    const KIND: ShapeKind = ShapeKind::AddSubExtended;
    const OPCODES: &'static [OpcodeEntry] = AddSubShifted::OPCODES;

    fn opcode_key(&self) -> u32 {
        (self.op.raw() << 1) | self.s.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key >> 1);
        self.s.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.amount() > 4
    }
}

layout! {
    /// `ADC`, `ADCS`, `SBC`, `SBCS`.
    pub struct AddSubCarry {
        @parent operands: RegisterOperands = RegisterOperands::default();
        op: u32 = FieldDescriptor::new("op", 30, 31, UNSIGNED);
        s: u32 = FieldDescriptor::new("S", 29, 30, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 21, 25, 0b0000, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        op3: u32 = FieldDescriptor::enforced("op3", 10, 16, 0, UNSIGNED);
    }
}

impl AddSubCarry {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn sets_flags(&self) -> bool {
        self.s.raw() != 0
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.zr(&self.rm)
    }
}

impl Terminal for AddSubCarry {
    const KIND: ShapeKind = ShapeKind::AddSubCarry;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00, Operation::Adc),
        OpcodeEntry::any(0b01, Operation::Adcs),
        OpcodeEntry::any(0b10, Operation::Sbc),
        OpcodeEntry::any(0b11, Operation::Sbcs),
    ];

    fn opcode_key(&self) -> u32 {
        (self.op.raw() << 1) | self.s.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key >> 1);
        self.s.set_raw(key);
    }
}

layout! {
    /// Fields common to both conditional compare forms. `Rd` is replaced by
    /// the `nzcv` fallback value.
    pub struct ConditionalCompare {
        @parent root: DataRegisterRoot = DataRegisterRoot::default();
        sf: bool = FieldDescriptor::new("sf", 31, 32, FLAG);
        op: u32 = FieldDescriptor::new("op", 30, 31, UNSIGNED);
        s: u32 = FieldDescriptor::enforced("S", 29, 30, 1, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 21, 25, 0b0010, UNSIGNED);
        cond: Condition = FieldDescriptor::new("cond", 12, 16, CONDITION);
        o2: u32 = FieldDescriptor::enforced("o2", 10, 11, 0, UNSIGNED);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        o3: u32 = FieldDescriptor::enforced("o3", 4, 5, 0, UNSIGNED);
        nzcv: u32 = FieldDescriptor::new("nzcv", 0, 4, UNSIGNED);
    }
}

impl ConditionalCompare {
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Ccmn),
        OpcodeEntry::any(1, Operation::Ccmp),
    ];

    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.sf.raw() != 0)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(self.rn.raw(), self.width(), IndexContext::ZeroRegister)
    }

    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        self.cond.value()
    }

    /// Flags written when the condition fails.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn fallback_flags(&self) -> ConditionFlags {
        ConditionFlags::from_nzcv((self.nzcv.raw() & 0xF) as u8)
    }
}

layout! {
    /// `CCMN`/`CCMP` against a register.
    pub struct ConditionalCompareRegister {
        @parent compare: ConditionalCompare = ConditionalCompare::default();
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        bit11: u32 = FieldDescriptor::enforced("bit11", 11, 12, 0, UNSIGNED);
    }
}

impl ConditionalCompareRegister {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.compare.width()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        Register::from_field(self.rm.raw(), self.width(), IndexContext::ZeroRegister)
    }
}

impl Terminal for ConditionalCompareRegister {
    const KIND: ShapeKind = ShapeKind::ConditionalCompareRegister;
    const OPCODES: &'static [OpcodeEntry] = ConditionalCompare::OPCODES;

    fn opcode_key(&self) -> u32 {
        self.compare.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.compare.op.set_raw(key);
    }
}

layout! {
    /// `CCMN`/`CCMP` against a 5-bit unsigned immediate.
    pub struct ConditionalCompareImmediate {
        @parent compare: ConditionalCompare = ConditionalCompare::default();
        imm5: u32 = FieldDescriptor::new("imm5", 16, 21, UNSIGNED);
        bit11: u32 = FieldDescriptor::enforced("bit11", 11, 12, 1, UNSIGNED);
    }
}

impl ConditionalCompareImmediate {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.compare.width()
    }

    #[must_use]
    pub const fn immediate(&self) -> u32 {
        self.imm5.raw()
    }
}

impl Terminal for ConditionalCompareImmediate {
    const KIND: ShapeKind = ShapeKind::ConditionalCompareImmediate;
    const OPCODES: &'static [OpcodeEntry] = ConditionalCompare::OPCODES;

    fn opcode_key(&self) -> u32 {
        self.compare.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.compare.op.set_raw(key);
    }
}

layout! {
    /// `CSEL`, `CSINC`, `CSINV`, `CSNEG`.
    pub struct ConditionalSelect {
        @parent operands: RegisterOperands = RegisterOperands::default();
        op: u32 = FieldDescriptor::new("op", 30, 31, UNSIGNED);
        s: u32 = FieldDescriptor::enforced("S", 29, 30, 0, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 21, 25, 0b0100, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        cond: Condition = FieldDescriptor::new("cond", 12, 16, CONDITION);
        op2_low: u32 = FieldDescriptor::new("op2", 10, 12, UNSIGNED);
    }
}

impl ConditionalSelect {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.zr(&self.rm)
    }

    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        self.cond.value()
    }
}

impl Terminal for ConditionalSelect {
    const KIND: ShapeKind = ShapeKind::ConditionalSelect;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b000, Operation::Csel),
        OpcodeEntry::any(0b001, Operation::Csinc),
        OpcodeEntry::any(0b100, Operation::Csinv),
        OpcodeEntry::any(0b101, Operation::Csneg),
    ];

    fn opcode_key(&self) -> u32 {
        (self.op.raw() << 2) | self.op2_low.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key >> 2);
        self.op2_low.set_raw(key);
    }
}

layout! {
    /// `RBIT`, `REV16`, `REV32`, `REV`, `CLZ`, `CLS`.
    pub struct DataProcessing1Source {
        @parent operands: RegisterOperands = RegisterOperands::default();
        bit30: u32 = FieldDescriptor::enforced("bit30", 30, 31, 1, UNSIGNED);
        s: u32 = FieldDescriptor::enforced("S", 29, 30, 0, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 21, 25, 0b0110, UNSIGNED);
        opcode2: u32 = FieldDescriptor::enforced("opcode2", 16, 21, 0, UNSIGNED);
        opcode: u32 = FieldDescriptor::new("opcode", 10, 16, UNSIGNED);
    }
}

impl DataProcessing1Source {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }
}

impl Terminal for DataProcessing1Source {
    const KIND: ShapeKind = ShapeKind::DataProcessing1Source;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00_0000, Operation::Rbit),
        OpcodeEntry::any(0b00_0001, Operation::Rev16),
        OpcodeEntry::sized(0b00_0010, Operation::Rev, Width::W32),
        OpcodeEntry::sized(0b00_0010, Operation::Rev32, Width::X64),
        OpcodeEntry::sized(0b00_0011, Operation::Rev, Width::X64),
        OpcodeEntry::any(0b00_0100, Operation::Clz),
        OpcodeEntry::any(0b00_0101, Operation::Cls),
    ];

    fn opcode_key(&self) -> u32 {
        self.opcode.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opcode.set_raw(key);
    }

    fn opcode_width(&self) -> Option<Width> {
        Some(self.width())
    }

    // Pointer authentication (opcode2 = 00001).
    fn is_unsupported(&self) -> bool {
        self.opcode2.raw() == 0b0_0001
            && self.bit30.confirms()
            && self.s.confirms()
            && self.op2.confirms()
    }
}

layout! {
    /// `UDIV`, `SDIV`, `LSLV`, `LSRV`, `ASRV`, `RORV`.
    pub struct DataProcessing2Source {
        @parent operands: RegisterOperands = RegisterOperands::default();
        bit30: u32 = FieldDescriptor::enforced("bit30", 30, 31, 0, UNSIGNED);
        s: u32 = FieldDescriptor::enforced("S", 29, 30, 0, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 21, 25, 0b0110, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        opcode: u32 = FieldDescriptor::new("opcode", 10, 16, UNSIGNED);
    }
}

impl DataProcessing2Source {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands.rn()
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.zr(&self.rm)
    }
}

impl Terminal for DataProcessing2Source {
    const KIND: ShapeKind = ShapeKind::DataProcessing2Source;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00_0010, Operation::Udiv),
        OpcodeEntry::any(0b00_0011, Operation::Sdiv),
        OpcodeEntry::any(0b00_1000, Operation::Lslv),
        OpcodeEntry::any(0b00_1001, Operation::Lsrv),
        OpcodeEntry::any(0b00_1010, Operation::Asrv),
        OpcodeEntry::any(0b00_1011, Operation::Rorv),
    ];

    fn opcode_key(&self) -> u32 {
        self.opcode.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opcode.set_raw(key);
    }

    // SUBP, IRG, GMI, PACGA and the CRC32 group.
    fn is_unsupported(&self) -> bool {
        self.confirms()
            && matches!(
                self.opcode.raw(),
                0b00_0000 | 0b00_0100 | 0b00_0101 | 0b00_1100 | 0b01_0000..=0b01_0111
            )
    }
}

layout! {
    /// Multiply-add family: `MADD`, `MSUB` and the widening or high-half
    /// signed and unsigned variants.
    pub struct DataProcessing3Source {
        @parent operands: RegisterOperands = RegisterOperands::default();
        op54: u32 = FieldDescriptor::new("op54", 29, 31, UNSIGNED);
        bit28: u32 = FieldDescriptor::enforced("bit28", 28, 29, 1, UNSIGNED);
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 1, UNSIGNED);
        op31: u32 = FieldDescriptor::new("op31", 21, 24, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        o0: u32 = FieldDescriptor::new("o0", 15, 16, UNSIGNED);
        ra: u32 = FieldDescriptor::new("Ra", 10, 15, UNSIGNED);
    }
}

impl DataProcessing3Source {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    /// Whether the sources are 32-bit halves widened to a 64-bit result
    /// (`SMADDL`, `SMSUBL`, `UMADDL`, `UMSUBL`).
    #[must_use]
    pub const fn is_widening(&self) -> bool {
        matches!(self.op31.raw(), 0b001 | 0b101)
    }

    const fn source_width(&self) -> Width {
        if self.is_widening() {
            Width::W32
        } else {
            self.width()
        }
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands.rd()
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(
            self.operands.rn.raw(),
            self.source_width(),
            IndexContext::ZeroRegister,
        )
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        Register::from_field(self.rm.raw(), self.source_width(), IndexContext::ZeroRegister)
    }

    /// Addend; always at the destination width.
    #[must_use]
    pub const fn ra(&self) -> Register {
        self.operands.zr(&self.ra)
    }
}

impl Terminal for DataProcessing3Source {
    const KIND: ShapeKind = ShapeKind::DataProcessing3Source;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0x0, Operation::Madd),
        OpcodeEntry::any(0x1, Operation::Msub),
        OpcodeEntry::sized(0x2, Operation::Smaddl, Width::X64),
        OpcodeEntry::sized(0x3, Operation::Smsubl, Width::X64),
        OpcodeEntry::sized(0x4, Operation::Smulh, Width::X64),
        OpcodeEntry::sized(0xA, Operation::Umaddl, Width::X64),
        OpcodeEntry::sized(0xB, Operation::Umsubl, Width::X64),
        OpcodeEntry::sized(0xC, Operation::Umulh, Width::X64),
    ];

    fn opcode_key(&self) -> u32 {
        (self.op54.raw() << 4) | (self.op31.raw() << 1) | self.o0.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op54.set_raw(key >> 4);
        self.op31.set_raw(key >> 1);
        self.o0.set_raw(key);
    }

    fn opcode_width(&self) -> Option<Width> {
        Some(self.width())
    }
}

shape_family! {
    /// Data-processing (register) shapes.
    pub enum DataRegisterShape in DataRegister {
        LogicalShifted,
        AddSubShifted,
        AddSubExtended,
        AddSubCarry,
        ConditionalCompareRegister,
        ConditionalCompareImmediate,
        ConditionalSelect,
        DataProcessing1Source,
        DataProcessing2Source,
        DataProcessing3Source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::instantiate;
    use rstest::rstest;

    #[rstest]
    #[case(0xAA01_03E0, ShapeKind::LogicalShifted)]
    #[case(0x8B00_0000, ShapeKind::AddSubShifted)]
    #[case(0x8B22_43E0, ShapeKind::AddSubExtended)]
    #[case(0x9A02_0020, ShapeKind::AddSubCarry)]
    #[case(0xFA42_0020, ShapeKind::ConditionalCompareRegister)]
    #[case(0xFA45_0820, ShapeKind::ConditionalCompareImmediate)]
    #[case(0x9A82_1020, ShapeKind::ConditionalSelect)]
    #[case(0xDAC0_0020, ShapeKind::DataProcessing1Source)]
    #[case(0x9AC2_0820, ShapeKind::DataProcessing2Source)]
    #[case(0x9B02_0C20, ShapeKind::DataProcessing3Source)]
    fn windows_select_shapes(#[case] word: u32, #[case] expected: ShapeKind) {
        assert_eq!(resolve(word), Ok(expected));
    }

    #[test]
    fn add_shifted_rejects_rotate() {
        // ADD x0, x0, x0, ROR #0
        let word = 0x8BC0_0000;
        assert_eq!(
            instantiate::<AddSubShifted>(word).map(|(op, _)| op),
            Err(DecodeError::Unrecognized { word })
        );
    }

    #[test]
    fn extended_form_reads_sp_and_narrow_index() {
        // ADD x0, sp, w2, UXTW #2
        let (operation, shape) = instantiate::<AddSubExtended>(0x8B22_4BE0).expect("ADD ext");
        assert_eq!(operation, Operation::Add);
        assert_eq!(shape.rd(), Register::X(0));
        assert_eq!(shape.rn(), Register::Sp);
        assert_eq!(shape.rm(), Register::W(2));
        assert_eq!(shape.extend(), Some(ExtendKind::Uxtw));
        assert_eq!(shape.amount(), 2);
    }

    #[test]
    fn widening_multiplies_read_w_sources() {
        // SMADDL x0, w1, w2, x3
        let (operation, shape) = instantiate::<DataProcessing3Source>(0x9B22_0C20).expect("SMADDL");
        assert_eq!(operation, Operation::Smaddl);
        assert_eq!(shape.rn(), Register::W(1));
        assert_eq!(shape.rm(), Register::W(2));
        assert_eq!(shape.ra(), Register::X(3));
        assert_eq!(shape.rd(), Register::X(0));
    }

    #[test]
    fn rev_depends_on_width() {
        // REV w0, w1 / REV32 x0, x1 / REV x0, x1
        assert_eq!(instantiate::<DataProcessing1Source>(0x5AC0_0820).map(|(op, _)| op), Ok(Operation::Rev));
        assert_eq!(instantiate::<DataProcessing1Source>(0xDAC0_0820).map(|(op, _)| op), Ok(Operation::Rev32));
        assert_eq!(instantiate::<DataProcessing1Source>(0xDAC0_0C20).map(|(op, _)| op), Ok(Operation::Rev));
        assert!(instantiate::<DataProcessing1Source>(0x5AC0_0C20).is_err());
    }

    #[test]
    fn crc32_is_unsupported() {
        // CRC32B w0, w1, w2
        assert!(instantiate::<DataProcessing2Source>(0x1AC2_4020).is_err_and(|error| error.is_unsupported()));
    }

    #[test]
    fn conditional_compare_exposes_fallback_flags() {
        // CCMP x1, #5, #0b0100, NE
        let (operation, shape) = instantiate::<ConditionalCompareImmediate>(0xFA45_1824).expect("CCMP");
        assert_eq!(operation, Operation::Ccmp);
        assert_eq!(shape.immediate(), 5);
        assert_eq!(shape.compare.condition(), Some(Condition::Ne));
        assert_eq!(shape.compare.fallback_flags(), ConditionFlags::from_nzcv(0b0100));
    }
}
