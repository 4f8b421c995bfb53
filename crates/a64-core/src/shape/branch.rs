//! Branches, exception generation and system instructions: bits 28:26 = `101`.
//!
//! Type resolution keys on `op0` (bits 31:29) first and then on the class
//! bits of the `110` group. Windows are tried in the order listed in
//! [`resolve`]; the first match wins.

#![allow(missing_docs)]

use std::fmt;

use crate::bits;
use crate::condition::Condition;
use crate::error::DecodeError;
use crate::field::{layout, FieldDescriptor, CONDITION, FLAG, UNSIGNED, WORD_OFFSET};
use crate::operation::Operation;
use crate::register::{IndexContext, Register, Width};
use crate::shape::{shape_family, Family, OpcodeEntry, ShapeKind, Terminal};

const HINT_CLASS: u32 = 0x032;
const BARRIER_CLASS: u32 = 0x033;

/// Type resolution inside the family.
///
/// # Errors
///
/// [`DecodeError::Unsupported`] for `PSTATE` writes and `SYS`/`SYSL`,
/// [`DecodeError::Unrecognized`] for unallocated windows.
pub fn resolve(word: u32) -> Result<ShapeKind, DecodeError> {
    let op0 = bits::extract(word, 29, 32);
    match op0 {
        0b010 if !bits::bit(word, 25) => Ok(ShapeKind::ConditionalBranch),
        0b110 => {
            if bits::extract(word, 24, 26) == 0b00 {
                Ok(ShapeKind::ExceptionGeneration)
            } else if bits::extract(word, 22, 26) == 0b0100 {
                resolve_system(word)
            } else if bits::bit(word, 25) {
                Ok(ShapeKind::BranchRegister)
            } else {
                Err(DecodeError::Unrecognized { word })
            }
        }
        _ => match bits::extract(word, 29, 31) {
            0b00 => Ok(ShapeKind::UnconditionalImmediate),
            0b01 if bits::bit(word, 25) => Ok(ShapeKind::TestBranch),
            0b01 => Ok(ShapeKind::CompareBranch),
            _ => Err(DecodeError::Unrecognized { word }),
        },
    }
}

fn resolve_system(word: u32) -> Result<ShapeKind, DecodeError> {
    let class = bits::extract(word, 12, 22);
    let rt_is_zero = bits::extract(word, 0, 5) == 0b11111;
    let unsupported = DecodeError::Unsupported {
        word,
        family: Family::BranchSystem,
    };
    match class {
        HINT_CLASS if rt_is_zero => Ok(ShapeKind::Hint),
        BARRIER_CLASS if rt_is_zero => Ok(ShapeKind::Barrier),
        _ => {
            let l = bits::bit(word, 21);
            let op0 = bits::extract(word, 19, 21);
            let crn = bits::extract(word, 12, 16);
            let pstate = !l && op0 == 0b00 && crn == 0b0100;
            if pstate || op0 == 0b01 {
                Err(unsupported)
            } else if bits::bit(word, 20) {
                Ok(ShapeKind::SystemRegisterMove)
            } else {
                Err(DecodeError::Unrecognized { word })
            }
        }
    }
}

layout! {
    /// Family selector shared by every shape below.
    pub struct BranchRoot {
        op0: u32 = FieldDescriptor::enforced("op0", 26, 29, 0b101, UNSIGNED);
    }
}

layout! {
    /// Class bits shared by hints, barriers and system register moves.
    pub struct SystemRoot {
        @parent root: BranchRoot = BranchRoot::default();
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 32, 0b110, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 22, 26, 0b0100, UNSIGNED);
    }
}

layout! {
    /// `B.cond`: conditional branch with a 19-bit word offset.
    pub struct ConditionalBranch {
        @parent root: BranchRoot = BranchRoot::default();
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 32, 0b010, UNSIGNED);
        bit25: u32 = FieldDescriptor::enforced("bit25", 25, 26, 0, UNSIGNED);
        o1: u32 = FieldDescriptor::new("o1", 24, 25, UNSIGNED);
        imm19: i64 = FieldDescriptor::new("imm19", 5, 24, WORD_OFFSET);
        o0: u32 = FieldDescriptor::new("o0", 4, 5, UNSIGNED);
        cond: Condition = FieldDescriptor::new("cond", 0, 4, CONDITION);
    }
}

impl ConditionalBranch {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    /// Byte offset from the branch.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm19.value().unwrap_or_default()
    }

    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        self.cond.value()
    }

    fn confirms_class(&self) -> bool {
        self.prefix.confirms() && self.bit25.confirms()
    }
}

impl Terminal for ConditionalBranch {
    const KIND: ShapeKind = ShapeKind::ConditionalBranch;
    const OPCODES: &'static [OpcodeEntry] = &[OpcodeEntry::any(0b00, Operation::BCond)];

    fn opcode_key(&self) -> u32 {
        (self.o1.raw() << 1) | self.o0.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.o1.set_raw(key >> 1);
        self.o0.set_raw(key);
    }

    // BC.cond (FEAT_HBC).
    fn is_unsupported(&self) -> bool {
        self.confirms_class() && self.opcode_key() == 0b01
    }
}

layout! {
    /// `SVC`, `HVC`, `SMC`, `BRK` and `HLT` with a 16-bit payload.
    pub struct ExceptionGeneration {
        @parent root: BranchRoot = BranchRoot::default();
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 32, 0b110, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 24, 26, 0b00, UNSIGNED);
        opc: u32 = FieldDescriptor::new("opc", 21, 24, UNSIGNED);
        imm16: u32 = FieldDescriptor::new("imm16", 5, 21, UNSIGNED);
        op2: u32 = FieldDescriptor::new("op2", 2, 5, UNSIGNED);
        ll: u32 = FieldDescriptor::new("LL", 0, 2, UNSIGNED);
    }
}

impl ExceptionGeneration {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn payload(&self) -> u16 {
        (self.imm16.raw() & 0xFFFF) as u16
    }
}

impl Terminal for ExceptionGeneration {
    const KIND: ShapeKind = ShapeKind::ExceptionGeneration;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0x01, Operation::Svc),
        OpcodeEntry::any(0x02, Operation::Hvc),
        OpcodeEntry::any(0x03, Operation::Smc),
        OpcodeEntry::any(0x20, Operation::Brk),
        OpcodeEntry::any(0x40, Operation::Hlt),
    ];

    fn opcode_key(&self) -> u32 {
        (self.opc.raw() << 5) | (self.op2.raw() << 2) | self.ll.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key >> 5);
        self.op2.set_raw(key >> 2);
        self.ll.set_raw(key);
    }

    // DCPS1..DCPS3.
    fn is_unsupported(&self) -> bool {
        self.prefix.confirms()
            && self.class.confirms()
            && matches!(self.opcode_key(), 0xA1..=0xA3)
    }
}

layout! {
    /// Hint space: `NOP`, `YIELD`, `WFE`, `WFI`, `SEV`, `SEVL` and the
    /// numbered `HINT #imm` for every other `CRm:op2`.
    pub struct Hint {
        @parent system: SystemRoot = SystemRoot::default();
        fixed: u32 = FieldDescriptor::enforced("fixed", 12, 22, HINT_CLASS, UNSIGNED);
        crm: u32 = FieldDescriptor::new("CRm", 8, 12, UNSIGNED);
        op2: u32 = FieldDescriptor::new("op2", 5, 8, UNSIGNED);
        rt: u32 = FieldDescriptor::enforced("Rt", 0, 5, 0b11111, UNSIGNED);
    }
}

impl Hint {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    /// `CRm:op2` hint number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        (self.crm.raw() << 3) | self.op2.raw()
    }
}

impl Terminal for Hint {
    const KIND: ShapeKind = ShapeKind::Hint;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Nop),
        OpcodeEntry::any(1, Operation::Yield),
        OpcodeEntry::any(2, Operation::Wfe),
        OpcodeEntry::any(3, Operation::Wfi),
        OpcodeEntry::any(4, Operation::Sev),
        OpcodeEntry::any(5, Operation::Sevl),
    ];
    const FALLBACK: Option<Operation> = Some(Operation::Hint);

    fn opcode_key(&self) -> u32 {
        self.number()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.crm.set_raw(key >> 3);
        self.op2.set_raw(key);
    }
}

layout! {
    /// `CLREX`, `DSB`, `DMB`, `ISB` and `SB`.
    pub struct Barrier {
        @parent system: SystemRoot = SystemRoot::default();
        fixed: u32 = FieldDescriptor::enforced("fixed", 12, 22, BARRIER_CLASS, UNSIGNED);
        crm: u32 = FieldDescriptor::new("CRm", 8, 12, UNSIGNED);
        op2: u32 = FieldDescriptor::new("op2", 5, 8, UNSIGNED);
        rt: u32 = FieldDescriptor::enforced("Rt", 0, 5, 0b11111, UNSIGNED);
    }
}

impl Barrier {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    /// `CRm` option (shareability domain and access types, or `CLREX` imm).
    #[must_use]
    pub const fn option(&self) -> u32 {
        self.crm.raw()
    }
}

/// Named `DMB`/`DSB` options by `CRm` value.
const BARRIER_OPTIONS: [(u32, &str); 12] = [
    (0b1111, "SY"),
    (0b1110, "ST"),
    (0b1101, "LD"),
    (0b1011, "ISH"),
    (0b1010, "ISHST"),
    (0b1001, "ISHLD"),
    (0b0111, "NSH"),
    (0b0110, "NSHST"),
    (0b0101, "NSHLD"),
    (0b0011, "OSH"),
    (0b0010, "OSHST"),
    (0b0001, "OSHLD"),
];

/// Name of a barrier option, if it has one.
#[must_use]
pub fn barrier_option_name(option: u32) -> Option<&'static str> {
    BARRIER_OPTIONS
        .iter()
        .find(|(value, _)| *value == option)
        .map(|(_, name)| *name)
}

/// `CRm` value of a named barrier option, ignoring case.
#[must_use]
pub fn barrier_option_from_name(name: &str) -> Option<u32> {
    BARRIER_OPTIONS
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(name))
        .map(|(value, _)| *value)
}

impl Terminal for Barrier {
    const KIND: ShapeKind = ShapeKind::Barrier;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b010, Operation::Clrex),
        OpcodeEntry::any(0b100, Operation::Dsb),
        OpcodeEntry::any(0b101, Operation::Dmb),
        OpcodeEntry::any(0b110, Operation::Isb),
        OpcodeEntry::any(0b111, Operation::Sb),
    ];

    fn opcode_key(&self) -> u32 {
        self.op2.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op2.set_raw(key);
    }
}

/// `op0:op1:CRn:CRm:op2` coordinates of a system register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SystemRegister {
    /// Always 2 or 3 for register moves.
    pub op0: u32,
    pub op1: u32,
    pub crn: u32,
    pub crm: u32,
    pub op2: u32,
}

impl SystemRegister {
    /// The condition flags register, the only one the engine executes.
    pub const NZCV: Self = Self {
        op0: 3,
        op1: 3,
        crn: 4,
        crm: 2,
        op2: 0,
    };

    /// Parses `NZCV` or the generic `S<op0>_<op1>_C<n>_C<m>_<op2>` form.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("nzcv") {
            return Some(Self::NZCV);
        }
        let rest = name.strip_prefix(['S', 's'])?;
        let mut parts = rest.split('_');
        let op0 = parts.next()?.parse().ok()?;
        let op1 = parts.next()?.parse().ok()?;
        let crn = parts.next()?.strip_prefix(['C', 'c'])?.parse().ok()?;
        let crm = parts.next()?.strip_prefix(['C', 'c'])?.parse().ok()?;
        let op2 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || !(2..=3).contains(&op0) || op1 > 7 || crn > 15 || crm > 15 || op2 > 7 {
            return None;
        }
        Some(Self {
            op0,
            op1,
            crn,
            crm,
            op2,
        })
    }
}

impl fmt::Display for SystemRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NZCV {
            return f.write_str("NZCV");
        }
        write!(
            f,
            "S{}_{}_C{}_C{}_{}",
            self.op0, self.op1, self.crn, self.crm, self.op2
        )
    }
}

layout! {
    /// `MRS`/`MSR` (register): move between `Xt` and a system register.
    pub struct SystemRegisterMove {
        @parent system: SystemRoot = SystemRoot::default();
        l: bool = FieldDescriptor::new("L", 21, 22, FLAG);
        op0_high: u32 = FieldDescriptor::enforced("op0<1>", 20, 21, 1, UNSIGNED);
        o0: u32 = FieldDescriptor::new("o0", 19, 20, UNSIGNED);
        op1: u32 = FieldDescriptor::new("op1", 16, 19, UNSIGNED);
        crn: u32 = FieldDescriptor::new("CRn", 12, 16, UNSIGNED);
        crm: u32 = FieldDescriptor::new("CRm", 8, 12, UNSIGNED);
        op2: u32 = FieldDescriptor::new("op2", 5, 8, UNSIGNED);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl SystemRegisterMove {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    #[must_use]
    pub const fn rt(&self) -> Register {
        Register::from_field(self.rt.raw(), Width::X64, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn system_register(&self) -> SystemRegister {
        SystemRegister {
            op0: 2 + self.o0.raw(),
            op1: self.op1.raw(),
            crn: self.crn.raw(),
            crm: self.crm.raw(),
            op2: self.op2.raw(),
        }
    }

    pub fn set_system_register(&mut self, register: SystemRegister) {
        self.o0.set_raw(register.op0);
        self.op1.set_raw(register.op1);
        self.crn.set_raw(register.crn);
        self.crm.set_raw(register.crm);
        self.op2.set_raw(register.op2);
    }
}

impl Terminal for SystemRegisterMove {
    const KIND: ShapeKind = ShapeKind::SystemRegisterMove;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Msr),
        OpcodeEntry::any(1, Operation::Mrs),
    ];

    fn opcode_key(&self) -> u32 {
        self.l.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.l.set_raw(key);
    }
}

layout! {
    /// `BR`, `BLR` and `RET` through a register.
    pub struct BranchRegister {
        @parent root: BranchRoot = BranchRoot::default();
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 32, 0b110, UNSIGNED);
        bit25: u32 = FieldDescriptor::enforced("bit25", 25, 26, 1, UNSIGNED);
        opc: u32 = FieldDescriptor::new("opc", 21, 25, UNSIGNED);
        op2: u32 = FieldDescriptor::enforced("op2", 16, 21, 0b11111, UNSIGNED);
        op3: u32 = FieldDescriptor::new("op3", 10, 16, UNSIGNED);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        op4: u32 = FieldDescriptor::new("op4", 0, 5, UNSIGNED);
    }
}

impl BranchRegister {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(self.rn.raw(), Width::X64, IndexContext::ZeroRegister)
    }
}

impl Terminal for BranchRegister {
    const KIND: ShapeKind = ShapeKind::BranchRegister;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b0000, Operation::Br),
        OpcodeEntry::any(0b0001, Operation::Blr),
        OpcodeEntry::any(0b0010, Operation::Ret),
    ];

    fn opcode_key(&self) -> u32 {
        self.opc.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key);
    }

    // Pointer authentication variants, ERET and DRPS.
    fn is_unsupported(&self) -> bool {
        self.prefix.confirms()
            && self.bit25.confirms()
            && self.op2.confirms()
            && (self.op3.raw() != 0 || matches!(self.opc.raw(), 0b0100 | 0b0101 | 0b1000 | 0b1001))
    }

    fn is_reserved(&self) -> bool {
        self.op4.raw() != 0
    }
}

layout! {
    /// `B`/`BL` with a 26-bit word offset.
    pub struct UnconditionalImmediate {
        @parent root: BranchRoot = BranchRoot::default();
        op: u32 = FieldDescriptor::new("op", 31, 32, UNSIGNED);
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 31, 0b00, UNSIGNED);
        imm26: i64 = FieldDescriptor::new("imm26", 0, 26, WORD_OFFSET);
    }
}

impl UnconditionalImmediate {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm26.value().unwrap_or_default()
    }
}

impl Terminal for UnconditionalImmediate {
    const KIND: ShapeKind = ShapeKind::UnconditionalImmediate;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::B),
        OpcodeEntry::any(1, Operation::Bl),
    ];

    fn opcode_key(&self) -> u32 {
        self.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key);
    }
}

layout! {
    /// `CBZ`/`CBNZ`: compare a register against zero and branch.
    pub struct CompareBranch {
        @parent root: BranchRoot = BranchRoot::default();
        sf: bool = FieldDescriptor::new("sf", 31, 32, FLAG);
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 31, 0b01, UNSIGNED);
        bit25: u32 = FieldDescriptor::enforced("bit25", 25, 26, 0, UNSIGNED);
        op: u32 = FieldDescriptor::new("op", 24, 25, UNSIGNED);
        imm19: i64 = FieldDescriptor::new("imm19", 5, 24, WORD_OFFSET);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl CompareBranch {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.sf.raw() != 0)
    }

    #[must_use]
    pub const fn rt(&self) -> Register {
        Register::from_field(self.rt.raw(), self.width(), IndexContext::ZeroRegister)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm19.value().unwrap_or_default()
    }
}

impl Terminal for CompareBranch {
    const KIND: ShapeKind = ShapeKind::CompareBranch;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Cbz),
        OpcodeEntry::any(1, Operation::Cbnz),
    ];

    fn opcode_key(&self) -> u32 {
        self.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key);
    }
}

layout! {
    /// `TBZ`/`TBNZ`: test one bit and branch. Bit 5 of the bit number doubles
    /// as the register width.
    pub struct TestBranch {
        @parent root: BranchRoot = BranchRoot::default();
        b5: u32 = FieldDescriptor::new("b5", 31, 32, UNSIGNED);
        prefix: u32 = FieldDescriptor::enforced("prefix", 29, 31, 0b01, UNSIGNED);
        bit25: u32 = FieldDescriptor::enforced("bit25", 25, 26, 1, UNSIGNED);
        op: u32 = FieldDescriptor::new("op", 24, 25, UNSIGNED);
        b40: u32 = FieldDescriptor::new("b40", 19, 24, UNSIGNED);
        imm14: i64 = FieldDescriptor::new("imm14", 5, 19, WORD_OFFSET);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl TestBranch {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.b5.raw() != 0)
    }

    #[must_use]
    pub const fn rt(&self) -> Register {
        Register::from_field(self.rt.raw(), self.width(), IndexContext::ZeroRegister)
    }

    /// Bit under test, `b5:b40`.
    #[must_use]
    pub const fn bit_number(&self) -> u32 {
        (self.b5.raw() << 5) | self.b40.raw()
    }

    pub fn set_bit_number(&mut self, number: u32) {
        self.b5.set_raw(number >> 5);
        self.b40.set_raw(number);
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm14.value().unwrap_or_default()
    }
}

impl Terminal for TestBranch {
    const KIND: ShapeKind = ShapeKind::TestBranch;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Tbz),
        OpcodeEntry::any(1, Operation::Tbnz),
    ];

    fn opcode_key(&self) -> u32 {
        self.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key);
    }
}

shape_family! {
    /// Branch, exception generation and system shapes.
    pub enum BranchShape in Branch {
        ConditionalBranch,
        ExceptionGeneration,
        Hint,
        Barrier,
        SystemRegisterMove,
        BranchRegister,
        UnconditionalImmediate,
        CompareBranch,
        TestBranch,
    }
}
