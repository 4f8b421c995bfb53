//! Data processing (immediate): bits 28:26 = `100`.
//!
//! Bits 25:23 select the shape:
//!
//! | 25:23 | shape                          |
//! |-------|--------------------------------|
//! | `00x` | PC-relative addressing         |
//! | `010` | add/subtract (immediate)       |
//! | `011` | add/subtract with tags (unsupported) |
//! | `100` | logical (immediate)            |
//! | `101` | move wide                      |
//! | `110` | bitfield                       |
//! | `111` | extract                        |

#![allow(missing_docs)]

use crate::bits;
use crate::error::DecodeError;
use crate::field::{layout, FieldDescriptor, FLAG, UNSIGNED};
use crate::operation::Operation;
use crate::register::{IndexContext, Register, Width};
use crate::shape::{shape_family, Family, OpcodeEntry, ShapeKind, Terminal};

/// Type resolution inside the family.
///
/// # Errors
///
/// [`DecodeError::Unsupported`] for the tagged add/subtract group.
pub fn resolve(word: u32) -> Result<ShapeKind, DecodeError> {
    match bits::extract(word, 23, 26) {
        0b000 | 0b001 => Ok(ShapeKind::PcRelative),
        0b010 => Ok(ShapeKind::AddSubImmediate),
        0b011 => Err(DecodeError::Unsupported {
            word,
            family: Family::DataImmediate,
        }),
        0b100 => Ok(ShapeKind::LogicalImmediate),
        0b101 => Ok(ShapeKind::MoveWide),
        0b110 => Ok(ShapeKind::Bitfield),
        _ => Ok(ShapeKind::Extract),
    }
}

layout! {
    /// Family selector shared by every shape below.
    pub struct DataImmediateRoot {
        op0: u32 = FieldDescriptor::enforced("op0", 26, 29, 0b100, UNSIGNED);
    }
}

layout! {
    /// `sf`, `Rn` and `Rd` shared by the register-to-register immediate shapes.
    pub struct ImmediateOperands {
        @parent root: DataImmediateRoot = DataImmediateRoot::default();
        sf: bool = FieldDescriptor::new("sf", 31, 32, FLAG);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        rd: u32 = FieldDescriptor::new("Rd", 0, 5, UNSIGNED);
    }
}

impl ImmediateOperands {
    /// Operand width from `sf`.
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.sf.raw() != 0)
    }

    const fn register(&self, field: &FieldDescriptor<u32>, context: IndexContext) -> Register {
        Register::from_field(field.raw(), self.width(), context)
    }
}

layout! {
    /// `ADR`/`ADRP`: a 21-bit signed immediate split into `immlo` and `immhi`.
    pub struct PcRelative {
        @parent root: DataImmediateRoot = DataImmediateRoot::default();
        op: bool = FieldDescriptor::new("op", 31, 32, FLAG);
        immlo: u32 = FieldDescriptor::new("immlo", 29, 31, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 24, 26, 0b00, UNSIGNED);
        immhi: u32 = FieldDescriptor::new("immhi", 5, 24, UNSIGNED);
        rd: u32 = FieldDescriptor::new("Rd", 0, 5, UNSIGNED);
    }
}

impl PcRelative {
    pub const IMMEDIATE_BITS: u32 = 21;

    #[must_use]
    pub const fn width(&self) -> Width {
        Width::X64
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        Register::from_field(self.rd.raw(), Width::X64, IndexContext::ZeroRegister)
    }

    /// Whether this is the page form (`ADRP`).
    #[must_use]
    pub const fn is_page(&self) -> bool {
        self.op.raw() != 0
    }

    /// Signed immediate reassembled from `immlo:immhi`.
    #[must_use]
    pub fn immediate(&self) -> i64 {
        let joined = bits::concat(&[(self.immlo.raw(), 2), (self.immhi.raw(), 19)]);
        bits::sign_extend(joined, Self::IMMEDIATE_BITS)
    }

    /// Splits `value` across `immlo` and `immhi`, truncating to 21 bits.
    #[allow(clippy::cast_sign_loss)]
    pub fn set_immediate(&mut self, value: i64) {
        let fragments = bits::divide(value as u64, &[2, 19]);
        self.immlo.set_raw(fragments[0]);
        self.immhi.set_raw(fragments[1]);
    }

    /// Byte offset added to the instruction address (`ADRP` pages are
    /// shifted by 12 and applied to the page-aligned address).
    #[must_use]
    pub fn byte_offset(&self) -> i64 {
        if self.is_page() {
            self.immediate() << 12
        } else {
            self.immediate()
        }
    }
}

impl Terminal for PcRelative {
    const KIND: ShapeKind = ShapeKind::PcRelative;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0, Operation::Adr),
        OpcodeEntry::any(1, Operation::Adrp),
    ];

    fn opcode_key(&self) -> u32 {
        self.op.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op.set_raw(key);
    }
}

layout! {
    /// `ADD`/`ADDS`/`SUB`/`SUBS` with a 12-bit immediate, optionally `LSL #12`.
    pub struct AddSubImmediate {
        @parent operands: ImmediateOperands = ImmediateOperands::default();
        op: bool = FieldDescriptor::new("op", 30, 31, FLAG);
        s: bool = FieldDescriptor::new("S", 29, 30, FLAG);
        class: u32 = FieldDescriptor::enforced("class", 23, 26, 0b010, UNSIGNED);
        sh: bool = FieldDescriptor::new("sh", 22, 23, FLAG);
        imm12: u32 = FieldDescriptor::new("imm12", 10, 22, UNSIGNED);
    }
}

impl AddSubImmediate {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    /// Whether the flag-setting form is encoded.
    #[must_use]
    pub const fn sets_flags(&self) -> bool {
        self.s.raw() != 0
    }

    /// Destination: `SP` unless flags are set, in which case `ZR`.
    #[must_use]
    pub const fn rd(&self) -> Register {
        let context = if self.sets_flags() {
            IndexContext::ZeroRegister
        } else {
            IndexContext::StackPointer
        };
        self.operands.register(&self.operands.rd, context)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands
            .register(&self.operands.rn, IndexContext::StackPointer)
    }

    /// Left shift applied to `imm12`: 0 or 12.
    #[must_use]
    pub const fn shift(&self) -> u32 {
        if self.sh.raw() != 0 {
            12
        } else {
            0
        }
    }

    /// Shifted immediate operand.
    #[must_use]
    pub fn immediate(&self) -> u64 {
        u64::from(self.imm12.raw()) << self.shift()
    }
}

impl Terminal for AddSubImmediate {
    const KIND: ShapeKind = ShapeKind::AddSubImmediate;
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
}

layout! {
    /// `AND`/`ORR`/`EOR`/`ANDS` with a bitmask immediate.
    pub struct LogicalImmediate {
        @parent operands: ImmediateOperands = ImmediateOperands::default();
        opc: u32 = FieldDescriptor::new("opc", 29, 31, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 23, 26, 0b100, UNSIGNED);
        n: u32 = FieldDescriptor::new("N", 22, 23, UNSIGNED);
        immr: u32 = FieldDescriptor::new("immr", 16, 22, UNSIGNED);
        imms: u32 = FieldDescriptor::new("imms", 10, 16, UNSIGNED);
    }
}

impl LogicalImmediate {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    /// Destination: `SP` for the non-flag-setting forms, `ZR` for `ANDS`.
    #[must_use]
    pub const fn rd(&self) -> Register {
        let context = if self.opc.raw() == 0b11 {
            IndexContext::ZeroRegister
        } else {
            IndexContext::StackPointer
        };
        self.operands.register(&self.operands.rd, context)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands
            .register(&self.operands.rn, IndexContext::ZeroRegister)
    }

    /// Expanded immediate, or `None` for a reserved pattern.
    #[must_use]
    pub const fn bitmask(&self) -> Option<u64> {
        bits::decode_bitmask(
            self.width().bits(),
            self.n.raw(),
            self.immr.raw(),
            self.imms.raw(),
        )
    }

    /// Stores `value` as `N:immr:imms`. Returns `false`, leaving the fields
    /// untouched, when `value` is not a valid bitmask for the width.
    pub fn set_bitmask(&mut self, value: u64) -> bool {
        match bits::encode_bitmask(value, self.width().bits()) {
            Some((n, immr, imms)) => {
                self.n.set_raw(n);
                self.immr.set_raw(immr);
                self.imms.set_raw(imms);
                true
            }
            None => false,
        }
    }
}

impl Terminal for LogicalImmediate {
    const KIND: ShapeKind = ShapeKind::LogicalImmediate;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00, Operation::And),
        OpcodeEntry::any(0b01, Operation::Orr),
        OpcodeEntry::any(0b10, Operation::Eor),
        OpcodeEntry::any(0b11, Operation::Ands),
    ];

    fn opcode_key(&self) -> u32 {
        self.opc.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.bitmask().is_none()
    }
}

layout! {
    /// `MOVN`/`MOVZ`/`MOVK`: a 16-bit payload at a multiple of 16.
    pub struct MoveWide {
        @parent root: DataImmediateRoot = DataImmediateRoot::default();
        sf: bool = FieldDescriptor::new("sf", 31, 32, FLAG);
        opc: u32 = FieldDescriptor::new("opc", 29, 31, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 23, 26, 0b101, UNSIGNED);
        hw: u32 = FieldDescriptor::new("hw", 21, 23, UNSIGNED);
        imm16: u32 = FieldDescriptor::new("imm16", 5, 21, UNSIGNED);
        rd: u32 = FieldDescriptor::new("Rd", 0, 5, UNSIGNED);
    }
}

impl MoveWide {
    #[must_use]
    pub const fn width(&self) -> Width {
        Width::from_sf(self.sf.raw() != 0)
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        Register::from_field(self.rd.raw(), self.width(), IndexContext::ZeroRegister)
    }

    /// Left shift of the payload: `hw * 16`.
    #[must_use]
    pub const fn shift(&self) -> u32 {
        self.hw.raw() * 16
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn payload(&self) -> u16 {
        (self.imm16.raw() & 0xFFFF) as u16
    }
}

impl Terminal for MoveWide {
    const KIND: ShapeKind = ShapeKind::MoveWide;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00, Operation::Movn),
        OpcodeEntry::any(0b10, Operation::Movz),
        OpcodeEntry::any(0b11, Operation::Movk),
    ];

    fn opcode_key(&self) -> u32 {
        self.opc.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.width() == Width::W32 && self.hw.raw() >= 2
    }
}

layout! {
    /// `SBFM`/`BFM`/`UBFM`, the base of the shift and extract aliases.
    pub struct Bitfield {
        @parent operands: ImmediateOperands = ImmediateOperands::default();
        opc: u32 = FieldDescriptor::new("opc", 29, 31, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 23, 26, 0b110, UNSIGNED);
        n: u32 = FieldDescriptor::new("N", 22, 23, UNSIGNED);
        immr: u32 = FieldDescriptor::new("immr", 16, 22, UNSIGNED);
        imms: u32 = FieldDescriptor::new("imms", 10, 16, UNSIGNED);
    }
}

impl Bitfield {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands
            .register(&self.operands.rd, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands
            .register(&self.operands.rn, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn immr(&self) -> u32 {
        self.immr.raw()
    }

    #[must_use]
    pub const fn imms(&self) -> u32 {
        self.imms.raw()
    }

    /// Stores `N = sf` together with `immr` and `imms`.
    pub fn set_bounds(&mut self, immr: u32, imms: u32) {
        self.n.set_raw(self.operands.sf.raw());
        self.immr.set_raw(immr);
        self.imms.set_raw(imms);
    }
}

impl Terminal for Bitfield {
    const KIND: ShapeKind = ShapeKind::Bitfield;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::any(0b00, Operation::Sbfm),
        OpcodeEntry::any(0b01, Operation::Bfm),
        OpcodeEntry::any(0b10, Operation::Ubfm),
    ];

    fn opcode_key(&self) -> u32 {
        self.opc.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.n.raw() != self.operands.sf.raw()
            || (self.width() == Width::W32 && (self.immr() >= 32 || self.imms() >= 32))
    }
}

layout! {
    /// `EXTR`: a field extracted from a register pair.
    pub struct Extract {
        @parent operands: ImmediateOperands = ImmediateOperands::default();
        op21: u32 = FieldDescriptor::new("op21", 29, 31, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 23, 26, 0b111, UNSIGNED);
        n: u32 = FieldDescriptor::new("N", 22, 23, UNSIGNED);
        o0: u32 = FieldDescriptor::new("o0", 21, 22, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        imms: u32 = FieldDescriptor::new("imms", 10, 16, UNSIGNED);
    }
}

impl Extract {
    #[must_use]
    pub const fn width(&self) -> Width {
        self.operands.width()
    }

    #[must_use]
    pub const fn rd(&self) -> Register {
        self.operands
            .register(&self.operands.rd, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.operands
            .register(&self.operands.rn, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn rm(&self) -> Register {
        self.operands.register(&self.rm, IndexContext::ZeroRegister)
    }

    /// Bit position in `Rm` where the extracted field starts.
    #[must_use]
    pub const fn lsb(&self) -> u32 {
        self.imms.raw()
    }
}

impl Terminal for Extract {
    const KIND: ShapeKind = ShapeKind::Extract;
    const OPCODES: &'static [OpcodeEntry] = &[OpcodeEntry::any(0b000, Operation::Extr)];

    fn opcode_key(&self) -> u32 {
        (self.op21.raw() << 1) | self.o0.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.op21.set_raw(key >> 1);
        self.o0.set_raw(key);
    }

    fn is_reserved(&self) -> bool {
        self.n.raw() != self.operands.sf.raw() || (self.width() == Width::W32 && self.lsb() >= 32)
    }
}

shape_family! {
    /// Data-processing (immediate) shapes.
    pub enum DataImmediateShape in DataImmediate {
        PcRelative,
        AddSubImmediate,
        LogicalImmediate,
        MoveWide,
        Bitfield,
        Extract,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Layout;
    use crate::shape::instantiate;

    #[test]
    fn movz_fields_load_from_word() {
        let (operation, shape) = instantiate::<MoveWide>(0xD280_00A0).expect("MOVZ x0, #5");
        assert_eq!(operation, Operation::Movz);
        assert_eq!(shape.rd(), Register::X(0));
        assert_eq!(shape.payload(), 5);
        assert_eq!(shape.shift(), 0);
    }

    #[test]
    fn adr_immediate_joins_fragments() {
        // ADR x1, #-4
        let (operation, shape) = instantiate::<PcRelative>(0x10FF_FFE1).expect("ADR");
        assert_eq!(operation, Operation::Adr);
        assert_eq!(shape.rd(), Register::X(1));
        assert_eq!(shape.immediate(), -4);

        let mut rebuilt = PcRelative::default();
        rebuilt.rd.set_raw(1);
        rebuilt.set_immediate(-4);
        assert_eq!(rebuilt.encode(), Ok(0x10FF_FFE1));
    }

    #[test]
    fn move_wide_32_bit_rejects_high_halfwords() {
        // MOVZ w0, #1, LSL #32 is reserved.
        assert_eq!(
            instantiate::<MoveWide>(0x52C0_0020).map(|(op, _)| op),
            Err(DecodeError::Unrecognized { word: 0x52C0_0020 })
        );
    }

    #[test]
    fn logical_immediate_rejects_reserved_masks() {
        // AND w0, w0, with N=1 in 32-bit mode.
        let word = 0x1240_0000;
        assert_eq!(
            instantiate::<LogicalImmediate>(word).map(|(op, _)| op),
            Err(DecodeError::Unrecognized { word })
        );
    }

    #[test]
    fn add_immediate_resolves_sp_for_destination() {
        // ADD sp, x1, #16
        let (_, shape) = instantiate::<AddSubImmediate>(0x9100_403F).expect("ADD sp");
        assert_eq!(shape.rd(), Register::Sp);
        assert_eq!(shape.rn(), Register::X(1));
        assert_eq!(shape.immediate(), 16);
    }

    #[test]
    fn tagged_add_subtract_is_unsupported() {
        // ADDG x0, x1, #0, #0
        let word = 0x9180_0020;
        assert!(resolve(word).is_err_and(|error| error.is_unsupported()));
    }
}
