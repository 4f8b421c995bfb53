//! Loads and stores of general-purpose registers: bits 27 = 1, 25 = 0.
//!
//! Within the family, `op0` (bits 29:28) picks literal, pair or
//! single-register forms; single-register forms then split on bit 24
//! (unsigned offset), bit 21 and `op4` (bits 11:10).
//!
//! Single-register shapes share one key, `size:opc`, and one table per
//! addressing class. The table row also fixes the transfer register width:
//! `LDRSB w0` and `LDRSB x0` differ only in `opc`.

#![allow(missing_docs)]

use crate::bits;
use crate::error::DecodeError;
use crate::field::{layout, FieldDescriptor, Layout, EXTEND, SIGNED, UNSIGNED, WORD_OFFSET};
use crate::operand::{ExtendKind, IndexMode};
use crate::operation::Operation;
use crate::register::{IndexContext, Register, Width};
use crate::shape::{lookup_operation, shape_family, Family, OpcodeEntry, ShapeKind, Terminal};

const PREFETCH_KEY: u32 = 0b1110;

/// Type resolution inside the family.
///
/// # Errors
///
/// [`DecodeError::Unsupported`] for vector registers, exclusives and
/// ordered accesses, unprivileged accesses, atomics and pointer-auth loads.
pub fn resolve(word: u32) -> Result<ShapeKind, DecodeError> {
    let unsupported = |family| DecodeError::Unsupported { word, family };
    if bits::bit(word, 26) {
        return Err(unsupported(Family::SimdFloatingPoint));
    }
    match bits::extract(word, 28, 30) {
        0b00 => Err(unsupported(Family::LoadStore)),
        0b01 if !bits::bit(word, 24) => Ok(ShapeKind::LoadLiteral),
        0b01 => Err(unsupported(Family::LoadStore)),
        0b10 => Ok(ShapeKind::LoadStorePair),
        _ if bits::bit(word, 24) => Ok(ShapeKind::LoadStoreUnsignedOffset),
        _ if !bits::bit(word, 21) => match bits::extract(word, 10, 12) {
            0b00 => Ok(ShapeKind::LoadStoreUnscaled),
            0b01 => Ok(ShapeKind::LoadStorePostIndexed),
            0b10 => Err(unsupported(Family::LoadStore)),
            _ => Ok(ShapeKind::LoadStorePreIndexed),
        },
        _ if bits::extract(word, 10, 12) == 0b10 => Ok(ShapeKind::LoadStoreRegisterOffset),
        _ => Err(unsupported(Family::LoadStore)),
    }
}

/// Width of the transfer register selected by `key`.
fn transfer_width(table: &'static [OpcodeEntry], key: u32) -> Width {
    lookup_operation(table, key, None)
        .and_then(|entry| entry.width)
        .unwrap_or_default()
}

const UNSCALED: &[OpcodeEntry] = &[
    OpcodeEntry::sized(0b0000, Operation::Sturb, Width::W32),
    OpcodeEntry::sized(0b0001, Operation::Ldurb, Width::W32),
    OpcodeEntry::sized(0b0010, Operation::Ldursb, Width::X64),
    OpcodeEntry::sized(0b0011, Operation::Ldursb, Width::W32),
    OpcodeEntry::sized(0b0100, Operation::Sturh, Width::W32),
    OpcodeEntry::sized(0b0101, Operation::Ldurh, Width::W32),
    OpcodeEntry::sized(0b0110, Operation::Ldursh, Width::X64),
    OpcodeEntry::sized(0b0111, Operation::Ldursh, Width::W32),
    OpcodeEntry::sized(0b1000, Operation::Stur, Width::W32),
    OpcodeEntry::sized(0b1001, Operation::Ldur, Width::W32),
    OpcodeEntry::sized(0b1010, Operation::Ldursw, Width::X64),
    OpcodeEntry::sized(0b1100, Operation::Stur, Width::X64),
    OpcodeEntry::sized(0b1101, Operation::Ldur, Width::X64),
];

const INDEXED: &[OpcodeEntry] = &[
    OpcodeEntry::sized(0b0000, Operation::Strb, Width::W32),
    OpcodeEntry::sized(0b0001, Operation::Ldrb, Width::W32),
    OpcodeEntry::sized(0b0010, Operation::Ldrsb, Width::X64),
    OpcodeEntry::sized(0b0011, Operation::Ldrsb, Width::W32),
    OpcodeEntry::sized(0b0100, Operation::Strh, Width::W32),
    OpcodeEntry::sized(0b0101, Operation::Ldrh, Width::W32),
    OpcodeEntry::sized(0b0110, Operation::Ldrsh, Width::X64),
    OpcodeEntry::sized(0b0111, Operation::Ldrsh, Width::W32),
    OpcodeEntry::sized(0b1000, Operation::Str, Width::W32),
    OpcodeEntry::sized(0b1001, Operation::Ldr, Width::W32),
    OpcodeEntry::sized(0b1010, Operation::Ldrsw, Width::X64),
    OpcodeEntry::sized(0b1100, Operation::Str, Width::X64),
    OpcodeEntry::sized(0b1101, Operation::Ldr, Width::X64),
];

layout! {
    /// Family selector: bit 27 set, scalar registers, bit 25 clear.
    pub struct LoadStoreRoot {
        bit27: u32 = FieldDescriptor::enforced("bit27", 27, 28, 1, UNSIGNED);
        v: u32 = FieldDescriptor::enforced("V", 26, 27, 0, UNSIGNED);
        bit25: u32 = FieldDescriptor::enforced("bit25", 25, 26, 0, UNSIGNED);
    }
}

layout! {
    /// `size`, `opc`, `Rn` and `Rt` of the single-register forms.
    pub struct SingleRegister {
        @parent root: LoadStoreRoot = LoadStoreRoot::default();
        size: u32 = FieldDescriptor::new("size", 30, 32, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 28, 30, 0b11, UNSIGNED);
        opc: u32 = FieldDescriptor::new("opc", 22, 24, UNSIGNED);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl SingleRegister {
    const fn key(&self) -> u32 {
        (self.size.raw() << 2) | self.opc.raw()
    }

    fn set_key(&mut self, key: u32) {
        self.size.set_raw(key >> 2);
        self.opc.set_raw(key);
    }

    /// Bytes moved by one access: `1 << size`.
    #[must_use]
    pub const fn access_size(&self) -> u64 {
        1 << self.size.raw()
    }

    /// Base register; encoding 31 is `SP`.
    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(self.rn.raw(), Width::X64, IndexContext::StackPointer)
    }

    const fn rt(&self, width: Width) -> Register {
        Register::from_field(self.rt.raw(), width, IndexContext::ZeroRegister)
    }
}

layout! {
    /// Signed 9-bit offset with the `op4` addressing selector.
    pub struct Imm9Index {
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 0, UNSIGNED);
        bit21: u32 = FieldDescriptor::enforced("bit21", 21, 22, 0, UNSIGNED);
        imm9: i64 = FieldDescriptor::new("imm9", 12, 21, SIGNED);
        mode: u32 = FieldDescriptor::new("op4", 10, 12, UNSIGNED);
    }
}

impl Imm9Index {
    const fn with_mode(mode: u32) -> Self {
        Self {
            bit24: FieldDescriptor::enforced("bit24", 24, 25, 0, UNSIGNED),
            bit21: FieldDescriptor::enforced("bit21", 21, 22, 0, UNSIGNED),
            imm9: FieldDescriptor::new("imm9", 12, 21, SIGNED),
            mode: FieldDescriptor::enforced("op4", 10, 12, mode, UNSIGNED),
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm9.value().unwrap_or_default()
    }
}

/// Accessors shared by the three `imm9` shapes.
macro_rules! imm9_accessors {
    ($shape:ident, $table:ident, $mode:expr) => {
        impl $shape {
            /// Transfer register width.
            #[must_use]
            pub fn width(&self) -> Width {
                transfer_width($table, self.single.key())
            }

            #[must_use]
            pub const fn rn(&self) -> Register {
                self.single.rn()
            }

            #[must_use]
            pub fn rt(&self) -> Register {
                self.single.rt(self.width())
            }

            #[must_use]
            pub const fn access_size(&self) -> u64 {
                self.single.access_size()
            }

            /// Signed byte offset.
            #[must_use]
            pub fn offset(&self) -> i64 {
                self.index.offset()
            }

            #[must_use]
            pub const fn index_mode(&self) -> IndexMode {
                $mode
            }
        }
    };
}

layout! {
    /// `STUR*`/`LDUR*`: unscaled signed offset, no writeback.
    pub struct LoadStoreUnscaled {
        @parent single: SingleRegister = SingleRegister::default();
        @parent index: Imm9Index = Imm9Index::with_mode(0b00);
    }
}

imm9_accessors!(LoadStoreUnscaled, UNSCALED, IndexMode::Offset);

impl Terminal for LoadStoreUnscaled {
    const KIND: ShapeKind = ShapeKind::LoadStoreUnscaled;
    const OPCODES: &'static [OpcodeEntry] = UNSCALED;

    fn opcode_key(&self) -> u32 {
        self.single.key()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.single.set_key(key);
    }

    // PRFUM.
    fn is_unsupported(&self) -> bool {
        self.confirms() && self.opcode_key() == PREFETCH_KEY
    }
}

layout! {
    /// Post-indexed single register: access at the base, then writeback.
    pub struct LoadStorePostIndexed {
        @parent single: SingleRegister = SingleRegister::default();
        @parent index: Imm9Index = Imm9Index::with_mode(0b01);
    }
}

imm9_accessors!(LoadStorePostIndexed, INDEXED, IndexMode::PostIndex);

impl Terminal for LoadStorePostIndexed {
    const KIND: ShapeKind = ShapeKind::LoadStorePostIndexed;
    const OPCODES: &'static [OpcodeEntry] = INDEXED;

    fn opcode_key(&self) -> u32 {
        self.single.key()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.single.set_key(key);
    }
}

layout! {
    /// Pre-indexed single register: writeback, then access at the new base.
    pub struct LoadStorePreIndexed {
        @parent single: SingleRegister = SingleRegister::default();
        @parent index: Imm9Index = Imm9Index::with_mode(0b11);
    }
}

imm9_accessors!(LoadStorePreIndexed, INDEXED, IndexMode::PreIndex);

impl Terminal for LoadStorePreIndexed {
    const KIND: ShapeKind = ShapeKind::LoadStorePreIndexed;
    const OPCODES: &'static [OpcodeEntry] = INDEXED;

    fn opcode_key(&self) -> u32 {
        self.single.key()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.single.set_key(key);
    }
}

layout! {
    /// Unsigned 12-bit offset scaled by the access size.
    pub struct LoadStoreUnsignedOffset {
        @parent single: SingleRegister = SingleRegister::default();
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 1, UNSIGNED);
        imm12: u32 = FieldDescriptor::new("imm12", 10, 22, UNSIGNED);
    }
}

impl LoadStoreUnsignedOffset {
    #[must_use]
    pub fn width(&self) -> Width {
        transfer_width(INDEXED, self.single.key())
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.single.rn()
    }

    #[must_use]
    pub fn rt(&self) -> Register {
        self.single.rt(self.width())
    }

    #[must_use]
    pub const fn access_size(&self) -> u64 {
        self.single.access_size()
    }

    /// Byte offset: `imm12 << size`.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.imm12.raw()) << self.single.size.raw()
    }
}

impl Terminal for LoadStoreUnsignedOffset {
    const KIND: ShapeKind = ShapeKind::LoadStoreUnsignedOffset;
    const OPCODES: &'static [OpcodeEntry] = INDEXED;

    fn opcode_key(&self) -> u32 {
        self.single.key()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.single.set_key(key);
    }

    // PRFM (immediate).
    fn is_unsupported(&self) -> bool {
        self.confirms() && self.opcode_key() == PREFETCH_KEY
    }
}

layout! {
    /// Register offset, extended and optionally scaled by the access size.
    pub struct LoadStoreRegisterOffset {
        @parent single: SingleRegister = SingleRegister::default();
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 0, UNSIGNED);
        bit21: u32 = FieldDescriptor::enforced("bit21", 21, 22, 1, UNSIGNED);
        rm: u32 = FieldDescriptor::new("Rm", 16, 21, UNSIGNED);
        option: ExtendKind = FieldDescriptor::new("option", 13, 16, EXTEND);
        s: u32 = FieldDescriptor::new("S", 12, 13, UNSIGNED);
        mode: u32 = FieldDescriptor::enforced("op4", 10, 12, 0b10, UNSIGNED);
    }
}

impl LoadStoreRegisterOffset {
    #[must_use]
    pub fn width(&self) -> Width {
        transfer_width(INDEXED, self.single.key())
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        self.single.rn()
    }

    #[must_use]
    pub fn rt(&self) -> Register {
        self.single.rt(self.width())
    }

    #[must_use]
    pub const fn access_size(&self) -> u64 {
        self.single.access_size()
    }

    /// Index register: `X` for the doubleword extends, `W` otherwise.
    #[must_use]
    pub const fn rm(&self) -> Register {
        let width = Width::from_sf(self.option.raw() & 1 != 0);
        Register::from_field(self.rm.raw(), width, IndexContext::ZeroRegister)
    }

    #[must_use]
    pub fn extend(&self) -> Option<ExtendKind> {
        self.option.value()
    }

    /// Whether the `S` bit requests scaling.
    #[must_use]
    pub const fn is_scaled(&self) -> bool {
        self.s.raw() != 0
    }

    /// Left shift applied to the extended index: `size` when scaled.
    #[must_use]
    pub const fn shift_amount(&self) -> u32 {
        if self.is_scaled() {
            self.single.size.raw()
        } else {
            0
        }
    }
}

impl Terminal for LoadStoreRegisterOffset {
    const KIND: ShapeKind = ShapeKind::LoadStoreRegisterOffset;
    const OPCODES: &'static [OpcodeEntry] = INDEXED;

    fn opcode_key(&self) -> u32 {
        self.single.key()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.single.set_key(key);
    }

    // PRFM (register).
    fn is_unsupported(&self) -> bool {
        self.confirms() && self.opcode_key() == PREFETCH_KEY
    }

    // Only UXTW, LSL (UXTX), SXTW and SXTX are allocated.
    fn is_reserved(&self) -> bool {
        self.option.raw() & 0b010 == 0
    }
}

layout! {
    /// `LDR (literal)`: PC-relative load with a 19-bit word offset.
    pub struct LoadLiteral {
        @parent root: LoadStoreRoot = LoadStoreRoot::default();
        opc: u32 = FieldDescriptor::new("opc", 30, 32, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 28, 30, 0b01, UNSIGNED);
        bit24: u32 = FieldDescriptor::enforced("bit24", 24, 25, 0, UNSIGNED);
        imm19: i64 = FieldDescriptor::new("imm19", 5, 24, WORD_OFFSET);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl LoadLiteral {
    #[must_use]
    pub fn width(&self) -> Width {
        transfer_width(Self::OPCODES, self.opc.raw())
    }

    #[must_use]
    pub fn rt(&self) -> Register {
        Register::from_field(self.rt.raw(), self.width(), IndexContext::ZeroRegister)
    }

    /// Bytes loaded: 8 for `LDR Xt`, 4 otherwise.
    #[must_use]
    pub const fn access_size(&self) -> u64 {
        if self.opc.raw() == 0b01 {
            8
        } else {
            4
        }
    }

    /// Byte offset from the instruction.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.imm19.value().unwrap_or_default()
    }
}

impl Terminal for LoadLiteral {
    const KIND: ShapeKind = ShapeKind::LoadLiteral;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::sized(0b00, Operation::Ldr, Width::W32),
        OpcodeEntry::sized(0b01, Operation::Ldr, Width::X64),
        OpcodeEntry::sized(0b10, Operation::Ldrsw, Width::X64),
    ];

    fn opcode_key(&self) -> u32 {
        self.opc.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key);
    }

    // PRFM (literal).
    fn is_unsupported(&self) -> bool {
        self.confirms() && self.opc.raw() == 0b11
    }
}

layout! {
    /// `STP`/`LDP`/`LDPSW` and the non-temporal `STNP`/`LDNP`.
    ///
    /// `index` is `00` for non-temporal offset, `01` post-index, `10` signed
    /// offset and `11` pre-index.
    pub struct LoadStorePair {
        @parent root: LoadStoreRoot = LoadStoreRoot::default();
        opc: u32 = FieldDescriptor::new("opc", 30, 32, UNSIGNED);
        class: u32 = FieldDescriptor::enforced("class", 28, 30, 0b10, UNSIGNED);
        index: u32 = FieldDescriptor::new("index", 23, 25, UNSIGNED);
        l: u32 = FieldDescriptor::new("L", 22, 23, UNSIGNED);
        imm7: i64 = FieldDescriptor::new("imm7", 15, 22, SIGNED);
        rt2: u32 = FieldDescriptor::new("Rt2", 10, 15, UNSIGNED);
        rn: u32 = FieldDescriptor::new("Rn", 5, 10, UNSIGNED);
        rt: u32 = FieldDescriptor::new("Rt", 0, 5, UNSIGNED);
    }
}

impl LoadStorePair {
    const NON_TEMPORAL: u32 = 0b1000;

    #[must_use]
    pub fn width(&self) -> Width {
        transfer_width(Self::OPCODES, self.opcode_key())
    }

    #[must_use]
    pub fn rt(&self) -> Register {
        Register::from_field(self.rt.raw(), self.width(), IndexContext::ZeroRegister)
    }

    #[must_use]
    pub fn rt2(&self) -> Register {
        Register::from_field(self.rt2.raw(), self.width(), IndexContext::ZeroRegister)
    }

    #[must_use]
    pub const fn rn(&self) -> Register {
        Register::from_field(self.rn.raw(), Width::X64, IndexContext::StackPointer)
    }

    /// Bytes per register: 8 for `opc = 10`, 4 otherwise (`LDPSW` included).
    #[must_use]
    pub const fn access_size(&self) -> u64 {
        if self.opc.raw() == 0b10 {
            8
        } else {
            4
        }
    }

    /// Byte offset: `imm7` scaled by the access size.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn offset(&self) -> i64 {
        self.imm7.value().unwrap_or_default() * self.access_size() as i64
    }

    #[must_use]
    pub const fn index_mode(&self) -> IndexMode {
        match self.index.raw() {
            0b01 => IndexMode::PostIndex,
            0b11 => IndexMode::PreIndex,
            _ => IndexMode::Offset,
        }
    }

    #[must_use]
    pub const fn is_non_temporal(&self) -> bool {
        self.index.raw() == 0b00
    }

    /// Writes the `index` selector. Non-temporal pairs only encode
    /// [`IndexMode::Offset`] and keep `00`.
    pub fn set_index_mode(&mut self, mode: IndexMode) {
        if self.is_non_temporal() {
            return;
        }
        self.index.set_raw(match mode {
            IndexMode::PostIndex => 0b01,
            IndexMode::Offset => 0b10,
            IndexMode::PreIndex => 0b11,
        });
    }
}

impl Terminal for LoadStorePair {
    const KIND: ShapeKind = ShapeKind::LoadStorePair;
    const OPCODES: &'static [OpcodeEntry] = &[
        OpcodeEntry::sized(0b0000, Operation::Stp, Width::W32),
        OpcodeEntry::sized(0b0001, Operation::Ldp, Width::W32),
        OpcodeEntry::sized(0b0011, Operation::Ldpsw, Width::X64),
        OpcodeEntry::sized(0b0100, Operation::Stp, Width::X64),
        OpcodeEntry::sized(0b0101, Operation::Ldp, Width::X64),
        OpcodeEntry::sized(0b1000, Operation::Stnp, Width::W32),
        OpcodeEntry::sized(0b1001, Operation::Ldnp, Width::W32),
        OpcodeEntry::sized(0b1100, Operation::Stnp, Width::X64),
        OpcodeEntry::sized(0b1101, Operation::Ldnp, Width::X64),
    ];

    fn opcode_key(&self) -> u32 {
        let non_temporal = if self.is_non_temporal() {
            Self::NON_TEMPORAL
        } else {
            0
        };
        non_temporal | (self.opc.raw() << 1) | self.l.raw()
    }

    fn set_opcode_key(&mut self, key: u32) {
        self.opc.set_raw(key >> 1);
        self.l.set_raw(key);
        if key & Self::NON_TEMPORAL != 0 {
            self.index.set_raw(0b00);
        } else if self.is_non_temporal() {
            self.index.set_raw(0b10);
        }
    }

    // STGP.
    fn is_unsupported(&self) -> bool {
        self.confirms() && self.opcode_key() == 0b0010
    }
}

shape_family! {
    /// Load and store shapes.
    pub enum LoadStoreShape in LoadStore {
        LoadLiteral,
        LoadStorePair,
        LoadStoreUnscaled,
        LoadStorePostIndexed,
        LoadStorePreIndexed,
        LoadStoreUnsignedOffset,
        LoadStoreRegisterOffset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::instantiate;
    use rstest::rstest;

    #[rstest]
    #[case(0xF940_0420, ShapeKind::LoadStoreUnsignedOffset)]
    #[case(0xF840_8420, ShapeKind::LoadStorePostIndexed)]
    #[case(0xF840_8C20, ShapeKind::LoadStorePreIndexed)]
    #[case(0xF85F_8020, ShapeKind::LoadStoreUnscaled)]
    #[case(0xF862_6820, ShapeKind::LoadStoreRegisterOffset)]
    #[case(0xA9BF_7BFD, ShapeKind::LoadStorePair)]
    #[case(0x5800_0040, ShapeKind::LoadLiteral)]
    fn windows_select_shapes(#[case] word: u32, #[case] expected: ShapeKind) {
        assert_eq!(resolve(word), Ok(expected));
    }

    #[test]
    fn vector_and_exclusive_forms_are_unsupported() {
        // LDR q0, [x1] and LDXR x0, [x1]
        assert!(resolve(0x3DC0_0020).is_err_and(|error| error.is_unsupported()));
        assert!(resolve(0xC85F_7C20).is_err_and(|error| error.is_unsupported()));
    }

    #[test]
    fn sign_extending_loads_pick_width_from_opc() {
        // LDRSB w0, [x1] / LDRSB x0, [x1]
        let (operation, w) = instantiate::<LoadStoreUnsignedOffset>(0x39C0_0020).expect("LDRSB w");
        assert_eq!(operation, Operation::Ldrsb);
        assert_eq!(w.rt(), Register::W(0));
        let (operation, x) = instantiate::<LoadStoreUnsignedOffset>(0x3980_0020).expect("LDRSB x");
        assert_eq!(operation, Operation::Ldrsb);
        assert_eq!(x.rt(), Register::X(0));
    }

    #[test]
    fn stp_pre_index_scales_offset() {
        // STP x29, x30, [sp, #-16]!
        let (operation, pair) = instantiate::<LoadStorePair>(0xA9BF_7BFD).expect("STP");
        assert_eq!(operation, Operation::Stp);
        assert_eq!(pair.index_mode(), IndexMode::PreIndex);
        assert_eq!(pair.offset(), -16);
        assert_eq!(pair.rn(), Register::Sp);
        assert_eq!(pair.rt(), Register::X(29));
        assert_eq!(pair.rt2(), Register::LINK);
    }

    #[test]
    fn non_temporal_key_controls_index_field() {
        let mut pair = LoadStorePair::default();
        pair.set_opcode_key(0b1101);
        assert!(pair.is_non_temporal());
        pair.set_opcode_key(0b0101);
        assert_eq!(pair.index_mode(), IndexMode::Offset);
        assert!(!pair.is_non_temporal());
        pair.set_index_mode(IndexMode::PostIndex);
        assert_eq!(pair.opcode_key(), 0b0101);
    }

    #[test]
    fn register_offset_rejects_byte_and_halfword_extends() {
        // LDR x0, [x1, w2, UXTB] is unallocated.
        let word = 0xF862_0820;
        assert_eq!(
            instantiate::<LoadStoreRegisterOffset>(word).map(|(op, _)| op),
            Err(DecodeError::Unrecognized { word })
        );
    }

    #[test]
    fn prefetches_are_unsupported() {
        // PRFM PLDL1KEEP, [x1]
        assert!(instantiate::<LoadStoreUnsignedOffset>(0xF980_0020)
            .is_err_and(|error| error.is_unsupported()));
    }
}
