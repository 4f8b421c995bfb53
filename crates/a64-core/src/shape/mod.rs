//! Instruction shapes: the terminal encodings of the A64 decode tree.
//!
//! Every terminal shape is a [`Layout`] struct listing its field descriptors
//! explicitly, with shared layouts embedded by value. Shapes are grouped by
//! family into closed enums so decode, build, disassembly and execution all
//! dispatch by exhaustive matching.
//!
//! Each shape owns a discriminator table ([`Terminal::OPCODES`]) mapping the
//! value of its opcode sub-fields to an [`Operation`]. Decode reads the table
//! forward; the builder reads it backward.

use std::fmt;

use crate::error::{DecodeError, EncodeError};
use crate::field::{Layout, RawField};
use crate::operation::Operation;
use crate::register::Width;

/// Branches, exception generation and system instructions.
pub mod branch;
/// Data processing with immediate operands.
pub mod data_immediate;
/// Data processing with register operands.
pub mod data_register;
/// Loads and stores of general-purpose registers.
pub mod load_store;

pub use branch::{
    barrier_option_from_name, barrier_option_name, Barrier, BranchRegister, BranchShape,
    CompareBranch, ConditionalBranch, ExceptionGeneration, Hint, SystemRegister,
    SystemRegisterMove, TestBranch, UnconditionalImmediate,
};
pub use data_immediate::{
    AddSubImmediate, Bitfield, DataImmediateShape, Extract, LogicalImmediate, MoveWide, PcRelative,
};
pub use data_register::{
    AddSubCarry, AddSubExtended, AddSubShifted, ConditionalCompareImmediate,
    ConditionalCompareRegister, ConditionalSelect, DataProcessing1Source, DataProcessing2Source,
    DataProcessing3Source, DataRegisterShape, LogicalShifted,
};
pub use load_store::{
    LoadLiteral, LoadStorePair, LoadStorePostIndexed, LoadStorePreIndexed,
    LoadStoreRegisterOffset, LoadStoreShape, LoadStoreUnscaled, LoadStoreUnsignedOffset,
};

/// Top-level encoding families selected by bits 28:25.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Family {
    /// Data processing, immediate (`100x`).
    DataImmediate,
    /// Branches, exception generation and system (`101x`).
    BranchSystem,
    /// Loads and stores (`x1x0`).
    LoadStore,
    /// Data processing, register (`x101`).
    DataRegister,
    /// Scalar floating point and Advanced SIMD (`x111`). Never implemented.
    SimdFloatingPoint,
    /// Scalable vector extension (`0010`). Never implemented.
    ScalableVector,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DataImmediate => "data-processing (immediate)",
            Self::BranchSystem => "branch/exception/system",
            Self::LoadStore => "load/store",
            Self::DataRegister => "data-processing (register)",
            Self::SimdFloatingPoint => "SIMD/floating-point",
            Self::ScalableVector => "SVE",
        })
    }
}

/// Fieldless identity of a terminal shape, produced by type resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum ShapeKind {
    PcRelative,
    AddSubImmediate,
    LogicalImmediate,
    MoveWide,
    Bitfield,
    Extract,
    ConditionalBranch,
    ExceptionGeneration,
    Hint,
    Barrier,
    SystemRegisterMove,
    BranchRegister,
    UnconditionalImmediate,
    CompareBranch,
    TestBranch,
    LoadLiteral,
    LoadStorePair,
    LoadStoreUnscaled,
    LoadStorePostIndexed,
    LoadStorePreIndexed,
    LoadStoreUnsignedOffset,
    LoadStoreRegisterOffset,
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

impl ShapeKind {
    /// Family this shape belongs to.
    #[must_use]
    pub const fn family(self) -> Family {
        match self {
            Self::PcRelative
            | Self::AddSubImmediate
            | Self::LogicalImmediate
            | Self::MoveWide
            | Self::Bitfield
            | Self::Extract => Family::DataImmediate,
            Self::ConditionalBranch
            | Self::ExceptionGeneration
            | Self::Hint
            | Self::Barrier
            | Self::SystemRegisterMove
            | Self::BranchRegister
            | Self::UnconditionalImmediate
            | Self::CompareBranch
            | Self::TestBranch => Family::BranchSystem,
            Self::LoadLiteral
            | Self::LoadStorePair
            | Self::LoadStoreUnscaled
            | Self::LoadStorePostIndexed
            | Self::LoadStorePreIndexed
            | Self::LoadStoreUnsignedOffset
            | Self::LoadStoreRegisterOffset => Family::LoadStore,
            Self::LogicalShifted
            | Self::AddSubShifted
            | Self::AddSubExtended
            | Self::AddSubCarry
            | Self::ConditionalCompareRegister
            | Self::ConditionalCompareImmediate
            | Self::ConditionalSelect
            | Self::DataProcessing1Source
            | Self::DataProcessing2Source
            | Self::DataProcessing3Source => Family::DataRegister,
        }
    }

    /// Operation table of this shape.
    #[must_use]
    pub const fn opcodes(self) -> &'static [OpcodeEntry] {
        match self {
            Self::PcRelative => PcRelative::OPCODES,
            Self::AddSubImmediate => AddSubImmediate::OPCODES,
            Self::LogicalImmediate => LogicalImmediate::OPCODES,
            Self::MoveWide => MoveWide::OPCODES,
            Self::Bitfield => Bitfield::OPCODES,
            Self::Extract => Extract::OPCODES,
            Self::ConditionalBranch => ConditionalBranch::OPCODES,
            Self::ExceptionGeneration => ExceptionGeneration::OPCODES,
            Self::Hint => Hint::OPCODES,
            Self::Barrier => Barrier::OPCODES,
            Self::SystemRegisterMove => SystemRegisterMove::OPCODES,
            Self::BranchRegister => BranchRegister::OPCODES,
            Self::UnconditionalImmediate => UnconditionalImmediate::OPCODES,
            Self::CompareBranch => CompareBranch::OPCODES,
            Self::TestBranch => TestBranch::OPCODES,
            Self::LoadLiteral => LoadLiteral::OPCODES,
            Self::LoadStorePair => LoadStorePair::OPCODES,
            Self::LoadStoreUnscaled => LoadStoreUnscaled::OPCODES,
            Self::LoadStorePostIndexed => LoadStorePostIndexed::OPCODES,
            Self::LoadStorePreIndexed => LoadStorePreIndexed::OPCODES,
            Self::LoadStoreUnsignedOffset => LoadStoreUnsignedOffset::OPCODES,
            Self::LoadStoreRegisterOffset => LoadStoreRegisterOffset::OPCODES,
            Self::LogicalShifted => LogicalShifted::OPCODES,
            Self::AddSubShifted => AddSubShifted::OPCODES,
            Self::AddSubExtended => AddSubExtended::OPCODES,
            Self::AddSubCarry => AddSubCarry::OPCODES,
            Self::ConditionalCompareRegister => ConditionalCompareRegister::OPCODES,
            Self::ConditionalCompareImmediate => ConditionalCompareImmediate::OPCODES,
            Self::ConditionalSelect => ConditionalSelect::OPCODES,
            Self::DataProcessing1Source => DataProcessing1Source::OPCODES,
            Self::DataProcessing2Source => DataProcessing2Source::OPCODES,
            Self::DataProcessing3Source => DataProcessing3Source::OPCODES,
        }
    }

    /// Returns `true` when the shape's table, or its fallback, produces
    /// `operation`.
    #[must_use]
    pub fn covers(self, operation: Operation) -> bool {
        (matches!(self, Self::Hint) && operation == Operation::Hint)
            || self.opcodes().iter().any(|entry| entry.operation == operation)
    }

    /// Phase two of decode: derives the operation and loads every field.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Unrecognized`] for reserved sub-encodings and
    /// [`DecodeError::Unsupported`] for recognized but unimplemented ones.
    pub fn instantiate(self, word: u32) -> Result<Instruction, DecodeError> {
        fn load<S: Terminal>(word: u32) -> Result<Instruction, DecodeError> {
            instantiate::<S>(word).map(|(operation, shape)| Instruction::new(operation, shape))
        }

        match self {
            Self::PcRelative => load::<PcRelative>(word),
            Self::AddSubImmediate => load::<AddSubImmediate>(word),
            Self::LogicalImmediate => load::<LogicalImmediate>(word),
            Self::MoveWide => load::<MoveWide>(word),
            Self::Bitfield => load::<Bitfield>(word),
            Self::Extract => load::<Extract>(word),
            Self::ConditionalBranch => load::<ConditionalBranch>(word),
            Self::ExceptionGeneration => load::<ExceptionGeneration>(word),
            Self::Hint => load::<Hint>(word),
            Self::Barrier => load::<Barrier>(word),
            Self::SystemRegisterMove => load::<SystemRegisterMove>(word),
            Self::BranchRegister => load::<BranchRegister>(word),
            Self::UnconditionalImmediate => load::<UnconditionalImmediate>(word),
            Self::CompareBranch => load::<CompareBranch>(word),
            Self::TestBranch => load::<TestBranch>(word),
            Self::LoadLiteral => load::<LoadLiteral>(word),
            Self::LoadStorePair => load::<LoadStorePair>(word),
            Self::LoadStoreUnscaled => load::<LoadStoreUnscaled>(word),
            Self::LoadStorePostIndexed => load::<LoadStorePostIndexed>(word),
            Self::LoadStorePreIndexed => load::<LoadStorePreIndexed>(word),
            Self::LoadStoreUnsignedOffset => load::<LoadStoreUnsignedOffset>(word),
            Self::LoadStoreRegisterOffset => load::<LoadStoreRegisterOffset>(word),
            Self::LogicalShifted => load::<LogicalShifted>(word),
            Self::AddSubShifted => load::<AddSubShifted>(word),
            Self::AddSubExtended => load::<AddSubExtended>(word),
            Self::AddSubCarry => load::<AddSubCarry>(word),
            Self::ConditionalCompareRegister => load::<ConditionalCompareRegister>(word),
            Self::ConditionalCompareImmediate => load::<ConditionalCompareImmediate>(word),
            Self::ConditionalSelect => load::<ConditionalSelect>(word),
            Self::DataProcessing1Source => load::<DataProcessing1Source>(word),
            Self::DataProcessing2Source => load::<DataProcessing2Source>(word),
            Self::DataProcessing3Source => load::<DataProcessing3Source>(word),
        }
    }
}

/// One row of a shape's discriminator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    /// Concatenated opcode sub-field value.
    pub key: u32,
    /// Operation the key selects.
    pub operation: Operation,
    /// Width the row is restricted to. For load/store shapes this is the
    /// transfer register width implied by the key.
    pub width: Option<Width>,
}

impl OpcodeEntry {
    /// Row valid for both widths.
    #[must_use]
    pub const fn any(key: u32, operation: Operation) -> Self {
        Self {
            key,
            operation,
            width: None,
        }
    }

    /// Row restricted to one width.
    #[must_use]
    pub const fn sized(key: u32, operation: Operation, width: Width) -> Self {
        Self {
            key,
            operation,
            width: Some(width),
        }
    }

    fn admits(&self, width: Option<Width>) -> bool {
        match (self.width, width) {
            (Some(own), Some(requested)) => own == requested,
            _ => true,
        }
    }
}

/// Finds the row for `key`, honouring width restrictions when `width` is
/// known. Rows are searched in table order.
#[must_use]
pub fn lookup_operation(
    table: &'static [OpcodeEntry],
    key: u32,
    width: Option<Width>,
) -> Option<&'static OpcodeEntry> {
    table
        .iter()
        .find(|entry| entry.key == key && entry.admits(width))
}

/// Finds the row encoding `operation` at `width`; the builder's direction.
#[must_use]
pub fn lookup_key(
    table: &'static [OpcodeEntry],
    operation: Operation,
    width: Option<Width>,
) -> Option<&'static OpcodeEntry> {
    table
        .iter()
        .find(|entry| entry.operation == operation && entry.admits(width))
}

/// Behaviour every terminal shape provides on top of its [`Layout`].
pub trait Terminal: Layout + Into<Shape> {
    /// Fieldless identity.
    const KIND: ShapeKind;
    /// Discriminator table, searched in order.
    const OPCODES: &'static [OpcodeEntry];
    /// Operation used when no table row matches.
    const FALLBACK: Option<Operation> = None;

    /// Current value of the opcode sub-fields, concatenated.
    fn opcode_key(&self) -> u32;

    /// Writes the opcode sub-fields from a table key.
    fn set_opcode_key(&mut self, key: u32);

    /// Width used to select among width-restricted rows, when the shape
    /// carries one in its own fields.
    fn opcode_width(&self) -> Option<Width> {
        None
    }

    /// Recognized encoding without an implementation.
    fn is_unsupported(&self) -> bool {
        false
    }

    /// Reserved combination of otherwise valid fields.
    fn is_reserved(&self) -> bool {
        false
    }
}

/// Decodes `word` as shape `S` without consulting the decode tree.
///
/// Unsupported checks run first, then enforced constants, reserved
/// combinations and the opcode table, in that order.
///
/// # Errors
///
/// See [`ShapeKind::instantiate`].
pub fn instantiate<S: Terminal>(word: u32) -> Result<(Operation, S), DecodeError> {
    let shape = S::from_word(word);
    if shape.is_unsupported() {
        return Err(DecodeError::Unsupported {
            word,
            family: S::KIND.family(),
        });
    }
    if !shape.confirms() || shape.is_reserved() {
        return Err(DecodeError::Unrecognized { word });
    }
    let operation = lookup_operation(S::OPCODES, shape.opcode_key(), shape.opcode_width())
        .map(|entry| entry.operation)
        .or(S::FALLBACK)
        .ok_or(DecodeError::Unrecognized { word })?;
    Ok((operation, shape))
}

/// Generates a family enum wrapping terminal shapes of the same name.
macro_rules! shape_family {
    (
        $(#[$meta:meta])*
        pub enum $family:ident in $outer:ident { $( $variant:ident ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $family {
            $(
                #[doc = concat!("`", stringify!($variant), "` encoding.")]
                $variant($variant),
            )*
        }

        impl $family {
            /// Fieldless identity of the wrapped shape.
            #[must_use]
            pub const fn kind(&self) -> $crate::shape::ShapeKind {
                match self {
                    $( Self::$variant(_) => $crate::shape::ShapeKind::$variant, )*
                }
            }

            /// Staged fields of the wrapped shape.
            #[must_use]
            pub fn fields(&self) -> Vec<$crate::field::RawField> {
                match self {
                    $( Self::$variant(shape) => $crate::field::Layout::fields(shape), )*
                }
            }

            /// Operand width of the wrapped shape.
            #[must_use]
            pub fn width(&self) -> $crate::register::Width {
                match self {
                    $( Self::$variant(shape) => shape.width(), )*
                }
            }
        }

        $(
            impl From<$variant> for $crate::shape::Shape {
                fn from(shape: $variant) -> Self {
                    Self::$outer($family::$variant(shape))
                }
            }
        )*
    };
}

pub(crate) use shape_family;

/// A terminal shape, grouped by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Data processing, immediate.
    DataImmediate(DataImmediateShape),
    /// Branch, exception generation and system.
    Branch(BranchShape),
    /// Loads and stores.
    LoadStore(LoadStoreShape),
    /// Data processing, register.
    DataRegister(DataRegisterShape),
}

impl Shape {
    /// Fieldless identity.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::DataImmediate(shape) => shape.kind(),
            Self::Branch(shape) => shape.kind(),
            Self::LoadStore(shape) => shape.kind(),
            Self::DataRegister(shape) => shape.kind(),
        }
    }

    /// Staged fields in declaration order, ancestors first.
    #[must_use]
    pub fn fields(&self) -> Vec<RawField> {
        match self {
            Self::DataImmediate(shape) => shape.fields(),
            Self::Branch(shape) => shape.fields(),
            Self::LoadStore(shape) => shape.fields(),
            Self::DataRegister(shape) => shape.fields(),
        }
    }

    /// Operand width.
    #[must_use]
    pub fn width(&self) -> Width {
        match self {
            Self::DataImmediate(shape) => shape.width(),
            Self::Branch(shape) => shape.width(),
            Self::LoadStore(shape) => shape.width(),
            Self::DataRegister(shape) => shape.width(),
        }
    }
}

/// A decoded or built instruction: an operation plus its shape's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    operation: Operation,
    shape: Shape,
}

impl Instruction {
    pub(crate) fn new(operation: Operation, shape: impl Into<Shape>) -> Self {
        Self {
            operation,
            shape: shape.into(),
        }
    }

    /// Decoded operation, used for execution dispatch.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Terminal shape and its fields.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Fieldless shape identity.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Encoding family.
    #[must_use]
    pub const fn family(&self) -> Family {
        self.shape.kind().family()
    }

    /// Operand width.
    #[must_use]
    pub fn width(&self) -> Width {
        self.shape.width()
    }

    /// Staged fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<RawField> {
        self.shape.fields()
    }

    /// Merges the fields back into a word.
    ///
    /// # Errors
    ///
    /// Propagates field merge failures, which indicate a malformed layout.
    pub fn encode(&self) -> Result<u32, EncodeError> {
        crate::field::merge(&self.fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_respects_width_restrictions() {
        let table = DataProcessing1Source::OPCODES;
        let rev_w = lookup_operation(table, 0b00_0010, Some(Width::W32)).map(|e| e.operation);
        let rev32_x = lookup_operation(table, 0b00_0010, Some(Width::X64)).map(|e| e.operation);
        assert_eq!(rev_w, Some(Operation::Rev));
        assert_eq!(rev32_x, Some(Operation::Rev32));
        assert!(lookup_operation(table, 0b00_0011, Some(Width::W32)).is_none());
        assert_eq!(
            lookup_key(table, Operation::Rev, Some(Width::X64)).map(|e| e.key),
            Some(0b00_0011)
        );
    }

    #[test]
    fn every_shape_kind_reports_its_family() {
        assert_eq!(ShapeKind::MoveWide.family(), Family::DataImmediate);
        assert_eq!(ShapeKind::TestBranch.family(), Family::BranchSystem);
        assert_eq!(ShapeKind::LoadStorePair.family(), Family::LoadStore);
        assert_eq!(ShapeKind::DataProcessing3Source.family(), Family::DataRegister);
    }

    #[test]
    fn wrong_shape_words_fail_confirmation() {
        let movz = 0xD280_00A0;
        assert!(instantiate::<MoveWide>(movz).is_ok());
        assert_eq!(
            instantiate::<AddSubImmediate>(movz).map(|(op, _)| op),
            Err(DecodeError::Unrecognized { word: movz })
        );
    }
}
