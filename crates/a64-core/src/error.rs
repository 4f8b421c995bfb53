//! Error taxonomy for decode, encode, build and execution.
//!
//! The four domains are disjoint. Callers that surface errors to users can
//! tell an invalid encoding ([`DecodeError::Unrecognized`]) apart from a valid
//! but unimplemented one ([`DecodeError::Unsupported`],
//! [`ExecuteError::Unsupported`]) through `is_unsupported`.

use thiserror::Error;

use crate::operand::ShiftKind;
use crate::operation::Operation;
use crate::register::{Register, Width};
use crate::shape::{Family, ShapeKind};

/// Decoding a raw word failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// Input was too short to hold an instruction word.
    #[error("malformed input: {available} byte(s) available, 4 required")]
    Malformed {
        /// Bytes that were available.
        available: usize,
    },
    /// No shape matches the bit pattern, or it is reserved.
    #[error("unrecognized encoding {word:#010x}")]
    Unrecognized {
        /// The offending word.
        word: u32,
    },
    /// The pattern is valid A64 but deliberately not implemented.
    #[error("unsupported {family} encoding {word:#010x}")]
    Unsupported {
        /// The offending word.
        word: u32,
        /// Family the word belongs to.
        family: Family,
    },
    /// A shape-specific entry point was handed a word of another shape.
    #[error("expected {expected:?} encoding, found {found:?}")]
    WrongShape {
        /// Shape the caller asked for.
        expected: ShapeKind,
        /// Shape the word actually resolves to.
        found: ShapeKind,
    },
}

impl DecodeError {
    /// Returns `true` for valid-but-unimplemented encodings.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Merging fields into a word failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum EncodeError {
    /// A field's range does not fit the 32-bit word.
    #[error("field `{field}` range [{lo}, {hi}) does not fit a 32-bit word")]
    RangeMismatch {
        /// Field name.
        field: &'static str,
        /// Declared low bit.
        lo: u32,
        /// Declared high bit (exclusive).
        hi: u32,
    },
    /// Two fields claim the same bits.
    #[error("fields `{first}` and `{second}` overlap")]
    Overlap {
        /// Earlier field.
        first: &'static str,
        /// Later field.
        second: &'static str,
    },
    /// The field's codec has no encoding for the value.
    #[error("value cannot be represented in field `{field}`")]
    Unrepresentable {
        /// Field name.
        field: &'static str,
    },
}

/// Building an instruction from operands failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Register operands disagree with the requested width.
    #[error("register {register} does not match {width:?} operation")]
    MixedWidth {
        /// Requested width.
        width: Width,
        /// Offending register.
        register: Register,
    },
    /// Wrong number of operands for the operation.
    #[error("{operation} takes {expected} operand(s), got {found}")]
    OperandCount {
        /// Operation being built.
        operation: Operation,
        /// Operand count accepted.
        expected: &'static str,
        /// Operand count supplied.
        found: usize,
    },
    /// An operand had the wrong kind for its position.
    #[error("operand {position} of {operation} must be {expected}")]
    OperandKind {
        /// Operation being built.
        operation: Operation,
        /// Zero-based operand position.
        position: usize,
        /// Description of the accepted kind.
        expected: &'static str,
    },
    /// The immediate has no encoding in any shape for this operation.
    #[error("immediate {value:#x} cannot be encoded for {operation}")]
    UnencodableImmediate {
        /// Operation being built.
        operation: Operation,
        /// Offending value.
        value: i64,
    },
    /// A scaled offset is not a multiple of the access size.
    #[error("offset {offset} is not a multiple of {scale} for {operation}")]
    MisalignedOffset {
        /// Operation being built.
        operation: Operation,
        /// Offending offset.
        offset: i64,
        /// Required alignment in bytes.
        scale: u64,
    },
    /// No shape encodes the operation with the given operands and width.
    #[error("{operation} has no {width:?} encoding for these operands")]
    UnsupportedOperation {
        /// Operation being built.
        operation: Operation,
        /// Requested width.
        width: Width,
    },
    /// A symbolic operand was never resolved.
    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),
    /// Field merge failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// A delegate refused a state access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DelegateError {
    /// Memory access outside the backing store.
    #[error("memory access of {size} byte(s) at {address:#x} is out of bounds")]
    OutOfBounds {
        /// Start address.
        address: u64,
        /// Access size in bytes.
        size: u64,
    },
    /// The delegate does not implement accesses of this size.
    #[error("{size}-byte memory accesses are not supported")]
    UnsupportedAccess {
        /// Access size in bytes.
        size: u64,
    },
    /// The delegate does not accept this register.
    #[error("register {0} is not accessible")]
    Register(Register),
    /// The syscall hook rejected the call.
    #[error("system call {0} failed")]
    Syscall(u64),
}

/// Executing a decoded instruction failed. Delegate state is unchanged
/// unless documented otherwise by the failing handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    /// Recognized instruction without execution semantics.
    #[error("{operation} is not supported by the execution engine")]
    Unsupported {
        /// Operation that has no handler.
        operation: Operation,
    },
    /// A required field decoded to no value.
    #[error("field `{field}` has no valid value")]
    MissingValue {
        /// Field name.
        field: &'static str,
    },
    /// Operand register width disagrees with the instruction.
    ///
    /// Decoded instructions derive every register from the shape's `sf`
    /// bit, so the engine never reports this for them.
    #[error("register {register} does not match {expected:?} operation")]
    WrongRegister {
        /// Width the instruction requires.
        expected: Width,
        /// Offending register.
        register: Register,
    },
    /// The shift kind is not valid for this instruction.
    #[error("{0} shift is not valid here")]
    UnsupportedShift(ShiftKind),
    /// The delegate rejected an access.
    #[error(transparent)]
    Delegate(#[from] DelegateError),
}

impl ExecuteError {
    /// Returns `true` for valid-but-unimplemented instructions.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
