//! AArch64 A64 instruction encoder, decoder and single-instruction
//! execution engine.

/// Bit slicing and bitmask-immediate helpers.
pub mod bits;
pub use bits::{decode_bitmask, encode_bitmask, sign_extend};

/// Field descriptors and layout merging.
pub mod field;
pub use field::{merge, BitRange, FieldDescriptor, Layout, RawField};

/// General-purpose register names and widths.
pub mod register;
pub use register::{IndexContext, Register, Width};

/// Condition codes.
pub mod condition;
pub use condition::Condition;

/// NZCV condition flags.
pub mod flags;
pub use flags::{ConditionFlags, Flag};

/// Shift, extend and index-mode operand kinds.
pub mod operand;
pub use operand::{ExtendKind, IndexMode, ShiftKind};

/// Error types for decoding, encoding, building and execution.
pub mod error;
pub use error::{BuildError, DecodeError, DelegateError, EncodeError, ExecuteError};

/// Operation identities and mnemonics.
pub mod operation;
pub use operation::Operation;

/// Instruction shapes, families and the decoded instruction value.
pub mod shape;
pub use shape::{Family, Instruction, Shape, ShapeKind};

/// Top-level encoding classes.
pub mod encoding;
pub use encoding::{classify_root, RootClass};

/// Word to instruction decoding.
pub mod decoder;
pub use decoder::{decode, decode_as, decode_le_bytes, INSTRUCTION_BYTES};

/// Preferred disassembly aliases.
pub mod alias;
pub use alias::Alias;

/// Instruction construction from operation and operands.
pub mod builder;
pub use builder::{build, build_linkable, Deferred, LinkOperand, Linkable, MemoryOffset, Operand};

/// Single-instruction execution.
pub mod execute;
pub use execute::{
    commit_execution, execute, plan, ExecuteOutcome, ExecuteState, ExecutionDelegate,
    FlagsUpdate, PendingStore,
};

/// Text disassembly.
pub mod disasm;
pub use disasm::{disassemble, disassemble_listing, DisassemblyBuilder, DisassemblyRow};

/// Flat-memory reference machine.
pub mod machine;
pub use machine::{
    words_from_le_bytes, Machine, MachineConfig, MachineError, RunOutcome, RunStop, TraceEvent,
    TraceSink,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
