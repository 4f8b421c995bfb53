//! Two-pass A64 assembler and linker built on `a64-core`.

use env_logger as _;
#[cfg(test)]
use tempfile as _;

/// Top-level two-pass assembler pipeline.
pub mod assembler;
/// Structured, located error types.
pub mod errors;
/// Pass 2: symbol resolution and image layout.
pub mod linker;
/// Mnemonic resolution to instruction builders.
pub mod mnemonic;
/// Assembly parser for instructions, labels, and directives.
pub mod parser;
/// Symbol table and pass-1 address assignment.
pub mod symbols;
