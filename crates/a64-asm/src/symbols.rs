//! Symbol table and pass-1 address assignment.
//!
//! This module implements the first pass of assembly: walking parsed lines,
//! assigning addresses to each instruction and datum, and building a symbol
//! table of label definitions. Every instruction is one 32-bit word, so no
//! instruction needs to be built before its address is known.

use std::collections::HashMap;

use a64_core::INSTRUCTION_BYTES;

use crate::parser::{Directive, ParsedLine};

/// A symbol (label) with its assigned address and definition location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The address assigned to this label.
    pub address: u64,
    /// Source line number where the label was defined.
    pub defined_at: usize,
}

/// Symbol table mapping label names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

/// Error during symbol table construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    /// Kind of error.
    pub kind: SymbolErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
}

/// Classification of symbol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolErrorKind {
    /// Duplicate label definition.
    DuplicateLabel {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
    /// Address overflow past the 64-bit address space.
    AddressOverflow,
    /// Instruction placed at an address that is not word aligned.
    MisalignedInstruction {
        /// The unaligned address.
        address: u64,
    },
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for SymbolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateLabel {
                name,
                first_definition,
            } => {
                write!(
                    f,
                    "duplicate label '{name}' (first defined at line {first_definition})"
                )
            }
            Self::AddressOverflow => write!(f, "address overflow"),
            Self::MisalignedInstruction { address } => {
                write!(
                    f,
                    "instruction at 0x{address:X} is not word aligned (add `.align 2`)"
                )
            }
        }
    }
}

impl std::error::Error for SymbolError {}

/// A line with its assigned address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedLine {
    /// The address where this line's content begins.
    pub address: u64,
    /// The size in bytes of this line's content.
    pub size: u64,
    /// The parsed line content.
    pub parsed: ParsedLine,
    /// Original source line number.
    pub source_line: usize,
}

/// Result of pass-1 address assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Address of the first byte.
    pub start_address: u64,
    /// All lines with their assigned addresses.
    pub lines: Vec<AddressedLine>,
    /// Symbol table of label definitions.
    pub symbols: SymbolTable,
    /// Final address after all content (one past the last byte).
    pub end_address: u64,
}

/// Computes the byte size of a parsed line placed at `address`.
///
/// - Instructions: 4 bytes
/// - `.word`: 4 bytes per value
/// - `.ascii`: string length in bytes
/// - `.asciz`: string length plus the terminator
/// - `.align n`: zero padding up to the next multiple of `2^n`
/// - Labels/blank: 0 bytes
#[must_use]
pub fn line_size(parsed: &ParsedLine, address: u64) -> u64 {
    match parsed {
        ParsedLine::Blank | ParsedLine::Label { .. } => 0,
        ParsedLine::Instruction { .. } => INSTRUCTION_BYTES as u64,
        ParsedLine::Directive { directive } => directive_size(directive, address),
    }
}

fn directive_size(directive: &Directive, address: u64) -> u64 {
    match directive {
        Directive::Word(values) => values.len() as u64 * 4,
        Directive::Ascii(bytes) => bytes.len() as u64,
        Directive::Asciz(bytes) => bytes.len() as u64 + 1,
        Directive::Align(power) => {
            address
                .checked_next_multiple_of(1u64 << power)
                .map_or(0, |aligned| aligned - address)
        }
    }
}

/// Performs pass-1 address assignment on parsed lines numbered from 1.
///
/// # Errors
///
/// As [`assign_addresses_with_lines`].
pub fn assign_addresses(
    lines: &[ParsedLine],
    start_address: u64,
) -> Result<Assignment, SymbolError> {
    assign_addresses_with_lines(lines, start_address, &(1..=lines.len()).collect::<Vec<_>>())
}

/// Performs pass-1 address assignment with explicit source line numbers.
///
/// One source line may produce several parsed items (a label and the
/// instruction after it), so `source_lines` maps each item to its line.
///
/// # Errors
///
/// Returns a `SymbolError` if:
/// - A label is defined twice (`DuplicateLabel`)
/// - The address counter overflows (`AddressOverflow`)
/// - An instruction does not start on a word boundary (`MisalignedInstruction`)
pub fn assign_addresses_with_lines(
    lines: &[ParsedLine],
    start_address: u64,
    source_lines: &[usize],
) -> Result<Assignment, SymbolError> {
    let mut symbols = SymbolTable::new();
    let mut addressed = Vec::with_capacity(lines.len());
    let mut pc = start_address;

    for (i, parsed) in lines.iter().enumerate() {
        let source_line = *source_lines.get(i).unwrap_or(&(i + 1));
        let size = line_size(parsed, pc);

        match parsed {
            ParsedLine::Label { name } => {
                if let Some(existing) = symbols.get(name) {
                    return Err(SymbolError {
                        kind: SymbolErrorKind::DuplicateLabel {
                            name: name.clone(),
                            first_definition: existing.defined_at,
                        },
                        line: source_line,
                    });
                }
                symbols.insert(
                    name.clone(),
                    Symbol {
                        address: pc,
                        defined_at: source_line,
                    },
                );
            }
            ParsedLine::Instruction { .. } if pc % INSTRUCTION_BYTES as u64 != 0 => {
                return Err(SymbolError {
                    kind: SymbolErrorKind::MisalignedInstruction { address: pc },
                    line: source_line,
                });
            }
            _ => {}
        }

        addressed.push(AddressedLine {
            address: pc,
            size,
            parsed: parsed.clone(),
            source_line,
        });

        pc = pc.checked_add(size).ok_or(SymbolError {
            kind: SymbolErrorKind::AddressOverflow,
            line: source_line,
        })?;
    }

    Ok(Assignment {
        start_address,
        lines: addressed,
        symbols,
        end_address: pc,
    })
}
