//! Top-level assembler pipeline.
//!
//! 1. **Parse**: every line, collecting all parse errors
//! 2. **Pass 1**: address assignment and symbol table construction
//! 3. **Pass 2**: lowering, symbol resolution and encoding
//!
//! The main entry point is [`assemble`], which takes a source file path and
//! a load address and returns the linked image plus a listing.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use a64_core::disasm::disassemble_word;
use log::debug;

use crate::errors::{AssemblerError, AssemblerErrorKind, ErrorCollection};
use crate::linker::{link, ListingEntry};
use crate::parser::parse_line;
use crate::symbols::{assign_addresses_with_lines, SymbolTable};

/// Result of assembly containing the image and metadata.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Load address of the first byte.
    pub base: u64,
    /// Assembled little-endian bytes.
    pub image: Vec<u8>,
    /// Address-to-source mapping for listing generation.
    pub listing: Vec<ListingEntry>,
    /// Label addresses.
    pub symbols: SymbolTable,
    /// Source text, one entry per line.
    source: Vec<String>,
}

impl Assembly {
    /// Source text of a 1-indexed line.
    #[must_use]
    pub fn source_line(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|index| self.source.get(index))
            .map_or("", |text| text.trim())
    }

    /// Renders the listing: address, bytes, disassembly and source.
    #[must_use]
    pub fn format_listing(&self) -> String {
        let mut out = String::new();
        for entry in &self.listing {
            let hex_bytes: String = entry
                .bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            let decoded = match <[u8; 4]>::try_from(entry.bytes.as_slice()) {
                Ok(word) if self.is_instruction(entry) => {
                    disassemble_word(entry.address, u32::from_le_bytes(word)).text
                }
                _ => String::new(),
            };
            let _ = writeln!(
                out,
                "{:08x}: {:<24} {:<28} ; {}",
                entry.address,
                hex_bytes,
                decoded,
                self.source_line(entry.line)
            );
        }
        out
    }

    fn is_instruction(&self, entry: &ListingEntry) -> bool {
        let text = self.source_line(entry.line);
        let body = text.split_once(':').map_or(text, |(_, rest)| rest).trim();
        !body.starts_with('.')
    }
}

/// Assembles source text.
///
/// `file` is only used to locate errors.
///
/// # Errors
///
/// Every parse error in the file, or the first pass-1 or pass-2 error.
pub fn assemble_source(source: &str, file: &Path, base: u64) -> Result<Assembly, ErrorCollection> {
    let mut errors = ErrorCollection::new();
    let mut parsed = Vec::new();
    let mut source_lines = Vec::new();

    for (index, text) in source.lines().enumerate() {
        let line_number = index + 1;
        match parse_line(text, line_number) {
            Ok(items) => {
                source_lines.extend(std::iter::repeat_n(line_number, items.len()));
                parsed.extend(items);
            }
            Err(error) => errors.push(AssemblerError::parse(file, error)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let assignment = assign_addresses_with_lines(&parsed, base, &source_lines)
        .map_err(|error| AssemblerError::symbol(file, error))?;
    debug!(
        "{}: {} symbols, {} bytes at {base:#x}",
        file.display(),
        assignment.symbols.len(),
        assignment.end_address - assignment.start_address
    );

    let linked = link(&assignment).map_err(|error| AssemblerError::link(file, error))?;

    Ok(Assembly {
        base: linked.base,
        image: linked.bytes,
        listing: linked.listing,
        symbols: assignment.symbols,
        source: source.lines().map(str::to_string).collect(),
    })
}

/// Assembles a source file.
///
/// # Errors
///
/// An I/O error when the file cannot be read, otherwise as
/// [`assemble_source`].
pub fn assemble(path: &Path, base: u64) -> Result<Assembly, ErrorCollection> {
    let source = fs::read_to_string(path).map_err(|e| {
        AssemblerError::new(AssemblerErrorKind::Io(format!(
            "{}: {e}",
            path.display()
        )))
    })?;
    assemble_source(&source, path, base)
}
