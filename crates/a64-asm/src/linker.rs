//! Pass 2: symbol resolution, encoding and image layout.
//!
//! Instructions that name labels come out of [`lower`] as
//! [`Deferred`](a64_core::Deferred) values. The linker substitutes each
//! label with the immediate the operation expects:
//!
//! - PC-relative operations receive `target - pc`
//! - `ADRP` receives the distance between the 4 KiB pages of target and pc
//! - everything else receives the absolute address

use a64_core::{BuildError, EncodeError, Linkable, Operation};
use log::debug;

use crate::mnemonic::lower;
use crate::parser::{DataValue, Directive, ParsedLine};
use crate::symbols::{AddressedLine, Assignment, SymbolTable};

const PAGE_MASK: u64 = !0xFFF;

/// Error during linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    /// Kind of error.
    pub kind: LinkErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
}

/// Classification of link errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkErrorKind {
    /// A label operand names no definition.
    UndefinedSymbol(String),
    /// The operands have no encoding.
    Build(BuildError),
    /// The built instruction failed to encode.
    Encode(EncodeError),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for LinkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedSymbol(name) => write!(f, "undefined symbol '{name}'"),
            Self::Build(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LinkError {}

/// An entry in the address-to-source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Address of this entry.
    pub address: u64,
    /// Bytes at this address.
    pub bytes: Vec<u8>,
    /// Source line number.
    pub line: usize,
}

/// A linked little-endian image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedImage {
    /// Load address of the first byte.
    pub base: u64,
    /// Image bytes.
    pub bytes: Vec<u8>,
    /// Per-line listing of emitted bytes.
    pub listing: Vec<ListingEntry>,
}

/// Immediate substituted for a label operand of `operation` at `pc`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn relocate(operation: Operation, target: u64, pc: u64) -> i64 {
    match operation {
        Operation::Adrp => (target & PAGE_MASK).wrapping_sub(pc & PAGE_MASK) as i64,
        // Only the literal form of a load can carry a label.
        Operation::Ldr | Operation::Ldrsw => target.wrapping_sub(pc) as i64,
        _ if operation.is_pc_relative() => target.wrapping_sub(pc) as i64,
        _ => target as i64,
    }
}

/// Links an address assignment into an image.
///
/// # Errors
///
/// The first [`LinkError`] in source order.
pub fn link(assignment: &Assignment) -> Result<LinkedImage, LinkError> {
    let capacity = usize::try_from(assignment.end_address - assignment.start_address).unwrap_or(0);
    let mut bytes = Vec::with_capacity(capacity);
    let mut listing = Vec::new();

    for addressed in &assignment.lines {
        let emitted = encode_line(addressed, &assignment.symbols).map_err(|kind| LinkError {
            kind,
            line: addressed.source_line,
        })?;

        if !emitted.is_empty() {
            listing.push(ListingEntry {
                address: addressed.address,
                bytes: emitted.clone(),
                line: addressed.source_line,
            });
        }

        bytes.extend(emitted);
    }

    Ok(LinkedImage {
        base: assignment.start_address,
        bytes,
        listing,
    })
}

fn encode_line(addressed: &AddressedLine, symbols: &SymbolTable) -> Result<Vec<u8>, LinkErrorKind> {
    match &addressed.parsed {
        ParsedLine::Blank | ParsedLine::Label { .. } => Ok(Vec::new()),
        ParsedLine::Directive { directive } => encode_directive(directive, addressed, symbols),
        ParsedLine::Instruction { instruction } => {
            let linkable =
                lower(instruction.resolution, &instruction.operands).map_err(build_error)?;
            let built = match linkable {
                Linkable::Ready(built) => built,
                Linkable::Deferred(deferred) => {
                    let operation = deferred.operation();
                    let pc = addressed.address;
                    debug!(
                        "line {}: resolving {:?} for {operation}",
                        addressed.source_line,
                        deferred.symbols()
                    );
                    deferred
                        .resolve(|name| {
                            symbols
                                .get(name)
                                .map(|symbol| relocate(operation, symbol.address, pc))
                        })
                        .map_err(build_error)?
                }
            };
            let word = built.encode().map_err(LinkErrorKind::Encode)?;
            Ok(word.to_le_bytes().to_vec())
        }
    }
}

fn build_error(error: BuildError) -> LinkErrorKind {
    match error {
        BuildError::UnresolvedSymbol(name) => LinkErrorKind::UndefinedSymbol(name),
        other => LinkErrorKind::Build(other),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_directive(
    directive: &Directive,
    addressed: &AddressedLine,
    symbols: &SymbolTable,
) -> Result<Vec<u8>, LinkErrorKind> {
    match directive {
        Directive::Word(values) => {
            let mut bytes = Vec::with_capacity(values.len() * 4);
            for value in values {
                let word = match value {
                    DataValue::Number(number) => *number as u32,
                    DataValue::Symbol(name) => {
                        symbols
                            .get(name)
                            .ok_or_else(|| LinkErrorKind::UndefinedSymbol(name.clone()))?
                            .address as u32
                    }
                };
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            Ok(bytes)
        }
        Directive::Ascii(text) => Ok(text.clone()),
        Directive::Asciz(text) => {
            let mut bytes = text.clone();
            bytes.push(0);
            Ok(bytes)
        }
        Directive::Align(_) => Ok(vec![0; usize::try_from(addressed.size).unwrap_or(0)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use crate::symbols::assign_addresses_with_lines;

    fn link_source(source: &str, base: u64) -> Result<LinkedImage, LinkError> {
        let mut lines = Vec::new();
        let mut numbers = Vec::new();
        for (i, text) in source.lines().enumerate() {
            for parsed in parse_line(text, i + 1).expect("line parses") {
                lines.push(parsed);
                numbers.push(i + 1);
            }
        }
        let assignment = assign_addresses_with_lines(&lines, base, &numbers).expect("assigns");
        link(&assignment)
    }

    fn words(image: &LinkedImage) -> Vec<u32> {
        a64_core::words_from_le_bytes(&image.bytes).expect("whole words")
    }

    #[test]
    fn relocation_rules() {
        assert_eq!(relocate(Operation::B, 0x1010, 0x1000), 0x10);
        assert_eq!(relocate(Operation::Cbz, 0x1000, 0x1008), -8);
        assert_eq!(relocate(Operation::Adrp, 0x3_2345, 0x1_0FFC), 0x2_2000);
        assert_eq!(relocate(Operation::Movz, 0x1234, 0x1000), 0x1234);
    }

    #[test]
    fn backward_and_forward_branches() {
        let image = link_source("top:\n  nop\n  b.ne top\n  b end\nend:\n  ret\n", 0x1000)
            .expect("links");
        assert_eq!(
            words(&image),
            vec![0xD503_201F, 0x54FF_FFE1, 0x1400_0001, 0xD65F_03C0]
        );
        assert_eq!(image.base, 0x1000);
        assert_eq!(image.listing.len(), 4);
        assert_eq!(image.listing[1].address, 0x1004);
        assert_eq!(image.listing[1].line, 3);
    }

    #[test]
    fn literal_loads_and_addresses_are_pc_relative() {
        let image = link_source("ldr x0, value\nadr x1, value\nvalue: .word 7, 0\n", 0)
            .expect("links");
        assert_eq!(words(&image), vec![0x5800_0040, 0x1000_0021, 7, 0]);
    }

    #[test]
    fn data_words_hold_absolute_addresses() {
        let image = link_source("nop\nptr: .word ptr\n", 0x2000).expect("links");
        assert_eq!(words(&image)[1], 0x2004);
    }

    #[test]
    fn undefined_symbols_are_located() {
        let err = link_source("nop\nbl missing\n", 0).expect_err("undefined");
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, LinkErrorKind::UndefinedSymbol("missing".into()));
    }

    #[test]
    fn strings_and_padding_are_emitted() {
        let image = link_source(".asciz \"hi\"\n.align 2\nnop\n", 0).expect("links");
        assert_eq!(&image.bytes[..4], b"hi\0\0");
        assert_eq!(image.bytes.len(), 8);
    }
}
