//! Structured error reporting for assembler phases.
//!
//! Every phase error is lifted into an [`AssemblerError`] carrying the file
//! and line it came from. Parse errors are collected across the whole file
//! before giving up, so one run reports every bad line.
//!
//! # Error Format
//!
//! ```text
//! program.s:10: error: unknown mnemonic: frob
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::linker::LinkError;
use crate::parser::ParseError;
use crate::symbols::SymbolError;

/// A source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    /// File path.
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
}

impl SourceLoc {
    /// Creates a new source location.
    #[must_use]
    pub fn new(file: &Path, line: usize) -> Self {
        Self {
            file: file.to_path_buf(),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A unified assembler error with source context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerError {
    /// The kind of error.
    pub kind: AssemblerErrorKind,
    /// Source location if available.
    pub location: Option<SourceLoc>,
}

impl AssemblerError {
    /// Creates a new assembler error.
    #[must_use]
    pub const fn new(kind: AssemblerErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Adds a source location to the error.
    #[must_use]
    pub fn with_location(mut self, loc: SourceLoc) -> Self {
        self.location = Some(loc);
        self
    }

    /// Formats the error for stderr output.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.location.as_ref().map_or_else(
            || format!("error: {}", self.kind),
            |loc| format!("{loc}: error: {}", self.kind),
        )
    }

    /// Lifts a parse error found in `file`.
    #[must_use]
    pub fn parse(file: &Path, error: ParseError) -> Self {
        let line = error.line;
        Self::new(AssemblerErrorKind::Parse(error)).with_location(SourceLoc::new(file, line))
    }

    /// Lifts a pass-1 error found in `file`.
    #[must_use]
    pub fn symbol(file: &Path, error: SymbolError) -> Self {
        let line = error.line;
        Self::new(AssemblerErrorKind::Symbol(error)).with_location(SourceLoc::new(file, line))
    }

    /// Lifts a pass-2 error found in `file`.
    #[must_use]
    pub fn link(file: &Path, error: LinkError) -> Self {
        let line = error.line;
        Self::new(AssemblerErrorKind::Link(error)).with_location(SourceLoc::new(file, line))
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AssemblerError {}

/// Classification of assembler errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerErrorKind {
    /// Source file could not be read.
    Io(String),
    /// Line-level syntax error.
    Parse(ParseError),
    /// Address assignment error.
    Symbol(SymbolError),
    /// Symbol resolution or encoding error.
    Link(LinkError),
}

impl fmt::Display for AssemblerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Link(e) => write!(f, "{e}"),
        }
    }
}

/// Every error reported by one assembler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCollection {
    /// Errors in source order.
    pub errors: Vec<AssemblerError>,
}

impl ErrorCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Appends an error.
    pub fn push(&mut self, error: AssemblerError) {
        self.errors.push(error);
    }

    /// Returns `true` when nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// One `file:line: error: message` line per error.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.errors
            .iter()
            .map(AssemblerError::format_for_stderr)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<AssemblerError> for ErrorCollection {
    fn from(error: AssemblerError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [only] => write!(f, "{only}"),
            [first, ..] => write!(f, "{first} (and {} more)", self.errors.len() - 1),
        }
    }
}

impl std::error::Error for ErrorCollection {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseErrorKind;

    #[test]
    fn stderr_format_names_file_and_line() {
        let error = AssemblerError::parse(
            Path::new("prog.s"),
            ParseError {
                line: 10,
                kind: ParseErrorKind::UnknownMnemonic("frob".into()),
            },
        );
        assert_eq!(
            error.format_for_stderr(),
            "prog.s:10: error: unknown mnemonic: frob"
        );
    }

    #[test]
    fn unlocated_errors_have_plain_prefix() {
        let error = AssemblerError::new(AssemblerErrorKind::Io("not found".into()));
        assert_eq!(error.format_for_stderr(), "error: I/O error: not found");
    }

    #[test]
    fn collection_reports_every_error() {
        let mut errors = ErrorCollection::new();
        assert!(errors.is_empty());
        for line in [2, 5] {
            errors.push(AssemblerError::parse(
                Path::new("a.s"),
                ParseError {
                    line,
                    kind: ParseErrorKind::MissingOperand,
                },
            ));
        }
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.format_for_stderr(),
            "a.s:2: error: missing operand\na.s:5: error: missing operand"
        );
        assert_eq!(errors.to_string(), "a.s:2: missing operand (and 1 more)");
    }
}
