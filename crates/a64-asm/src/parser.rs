//! Assembly source line parser for instructions, labels, and directives.
//!
//! Converts raw source lines into [`ParsedLine`] items ready for address
//! assignment and linking. Operand text is parsed into typed operands here;
//! bare identifiers stay unresolved because whether `eq` is a condition, a
//! system register or a label depends on the mnemonic.

use a64_core::{ExtendKind, IndexMode, MemoryOffset, Register, ShiftKind};

use crate::mnemonic::{resolve_mnemonic, Mnemonic};

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOperand {
    /// General-purpose register, `sp` or zero register.
    Register(Register),
    /// Numeric immediate, with or without `#`.
    Immediate(i64),
    /// Label, condition name or system register name.
    Identifier(String),
    /// `lsl #n` and friends.
    Shift(ShiftKind, u32),
    /// `uxtw #n` and friends.
    Extend(ExtendKind, u32),
    /// Bracketed memory operand, including a trailing post-index immediate.
    Memory {
        /// Base register.
        base: Register,
        /// Offset from the base.
        offset: MemoryOffset,
        /// Writeback behaviour.
        mode: IndexMode,
    },
}

/// A parsed instruction with all operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// The mnemonic string as written.
    pub mnemonic: String,
    /// Resolved mnemonic.
    pub resolution: Mnemonic,
    /// Operands in source order.
    pub operands: Vec<ParsedOperand>,
}

/// A value in a data directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// Literal number.
    Number(i64),
    /// Address of a label.
    Symbol(String),
}

/// A parsed data directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `.word v, ...` - emit 32-bit little-endian values.
    Word(Vec<DataValue>),
    /// `.ascii "str"` - emit string bytes.
    Ascii(Vec<u8>),
    /// `.asciz "str"` - emit string bytes and a terminating zero.
    Asciz(Vec<u8>),
    /// `.align n` - pad with zeros to a multiple of `2^n` bytes.
    Align(u32),
}

/// A single parsed source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Empty or comment-only line.
    Blank,
    /// Label definition.
    Label {
        /// Label name.
        name: String,
    },
    /// Data directive.
    Directive {
        /// The parsed directive.
        directive: Directive,
    },
    /// Instruction line.
    Instruction {
        /// The parsed instruction.
        instruction: ParsedInstruction,
    },
}

/// Parse error with source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-indexed line number.
    pub line: usize,
    /// Kind of parse error.
    pub kind: ParseErrorKind,
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unknown or invalid mnemonic.
    UnknownMnemonic(String),
    /// Register name not recognised.
    InvalidRegister(String),
    /// Malformed immediate value.
    InvalidImmediate(String),
    /// Malformed memory operand.
    InvalidMemoryOperand(String),
    /// Unknown directive name.
    InvalidDirective(String),
    /// Invalid value for directive.
    InvalidDirectiveValue(String),
    /// General syntax error.
    InvalidSyntax(String),
    /// String literal missing closing quote.
    UnterminatedString,
    /// Required operand missing.
    MissingOperand,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMnemonic(m) => write!(f, "unknown mnemonic: {m}"),
            Self::InvalidRegister(r) => write!(f, "invalid register: {r}"),
            Self::InvalidImmediate(v) => write!(f, "invalid immediate value: {v}"),
            Self::InvalidMemoryOperand(m) => write!(f, "invalid memory operand: {m}"),
            Self::InvalidDirective(d) => write!(f, "unknown directive: {d}"),
            Self::InvalidDirectiveValue(v) => write!(f, "invalid directive value: {v}"),
            Self::InvalidSyntax(s) => write!(f, "invalid syntax: {s}"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::MissingOperand => write!(f, "missing operand"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a single line; a label followed by content yields two
/// items.
pub type ParseResult = Result<Vec<ParsedLine>, ParseError>;

const fn error(line: usize, kind: ParseErrorKind) -> ParseError {
    ParseError { line, kind }
}

/// Parses a source line.
///
/// # Errors
///
/// Returns a `ParseError` if the line contains invalid syntax, unknown
/// mnemonics or malformed operands.
pub fn parse_line(line: &str, line_number: usize) -> ParseResult {
    let stripped = strip_comment(line);
    let trimmed = stripped.trim();

    if trimmed.is_empty() {
        return Ok(vec![ParsedLine::Blank]);
    }

    if let Some((label, rest)) = split_label(trimmed) {
        let mut items = vec![ParsedLine::Label { name: label }];
        let rest = rest.trim();
        if !rest.is_empty() {
            items.push(parse_directive_or_instruction(rest, line_number)?);
        }
        return Ok(items);
    }

    parse_directive_or_instruction(trimmed, line_number).map(|item| vec![item])
}

/// Cuts a `//` or `;` comment, ignoring markers inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut previous_slash = false;
    for (pos, ch) in line.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            ';' => return &line[..pos],
            '/' if previous_slash => return &line[..pos - 1],
            _ => {}
        }
        previous_slash = ch == '/';
    }
    line
}

fn split_label(text: &str) -> Option<(String, &str)> {
    let colon_pos = text.find(':')?;
    let label = text[..colon_pos].trim();
    is_valid_label(label).then(|| (label.to_string(), &text[colon_pos + 1..]))
}

fn is_valid_label(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() && first != '_' && first != '.' {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_directive_or_instruction(text: &str, line_number: usize) -> Result<ParsedLine, ParseError> {
    if text.starts_with('.') {
        parse_directive(text, line_number)
    } else {
        parse_instruction(text, line_number)
    }
}

fn parse_directive(text: &str, line_number: usize) -> Result<ParsedLine, ParseError> {
    let without_dot = &text[1..];
    let (name, args) = split_first_word(without_dot);

    let directive = match name.to_ascii_lowercase().as_str() {
        "word" => Directive::Word(parse_data_values(args, line_number)?),
        "ascii" => Directive::Ascii(parse_string_literal(args, line_number)?),
        "asciz" | "string" => Directive::Asciz(parse_string_literal(args, line_number)?),
        "align" | "p2align" => {
            let power = parse_numeric_value(args)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|power| *power <= 16)
                .ok_or_else(|| {
                    error(line_number, ParseErrorKind::InvalidDirectiveValue(args.to_string()))
                })?;
            Directive::Align(power)
        }
        _ => {
            return Err(error(
                line_number,
                ParseErrorKind::InvalidDirective(name.to_string()),
            ));
        }
    };

    Ok(ParsedLine::Directive { directive })
}

fn split_first_word(text: &str) -> (&str, &str) {
    text.find(char::is_whitespace)
        .map_or((text, ""), |pos| (&text[..pos], text[pos..].trim()))
}

fn parse_data_values(args: &str, line: usize) -> Result<Vec<DataValue>, ParseError> {
    if args.is_empty() {
        return Err(error(line, ParseErrorKind::MissingOperand));
    }
    split_operands(args)
        .into_iter()
        .map(|item| {
            if let Some(value) = parse_numeric_value(item.trim_start_matches('#')) {
                Ok(DataValue::Number(value))
            } else if is_valid_label(item) {
                Ok(DataValue::Symbol(item.to_string()))
            } else {
                Err(error(
                    line,
                    ParseErrorKind::InvalidDirectiveValue(item.to_string()),
                ))
            }
        })
        .collect()
}

fn parse_string_literal(s: &str, line: usize) -> Result<Vec<u8>, ParseError> {
    let Some(body) = s.trim().strip_prefix('"') else {
        return Err(error(
            line,
            ParseErrorKind::InvalidDirectiveValue("expected string literal".into()),
        ));
    };

    let mut bytes = Vec::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                let trailing = chars.as_str().trim();
                if !trailing.is_empty() {
                    return Err(error(
                        line,
                        ParseErrorKind::InvalidSyntax(format!("unexpected `{trailing}`")),
                    ));
                }
                return Ok(bytes);
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('0') => '\0',
                    Some(other) => other,
                    None => return Err(error(line, ParseErrorKind::UnterminatedString)),
                };
                push_char(&mut bytes, escaped);
            }
            other => push_char(&mut bytes, other),
        }
    }
    Err(error(line, ParseErrorKind::UnterminatedString))
}

fn push_char(bytes: &mut Vec<u8>, ch: char) {
    let mut buffer = [0; 4];
    bytes.extend_from_slice(ch.encode_utf8(&mut buffer).as_bytes());
}

fn parse_instruction(text: &str, line_number: usize) -> Result<ParsedLine, ParseError> {
    let (mnemonic, rest) = split_first_word(text);

    let resolution = resolve_mnemonic(mnemonic).ok_or_else(|| {
        error(
            line_number,
            ParseErrorKind::UnknownMnemonic(mnemonic.to_string()),
        )
    })?;

    let operands = parse_operands(&split_operands(rest), line_number)?;

    Ok(ParsedLine::Instruction {
        instruction: ParsedInstruction {
            mnemonic: mnemonic.to_string(),
            resolution,
            operands,
        },
    })
}

/// Splits on commas outside brackets and string literals.
fn split_operands(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;

    for (pos, ch) in text.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string => {
                items.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }

    let last = text[start..].trim();
    if !last.is_empty() || !items.is_empty() {
        items.push(last);
    }
    items
}

fn parse_operands(tokens: &[&str], line_number: usize) -> Result<Vec<ParsedOperand>, ParseError> {
    let mut operands = Vec::with_capacity(tokens.len());
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];
        if token.is_empty() {
            return Err(error(line_number, ParseErrorKind::MissingOperand));
        }

        if token.starts_with('[') {
            let (base, offset, mode) = parse_memory(token, line_number)?;
            let post_index = tokens.get(index + 1).and_then(|next| parse_immediate(next));
            match (post_index, mode, offset) {
                (Some(amount), IndexMode::Offset, MemoryOffset::Immediate(0))
                    if !token.contains(',') =>
                {
                    operands.push(ParsedOperand::Memory {
                        base,
                        offset: MemoryOffset::Immediate(amount),
                        mode: IndexMode::PostIndex,
                    });
                    index += 2;
                }
                _ => {
                    operands.push(ParsedOperand::Memory { base, offset, mode });
                    index += 1;
                }
            }
            continue;
        }

        operands.push(parse_operand(token, line_number)?);
        index += 1;
    }

    Ok(operands)
}

fn parse_operand(token: &str, line: usize) -> Result<ParsedOperand, ParseError> {
    if let Some(value) = parse_immediate(token) {
        return Ok(ParsedOperand::Immediate(value));
    }
    if token.starts_with('#') || token.starts_with('-') || token.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(error(line, ParseErrorKind::InvalidImmediate(token.to_string())));
    }
    if let Some(modifier) = parse_modifier(token, line)? {
        return Ok(modifier);
    }
    if let Some(register) = parse_register(token) {
        return Ok(ParsedOperand::Register(register));
    }
    if is_valid_label(token) {
        return Ok(ParsedOperand::Identifier(token.to_string()));
    }
    Err(error(line, ParseErrorKind::InvalidSyntax(token.to_string())))
}

/// Parses `lsl #n` style shifts and `uxtw {#n}` style extends.
fn parse_modifier(token: &str, line: usize) -> Result<Option<ParsedOperand>, ParseError> {
    let (name, amount_text) = split_first_word(token);
    let amount = if amount_text.is_empty() {
        None
    } else {
        let value = parse_immediate(amount_text)
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| error(line, ParseErrorKind::InvalidImmediate(amount_text.to_string())))?;
        Some(value)
    };

    if let Some(kind) = parse_shift_kind(name) {
        return match amount {
            Some(amount) => Ok(Some(ParsedOperand::Shift(kind, amount))),
            // Bare `lsl` falls through to the identifier rules.
            None => Ok(None),
        };
    }
    if let Some(kind) = ExtendKind::from_name(name) {
        return Ok(Some(ParsedOperand::Extend(kind, amount.unwrap_or(0))));
    }
    if amount.is_some() {
        return Err(error(line, ParseErrorKind::InvalidSyntax(token.to_string())));
    }
    Ok(None)
}

fn parse_shift_kind(name: &str) -> Option<ShiftKind> {
    (0..4)
        .filter_map(ShiftKind::from_u2)
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
}

type MemoryParts = (Register, MemoryOffset, IndexMode);

fn parse_memory(token: &str, line: usize) -> Result<MemoryParts, ParseError> {
    let invalid = || error(line, ParseErrorKind::InvalidMemoryOperand(token.to_string()));

    let (inner, writeback) = match token.strip_suffix('!') {
        Some(rest) => (rest.trim_end(), true),
        None => (token, false),
    };
    let inner = inner
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(invalid)?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let base = parse_register(parts[0])
        .filter(|base| base.width() == a64_core::Width::X64 && !base.is_zero())
        .ok_or_else(|| error(line, ParseErrorKind::InvalidRegister(parts[0].to_string())))?;

    let offset = match parts.as_slice() {
        [_] => MemoryOffset::Immediate(0),
        [_, offset] => match parse_immediate(offset) {
            Some(value) => MemoryOffset::Immediate(value),
            None => index_offset(offset, None, line)?,
        },
        [_, index, modifier] => index_offset(index, Some(*modifier), line)?,
        _ => return Err(invalid()),
    };

    let mode = match (writeback, offset) {
        (false, _) => IndexMode::Offset,
        (true, MemoryOffset::Immediate(_)) => IndexMode::PreIndex,
        (true, MemoryOffset::Register { .. }) => return Err(invalid()),
    };

    Ok((base, offset, mode))
}

fn index_offset(index: &str, modifier: Option<&str>, line: usize) -> Result<MemoryOffset, ParseError> {
    let index = parse_register(index)
        .ok_or_else(|| error(line, ParseErrorKind::InvalidRegister(index.to_string())))?;
    let default_extend = match index.width() {
        a64_core::Width::X64 => ExtendKind::Uxtx,
        a64_core::Width::W32 => ExtendKind::Uxtw,
    };
    let (extend, amount) = match modifier {
        None => (default_extend, 0),
        Some(text) => match parse_modifier(text, line)? {
            Some(ParsedOperand::Shift(ShiftKind::Lsl, amount)) => (ExtendKind::Uxtx, amount),
            Some(ParsedOperand::Extend(kind, amount)) => (kind, amount),
            _ => {
                return Err(error(
                    line,
                    ParseErrorKind::InvalidMemoryOperand(text.to_string()),
                ))
            }
        },
    };
    Ok(MemoryOffset::Register {
        index,
        extend,
        amount,
    })
}

/// Parses a register name, including the `lr` and `fp` conventions.
#[must_use]
pub fn parse_register(s: &str) -> Option<Register> {
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
        "sp" => return Some(Register::Sp),
        "wsp" => return Some(Register::Wsp),
        "xzr" => return Some(Register::Xzr),
        "wzr" => return Some(Register::Wzr),
        "lr" => return Some(Register::LINK),
        "fp" => return Some(Register::FRAME),
        _ => {}
    }

    let mut chars = lower.chars();
    let prefix = chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    if n > 30 {
        return None;
    }
    match prefix {
        'x' => Some(Register::X(n)),
        'w' => Some(Register::W(n)),
        _ => None,
    }
}

/// Parses `#value` or a bare number.
fn parse_immediate(token: &str) -> Option<i64> {
    parse_numeric_value(token.strip_prefix('#').unwrap_or(token).trim())
}

/// Parses decimal, `0x` hexadecimal or `0b` binary, with an optional sign.
#[must_use]
pub fn parse_numeric_value(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let value = if let Some(hex) = magnitude
        .strip_prefix("0x")
        .or_else(|| magnitude.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = magnitude
        .strip_prefix("0b")
        .or_else(|| magnitude.strip_prefix("0B"))
    {
        u64::from_str_radix(bin, 2).ok()?
    } else {
        if !magnitude.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        magnitude.parse::<u64>().ok()?
    };

    #[allow(clippy::cast_possible_wrap)]
    let value = value as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use a64_core::Operation;

    fn instruction(line: &str) -> ParsedInstruction {
        match parse_line(line, 1).expect("line parses").pop() {
            Some(ParsedLine::Instruction { instruction }) => instruction,
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn parse_blank_and_comments() {
        assert_eq!(parse_line("", 1), Ok(vec![ParsedLine::Blank]));
        assert_eq!(parse_line("   // only a comment", 1), Ok(vec![ParsedLine::Blank]));
        assert_eq!(parse_line("; also a comment", 1), Ok(vec![ParsedLine::Blank]));
    }

    #[test]
    fn parse_label_with_instruction() {
        let items = parse_line("loop: subs x0, x0, #1 // count down", 3).expect("parses");
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            ParsedLine::Label {
                name: "loop".into()
            }
        );
        let ParsedLine::Instruction { instruction } = &items[1] else {
            panic!("expected instruction");
        };
        assert_eq!(instruction.resolution, Mnemonic::Operation(Operation::Subs));
        assert_eq!(
            instruction.operands,
            vec![
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Register(Register::X(0)),
                ParsedOperand::Immediate(1),
            ]
        );
    }

    #[test]
    fn parse_immediates() {
        assert_eq!(parse_numeric_value("42"), Some(42));
        assert_eq!(parse_numeric_value("0x2A"), Some(42));
        assert_eq!(parse_numeric_value("0b101010"), Some(42));
        assert_eq!(parse_numeric_value("-16"), Some(-16));
        assert_eq!(parse_numeric_value("label"), None);
    }

    #[test]
    fn parse_registers() {
        assert_eq!(parse_register("x30"), Some(Register::X(30)));
        assert_eq!(parse_register("W7"), Some(Register::W(7)));
        assert_eq!(parse_register("sp"), Some(Register::Sp));
        assert_eq!(parse_register("lr"), Some(Register::LINK));
        assert_eq!(parse_register("x31"), None);
        assert_eq!(parse_register("v0"), None);
    }

    #[test]
    fn parse_memory_forms() {
        let cases = [
            ("ldr x0, [x1]", MemoryOffset::Immediate(0), IndexMode::Offset),
            ("ldr x0, [x1, #8]", MemoryOffset::Immediate(8), IndexMode::Offset),
            ("ldr x0, [x1, #-8]!", MemoryOffset::Immediate(-8), IndexMode::PreIndex),
            ("ldr x0, [x1], #16", MemoryOffset::Immediate(16), IndexMode::PostIndex),
            (
                "ldr x0, [x1, x2, lsl #3]",
                MemoryOffset::Register {
                    index: Register::X(2),
                    extend: ExtendKind::Uxtx,
                    amount: 3,
                },
                IndexMode::Offset,
            ),
            (
                "ldr x0, [x1, w2, sxtw]",
                MemoryOffset::Register {
                    index: Register::W(2),
                    extend: ExtendKind::Sxtw,
                    amount: 0,
                },
                IndexMode::Offset,
            ),
        ];
        for (line, offset, mode) in cases {
            let parsed = instruction(line);
            assert_eq!(
                parsed.operands[1],
                ParsedOperand::Memory {
                    base: Register::X(1),
                    offset,
                    mode
                },
                "{line}"
            );
        }
    }

    #[test]
    fn parse_shift_and_extend_modifiers() {
        let parsed = instruction("add x0, x1, x2, lsl #4");
        assert_eq!(parsed.operands[3], ParsedOperand::Shift(ShiftKind::Lsl, 4));

        let parsed = instruction("add x0, sp, w2, uxtw #2");
        assert_eq!(parsed.operands[3], ParsedOperand::Extend(ExtendKind::Uxtw, 2));
    }

    #[test]
    fn parse_identifiers_and_conditional_branch() {
        let parsed = instruction("b.ne loop");
        assert!(matches!(parsed.resolution, Mnemonic::Conditional(_)));
        assert_eq!(parsed.operands, vec![ParsedOperand::Identifier("loop".into())]);

        let parsed = instruction("csel x0, x1, x2, eq");
        assert_eq!(parsed.operands[3], ParsedOperand::Identifier("eq".into()));
    }

    #[test]
    fn parse_directives() {
        assert_eq!(
            parse_line(".word 1, 0x10, start", 1),
            Ok(vec![ParsedLine::Directive {
                directive: Directive::Word(vec![
                    DataValue::Number(1),
                    DataValue::Number(16),
                    DataValue::Symbol("start".into()),
                ])
            }])
        );
        assert_eq!(
            parse_line(r#"msg: .asciz "hi;\n""#, 1),
            Ok(vec![
                ParsedLine::Label { name: "msg".into() },
                ParsedLine::Directive {
                    directive: Directive::Asciz(b"hi;\n".to_vec())
                }
            ])
        );
        assert_eq!(
            parse_line(".align 3", 1),
            Ok(vec![ParsedLine::Directive {
                directive: Directive::Align(3)
            }])
        );
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = parse_line("frobnicate x0", 7).expect_err("unknown mnemonic");
        assert_eq!(err.line, 7);
        assert_eq!(err.kind, ParseErrorKind::UnknownMnemonic("frobnicate".into()));

        let err = parse_line(".ascii \"open", 2).expect_err("unterminated");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);

        let err = parse_line("ldr x0, [x1, #8", 4).expect_err("bad memory");
        assert!(matches!(err.kind, ParseErrorKind::InvalidMemoryOperand(_)));

        let err = parse_line(".section text", 5).expect_err("unknown directive");
        assert_eq!(err.kind, ParseErrorKind::InvalidDirective("section".into()));
    }
}
