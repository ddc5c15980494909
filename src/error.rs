use std::fmt;

use thiserror::Error;

/// Result alias for operations that may produce a [`ParseError`].
pub type ParseResult<T> = Result<T, ParseError>;

/// A parse failure, pinpointed by its byte offset into the input text.
///
/// Offsets are always absolute, even when the failure occurred inside a
/// nested block subview, so callers can map them straight back to a cursor
/// position in the edited text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        ParseError { kind, offset }
    }
}

/// Everything that can go wrong while parsing the textual class notation.
///
/// These are ordinary values, not panics: grammar alternatives inspect them
/// to decide whether to try the next alternative, and every failure bubbles
/// to the top-level [`parse`](crate::parser::parse) call unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("read past end of input")]
    OutOfRange,
    #[error("pair needs to contain '='")]
    MissingDelimiter,
    #[error("'}}' expected")]
    UnterminatedBlock,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("missing property '{0}'")]
    MissingProperty(String),
    #[error("unknown instruction '{0}'")]
    InvalidInstruction(String),
    #[error("invalid operand '{0}'")]
    InvalidOperand(String),
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),
    #[error("duplicate info block")]
    DuplicateInfoBlock,
    #[error("unsupported attribute '{0}'")]
    UnsupportedAttribute(String),
    #[error("raw attributes can't have child attributes")]
    RawAttributeWithChildren,
    #[error("invalid number")]
    NumberFormat,
}

/// Errors that can occur while rendering a class model back into text.
///
/// These indicate a corrupt model (dangling pool indices, entries of the
/// wrong kind) rather than bad user input.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("constant pool index {0} is unusable or out of range")]
    BadPoolIndex(u16),
    #[error("expected a {expected} entry at constant pool index {index}")]
    UnexpectedEntry { index: u16, expected: &'static str },
    #[error("unknown opcode byte 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error(transparent)]
    Fmt(#[from] fmt::Error),
}
