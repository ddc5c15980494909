//! classtext is a two-way textual notation for JVM class files: it renders
//! an in-memory class model as editable brace-delimited text and parses
//! that text back, byte-faithfully, into the model.
//!
//! The two entry points are [`render`] and [`parse`]. Parsing is
//! replace-on-success: it returns a new model and never mutates its input,
//! so a failed edit leaves the loaded class intact. Everything the text
//! references (class names, member descriptors, string and numeric
//! constants) resolves through the constant pool with insert-or-reuse
//! semantics, which keeps repeated parses from growing the pool.

pub mod assembler;
pub mod cursor;
pub mod error;
pub mod formatter;
pub mod materialize;
pub mod model;
pub mod opcodes;
pub mod parser;
pub mod pool_codec;
pub mod reader;

pub use cursor::Cursor;
pub use error::{FormatError, ParseError, ParseErrorKind, ParseResult};
pub use formatter::render;
pub use model::{
    AccessFlags, Attribute, ClassModel, CodeAttribute, ConstantPool, FieldModel, MethodModel,
    PoolEntry, RawAttribute, StackMapFrame, StackMapTableAttribute, VerificationType,
};
pub use opcodes::{Instruction, Opcode};
pub use parser::{parse, ParsedAttribute, ParsedField, ParsedMethod};
