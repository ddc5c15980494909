//! Canonical `tag{field:field:...}` text for constant pool entries.
//!
//! Rendering resolves every reference through the pool, so the text is
//! self-contained: a method ref carries its owner class name, member name
//! and descriptor rather than pool indices. Decoding goes the other way
//! through insert-or-reuse, so the same text always lands on the same pool
//! slot no matter how often or in what order it appears.

use crate::cursor::Cursor;
use crate::error::{FormatError, ParseError, ParseErrorKind, ParseResult};
use crate::model::{ConstantPool, PoolEntry};

/// JVM method handle kinds by their textual names.
const HANDLE_KINDS: &[(u8, &str)] = &[
    (1, "getfield"),
    (2, "getstatic"),
    (3, "putfield"),
    (4, "putstatic"),
    (5, "invokevirtual"),
    (6, "invokestatic"),
    (7, "invokespecial"),
    (8, "newinvokespecial"),
    (9, "invokeinterface"),
];

fn handle_kind_name(kind: u8) -> Option<&'static str> {
    HANDLE_KINDS
        .iter()
        .find(|(byte, _)| *byte == kind)
        .map(|(_, name)| *name)
}

fn handle_kind_byte(name: &str) -> Option<u8> {
    HANDLE_KINDS
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(byte, _)| *byte)
}

/// Escapes the characters the codec grammar reserves: `\`, `{`, `}`, `:`.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '{' | '}' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits content on unescaped `:` and unescapes each field.
fn split_fields(content: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn utf8_str(pool: &ConstantPool, index: u16) -> Result<&str, FormatError> {
    match pool.entry(index) {
        Some(PoolEntry::Utf8(value)) => Ok(value),
        Some(_) => Err(FormatError::UnexpectedEntry { index, expected: "utf8" }),
        None => Err(FormatError::BadPoolIndex(index)),
    }
}

fn class_str(pool: &ConstantPool, index: u16) -> Result<&str, FormatError> {
    match pool.entry(index) {
        Some(PoolEntry::Class { name_index }) => utf8_str(pool, *name_index),
        Some(_) => Err(FormatError::UnexpectedEntry { index, expected: "class" }),
        None => Err(FormatError::BadPoolIndex(index)),
    }
}

fn name_and_type_strs(pool: &ConstantPool, index: u16) -> Result<(&str, &str), FormatError> {
    match pool.entry(index) {
        Some(PoolEntry::NameAndType { name_index, descriptor_index }) => Ok((
            utf8_str(pool, *name_index)?,
            utf8_str(pool, *descriptor_index)?,
        )),
        Some(_) => Err(FormatError::UnexpectedEntry { index, expected: "nameandtype" }),
        None => Err(FormatError::BadPoolIndex(index)),
    }
}

/// `class:name:descriptor`, escaped, for the ref-style entries.
fn member_fields(
    pool: &ConstantPool,
    class_index: u16,
    name_and_type_index: u16,
) -> Result<String, FormatError> {
    let class = class_str(pool, class_index)?;
    let (name, descriptor) = name_and_type_strs(pool, name_and_type_index)?;
    Ok(format!(
        "{}:{}:{}",
        escape(class),
        escape(name),
        escape(descriptor)
    ))
}

/// Renders the pool entry at `index` as its canonical self-contained text.
pub fn format_entry(pool: &ConstantPool, index: u16) -> Result<String, FormatError> {
    let entry = pool
        .entry(index)
        .ok_or(FormatError::BadPoolIndex(index))?;
    let text = match entry {
        PoolEntry::Utf8(value) => format!("utf8{{{}}}", escape(value)),
        PoolEntry::Integer(value) => format!("integer{{{}}}", value),
        PoolEntry::Float(value) => format!("float{{{}}}", value),
        PoolEntry::Long(value) => format!("long{{{}}}", value),
        PoolEntry::Double(value) => format!("double{{{}}}", value),
        PoolEntry::Class { name_index } => {
            format!("class{{{}}}", escape(utf8_str(pool, *name_index)?))
        }
        PoolEntry::String { string_index } => {
            format!("string{{{}}}", escape(utf8_str(pool, *string_index)?))
        }
        PoolEntry::FieldRef { class_index, name_and_type_index } => {
            format!("field{{{}}}", member_fields(pool, *class_index, *name_and_type_index)?)
        }
        PoolEntry::MethodRef { class_index, name_and_type_index } => {
            format!("method{{{}}}", member_fields(pool, *class_index, *name_and_type_index)?)
        }
        PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => format!(
            "interfacemethod{{{}}}",
            member_fields(pool, *class_index, *name_and_type_index)?
        ),
        PoolEntry::NameAndType { name_index, descriptor_index } => format!(
            "nameandtype{{{}:{}}}",
            escape(utf8_str(pool, *name_index)?),
            escape(utf8_str(pool, *descriptor_index)?)
        ),
        PoolEntry::MethodHandle { kind, reference_index } => {
            let member = match pool.entry(*reference_index) {
                Some(
                    PoolEntry::FieldRef { class_index, name_and_type_index }
                    | PoolEntry::MethodRef { class_index, name_and_type_index }
                    | PoolEntry::InterfaceMethodRef { class_index, name_and_type_index },
                ) => member_fields(pool, *class_index, *name_and_type_index)?,
                Some(_) => {
                    return Err(FormatError::UnexpectedEntry {
                        index: *reference_index,
                        expected: "member reference",
                    })
                }
                None => return Err(FormatError::BadPoolIndex(*reference_index)),
            };
            match handle_kind_name(*kind) {
                Some(name) => format!("methodhandle{{{}:{}}}", name, member),
                None => format!("methodhandle{{{}:{}}}", kind, member),
            }
        }
        PoolEntry::MethodType { descriptor_index } => {
            format!("methodtype{{{}}}", escape(utf8_str(pool, *descriptor_index)?))
        }
        PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
            let (name, descriptor) = name_and_type_strs(pool, *name_and_type_index)?;
            format!(
                "invokedynamic{{{}:{}:{}}}",
                bootstrap_method_attr_index,
                escape(name),
                escape(descriptor)
            )
        }
        PoolEntry::Unusable => return Err(FormatError::BadPoolIndex(index)),
    };
    Ok(text)
}

/// Parses one `tag{...}` entry from the cursor and returns its pool index,
/// inserting through insert-or-reuse. The cursor is rewound on failure.
pub fn parse_entry(cur: &mut Cursor<'_>, pool: &mut ConstantPool) -> ParseResult<u16> {
    cur.strip_leading();
    let mark = cur.mark();
    match decode(cur, pool, mark) {
        Ok(index) => Ok(index),
        Err(err) => {
            cur.reset(mark);
            Err(err)
        }
    }
}

fn decode(cur: &mut Cursor<'_>, pool: &mut ConstantPool, mark: usize) -> ParseResult<u16> {
    let mut tag_len = 0;
    loop {
        match cur.peek(tag_len) {
            Ok(b'{') => break,
            Ok(b) if b.is_ascii_whitespace() => {
                let token = cur.clone().next_token().unwrap_or("").to_owned();
                return Err(ParseError::new(ParseErrorKind::UnexpectedToken(token), mark));
            }
            Ok(_) => tag_len += 1,
            Err(_) => {
                return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, mark))
            }
        }
    }
    let tag = cur.next(tag_len)?;
    let open = cur.mark();
    cur.advance(1)?;
    let mut content_len = 0;
    loop {
        match cur.peek(content_len) {
            Ok(b'\\') => content_len += 2,
            Ok(b'}') => break,
            Ok(_) => content_len += 1,
            Err(_) => return Err(ParseError::new(ParseErrorKind::UnterminatedBlock, open)),
        }
    }
    let content = cur.next(content_len)?;
    cur.advance(1)?;

    let fields = split_fields(content);
    let arity = |n: usize| -> ParseResult<()> {
        if fields.len() == n {
            Ok(())
        } else {
            Err(ParseError::new(
                ParseErrorKind::InvalidOperand(content.to_owned()),
                mark,
            ))
        }
    };
    let number_err = || ParseError::new(ParseErrorKind::NumberFormat, mark);

    let index = match tag {
        "utf8" => {
            arity(1)?;
            pool.utf8(&fields[0])
        }
        "integer" => {
            arity(1)?;
            let value: i32 = fields[0].parse().map_err(|_| number_err())?;
            pool.insert(PoolEntry::Integer(value))
        }
        "float" => {
            arity(1)?;
            let value: f32 = fields[0].parse().map_err(|_| number_err())?;
            pool.insert(PoolEntry::Float(value))
        }
        "long" => {
            arity(1)?;
            let value: i64 = fields[0].parse().map_err(|_| number_err())?;
            pool.insert(PoolEntry::Long(value))
        }
        "double" => {
            arity(1)?;
            let value: f64 = fields[0].parse().map_err(|_| number_err())?;
            pool.insert(PoolEntry::Double(value))
        }
        "class" => {
            arity(1)?;
            pool.class(&fields[0])
        }
        "string" => {
            arity(1)?;
            pool.string(&fields[0])
        }
        "nameandtype" => {
            arity(2)?;
            pool.name_and_type(&fields[0], &fields[1])
        }
        "field" | "method" | "interfacemethod" => {
            arity(3)?;
            let class_index = pool.class(&fields[0]);
            let name_and_type_index = pool.name_and_type(&fields[1], &fields[2]);
            let entry = match tag {
                "field" => PoolEntry::FieldRef { class_index, name_and_type_index },
                "method" => PoolEntry::MethodRef { class_index, name_and_type_index },
                _ => PoolEntry::InterfaceMethodRef { class_index, name_and_type_index },
            };
            pool.insert(entry)
        }
        "methodhandle" => {
            arity(4)?;
            let kind = match handle_kind_byte(&fields[0]) {
                Some(kind) => kind,
                None => fields[0].parse().map_err(|_| number_err())?,
            };
            let class_index = pool.class(&fields[1]);
            let name_and_type_index = pool.name_and_type(&fields[2], &fields[3]);
            // kinds 1-4 reference a field, 9 an interface method, the rest
            // a plain method
            let member = match kind {
                1..=4 => PoolEntry::FieldRef { class_index, name_and_type_index },
                9 => PoolEntry::InterfaceMethodRef { class_index, name_and_type_index },
                _ => PoolEntry::MethodRef { class_index, name_and_type_index },
            };
            let reference_index = pool.insert(member);
            pool.insert(PoolEntry::MethodHandle { kind, reference_index })
        }
        "methodtype" => {
            arity(1)?;
            let descriptor_index = pool.utf8(&fields[0]);
            pool.insert(PoolEntry::MethodType { descriptor_index })
        }
        "invokedynamic" => {
            arity(3)?;
            let bootstrap_method_attr_index: u16 =
                fields[0].parse().map_err(|_| number_err())?;
            let name_and_type_index = pool.name_and_type(&fields[1], &fields[2]);
            pool.insert(PoolEntry::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            })
        }
        other => {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken(other.to_owned()),
                mark,
            ))
        }
    };
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_text(text: &str, pool: &mut ConstantPool) -> ParseResult<u16> {
        let mut cur = Cursor::new(text);
        parse_entry(&mut cur, pool)
    }

    #[test]
    fn method_ref_round_trips() {
        let mut pool = ConstantPool::default();
        let index = parse_text("method{java/io/PrintStream:println:(I)V}", &mut pool)
            .expect("parse");
        let text = format_entry(&pool, index).expect("format");
        assert_eq!(text, "method{java/io/PrintStream:println:(I)V}");
    }

    #[test]
    fn identical_text_reuses_the_same_slot() {
        let mut pool = ConstantPool::default();
        let first = parse_text("class{java/lang/Object}", &mut pool).expect("parse");
        let len = pool.len();
        let second = parse_text("class{java/lang/Object}", &mut pool).expect("parse");
        assert_eq!(first, second);
        assert_eq!(pool.len(), len);
    }

    #[test]
    fn escaped_characters_survive_both_directions() {
        let mut pool = ConstantPool::default();
        let raw = "odd:{name}\\end";
        let index = pool.utf8(raw);
        let text = format_entry(&pool, index).expect("format");
        assert_eq!(text, "utf8{odd\\:\\{name\\}\\\\end}");
        let mut other = ConstantPool::default();
        let reparsed = parse_text(&text, &mut other).expect("parse");
        assert_eq!(other.utf8_at(reparsed), Some(raw));
    }

    #[test]
    fn method_handle_uses_kind_names() {
        let mut pool = ConstantPool::default();
        let index =
            parse_text("methodhandle{invokestatic:Util:max:(II)I}", &mut pool).expect("parse");
        match pool.entry(index) {
            Some(PoolEntry::MethodHandle { kind: 6, reference_index }) => {
                assert!(matches!(
                    pool.entry(*reference_index),
                    Some(PoolEntry::MethodRef { .. })
                ));
            }
            other => panic!("unexpected entry {:?}", other),
        }
        let text = format_entry(&pool, index).expect("format");
        assert_eq!(text, "methodhandle{invokestatic:Util:max:(II)I}");
    }

    #[test]
    fn method_handle_field_kinds_reference_fields() {
        let mut pool = ConstantPool::default();
        let index =
            parse_text("methodhandle{getstatic:System:out:Ljava/io/PrintStream;}", &mut pool)
                .expect("parse");
        match pool.entry(index) {
            Some(PoolEntry::MethodHandle { kind: 2, reference_index }) => {
                assert!(matches!(
                    pool.entry(*reference_index),
                    Some(PoolEntry::FieldRef { .. })
                ));
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn invokedynamic_carries_decimal_bootstrap_index() {
        let mut pool = ConstantPool::default();
        let index = parse_text("invokedynamic{2:apply:()Ljava/lang/Runnable;}", &mut pool)
            .expect("parse");
        assert!(matches!(
            pool.entry(index),
            Some(PoolEntry::InvokeDynamic { bootstrap_method_attr_index: 2, .. })
        ));
        let text = format_entry(&pool, index).expect("format");
        assert_eq!(text, "invokedynamic{2:apply:()Ljava/lang/Runnable;}");
    }

    #[test]
    fn unknown_tag_is_rejected_and_rewinds() {
        let mut pool = ConstantPool::default();
        let mut cur = Cursor::new("  blob{x}");
        let err = parse_entry(&mut cur, &mut pool).expect_err("unknown tag");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("blob".to_owned()));
        assert_eq!(err.offset, 2);
        assert_eq!(cur.mark(), 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn wrong_field_count_is_invalid_operand() {
        let mut pool = ConstantPool::default();
        let err = parse_text("method{only:two}", &mut pool).expect_err("arity");
        assert_eq!(err.kind, ParseErrorKind::InvalidOperand("only:two".to_owned()));
    }

    #[test]
    fn bad_number_is_number_format() {
        let mut pool = ConstantPool::default();
        let err = parse_text("integer{twelve}", &mut pool).expect_err("number");
        assert_eq!(err.kind, ParseErrorKind::NumberFormat);
    }

    #[test]
    fn numeric_entries_round_trip() {
        let mut pool = ConstantPool::default();
        for text in ["integer{-7}", "float{2.5}", "long{123456789012}", "double{0.25}"] {
            let index = parse_text(text, &mut pool).expect("parse");
            assert_eq!(format_entry(&pool, index).expect("format"), text);
        }
    }
}
