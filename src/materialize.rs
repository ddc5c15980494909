//! Turns parsed attribute trees into model attributes.
//!
//! Dispatch is by attribute name, with a raw-hex escape hatch checked
//! first: any attribute whose info body is a `0x` literal round-trips as
//! opaque bytes without needing a structured form.

use std::collections::HashMap;

use crate::assembler::{assemble, decode_hex};
use crate::cursor::Cursor;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::model::{
    AccessFlags, Attribute, CodeAttribute, ConstantPool, FieldModel, MethodModel, RawAttribute,
    StackMapFrame, StackMapTableAttribute, VerificationType,
};
use crate::parser::{ParsedAttribute, ParsedField, ParsedMethod};

/// Resolves a comma-separated list of access-flag names. Empty text and
/// empty segments mean no flags.
pub(crate) fn parse_flags(text: &str, offset: usize) -> ParseResult<AccessFlags> {
    let mut flags = AccessFlags::empty();
    for name in text.split(',') {
        if name.is_empty() {
            continue;
        }
        match AccessFlags::from_name(name) {
            Some(flag) => flags |= flag,
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(name.to_owned()),
                    offset,
                ))
            }
        }
    }
    Ok(flags)
}

fn required_u16(parsed: &ParsedAttribute<'_>, name: &str) -> ParseResult<u16> {
    let value = parsed.properties.get(name).copied().ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty(name.to_owned()), parsed.mark)
    })?;
    value
        .parse()
        .map_err(|_| ParseError::new(ParseErrorKind::NumberFormat, parsed.mark))
}

/// Materializes one parsed attribute, recursing into its children.
pub fn attribute(pool: &mut ConstantPool, parsed: &ParsedAttribute<'_>) -> ParseResult<Attribute> {
    let mut info = parsed.info.clone().unwrap_or_else(|| Cursor::new(""));
    info.strip_leading();
    if info.expect("0x") {
        let hex_mark = info.mark();
        let token = info.next_token().unwrap_or("");
        let bytes = decode_hex(token).ok_or_else(|| {
            ParseError::new(ParseErrorKind::InvalidOperand(token.to_owned()), hex_mark)
        })?;
        info.strip_leading();
        if !info.end() {
            let trailing = info.clone().next_token().unwrap_or("").to_owned();
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken(trailing),
                info.mark(),
            ));
        }
        if !parsed.children.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::RawAttributeWithChildren,
                parsed.mark,
            ));
        }
        let name_index = pool.utf8(parsed.name);
        return Ok(Attribute::Raw(RawAttribute { name_index, info: bytes }));
    }

    let mut result = match parsed.name {
        "Code" => {
            let max_locals = required_u16(parsed, "locals")?;
            let max_stack = required_u16(parsed, "stack")?;
            let mut body = parsed.info.clone().ok_or_else(|| {
                ParseError::new(ParseErrorKind::UnexpectedEndOfInput, parsed.mark)
            })?;
            let code = assemble(&mut body, pool)?;
            pool.utf8("Code");
            Attribute::Code(CodeAttribute {
                max_stack,
                max_locals,
                code,
                attributes: Vec::new(),
            })
        }
        "StackMapTable" => {
            let frames = match parsed.info.clone() {
                Some(mut body) => read_frames(&mut body, pool)?,
                None => Vec::new(),
            };
            pool.utf8("StackMapTable");
            Attribute::StackMapTable(StackMapTableAttribute {
                frames,
                attributes: Vec::new(),
            })
        }
        other => {
            return Err(ParseError::new(
                ParseErrorKind::UnsupportedAttribute(other.to_owned()),
                parsed.mark,
            ))
        }
    };

    let mut children = Vec::with_capacity(parsed.children.len());
    for child in &parsed.children {
        children.push(attribute(pool, child)?);
    }
    match &mut result {
        Attribute::Code(code) => code.attributes = children,
        Attribute::StackMapTable(table) => table.attributes = children,
        Attribute::Raw(_) => {}
    }
    Ok(result)
}

fn read_frames(cur: &mut Cursor<'_>, pool: &mut ConstantPool) -> ParseResult<Vec<StackMapFrame>> {
    let mut frames = Vec::new();
    loop {
        cur.strip_leading();
        if cur.end() {
            break;
        }
        let mark = cur.mark();
        let kind = cur.next_token().unwrap_or("");
        let mut block = crate::reader::read_block(cur)?;
        let mut properties: HashMap<&str, &str> = HashMap::new();
        let mut locals = None;
        let mut stack = None;
        let mut types = None;
        loop {
            block.strip_leading();
            if block.end() {
                break;
            }
            if let Ok((key, value)) = crate::reader::read_pair(&mut block) {
                properties.insert(key, value);
                continue;
            }
            let kw_mark = block.mark();
            // the list keyword may sit tight against its brace, as the
            // formatter writes it
            let mut len = 0;
            loop {
                match block.peek(len) {
                    Ok(b'{') => break,
                    Ok(b) if b.is_ascii_whitespace() => break,
                    Ok(_) => len += 1,
                    Err(_) => break,
                }
            }
            let token = block.next(len)?;
            let type_list = match token {
                "locals" => &mut locals,
                "stack" => &mut stack,
                "types" => &mut types,
                other => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedToken(other.to_owned()),
                        kw_mark,
                    ))
                }
            };
            let mut inner = crate::reader::read_block(&mut block)?;
            *type_list = Some(read_types(&mut inner, pool)?);
        }
        let offset = frame_u16(&properties, "offset", mark)?;
        let frame = match kind {
            "same" => StackMapFrame::Same { offset },
            "same-extended" => StackMapFrame::SameExtended { offset },
            "same-locals-1-stack-item" => StackMapFrame::SameLocals1StackItem {
                offset,
                stack: single_type(stack, mark)?,
            },
            "same-locals-1-stack-item-extended" => StackMapFrame::SameLocals1StackItemExtended {
                offset,
                stack: single_type(stack, mark)?,
            },
            "chop" => {
                let absent = frame_u16(&properties, "absent", mark)?;
                if absent > u8::MAX as u16 {
                    return Err(ParseError::new(ParseErrorKind::NumberFormat, mark));
                }
                StackMapFrame::Chop { offset, absent: absent as u8 }
            }
            "append" => StackMapFrame::Append {
                offset,
                locals: types.ok_or_else(|| {
                    ParseError::new(ParseErrorKind::MissingProperty("types".to_owned()), mark)
                })?,
            },
            "full" => StackMapFrame::Full {
                offset,
                locals: locals.ok_or_else(|| {
                    ParseError::new(ParseErrorKind::MissingProperty("locals".to_owned()), mark)
                })?,
                stack: stack.ok_or_else(|| {
                    ParseError::new(ParseErrorKind::MissingProperty("stack".to_owned()), mark)
                })?,
            },
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(other.to_owned()),
                    mark,
                ))
            }
        };
        frames.push(frame);
    }
    Ok(frames)
}

fn frame_u16(properties: &HashMap<&str, &str>, name: &str, mark: usize) -> ParseResult<u16> {
    let value = properties.get(name).copied().ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty(name.to_owned()), mark)
    })?;
    value
        .parse()
        .map_err(|_| ParseError::new(ParseErrorKind::NumberFormat, mark))
}

fn single_type(
    types: Option<Vec<VerificationType>>,
    mark: usize,
) -> ParseResult<VerificationType> {
    let types = types.ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty("stack".to_owned()), mark)
    })?;
    if types.len() != 1 {
        return Err(ParseError::new(
            ParseErrorKind::InvalidOperand(format!("{} stack entries", types.len())),
            mark,
        ));
    }
    Ok(types[0])
}

fn read_types(
    cur: &mut Cursor<'_>,
    pool: &mut ConstantPool,
) -> ParseResult<Vec<VerificationType>> {
    let mut types = Vec::new();
    loop {
        cur.strip_leading();
        let mark = cur.mark();
        let token = match cur.next_token() {
            Some(token) if !token.is_empty() => token,
            _ => break,
        };
        types.push(parse_type(token, pool, mark)?);
    }
    Ok(types)
}

fn parse_type(token: &str, pool: &mut ConstantPool, mark: usize) -> ParseResult<VerificationType> {
    let parsed = match token {
        "top" => VerificationType::Top,
        "integer" => VerificationType::Integer,
        "float" => VerificationType::Float,
        "long" => VerificationType::Long,
        "double" => VerificationType::Double,
        "null" => VerificationType::Null,
        "uninitialized-this" => VerificationType::UninitializedThis,
        _ => {
            if let Some(class) = token.strip_prefix("object:") {
                VerificationType::Object(pool.class(class))
            } else if let Some(value) = token.strip_prefix("uninitialized-variable:") {
                let offset = parse_u16_literal(value).ok_or_else(|| {
                    ParseError::new(ParseErrorKind::NumberFormat, mark)
                })?;
                VerificationType::UninitializedVariable(offset)
            } else {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(token.to_owned()),
                    mark,
                ));
            }
        }
    };
    Ok(parsed)
}

/// Decimal or `0x` hex.
fn parse_u16_literal(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x") {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn member(
    pool: &mut ConstantPool,
    name: &str,
    properties: &HashMap<&str, &str>,
    parsed_attributes: &[ParsedAttribute<'_>],
    mark: usize,
) -> ParseResult<(AccessFlags, u16, u16, Vec<Attribute>)> {
    let flags_text = properties.get("flags").copied().ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty("flags".to_owned()), mark)
    })?;
    let access_flags = parse_flags(flags_text, mark)?;
    let descriptor = properties.get("descriptor").copied().ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty("descriptor".to_owned()), mark)
    })?;
    let name_index = pool.utf8(name);
    let descriptor_index = pool.utf8(descriptor);
    let mut attributes = Vec::with_capacity(parsed_attributes.len());
    for parsed in parsed_attributes {
        attributes.push(attribute(pool, parsed)?);
    }
    Ok((access_flags, name_index, descriptor_index, attributes))
}

pub fn field(pool: &mut ConstantPool, parsed: &ParsedField<'_>) -> ParseResult<FieldModel> {
    let (access_flags, name_index, descriptor_index, attributes) = member(
        pool,
        parsed.name,
        &parsed.properties,
        &parsed.attributes,
        parsed.mark,
    )?;
    Ok(FieldModel { access_flags, name_index, descriptor_index, attributes })
}

pub fn method(pool: &mut ConstantPool, parsed: &ParsedMethod<'_>) -> ParseResult<MethodModel> {
    let (access_flags, name_index, descriptor_index, attributes) = member(
        pool,
        parsed.name,
        &parsed.properties,
        &parsed.attributes,
        parsed.mark,
    )?;
    Ok(MethodModel { access_flags, name_index, descriptor_index, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_attribute;

    fn parse_attribute_text(text: &str, pool: &mut ConstantPool) -> ParseResult<Attribute> {
        let mut cur = Cursor::new(text);
        // the caller has already consumed the `attribute` keyword
        let parsed = read_attribute(&mut cur)?;
        attribute(pool, &parsed)
    }

    #[test]
    fn raw_hex_info_becomes_an_opaque_attribute() {
        let mut pool = ConstantPool::default();
        let attr = parse_attribute_text(
            "MyCustomThing {\n\tinfo {\n\t\t0xdeadbeef\n\t}\n}",
            &mut pool,
        )
        .expect("raw");
        match attr {
            Attribute::Raw(raw) => {
                assert_eq!(raw.info, vec![0xde, 0xad, 0xbe, 0xef]);
                assert_eq!(pool.utf8_at(raw.name_index), Some("MyCustomThing"));
            }
            other => panic!("unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn raw_attribute_rejects_children() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text(
            "MyCustomThing {\n\tinfo { 0xff }\n\tattribute Nested { info { 0x00 } }\n}",
            &mut pool,
        )
        .expect_err("children");
        assert_eq!(err.kind, ParseErrorKind::RawAttributeWithChildren);
    }

    #[test]
    fn unsupported_structured_attribute_is_rejected() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text("LineNumberTable {\n\tinfo { lines }\n}", &mut pool)
            .expect_err("unsupported");
        assert_eq!(
            err.kind,
            ParseErrorKind::UnsupportedAttribute("LineNumberTable".to_owned())
        );
    }

    #[test]
    fn code_requires_locals_and_stack() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text("Code {\n\tstack=1\n\tinfo { return }\n}", &mut pool)
            .expect_err("missing locals");
        assert_eq!(err.kind, ParseErrorKind::MissingProperty("locals".to_owned()));
    }

    #[test]
    fn code_attribute_carries_nested_stack_map_table() {
        let mut pool = ConstantPool::default();
        let attr = parse_attribute_text(
            concat!(
                "Code {\n",
                "\tlocals=1\n",
                "\tstack=1\n",
                "\tinfo {\n",
                "\t\ticonst_0\n",
                "\t\tstart: ireturn\n",
                "\t}\n",
                "\tattribute StackMapTable {\n",
                "\t\tinfo {\n",
                "\t\t\tsame { offset=1 }\n",
                "\t\t}\n",
                "\t}\n",
                "}"
            ),
            &mut pool,
        )
        .expect("code");
        match attr {
            Attribute::Code(code) => {
                assert_eq!(code.code.len(), 2);
                match &code.attributes[0] {
                    Attribute::StackMapTable(table) => {
                        assert_eq!(table.frames, vec![StackMapFrame::Same { offset: 1 }]);
                    }
                    other => panic!("unexpected child {:?}", other),
                }
            }
            other => panic!("unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn frame_variants_decode_their_operands() {
        let mut pool = ConstantPool::default();
        let attr = parse_attribute_text(
            concat!(
                "StackMapTable {\n",
                "\tinfo {\n",
                "\t\tchop { offset=4 absent=2 }\n",
                "\t\tappend { offset=8 types{ integer object:java/lang/String } }\n",
                "\t\tfull { offset=12 locals{ long top } stack{ null } }\n",
                "\t\tsame-locals-1-stack-item { offset=16 stack{ uninitialized-variable:0x0a } }\n",
                "\t}\n",
                "}"
            ),
            &mut pool,
        )
        .expect("frames");
        let frames = match attr {
            Attribute::StackMapTable(table) => table.frames,
            other => panic!("unexpected attribute {:?}", other),
        };
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], StackMapFrame::Chop { offset: 4, absent: 2 });
        match &frames[1] {
            StackMapFrame::Append { offset: 8, locals } => {
                assert_eq!(locals[0], VerificationType::Integer);
                match locals[1] {
                    VerificationType::Object(index) => {
                        assert_eq!(pool.class_name_at(index), Some("java/lang/String"));
                    }
                    other => panic!("unexpected type {:?}", other),
                }
            }
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(
            frames[2],
            StackMapFrame::Full {
                offset: 12,
                locals: vec![VerificationType::Long, VerificationType::Top],
                stack: vec![VerificationType::Null],
            }
        );
        assert_eq!(
            frames[3],
            StackMapFrame::SameLocals1StackItem {
                offset: 16,
                stack: VerificationType::UninitializedVariable(10),
            }
        );
    }

    #[test]
    fn frame_list_keyword_may_sit_tight_against_its_brace() {
        for text in [
            "StackMapTable {\n\tinfo {\n\t\tfull { offset=0 locals{ integer } stack{ null } }\n\t}\n}",
            "StackMapTable {\n\tinfo {\n\t\tfull { offset=0 locals { integer } stack { null } }\n\t}\n}",
        ] {
            let mut pool = ConstantPool::default();
            let attr = parse_attribute_text(text, &mut pool).expect("frames");
            let frames = match attr {
                Attribute::StackMapTable(table) => table.frames,
                other => panic!("unexpected attribute {:?}", other),
            };
            assert_eq!(
                frames,
                vec![StackMapFrame::Full {
                    offset: 0,
                    locals: vec![VerificationType::Integer],
                    stack: vec![VerificationType::Null],
                }]
            );
        }
    }

    #[test]
    fn chop_absent_count_must_fit_a_byte() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text(
            "StackMapTable {\n\tinfo {\n\t\tchop { offset=4 absent=300 }\n\t}\n}",
            &mut pool,
        )
        .expect_err("absent too large");
        assert_eq!(err.kind, ParseErrorKind::NumberFormat);
    }

    #[test]
    fn code_without_info_reports_the_attribute_position() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text("Code {\n\tlocals=1\n\tstack=1\n}", &mut pool)
            .expect_err("no info");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEndOfInput);
        // reported at the attribute's own name token
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let mut pool = ConstantPool::default();
        let err = parse_attribute_text(
            "StackMapTable {\n\tinfo {\n\t\tsideways { offset=0 }\n\t}\n}",
            &mut pool,
        )
        .expect_err("frame type");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("sideways".to_owned()));
    }
}
