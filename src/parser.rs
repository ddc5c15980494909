//! Recursive-descent parser for the textual class notation.
//!
//! Parsing is two-staged: this module builds an intermediate tree of
//! borrowed spans (`ParsedAttribute` and friends) from the text, then hands
//! it to the materializer to produce model values. The split keeps the
//! grammar independent of attribute semantics; an attribute body is carried
//! as an uninterpreted sub-cursor until its name decides what it means.
//!
//! The entry point is replace-on-success: it works on a clone of the given
//! model, so a failing parse leaves the caller's model untouched.

use std::collections::HashMap;

use crate::cursor::Cursor;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::materialize;
use crate::model::ClassModel;
use crate::pool_codec::parse_entry;
use crate::reader::{read_block, read_pair};

/// One `attribute NAME { ... }` block before materialization.
#[derive(Debug, Clone)]
pub struct ParsedAttribute<'a> {
    pub name: &'a str,
    /// The uninterpreted `info { ... }` body, if the block had one.
    pub info: Option<Cursor<'a>>,
    pub properties: HashMap<&'a str, &'a str>,
    pub children: Vec<ParsedAttribute<'a>>,
    /// Offset of the block's first token, used for errors raised later
    /// during materialization.
    pub mark: usize,
}

/// One `field NAME { ... }` block.
#[derive(Debug, Clone)]
pub struct ParsedField<'a> {
    pub name: &'a str,
    pub properties: HashMap<&'a str, &'a str>,
    pub attributes: Vec<ParsedAttribute<'a>>,
    pub mark: usize,
}

/// One `method NAME { ... }` block.
#[derive(Debug, Clone)]
pub struct ParsedMethod<'a> {
    pub name: &'a str,
    pub properties: HashMap<&'a str, &'a str>,
    pub attributes: Vec<ParsedAttribute<'a>>,
    pub mark: usize,
}

/// Reads the block that follows an already-consumed `attribute` keyword.
pub fn read_attribute<'a>(cur: &mut Cursor<'a>) -> ParseResult<ParsedAttribute<'a>> {
    cur.strip_leading();
    let mark = cur.mark();
    match read_attribute_inner(cur, mark) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            cur.reset(mark);
            Err(err)
        }
    }
}

fn read_attribute_inner<'a>(cur: &mut Cursor<'a>, mark: usize) -> ParseResult<ParsedAttribute<'a>> {
    let name = match cur.next_token() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, mark)),
    };
    let mut block = read_block(cur)?;
    let mut properties = HashMap::new();
    let mut children = Vec::new();
    let mut info = None;
    loop {
        block.strip_leading();
        if block.end() {
            break;
        }
        if let Ok((key, value)) = read_pair(&mut block) {
            properties.insert(key, value);
            continue;
        }
        let kw_mark = block.mark();
        let token = block.next_token().unwrap_or("");
        match token {
            "attribute" => children.push(read_attribute(&mut block)?),
            "info" => {
                if info.is_some() {
                    return Err(ParseError::new(ParseErrorKind::DuplicateInfoBlock, kw_mark));
                }
                info = Some(read_block(&mut block)?);
            }
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(other.to_owned()),
                    kw_mark,
                ))
            }
        }
    }
    Ok(ParsedAttribute { name, info, properties, children, mark })
}

type Member<'a> = (&'a str, HashMap<&'a str, &'a str>, Vec<ParsedAttribute<'a>>, usize);

fn read_member<'a>(cur: &mut Cursor<'a>) -> ParseResult<Member<'a>> {
    cur.strip_leading();
    let mark = cur.mark();
    match read_member_inner(cur, mark) {
        Ok(member) => Ok(member),
        Err(err) => {
            cur.reset(mark);
            Err(err)
        }
    }
}

fn read_member_inner<'a>(cur: &mut Cursor<'a>, mark: usize) -> ParseResult<Member<'a>> {
    let name = match cur.next_token() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, mark)),
    };
    let mut block = read_block(cur)?;
    let mut properties = HashMap::new();
    let mut attributes = Vec::new();
    loop {
        block.strip_leading();
        if block.end() {
            break;
        }
        if let Ok((key, value)) = read_pair(&mut block) {
            properties.insert(key, value);
            continue;
        }
        let kw_mark = block.mark();
        let token = block.next_token().unwrap_or("");
        match token {
            "attribute" => attributes.push(read_attribute(&mut block)?),
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(other.to_owned()),
                    kw_mark,
                ))
            }
        }
    }
    Ok((name, properties, attributes, mark))
}

/// Reads the block after a `constantpool` keyword: a sequence of pool
/// entries, each resolved through insert-or-reuse. Repeated blocks merge.
fn read_constant_pool(
    cur: &mut Cursor<'_>,
    pool: &mut crate::model::ConstantPool,
) -> ParseResult<()> {
    let mut block = read_block(cur)?;
    loop {
        block.strip_leading();
        if block.end() {
            break;
        }
        parse_entry(&mut block, pool)?;
    }
    Ok(())
}

fn required<'a>(
    properties: &HashMap<&'a str, &'a str>,
    name: &str,
    offset: usize,
) -> ParseResult<&'a str> {
    properties.get(name).copied().ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingProperty(name.to_owned()), offset)
    })
}

fn apply_class_properties(
    model: &mut ClassModel,
    properties: &HashMap<&str, &str>,
) -> ParseResult<()> {
    let number = || ParseError::new(ParseErrorKind::NumberFormat, 0);
    model.major_version = required(properties, "major", 0)?
        .parse()
        .map_err(|_| number())?;
    model.minor_version = required(properties, "minor", 0)?
        .parse()
        .map_err(|_| number())?;
    let superclass = required(properties, "superclass", 0)?;
    model.super_class = if superclass.is_empty() {
        0
    } else {
        model.constant_pool.class(superclass)
    };
    model.interfaces.clear();
    let interfaces = required(properties, "interfaces", 0)?;
    if !interfaces.is_empty() {
        for name in interfaces.split(',') {
            let index = model.constant_pool.class(name);
            model.interfaces.push(index);
        }
    }
    let flags = required(properties, "flags", 0)?;
    model.access_flags = materialize::parse_flags(flags, 0)?;
    Ok(())
}

/// Parses the full textual form into a new model.
///
/// The given model supplies the starting constant pool and class identity;
/// its fields, methods and attributes are replaced by the parsed ones.
/// Pool entries referenced by the text resolve through insert-or-reuse, so
/// existing indices stay valid. On error the input model is untouched.
pub fn parse(original: &ClassModel, text: &str) -> Result<ClassModel, ParseError> {
    let mut model = original.clone();
    let mut cur = Cursor::new(text);
    let mut class_properties: HashMap<&str, &str> = HashMap::new();
    let mut attributes = Vec::new();
    let mut fields = Vec::new();
    let mut methods = Vec::new();
    loop {
        cur.strip_leading();
        if cur.end() {
            break;
        }
        if let Ok((key, value)) = read_pair(&mut cur) {
            class_properties.insert(key, value);
            continue;
        }
        let kw_mark = cur.mark();
        let token = cur.next_token().unwrap_or("");
        match token {
            "constantpool" => read_constant_pool(&mut cur, &mut model.constant_pool)?,
            "attribute" => attributes.push(read_attribute(&mut cur)?),
            "field" => fields.push(read_member(&mut cur)?),
            "method" => methods.push(read_member(&mut cur)?),
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken(other.to_owned()),
                    kw_mark,
                ))
            }
        }
    }
    apply_class_properties(&mut model, &class_properties)?;

    model.attributes.clear();
    for parsed in &attributes {
        let attribute = materialize::attribute(&mut model.constant_pool, parsed)?;
        model.attributes.push(attribute);
    }
    model.fields.clear();
    for (name, properties, parsed_attributes, mark) in &fields {
        let parsed = ParsedField {
            name: *name,
            properties: properties.clone(),
            attributes: parsed_attributes.clone(),
            mark: *mark,
        };
        let field = materialize::field(&mut model.constant_pool, &parsed)?;
        model.fields.push(field);
    }
    model.methods.clear();
    for (name, properties, parsed_attributes, mark) in &methods {
        let parsed = ParsedMethod {
            name: *name,
            properties: properties.clone(),
            attributes: parsed_attributes.clone(),
            mark: *mark,
        };
        let method = materialize::method(&mut model.constant_pool, &parsed)?;
        model.methods.push(method);
    }
    log::debug!(
        "parsed class: {} fields, {} methods, {} attributes, pool of {}",
        model.fields.len(),
        model.methods.len(),
        model.attributes.len(),
        model.constant_pool.len()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessFlags, Attribute, PoolEntry};

    const MINIMAL: &str = concat!(
        "major=52\n",
        "minor=0\n",
        "superclass=java/lang/Object\n",
        "interfaces=\n",
        "flags=public,super\n"
    );

    #[test]
    fn minimal_class_parses() {
        let model = parse(&ClassModel::default(), MINIMAL).expect("parse");
        assert_eq!(model.major_version, 52);
        assert_eq!(model.minor_version, 0);
        assert_eq!(model.access_flags, AccessFlags::PUBLIC | AccessFlags::SUPER);
        assert!(model.interfaces.is_empty());
        assert_eq!(
            model.constant_pool.class_name_at(model.super_class),
            Some("java/lang/Object")
        );
    }

    #[test]
    fn interfaces_are_comma_separated() {
        let text = concat!(
            "major=52\nminor=0\nsuperclass=java/lang/Object\n",
            "interfaces=java/lang/Runnable,java/io/Serializable\n",
            "flags=public\n"
        );
        let model = parse(&ClassModel::default(), text).expect("parse");
        let names: Vec<_> = model
            .interfaces
            .iter()
            .map(|i| model.constant_pool.class_name_at(*i).expect("class"))
            .collect();
        assert_eq!(names, vec!["java/lang/Runnable", "java/io/Serializable"]);
    }

    #[test]
    fn missing_required_property_is_reported() {
        let text = "major=52\nminor=0\nsuperclass=java/lang/Object\nflags=public\n";
        let err = parse(&ClassModel::default(), text).expect_err("missing");
        assert_eq!(err.kind, ParseErrorKind::MissingProperty("interfaces".to_owned()));
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn unknown_keyword_is_terminal() {
        let text = "major=52\nwidget Foo { }\n";
        let err = parse(&ClassModel::default(), text).expect_err("keyword");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("widget".to_owned()));
        assert_eq!(err.offset, 9);
    }

    #[test]
    fn unterminated_attribute_block_points_at_its_brace() {
        let text = "attribute Code { locals=1";
        let err = parse(&ClassModel::default(), text).expect_err("unterminated");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedBlock);
        assert_eq!(err.offset, 15);
    }

    #[test]
    fn failed_parse_leaves_the_original_untouched() {
        let mut original = ClassModel::default();
        original.major_version = 52;
        original.this_class = original.constant_pool.class("Example");
        let before = original.clone();
        let text = concat!(
            "major=52\nminor=0\nsuperclass=java/lang/Object\ninterfaces=\nflags=public\n",
            "method run {\n",
            "\tflags=public\n",
            "\tdescriptor=()V\n",
            "\tattribute Code {\n",
            "\t\tlocals=1\n\t\tstack=1\n",
            "\t\tinfo {\n\t\t\tgoto label:nowhere\n\t\t}\n",
            "\t}\n",
            "}\n"
        );
        let err = parse(&original, text).expect_err("undefined label");
        assert_eq!(err.kind, ParseErrorKind::UndefinedLabel("nowhere".to_owned()));
        assert_eq!(original, before);
    }

    #[test]
    fn duplicate_constantpool_blocks_merge() {
        let text = concat!(
            "major=52\nminor=0\nsuperclass=java/lang/Object\ninterfaces=\nflags=public\n",
            "constantpool {\n\tclass{Example}\n}\n",
            "constantpool {\n\tclass{Example}\n\tutf8{extra}\n}\n"
        );
        let model = parse(&ClassModel::default(), text).expect("parse");
        let classes = model
            .constant_pool
            .iter()
            .filter(|e| matches!(e, PoolEntry::Class { .. }))
            .count();
        // Example once, java/lang/Object once
        assert_eq!(classes, 2);
    }

    #[test]
    fn duplicate_properties_keep_the_last_value() {
        let text = "major=51\nmajor=52\nminor=0\nsuperclass=x\ninterfaces=\nflags=\n";
        let model = parse(&ClassModel::default(), text).expect("parse");
        assert_eq!(model.major_version, 52);
        assert_eq!(model.access_flags, AccessFlags::empty());
    }

    #[test]
    fn method_with_code_attribute_materializes() {
        let text = concat!(
            "major=52\nminor=0\nsuperclass=java/lang/Object\ninterfaces=\nflags=public\n",
            "method answer {\n",
            "\tflags=public,static\n",
            "\tdescriptor=()I\n",
            "\tattribute Code {\n",
            "\t\tlocals=0\n",
            "\t\tstack=1\n",
            "\t\tinfo {\n",
            "\t\t\tbipush 0x2a\n",
            "\t\t\tireturn\n",
            "\t\t}\n",
            "\t}\n",
            "}\n"
        );
        let model = parse(&ClassModel::default(), text).expect("parse");
        assert_eq!(model.methods.len(), 1);
        let method = &model.methods[0];
        assert_eq!(model.constant_pool.utf8_at(method.name_index), Some("answer"));
        assert_eq!(model.constant_pool.utf8_at(method.descriptor_index), Some("()I"));
        match &method.attributes[0] {
            Attribute::Code(code) => {
                assert_eq!(code.max_locals, 0);
                assert_eq!(code.max_stack, 1);
                assert_eq!(code.code.len(), 2);
            }
            other => panic!("unexpected attribute {:?}", other),
        }
    }
}
