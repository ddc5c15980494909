//! Renders a class model back into its canonical textual form.
//!
//! The output is a fixed point of the round trip: rendering, parsing the
//! result and rendering again produces identical text.

use std::fmt::Write;

use crate::assembler::disassemble;
use crate::error::FormatError;
use crate::model::{
    AccessFlags, Attribute, ClassModel, ConstantPool, StackMapFrame, VerificationType,
};

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push('\t');
    }
}

fn class_name(pool: &ConstantPool, index: u16) -> Result<&str, FormatError> {
    pool.class_name_at(index)
        .ok_or(FormatError::BadPoolIndex(index))
}

fn utf8(pool: &ConstantPool, index: u16) -> Result<&str, FormatError> {
    pool.utf8_at(index).ok_or(FormatError::BadPoolIndex(index))
}

/// Renders the whole class: required properties first, then top-level
/// attributes, fields and methods as brace blocks.
pub fn render(model: &ClassModel) -> Result<String, FormatError> {
    let mut out = String::new();
    writeln!(out, "major={}", model.major_version)?;
    writeln!(out, "minor={}", model.minor_version)?;
    let superclass = if model.super_class == 0 {
        ""
    } else {
        class_name(&model.constant_pool, model.super_class)?
    };
    writeln!(out, "superclass={}", superclass)?;
    let mut interfaces = Vec::with_capacity(model.interfaces.len());
    for index in &model.interfaces {
        interfaces.push(class_name(&model.constant_pool, *index)?);
    }
    writeln!(out, "interfaces={}", interfaces.join(","))?;
    writeln!(out, "flags={}", model.access_flags.names().join(","))?;
    out.push('\n');
    for attribute in &model.attributes {
        write_attribute(&mut out, &model.constant_pool, attribute, 0)?;
        out.push('\n');
    }
    for field in &model.fields {
        write_member(
            &mut out,
            &model.constant_pool,
            "field",
            field.access_flags,
            field.name_index,
            field.descriptor_index,
            &field.attributes,
        )?;
        out.push('\n');
    }
    for method in &model.methods {
        write_member(
            &mut out,
            &model.constant_pool,
            "method",
            method.access_flags,
            method.name_index,
            method.descriptor_index,
            &method.attributes,
        )?;
        out.push('\n');
    }
    log::debug!("rendered class into {} bytes of text", out.len());
    Ok(out)
}

fn write_attribute(
    out: &mut String,
    pool: &ConstantPool,
    attribute: &Attribute,
    indent: usize,
) -> Result<(), FormatError> {
    let name = match attribute {
        Attribute::Code(_) => "Code",
        Attribute::StackMapTable(_) => "StackMapTable",
        Attribute::Raw(raw) => utf8(pool, raw.name_index)?,
    };
    push_indent(out, indent);
    writeln!(out, "attribute {} {{", name)?;
    match attribute {
        Attribute::Code(code) => {
            push_indent(out, indent + 1);
            writeln!(out, "locals={}", code.max_locals)?;
            push_indent(out, indent + 1);
            writeln!(out, "stack={}", code.max_stack)?;
            push_indent(out, indent + 1);
            out.push_str("info {\n");
            disassemble(&code.code, pool, indent + 2, out)?;
            push_indent(out, indent + 1);
            out.push_str("}\n");
        }
        Attribute::StackMapTable(table) => {
            push_indent(out, indent + 1);
            out.push_str("info {\n");
            for frame in &table.frames {
                write_frame(out, pool, frame, indent + 2)?;
            }
            push_indent(out, indent + 1);
            out.push_str("}\n");
        }
        Attribute::Raw(raw) => {
            push_indent(out, indent + 1);
            out.push_str("info {\n");
            push_indent(out, indent + 2);
            out.push_str("0x");
            for byte in &raw.info {
                write!(out, "{:02x}", byte)?;
            }
            out.push('\n');
            push_indent(out, indent + 1);
            out.push_str("}\n");
        }
    }
    for child in attribute.children() {
        write_attribute(out, pool, child, indent + 1)?;
    }
    push_indent(out, indent);
    out.push_str("}\n");
    Ok(())
}

fn write_frame(
    out: &mut String,
    pool: &ConstantPool,
    frame: &StackMapFrame,
    indent: usize,
) -> Result<(), FormatError> {
    push_indent(out, indent);
    write!(out, "{} {{ offset={}", frame.type_name(), frame.offset())?;
    match frame {
        StackMapFrame::Same { .. } | StackMapFrame::SameExtended { .. } => {}
        StackMapFrame::SameLocals1StackItem { stack, .. }
        | StackMapFrame::SameLocals1StackItemExtended { stack, .. } => {
            write!(out, " stack{{ {} }}", type_text(pool, stack)?)?;
        }
        StackMapFrame::Chop { absent, .. } => {
            write!(out, " absent={}", absent)?;
        }
        StackMapFrame::Append { locals, .. } => {
            write!(out, " types{{ {} }}", types_text(pool, locals)?)?;
        }
        StackMapFrame::Full { locals, stack, .. } => {
            write!(out, " locals{{ {} }}", types_text(pool, locals)?)?;
            write!(out, " stack{{ {} }}", types_text(pool, stack)?)?;
        }
    }
    out.push_str(" }\n");
    Ok(())
}

fn types_text(pool: &ConstantPool, types: &[VerificationType]) -> Result<String, FormatError> {
    let mut parts = Vec::with_capacity(types.len());
    for entry in types {
        parts.push(type_text(pool, entry)?);
    }
    Ok(parts.join(" "))
}

fn type_text(pool: &ConstantPool, entry: &VerificationType) -> Result<String, FormatError> {
    let text = match entry {
        VerificationType::Top => "top".to_owned(),
        VerificationType::Integer => "integer".to_owned(),
        VerificationType::Float => "float".to_owned(),
        VerificationType::Long => "long".to_owned(),
        VerificationType::Double => "double".to_owned(),
        VerificationType::Null => "null".to_owned(),
        VerificationType::UninitializedThis => "uninitialized-this".to_owned(),
        VerificationType::Object(index) => format!("object:{}", class_name(pool, *index)?),
        VerificationType::UninitializedVariable(offset) => {
            format!("uninitialized-variable:{}", offset)
        }
    };
    Ok(text)
}

fn write_member(
    out: &mut String,
    pool: &ConstantPool,
    keyword: &str,
    flags: AccessFlags,
    name_index: u16,
    descriptor_index: u16,
    attributes: &[Attribute],
) -> Result<(), FormatError> {
    let name = utf8(pool, name_index)?;
    let descriptor = utf8(pool, descriptor_index)?;
    writeln!(out, "{} {} {{", keyword, name)?;
    push_indent(out, 1);
    writeln!(out, "descriptor={}", descriptor)?;
    push_indent(out, 1);
    writeln!(out, "flags={}", flags.names().join(","))?;
    for attribute in attributes {
        write_attribute(out, pool, attribute, 1)?;
    }
    out.push_str("}\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn minimal_class_renders_its_properties() {
        let mut model = ClassModel::default();
        model.major_version = 52;
        model.access_flags = AccessFlags::PUBLIC | AccessFlags::SUPER;
        model.super_class = model.constant_pool.class("java/lang/Object");
        let text = render(&model).expect("render");
        assert_eq!(
            text,
            concat!(
                "major=52\n",
                "minor=0\n",
                "superclass=java/lang/Object\n",
                "interfaces=\n",
                "flags=public,super\n",
                "\n"
            )
        );
    }

    #[test]
    fn rendered_text_parses_back_to_an_equal_model() {
        let text = concat!(
            "major=52\nminor=0\nsuperclass=java/lang/Object\ninterfaces=\nflags=public,super\n",
            "field counter {\n",
            "\tflags=private\n",
            "\tdescriptor=I\n",
            "}\n",
            "method bump {\n",
            "\tflags=public\n",
            "\tdescriptor=()V\n",
            "\tattribute Code {\n",
            "\t\tlocals=1\n",
            "\t\tstack=2\n",
            "\t\tinfo {\n",
            "\t\t\taload_0\n",
            "\t\t\tifnull label:out\n",
            "\t\t\tgetstatic field{System:out:Ljava/io/PrintStream;}\n",
            "\t\t\tout: return\n",
            "\t\t}\n",
            "\t}\n",
            "}\n"
        );
        let model = parse(&ClassModel::default(), text).expect("parse");
        let rendered = render(&model).expect("render");
        let reparsed = parse(&model, &rendered).expect("reparse");
        assert_eq!(model, reparsed);
        let again = render(&reparsed).expect("render again");
        assert_eq!(rendered, again);
    }

    #[test]
    fn stack_map_frames_reparse_from_their_own_rendering() {
        use crate::model::{
            Attribute, CodeAttribute, MethodModel, StackMapFrame, StackMapTableAttribute,
            VerificationType,
        };
        use crate::opcodes::{Instruction, Opcode};

        let mut model = ClassModel::default();
        model.major_version = 52;
        model.access_flags = AccessFlags::PUBLIC;
        model.super_class = model.constant_pool.class("java/lang/Object");
        let string = model.constant_pool.class("java/lang/String");
        let name_index = model.constant_pool.utf8("run");
        let descriptor_index = model.constant_pool.utf8("()V");
        model.constant_pool.utf8("Code");
        model.constant_pool.utf8("StackMapTable");
        let frames = vec![
            StackMapFrame::Append {
                offset: 8,
                locals: vec![VerificationType::Integer, VerificationType::Object(string)],
            },
            StackMapFrame::SameLocals1StackItem {
                offset: 9,
                stack: VerificationType::Null,
            },
        ];
        model.methods.push(MethodModel {
            access_flags: AccessFlags::PUBLIC,
            name_index,
            descriptor_index,
            attributes: vec![Attribute::Code(CodeAttribute {
                max_stack: 1,
                max_locals: 1,
                code: vec![Instruction::new(Opcode::RETURN, Vec::new())],
                attributes: vec![Attribute::StackMapTable(StackMapTableAttribute {
                    frames,
                    attributes: Vec::new(),
                })],
            })],
        });
        let text = render(&model).expect("render");
        let parsed = parse(&model, &text).expect("reparse");
        assert_eq!(parsed, model);
        assert_eq!(render(&parsed).expect("render again"), text);
    }

    #[test]
    fn dangling_pool_index_is_a_format_error() {
        let mut model = ClassModel::default();
        model.super_class = 99;
        let err = render(&model).expect_err("dangling");
        assert!(matches!(err, FormatError::BadPoolIndex(99)));
    }
}
