//! Bytecode assembly and disassembly for `Code` attribute bodies.
//!
//! Assembly is two-pass: the first pass turns tokens into instruction
//! records, collecting label declarations and leaving placeholder offsets
//! for branches whose target is not yet known; the second pass computes
//! byte offsets and patches every deferred branch. Disassembly synthesizes
//! stable `label<n>` names in instruction order so the same stream always
//! renders the same text.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use byteorder::{BigEndian, ByteOrder};

use crate::cursor::Cursor;
use crate::error::{FormatError, ParseError, ParseErrorKind, ParseResult};
use crate::model::ConstantPool;
use crate::opcodes::{Instruction, Opcode};
use crate::pool_codec::{format_entry, parse_entry};

/// Decodes a run of hex digit pairs. Rejects odd lengths and anything
/// `to_digit` does not accept, so signs and whitespace never sneak in.
pub(crate) fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    for pair in text.as_bytes().chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

struct Deferred {
    instruction: usize,
    name: String,
    mark: usize,
}

/// Assembles an instruction stream from the cursor's remaining text.
///
/// One instruction per line: a mnemonic followed by at most one operand,
/// which is a `0x` hex literal, a `label:<name>` branch target, or a
/// constant pool entry in `tag{...}` form. A bare `<name>:` token declares
/// a label at the next instruction's offset.
pub fn assemble(cur: &mut Cursor<'_>, pool: &mut ConstantPool) -> ParseResult<Vec<Instruction>> {
    let start = cur.strip_leading().mark();
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut deferred: Vec<Deferred> = Vec::new();
    loop {
        cur.strip_leading();
        let tok_mark = cur.mark();
        let token = match cur.next_token() {
            Some(token) => token,
            None => break,
        };
        if let Some(name) = token.strip_suffix(':') {
            if labels.contains_key(name) {
                return Err(ParseError::new(
                    ParseErrorKind::DuplicateLabel(name.to_owned()),
                    tok_mark,
                ));
            }
            labels.insert(name.to_owned(), instructions.len());
            continue;
        }
        let opcode = Opcode::from_mnemonic(token).ok_or_else(|| {
            ParseError::new(ParseErrorKind::InvalidInstruction(token.to_owned()), tok_mark)
        })?;
        let mut line_len = 0;
        while let Ok(byte) = cur.peek(line_len) {
            if byte == b'\n' {
                break;
            }
            line_len += 1;
        }
        let mut operand = cur.sub(line_len);
        cur.advance(line_len)?;
        operand.strip_leading();
        let operand_mark = operand.mark();
        let text = operand.rest().trim_end();
        let operands = if text.is_empty() {
            Vec::new()
        } else if let Some(name) = text.strip_prefix("label:") {
            deferred.push(Deferred {
                instruction: instructions.len(),
                name: name.to_owned(),
                mark: operand_mark,
            });
            vec![0, 0]
        } else if let Some(hex) = text.strip_prefix("0x") {
            decode_hex(hex).ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidOperand(text.to_owned()), operand_mark)
            })?
        } else if text.contains('{') {
            let index = parse_entry(&mut operand, pool)?;
            if !operand.strip_leading().end() {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidOperand(operand.rest().trim_end().to_owned()),
                    operand.mark(),
                ));
            }
            let mut buf = [0u8; 2];
            BigEndian::write_u16(&mut buf, index);
            buf.to_vec()
        } else {
            return Err(ParseError::new(
                ParseErrorKind::InvalidOperand(text.to_owned()),
                operand_mark,
            ));
        };
        instructions.push(Instruction::new(opcode, operands));
    }
    if instructions.is_empty() {
        return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, start));
    }

    let mut offsets = Vec::with_capacity(instructions.len());
    let mut total = 0usize;
    for instruction in &instructions {
        offsets.push(total);
        total += instruction.size();
    }
    for patch in &deferred {
        let target = *labels.get(&patch.name).ok_or_else(|| {
            ParseError::new(ParseErrorKind::UndefinedLabel(patch.name.clone()), patch.mark)
        })?;
        // a label declared after the last instruction points at the end of
        // the stream
        let target_offset = offsets.get(target).copied().unwrap_or(total);
        let delta = target_offset as i64 - offsets[patch.instruction] as i64;
        if delta < i16::MIN as i64 || delta > i16::MAX as i64 {
            return Err(ParseError::new(
                ParseErrorKind::InvalidOperand(format!("label:{}", patch.name)),
                patch.mark,
            ));
        }
        BigEndian::write_i16(&mut instructions[patch.instruction].operands, delta as i16);
    }
    log::debug!(
        "assembled {} instructions, {} bytes",
        instructions.len(),
        total
    );
    Ok(instructions)
}

fn write_hex_operand(out: &mut String, bytes: &[u8]) -> std::fmt::Result {
    out.push_str(" 0x");
    for byte in bytes {
        write!(out, "{:02x}", byte)?;
    }
    Ok(())
}

/// Renders an instruction stream, one instruction per line at `indent`
/// tabs.
///
/// Two-byte operands of pool-referencing opcodes render through the entry
/// codec and two-byte branch offsets through synthesized labels; everything
/// else (including the four operand bytes of `invokeinterface` and the wide
/// branches) renders as a hex literal so the byte stream survives exactly.
pub fn disassemble(
    code: &[Instruction],
    pool: &ConstantPool,
    indent: usize,
    out: &mut String,
) -> Result<(), FormatError> {
    let mut starts = Vec::with_capacity(code.len());
    let mut boundaries = HashSet::new();
    let mut offset = 0i64;
    for instruction in code {
        starts.push(offset);
        boundaries.insert(offset);
        offset += instruction.size() as i64;
    }
    let mut labels: HashMap<i64, String> = HashMap::new();
    for (i, instruction) in code.iter().enumerate() {
        if instruction.opcode.is_branch() && instruction.operands.len() == 2 {
            let target = starts[i] + BigEndian::read_i16(&instruction.operands) as i64;
            if boundaries.contains(&target) && !labels.contains_key(&target) {
                labels.insert(target, format!("label{}", labels.len()));
            }
        }
    }
    for (i, instruction) in code.iter().enumerate() {
        let mnemonic = instruction
            .opcode
            .mnemonic()
            .ok_or(FormatError::UnknownOpcode(instruction.opcode.0))?;
        for _ in 0..indent {
            out.push('\t');
        }
        if let Some(name) = labels.get(&starts[i]) {
            write!(out, "{}: ", name)?;
        }
        out.push_str(mnemonic);
        if instruction.opcode.takes_pool_ref() && instruction.operands.len() == 2 {
            let index = BigEndian::read_u16(&instruction.operands);
            write!(out, " {}", format_entry(pool, index)?)?;
        } else if instruction.opcode.is_branch() && instruction.operands.len() == 2 {
            let target = starts[i] + BigEndian::read_i16(&instruction.operands) as i64;
            match labels.get(&target) {
                Some(name) => write!(out, " label:{}", name)?,
                None => write_hex_operand(out, &instruction.operands)?,
            }
        } else if !instruction.operands.is_empty() {
            write_hex_operand(out, &instruction.operands)?;
        }
        out.push('\n');
    }
    Ok(())
}
