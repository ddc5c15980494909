//! Low-level readers for the two syntactic shapes of the notation:
//! `key=value` pairs and brace-delimited blocks.

use crate::cursor::Cursor;
use crate::error::{ParseError, ParseErrorKind, ParseResult};

/// Reads one whitespace-delimited `key=value` pair.
///
/// The cursor is left after the pair on success and rewound to where it
/// started on failure, so callers can retry the same input as a different
/// construct.
pub fn read_pair<'a>(cur: &mut Cursor<'a>) -> ParseResult<(&'a str, &'a str)> {
    cur.strip_leading();
    let mark = cur.mark();
    let token = match cur.next_token() {
        Some(token) => token,
        None => return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, mark)),
    };
    match token.split_once('=') {
        Some((key, value)) => Ok((key, value)),
        None => {
            cur.reset(mark);
            Err(ParseError::new(ParseErrorKind::MissingDelimiter, mark))
        }
    }
}

/// Reads one `{ ... }` block and returns a bounded subview over its interior.
///
/// Nested braces are balanced by depth counting; the block's own delimiters
/// are consumed from `cur` but excluded from the returned view. A missing
/// closing brace is reported at the offset of the opening one, which is the
/// most useful place to point a user at.
pub fn read_block<'a>(cur: &mut Cursor<'a>) -> ParseResult<Cursor<'a>> {
    cur.strip_leading();
    let open = cur.mark();
    match cur.get() {
        Some(b'{') => {}
        Some(_) => {
            let mut probe = cur.clone();
            let token = probe.next_token().unwrap_or("");
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken(token.to_owned()),
                open,
            ));
        }
        None => return Err(ParseError::new(ParseErrorKind::UnexpectedEndOfInput, open)),
    }
    let mut depth = 1usize;
    let mut i = 1usize;
    loop {
        let byte = match cur.peek(i) {
            Ok(byte) => byte,
            Err(_) => {
                cur.reset(open);
                return Err(ParseError::new(ParseErrorKind::UnterminatedBlock, open));
            }
        };
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    cur.advance(1)?;
    let inner = cur.sub(i - 1);
    cur.advance(i)?;
    Ok(inner)
}
