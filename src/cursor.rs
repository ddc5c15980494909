//! Backtracking cursor primitives for the textual class notation.

use crate::error::{ParseError, ParseErrorKind, ParseResult};

/// A position-tracked, mark/reset-capable view over a region of a shared
/// backing string.
///
/// Every cursor is a `(start, end, index)` triple of byte offsets into one
/// immutable `&str`; nested blocks get their own bounded [`Cursor::sub`]
/// view without copying any text. Because positions are absolute, a mark
/// taken deep inside a nested block is directly usable as the offset of a
/// [`ParseError`].
///
/// The grammar is ASCII-delimited (whitespace, braces, `=`), so the cursor
/// works on bytes; multi-byte characters pass through tokens untouched.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    index: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Cursor {
            text,
            start: 0,
            end: text.len(),
            index: 0,
        }
    }

    /// Current absolute byte position, suitable for a later [`Cursor::reset`].
    pub fn mark(&self) -> usize {
        self.index
    }

    /// Rewinds to a position previously obtained from [`Cursor::mark`].
    pub fn reset(&mut self, mark: usize) {
        debug_assert!(mark >= self.start && mark <= self.end);
        self.index = mark;
    }

    pub fn end(&self) -> bool {
        self.index >= self.end
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.index)
    }

    /// Byte at the current position, or `None` at the end of this view.
    pub fn get(&self) -> Option<u8> {
        if self.end() {
            None
        } else {
            Some(self.text.as_bytes()[self.index])
        }
    }

    /// Bounds-checked lookahead relative to the current position.
    ///
    /// Fails with [`ParseErrorKind::OutOfRange`] past this cursor's own end,
    /// which for a subview may be well before the backing text's end.
    pub fn peek(&self, count: usize) -> ParseResult<u8> {
        let pos = self.index + count;
        if pos >= self.end {
            return Err(ParseError::new(ParseErrorKind::OutOfRange, self.end));
        }
        Ok(self.text.as_bytes()[pos])
    }

    pub fn advance(&mut self, count: usize) -> ParseResult<()> {
        if self.index + count > self.end {
            return Err(ParseError::new(ParseErrorKind::OutOfRange, self.end));
        }
        self.index += count;
        Ok(())
    }

    /// Consumes the next `count` bytes and returns them as a slice of the
    /// backing text.
    pub fn next(&mut self, count: usize) -> ParseResult<&'a str> {
        if self.index + count > self.end {
            return Err(ParseError::new(ParseErrorKind::OutOfRange, self.end));
        }
        let piece = self
            .text
            .get(self.index..self.index + count)
            .ok_or_else(|| ParseError::new(ParseErrorKind::OutOfRange, self.index))?;
        self.index += count;
        Ok(piece)
    }

    /// Consumes `literal` iff the upcoming input matches it verbatim.
    pub fn expect(&mut self, literal: &str) -> bool {
        let to = self.index + literal.len();
        if to <= self.end && self.text.get(self.index..to) == Some(literal) {
            self.index = to;
            return true;
        }
        false
    }

    /// A bounded subview over the next `count` bytes, sharing the backing
    /// text but independently positioned. The parent is not advanced.
    pub fn sub(&self, count: usize) -> Cursor<'a> {
        Cursor {
            text: self.text,
            start: self.index,
            end: (self.index + count).min(self.end),
            index: self.index,
        }
    }

    /// Skips leading ASCII whitespace.
    pub fn strip_leading(&mut self) -> &mut Self {
        while let Some(b) = self.get() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.index += 1;
        }
        self
    }

    /// The maximal run of non-whitespace bytes, consumed.
    ///
    /// Returns `None` at end of input; an empty token (whitespace directly
    /// ahead) is `Some("")`, which is a distinct condition.
    pub fn next_token(&mut self) -> Option<&'a str> {
        if self.end() {
            return None;
        }
        let bytes = self.text.as_bytes();
        let mut count = 0;
        while self.index + count < self.end && !bytes[self.index + count].is_ascii_whitespace() {
            count += 1;
        }
        self.next(count).ok()
    }

    /// Everything between the current position and this view's end.
    pub fn rest(&self) -> &'a str {
        self.text.get(self.index..self.end).unwrap_or("")
    }
}
