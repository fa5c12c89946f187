//! # Token Streams
//!
//! Prediction reads lookahead through the [`TokenStream`] trait. It peeks
//! and consumes speculatively and always seeks back to where it started, so
//! a stream must support exact rollback via [`TokenStream::seek`].
//!
//! Symbols are plain token types; the end of input is [`EOF`].

use crate::{EOF, INVALID_TOKEN_TYPE};

/// Lookahead access to a stream of token types.
pub trait TokenStream {
    /// The symbol `offset` positions away from the cursor. `la(1)` is the
    /// next symbol, `la(-1)` the previous one. Reading past the end yields
    /// [`EOF`]; `la(0)` and reading before the start yield
    /// [`INVALID_TOKEN_TYPE`].
    fn la(&mut self, offset: isize) -> i32;

    /// Advance past the next symbol. Consuming at [`EOF`] is a no-op.
    fn consume(&mut self);

    /// Index of the next symbol.
    fn index(&self) -> usize;

    /// Number of symbols, including the trailing [`EOF`] when known.
    fn size(&self) -> usize;

    /// Ask the stream to keep everything from the current position on
    /// available for [`seek`](Self::seek) until the marker is released.
    fn mark(&mut self) -> isize;

    fn release(&mut self, marker: isize);

    /// Move the cursor to `index`.
    fn seek(&mut self, index: usize);
}

/// A stream over a pre-lexed vector of token types.
///
/// An [`EOF`] is appended when the input does not already end with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecTokenStream {
    symbols: Vec<i32>,
    pos: usize,
    marks: usize,
}

impl VecTokenStream {
    #[must_use]
    pub fn new(mut symbols: Vec<i32>) -> Self {
        if symbols.last() != Some(&EOF) {
            symbols.push(EOF);
        }
        Self { symbols, pos: 0, marks: 0 }
    }

    #[must_use]
    pub fn symbols(&self) -> &[i32] {
        &self.symbols
    }

    /// Number of symbols excluding the trailing [`EOF`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Markers handed out and not yet released.
    #[must_use]
    pub fn open_markers(&self) -> usize {
        self.marks
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl TokenStream for VecTokenStream {
    fn la(&mut self, offset: isize) -> i32 {
        match offset {
            0 => INVALID_TOKEN_TYPE,
            o if o < 0 => self
                .pos
                .checked_sub(o.unsigned_abs())
                .map_or(INVALID_TOKEN_TYPE, |i| self.symbols[i]),
            o => self.symbols.get(self.pos + o as usize - 1).copied().unwrap_or(EOF),
        }
    }

    fn consume(&mut self) {
        if self.symbols.get(self.pos).is_some_and(|&s| s != EOF) {
            self.pos += 1;
        }
    }

    fn index(&self) -> usize {
        self.pos
    }

    fn size(&self) -> usize {
        self.symbols.len()
    }

    fn mark(&mut self) -> isize {
        self.marks += 1;
        -(self.marks as isize)
    }

    fn release(&mut self, _marker: isize) {
        self.marks = self.marks.saturating_sub(1);
    }

    fn seek(&mut self, index: usize) {
        self.pos = index.min(self.symbols.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead() {
        let mut stream = VecTokenStream::new(vec![3, 4]);
        assert_eq!(stream.la(1), 3);
        assert_eq!(stream.la(2), 4);
        assert_eq!(stream.la(3), EOF);
        assert_eq!(stream.la(9), EOF);
        assert_eq!(stream.la(-1), INVALID_TOKEN_TYPE);
        stream.consume();
        assert_eq!(stream.la(-1), 3);
        assert_eq!(stream.la(0), INVALID_TOKEN_TYPE);
    }

    #[test]
    fn test_consume_stops_at_eof() {
        let mut stream = VecTokenStream::new(vec![3]);
        stream.consume();
        stream.consume();
        stream.consume();
        assert_eq!(stream.index(), 1);
        assert_eq!(stream.la(1), EOF);
    }

    #[test]
    fn test_mark_seek_release() {
        let mut stream = VecTokenStream::new(vec![3, 4, 5]);
        let marker = stream.mark();
        let start = stream.index();
        stream.consume();
        stream.consume();
        stream.seek(start);
        stream.release(marker);
        assert_eq!(stream.la(1), 3);
        assert_eq!(stream.open_markers(), 0);
    }

    #[test]
    fn test_existing_eof_is_not_duplicated() {
        let stream = VecTokenStream::new(vec![3, EOF]);
        assert_eq!(stream.size(), 2);
        assert_eq!(stream.len(), 1);
    }
}
