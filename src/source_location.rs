//! Source Location Utilities
//!
//! Line/column bookkeeping shared by the grammar scanner and the runtime
//! error builder. Offsets are UTF-8 byte offsets; lines and columns are
//! 1-based and columns count characters, not bytes.

use std::fmt;

/// A position in grammar source or parser input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in chars)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Create a position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Calculate position from a byte offset in the input
    ///
    /// Offsets past the end are clamped to the input length.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());

        let mut line = 1;
        let mut column = 1;

        for (index, ch) in input.char_indices() {
            if index >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        Self {
            offset,
            line,
            column,
        }
    }

    /// The full text of the line containing this position, without its terminator
    pub fn line_text<'a>(&self, input: &'a str) -> &'a str {
        line_of(input, self.offset)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}

/// Return the line of `input` that contains byte `offset`
pub fn line_of(input: &str, offset: usize) -> &str {
    let offset = offset.min(input.len());
    let start = input[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = input[offset..]
        .find('\n')
        .map_or(input.len(), |i| offset + i);
    input[start..end].trim_end_matches('\r')
}

/// Incremental line/column tracker for left-to-right scanners
///
/// Cheaper than [`SourcePosition::from_offset`] when positions are needed
/// for every token.
#[derive(Debug, Clone, Copy)]
pub struct LineTracker {
    position: SourcePosition,
}

impl LineTracker {
    /// Start tracking at the beginning of the input
    pub fn new() -> Self {
        Self {
            position: SourcePosition::start(),
        }
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// Advance past one character
    #[inline]
    pub fn advance(&mut self, ch: char) {
        self.position.offset += ch.len_utf8();
        if ch == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
    }
}

impl Default for LineTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_offset_first_line() {
        let pos = SourcePosition::from_offset("hello world", 6);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 7);
    }

    #[test]
    fn test_from_offset_after_newline() {
        let input = "ab\ncd\nef";
        let pos = SourcePosition::from_offset(input, 4);
        assert_eq!((pos.line, pos.column), (2, 2));
        assert_eq!(pos.line_text(input), "cd");
    }

    #[test]
    fn test_from_offset_counts_chars() {
        let input = "héllo";
        let pos = SourcePosition::from_offset(input, 3);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_from_offset_clamps() {
        let pos = SourcePosition::from_offset("abc", 99);
        assert_eq!(pos.offset, 3);
        assert_eq!(pos.column, 4);
    }

    #[test]
    fn test_line_of_crlf() {
        assert_eq!(line_of("one\r\ntwo", 1), "one");
        assert_eq!(line_of("one\r\ntwo", 6), "two");
        assert_eq!(line_of("", 0), "");
    }

    #[test]
    fn test_tracker_matches_from_offset() {
        let input = "a\nbc\n\nd";
        let mut tracker = LineTracker::new();
        for ch in input.chars() {
            tracker.advance(ch);
            let expected = SourcePosition::from_offset(input, tracker.position().offset);
            assert_eq!(tracker.position(), expected);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(SourcePosition::new(0, 3, 9).to_string(), "3:9");
    }
}
