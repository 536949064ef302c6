//! Offset <-> (line, column) mapping over a sequence of text lines.
//!
//! Every component of the collaboration core speaks flat character
//! offsets; the editor widget speaks 1-based (line, column) positions.
//! These two functions are the only bridge between the spaces.
//!
//! ```text
//!  lines:   "ab" │ "cde" │ ""
//!  offset:   0 1 2  3 4 5 6  7
//!            ▲   ▲           ▲
//!          (1,1)(1,3)      (3,1)
//! ```
//!
//! Each line break counts as exactly one character. Offsets count
//! Unicode scalar values, not bytes.

use serde::{Deserialize, Serialize};

/// A 1-based (line, column) position inside a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

/// A half-open range between two positions. `start == end` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range at `pos`.
    pub fn caret(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Build a range from two flat offsets against `lines`.
    pub fn from_offsets<S: AsRef<str>>(lines: &[S], start: usize, end: usize) -> Self {
        Self {
            start: offset_to_position(lines, start),
            end: offset_to_position(lines, end),
        }
    }
}

/// Number of characters in a line, excluding its line break.
#[inline]
fn line_len(line: &str) -> usize {
    line.chars().count()
}

/// Convert a 1-based (line, column) pair into a flat offset.
///
/// Sums the lengths of all lines before `line` (each plus one line
/// break) and adds `column - 1`. The pair is trusted to come from the
/// same snapshot as `lines`.
pub fn position_to_offset<S: AsRef<str>>(lines: &[S], line: usize, column: usize) -> usize {
    let before: usize = lines
        .iter()
        .take(line.saturating_sub(1))
        .map(|l| line_len(l.as_ref()) + 1)
        .sum();
    before + column.saturating_sub(1)
}

/// Convert a flat offset into a 1-based position.
///
/// Offsets past the end of the text clamp to the end of the last line;
/// this never fails.
pub fn offset_to_position<S: AsRef<str>>(lines: &[S], offset: usize) -> Position {
    let mut remaining = offset;
    for (index, line) in lines.iter().enumerate() {
        let len = line_len(line.as_ref());
        if remaining <= len {
            return Position::new(index + 1, remaining + 1);
        }
        remaining -= len + 1;
    }

    match lines.last() {
        Some(last) => Position::new(lines.len(), line_len(last.as_ref()) + 1),
        None => Position::START,
    }
}

/// Split a text snapshot into lines the way the editor reports them.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Length of a text snapshot in offset units.
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
