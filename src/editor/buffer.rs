//! Document snapshots backed by ropey.
//!
//! A [`DocState`] pairs the text with its selection. Snapshots are cheap to
//! clone (ropey shares tree nodes), so every transaction carries the state
//! before and after it.

use ropey::Rope;
use thiserror::Error;

use super::selection::EditorSelection;

/// Editor error type.
#[derive(Debug, Error)]
pub enum EditorError {
    /// Position out of bounds.
    #[error("Position out of bounds: {pos} (document length {len})")]
    OutOfBounds { pos: usize, len: usize },

    /// Range with its end before its start.
    #[error("Invalid range: {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    /// Two changes in one transaction overlap.
    #[error("Overlapping changes at {at}")]
    OverlappingChanges { at: usize },
}

/// A line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Offset of the first character of the line.
    pub from: usize,
    /// Offset just past the last character, excluding the line break.
    pub to: usize,
    /// Line text without the line break.
    pub text: String,
}

/// Immutable document state: text plus selection.
#[derive(Debug, Clone)]
pub struct DocState {
    /// The text.
    pub doc: Rope,
    /// The selection.
    pub selection: EditorSelection,
}

impl DocState {
    /// Creates a state with the cursor at the end of `text`.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        let doc = Rope::from_str(text);
        let end = doc.len_chars();
        Self {
            doc,
            selection: EditorSelection::cursor(end),
        }
    }

    /// Returns the document length in characters.
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.doc.len_chars()
    }

    /// Returns the head of the main selection range.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.selection.main().head
    }

    /// Returns the text in `[from, to)`, clamped to the document.
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> String {
        slice_rope(&self.doc, from, to)
    }

    /// Returns the line containing `pos`.
    #[must_use]
    pub fn line_at(&self, pos: usize) -> Line {
        line_at(&self.doc, pos)
    }

    /// Returns the full text.
    #[must_use]
    pub fn text(&self) -> String {
        self.doc.to_string()
    }
}

/// Returns the text of `rope` in `[from, to)`, clamped to its length.
#[must_use]
pub fn slice_rope(rope: &Rope, from: usize, to: usize) -> String {
    let len = rope.len_chars();
    let to = to.min(len);
    let from = from.min(to);
    rope.slice(from..to).to_string()
}

/// Returns the line of `rope` containing `pos`.
#[must_use]
pub fn line_at(rope: &Rope, pos: usize) -> Line {
    let pos = pos.min(rope.len_chars());
    let line_idx = rope.char_to_line(pos);
    let from = rope.line_to_char(line_idx);
    let mut text = rope.line(line_idx).to_string();
    while text.ends_with('\n') || text.ends_with('\r') {
        text.pop();
    }
    let to = from + text.chars().count();
    Line { from, to, text }
}
