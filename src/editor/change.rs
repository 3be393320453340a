//! Change descriptions and position remapping.
//!
//! A [`ChangeSet`] describes the edits made by one transaction, expressed in
//! the coordinates of the document *before* the transaction. Anything that
//! stores document offsets (completion ranges, snippet fields, selections)
//! maps them through the change set to stay valid.
//!
//! All offsets are character indices into the rope.

use ropey::Rope;

use super::buffer::EditorError;

/// Which side of an insertion a position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assoc {
    /// Stay before text inserted exactly at the position.
    #[default]
    Before,
    /// Move past text inserted exactly at the position.
    After,
}

/// How to treat positions whose surrounding text was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    /// Always produce a position, collapsing into the replacement.
    #[default]
    Simple,
    /// Report `None` when the text on both sides of the position was deleted.
    TrackDel,
}

/// A single replacement of `[from, to)` by `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Start of the replaced range.
    pub from: usize,
    /// End of the replaced range (exclusive).
    pub to: usize,
    /// Replacement text.
    pub insert: String,
}

impl Change {
    /// Creates a replacement of `[from, to)`.
    #[must_use]
    pub fn new(from: usize, to: usize, insert: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    /// Creates a pure insertion at `pos`.
    #[must_use]
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        Self::new(pos, pos, text)
    }

    /// Creates a pure deletion of `[from, to)`.
    #[must_use]
    pub fn delete(from: usize, to: usize) -> Self {
        Self::new(from, to, String::new())
    }

    /// Returns the inserted length in characters.
    #[must_use]
    pub fn insert_len(&self) -> usize {
        self.insert.chars().count()
    }

    fn is_noop(&self) -> bool {
        self.from == self.to && self.insert.is_empty()
    }
}

/// The edits of one transaction, sorted and non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
    len_before: usize,
}

impl ChangeSet {
    /// Creates a change set that changes nothing in a document of `len` chars.
    #[must_use]
    pub fn empty(len: usize) -> Self {
        Self {
            changes: Vec::new(),
            len_before: len,
        }
    }

    /// Builds a change set for a document of `len_before` characters.
    ///
    /// Changes may be given in any order. No-op changes are dropped.
    ///
    /// # Errors
    /// Returns an error if a change is out of bounds, inverted, or overlaps
    /// another change.
    pub fn new(mut changes: Vec<Change>, len_before: usize) -> Result<Self, EditorError> {
        changes.retain(|c| !c.is_noop());
        changes.sort_by_key(|c| (c.from, c.to));

        let mut prev_to = 0;
        for (i, change) in changes.iter().enumerate() {
            if change.from > change.to {
                return Err(EditorError::InvalidRange {
                    from: change.from,
                    to: change.to,
                });
            }
            if change.to > len_before {
                return Err(EditorError::OutOfBounds {
                    pos: change.to,
                    len: len_before,
                });
            }
            if i > 0 && change.from < prev_to {
                return Err(EditorError::OverlappingChanges { at: change.from });
            }
            prev_to = change.to;
        }

        Ok(Self {
            changes,
            len_before,
        })
    }

    /// Returns whether the change set leaves the document untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the individual changes, sorted by position.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Returns the document length the change set applies to.
    #[must_use]
    pub const fn len_before(&self) -> usize {
        self.len_before
    }

    /// Returns the document length after applying the change set.
    #[must_use]
    pub fn len_after(&self) -> usize {
        self.changes.iter().fold(self.len_before, |len, c| {
            len - (c.to - c.from) + c.insert_len()
        })
    }

    /// Maps a position through the changes.
    ///
    /// `pos` must not exceed [`len_before`](Self::len_before). Returns
    /// `None` only in [`MapMode::TrackDel`] when the position was deleted.
    #[must_use]
    pub fn map_pos(&self, pos: usize, assoc: Assoc, mode: MapMode) -> Option<usize> {
        let mut consumed = 0;
        let mut produced = 0;

        for change in &self.changes {
            if pos < change.from {
                break;
            }
            let start = change.from - consumed + produced;
            let ins = change.insert_len();

            if mode == MapMode::TrackDel && change.from < pos && pos < change.to {
                return None;
            }
            let pure_insert_before =
                change.from == change.to && pos == change.to && assoc == Assoc::Before;
            if pos < change.to || pure_insert_before {
                return Some(if pos == change.from || assoc == Assoc::Before {
                    start
                } else {
                    start + ins
                });
            }

            consumed += change.to - change.from;
            produced += ins;
        }

        Some(pos - consumed + produced)
    }

    /// Maps a position in [`MapMode::Simple`], which never fails.
    #[must_use]
    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_pos(pos, assoc, MapMode::Simple).unwrap_or(pos)
    }

    /// Maps a half-open range, keeping its start before and its end after
    /// insertions at the edges.
    #[must_use]
    pub fn map_range(&self, from: usize, to: usize, mode: MapMode) -> Option<(usize, usize)> {
        let from = self.map_pos(from, Assoc::Before, mode)?;
        let to = self.map_pos(to, Assoc::After, mode)?;
        Some((from, to.max(from)))
    }

    /// Returns whether any change touches `[from, to]`, edges included.
    #[must_use]
    pub fn touches_range(&self, from: usize, to: usize) -> bool {
        self.changes
            .iter()
            .take_while(|c| c.from <= to)
            .any(|c| c.to >= from)
    }

    /// Applies the changes to a rope.
    pub fn apply(&self, rope: &mut Rope) {
        for change in self.changes.iter().rev() {
            if change.to > change.from {
                rope.remove(change.from..change.to);
            }
            if !change.insert.is_empty() {
                rope.insert(change.from, &change.insert);
            }
        }
    }

    /// Returns the change set that undoes this one.
    ///
    /// `before` must be the document this change set was applied to.
    #[must_use]
    pub fn invert(&self, before: &Rope) -> Self {
        let mut consumed = 0;
        let mut produced = 0;
        let mut inverse = Vec::with_capacity(self.changes.len());

        for change in &self.changes {
            let start = change.from - consumed + produced;
            let ins = change.insert_len();
            inverse.push(Change::new(
                start,
                start + ins,
                before.slice(change.from..change.to).to_string(),
            ));
            consumed += change.to - change.from;
            produced += ins;
        }

        Self {
            changes: inverse,
            len_before: self.len_after(),
        }
    }
}
