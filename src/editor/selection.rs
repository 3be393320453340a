//! Selection ranges.
//!
//! An [`EditorSelection`] holds one or more ranges, one of which is the main
//! range. Ranges are kept sorted by position.

use super::change::{Assoc, ChangeSet};

/// A selection range with an anchor and a head (the cursor side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    /// Fixed side of the range.
    pub anchor: usize,
    /// Moving side of the range.
    pub head: usize,
}

impl SelectionRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Creates an empty range at `pos`.
    #[must_use]
    pub const fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Returns whether the range is a plain cursor.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Maps the range through a change set.
    #[must_use]
    pub fn map(&self, changes: &ChangeSet) -> Self {
        if self.is_empty() {
            return Self::cursor(changes.map(self.head, Assoc::Before));
        }
        let from = changes.map(self.from(), Assoc::After);
        let to = changes.map(self.to(), Assoc::Before).max(from);
        if self.anchor <= self.head {
            Self::new(from, to)
        } else {
            Self::new(to, from)
        }
    }
}

/// A multi-range selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSelection {
    ranges: Vec<SelectionRange>,
    main: usize,
}

impl Default for EditorSelection {
    fn default() -> Self {
        Self::cursor(0)
    }
}

impl EditorSelection {
    /// Creates a selection with a single cursor.
    #[must_use]
    pub fn cursor(pos: usize) -> Self {
        Self::single(SelectionRange::cursor(pos))
    }

    /// Creates a selection with a single range.
    #[must_use]
    pub fn single(range: SelectionRange) -> Self {
        Self {
            ranges: vec![range],
            main: 0,
        }
    }

    /// Creates a selection from several ranges.
    ///
    /// Ranges are sorted and exact duplicates removed; `main` keeps pointing
    /// at the same range. An empty list yields a cursor at 0.
    #[must_use]
    pub fn create(ranges: Vec<SelectionRange>, main: usize) -> Self {
        if ranges.is_empty() {
            return Self::cursor(0);
        }
        let main_range = ranges[main.min(ranges.len() - 1)];
        let mut ranges = ranges;
        ranges.sort_by_key(|r| (r.from(), r.to()));
        ranges.dedup();
        let main = ranges.iter().position(|r| *r == main_range).unwrap_or(0);
        Self { ranges, main }
    }

    /// Returns the main range.
    #[must_use]
    pub fn main(&self) -> SelectionRange {
        self.ranges[self.main]
    }

    /// Returns the index of the main range.
    #[must_use]
    pub const fn main_index(&self) -> usize {
        self.main
    }

    /// Returns all ranges, sorted by position.
    #[must_use]
    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    /// Returns the largest offset referenced by the selection.
    #[must_use]
    pub fn max_offset(&self) -> usize {
        self.ranges.iter().map(SelectionRange::to).max().unwrap_or(0)
    }

    /// Maps every range through a change set.
    #[must_use]
    pub fn map(&self, changes: &ChangeSet) -> Self {
        if changes.is_empty() {
            return self.clone();
        }
        let ranges = self.ranges.iter().map(|r| r.map(changes)).collect();
        Self::create(ranges, self.main)
    }
}
