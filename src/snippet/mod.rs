//! Snippets: templated insertions with fields the user tabs through.
//!
//! Inserting a snippet selects its first field. While the selection stays
//! inside the active field, [`SnippetNavigator::next_field`] and
//! [`SnippetNavigator::prev_field`] move between fields. Moving onto the
//! last field, moving the selection elsewhere, or an edit that deletes a
//! field ends the session.

mod template;

pub use self::template::{FieldRange, Snippet};

use tracing::debug;

use crate::editor::{
    Change, Editor, EditorError, EditorSelection, SelectionRange, Transaction, TransactionSpec,
    UserEvent,
};

/// Fields of an inserted snippet and the field being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSnippet {
    /// Every field occurrence.
    ranges: Vec<FieldRange>,
    /// Active field index.
    active: usize,
}

impl ActiveSnippet {
    /// Creates a session with `active` as the current field.
    #[must_use]
    pub const fn new(ranges: Vec<FieldRange>, active: usize) -> Self {
        Self { ranges, active }
    }

    /// Returns the field occurrences.
    #[must_use]
    pub fn ranges(&self) -> &[FieldRange] {
        &self.ranges
    }

    /// Returns the active field.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.active
    }

    /// Returns whether field `field` occurs.
    #[must_use]
    pub fn has_field(&self, field: usize) -> bool {
        self.ranges.iter().any(|r| r.field == field)
    }

    /// Maps every range through `tr`. Returns `None` if a range was deleted.
    #[must_use]
    pub fn map(&self, tr: &Transaction) -> Option<Self> {
        let ranges = self
            .ranges
            .iter()
            .map(|r| r.map(&tr.changes))
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(ranges, self.active))
    }

    /// Returns whether every range of `selection` lies inside an occurrence
    /// of the active field.
    #[must_use]
    pub fn contains_selection(&self, selection: &EditorSelection) -> bool {
        selection.ranges().iter().all(|s| {
            self.ranges
                .iter()
                .any(|r| r.field == self.active && r.from <= s.from() && r.to >= s.to())
        })
    }

    /// Returns a selection covering every occurrence of `field`.
    #[must_use]
    pub fn field_selection(&self, field: usize) -> EditorSelection {
        field_selection(&self.ranges, field)
    }
}

fn field_selection(ranges: &[FieldRange], field: usize) -> EditorSelection {
    let ranges = ranges
        .iter()
        .filter(|r| r.field == field)
        .map(|r| SelectionRange::new(r.from, r.to))
        .collect();
    EditorSelection::create(ranges, 0)
}

/// Tracks the snippet session of one editor.
#[derive(Debug, Default)]
pub struct SnippetNavigator {
    /// Current session.
    active: Option<ActiveSnippet>,
}

impl SnippetNavigator {
    /// Creates a navigator with no session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current session.
    #[must_use]
    pub const fn active(&self) -> Option<&ActiveSnippet> {
        self.active.as_ref()
    }

    /// Returns whether a session is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Follows a transaction dispatched outside the navigator.
    pub fn update(&mut self, tr: &Transaction) {
        let Some(active) = self.active.take() else {
            return;
        };
        let mapped = if tr.doc_changed() {
            active.map(tr)
        } else {
            Some(active)
        };
        self.active = mapped.filter(|a| !tr.selection_set || a.contains_selection(&tr.state.selection));
        if self.active.is_none() {
            debug!("Snippet session ended");
        }
    }

    /// Inserts `snippet` over `[from, to)` and selects its first field.
    ///
    /// A session starts only if the snippet has more than one field
    /// occurrence.
    ///
    /// # Errors
    /// Returns an error if the range is invalid.
    pub fn insert(
        &mut self,
        editor: &mut Editor,
        snippet: &Snippet,
        from: usize,
        to: usize,
    ) -> Result<Transaction, EditorError> {
        let line = editor.line_at(from);
        let base_indent: String = line.text.chars().take_while(|c| c.is_whitespace()).collect();
        let (text, ranges) = snippet.instantiate(&base_indent, editor.indent_unit(), from);

        let mut spec = TransactionSpec::changes(vec![Change::new(from, to, text)])
            .with_user_event(UserEvent::Complete);
        if !ranges.is_empty() {
            spec = spec.with_selection(field_selection(&ranges, 0));
        }
        let tr = editor.dispatch(spec)?;

        self.active = (ranges.len() > 1).then(|| ActiveSnippet::new(ranges, 0));
        debug!(
            "Inserted snippet with {} fields (session: {})",
            snippet.field_count(),
            self.active.is_some()
        );
        Ok(tr)
    }

    /// Selects the next field. Moving onto the last field ends the session.
    ///
    /// Returns `None` when there is no session.
    ///
    /// # Errors
    /// Returns an error if the field ranges no longer fit the document.
    pub fn next_field(&mut self, editor: &mut Editor) -> Result<Option<Transaction>, EditorError> {
        self.move_field(editor, true)
    }

    /// Selects the previous field.
    ///
    /// Returns `None` when there is no session or the first field is active.
    ///
    /// # Errors
    /// Returns an error if the field ranges no longer fit the document.
    pub fn prev_field(&mut self, editor: &mut Editor) -> Result<Option<Transaction>, EditorError> {
        self.move_field(editor, false)
    }

    fn move_field(
        &mut self,
        editor: &mut Editor,
        forward: bool,
    ) -> Result<Option<Transaction>, EditorError> {
        let Some(active) = &self.active else {
            return Ok(None);
        };
        let next = if forward {
            active.active + 1
        } else if let Some(prev) = active.active.checked_sub(1) {
            prev
        } else {
            return Ok(None);
        };
        if !active.has_field(next) {
            return Ok(None);
        }

        let last = forward && !active.has_field(next + 1);
        let selection = active.field_selection(next);
        let session = (!last).then(|| ActiveSnippet::new(active.ranges.clone(), next));

        let tr = editor.dispatch_selection(selection)?;
        self.active = session;
        Ok(Some(tr))
    }

    /// Ends the session. Returns whether one was active.
    pub fn clear(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Handles a click at `pos`.
    ///
    /// Clicking an occurrence of a field other than the active one selects
    /// that field. Returns `None` when the click is not on such a field.
    ///
    /// # Errors
    /// Returns an error if the field ranges no longer fit the document.
    pub fn click(
        &mut self,
        editor: &mut Editor,
        pos: usize,
    ) -> Result<Option<Transaction>, EditorError> {
        let Some(active) = &self.active else {
            return Ok(None);
        };
        let Some(hit) = active.ranges.iter().find(|r| r.from <= pos && r.to >= pos) else {
            return Ok(None);
        };
        if hit.field == active.active {
            return Ok(None);
        }

        let field = hit.field;
        let selection = active.field_selection(field);
        let session = active
            .ranges
            .iter()
            .any(|r| r.field > field)
            .then(|| ActiveSnippet::new(active.ranges.clone(), field));

        let tr = editor.dispatch_selection(selection)?;
        self.active = session;
        Ok(Some(tr))
    }
}
