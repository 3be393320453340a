//! In-memory editor host.
//!
//! Provides the document the completion engine works against: rope text,
//! multi-range selection, transactions with change sets, and undo.

pub mod buffer;
pub mod change;
pub mod selection;
pub mod transaction;

use tracing::trace;

pub use self::buffer::{DocState, EditorError, Line};
pub use self::change::{Assoc, Change, ChangeSet, MapMode};
pub use self::selection::{EditorSelection, SelectionRange};
pub use self::transaction::{Transaction, TransactionKind, TransactionSpec, UserEvent};

/// Default indent unit.
pub const DEFAULT_INDENT_UNIT: &str = "    ";

/// Callback invoked after every dispatched transaction.
pub type TransactionListener = Box<dyn FnMut(&Transaction) + Send>;

/// Undo history entry.
struct HistoryEntry {
    /// Changes that revert the transaction.
    inverse: ChangeSet,
    /// Selection before the transaction.
    selection: EditorSelection,
}

/// Editor instance.
pub struct Editor {
    /// Current document state.
    state: DocState,
    /// Text inserted per indentation level.
    indent_unit: String,
    /// Undo history, most recent last.
    history: Vec<HistoryEntry>,
    /// Transaction listeners.
    listeners: Vec<TransactionListener>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("indent_unit", &self.indent_unit)
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Editor {
    /// Creates an empty editor.
    #[must_use]
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Creates an editor holding `text`, with the cursor at the end.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            state: DocState::from_str(text),
            indent_unit: DEFAULT_INDENT_UNIT.to_string(),
            history: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Sets the indent unit.
    #[must_use]
    pub fn with_indent_unit(mut self, unit: impl Into<String>) -> Self {
        self.indent_unit = unit.into();
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &DocState {
        &self.state
    }

    /// Returns the full text.
    #[must_use]
    pub fn text(&self) -> String {
        self.state.text()
    }

    /// Returns the document length in characters.
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.state.len_chars()
    }

    /// Returns the selection.
    #[must_use]
    pub const fn selection(&self) -> &EditorSelection {
        &self.state.selection
    }

    /// Returns the cursor offset (head of the main selection range).
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.state.cursor()
    }

    /// Returns the text in `[from, to)`.
    #[must_use]
    pub fn slice_text(&self, from: usize, to: usize) -> String {
        self.state.slice(from, to)
    }

    /// Returns the line containing `pos`.
    #[must_use]
    pub fn line_at(&self, pos: usize) -> Line {
        self.state.line_at(pos)
    }

    /// Returns the indent unit.
    #[must_use]
    pub fn indent_unit(&self) -> &str {
        &self.indent_unit
    }

    /// Returns whether there is anything to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Registers a listener for every dispatched transaction.
    pub fn on_transaction(&mut self, listener: TransactionListener) {
        self.listeners.push(listener);
    }

    /// Dispatches a transaction.
    ///
    /// # Errors
    /// Returns an error if a change or the new selection is out of bounds.
    pub fn dispatch(&mut self, spec: TransactionSpec) -> Result<Transaction, EditorError> {
        self.dispatch_inner(spec, true)
    }

    /// Applies an atomic multi-range edit, mapping the selection through it.
    ///
    /// # Errors
    /// Returns an error if the edits are out of bounds or overlap.
    pub fn apply_edit(&mut self, changes: Vec<Change>) -> Result<Transaction, EditorError> {
        self.dispatch(TransactionSpec::changes(changes))
    }

    /// Sets the selection.
    ///
    /// # Errors
    /// Returns an error if a range is out of bounds.
    pub fn dispatch_selection(
        &mut self,
        selection: EditorSelection,
    ) -> Result<Transaction, EditorError> {
        self.dispatch(TransactionSpec::default().with_selection(selection))
    }

    /// Types `text` at every selection range, replacing selected text.
    ///
    /// # Errors
    /// Returns an error if the selection is out of bounds.
    pub fn type_text(&mut self, text: &str) -> Result<Transaction, EditorError> {
        let ranges = self.state.selection.ranges();
        let changes: Vec<Change> = ranges
            .iter()
            .map(|r| Change::new(r.from(), r.to(), text))
            .collect();
        let set = ChangeSet::new(changes.clone(), self.len_chars())?;
        let cursors = ranges
            .iter()
            .map(|r| SelectionRange::cursor(set.map(r.to(), Assoc::After)))
            .collect();
        let selection = EditorSelection::create(cursors, self.state.selection.main_index());

        self.dispatch(
            TransactionSpec::changes(changes)
                .with_selection(selection)
                .with_user_event(UserEvent::Input),
        )
    }

    /// Deletes the selected text, or the character before each cursor.
    ///
    /// Returns `None` when there was nothing to delete.
    ///
    /// # Errors
    /// Returns an error if the selection is out of bounds.
    pub fn delete_backward(&mut self) -> Result<Option<Transaction>, EditorError> {
        let ranges = self.state.selection.ranges();
        let changes: Vec<Change> = ranges
            .iter()
            .filter_map(|r| {
                if !r.is_empty() {
                    Some(Change::delete(r.from(), r.to()))
                } else if r.head > 0 {
                    Some(Change::delete(r.head - 1, r.head))
                } else {
                    None
                }
            })
            .collect();
        if changes.is_empty() {
            return Ok(None);
        }

        let set = ChangeSet::new(changes.clone(), self.len_chars())?;
        let cursors = ranges
            .iter()
            .map(|r| SelectionRange::cursor(set.map(r.from(), Assoc::Before)))
            .collect();
        let selection = EditorSelection::create(cursors, self.state.selection.main_index());

        self.dispatch(
            TransactionSpec::changes(changes)
                .with_selection(selection)
                .with_user_event(UserEvent::Delete),
        )
        .map(Some)
    }

    /// Moves the cursor to `pos`, collapsing the selection.
    ///
    /// # Errors
    /// Returns an error if `pos` is out of bounds.
    pub fn move_cursor(&mut self, pos: usize) -> Result<Transaction, EditorError> {
        self.dispatch_selection(EditorSelection::cursor(pos))
    }

    /// Replaces `[from, to)` programmatically (no user event).
    ///
    /// # Errors
    /// Returns an error if the range is invalid.
    pub fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<Transaction, EditorError> {
        self.apply_edit(vec![Change::new(from, to, text)])
    }

    /// Reverts the most recent document change.
    ///
    /// Returns `None` when the history is empty.
    ///
    /// # Errors
    /// Returns an error if the history no longer fits the document.
    pub fn undo(&mut self) -> Result<Option<Transaction>, EditorError> {
        let Some(entry) = self.history.last() else {
            return Ok(None);
        };
        let spec = TransactionSpec::changes(entry.inverse.changes().to_vec())
            .with_selection(entry.selection.clone());
        // The entry stays in the history if it cannot be applied.
        let tr = self.dispatch_inner(spec, false)?;
        self.history.pop();
        Ok(Some(tr))
    }

    fn dispatch_inner(
        &mut self,
        spec: TransactionSpec,
        record: bool,
    ) -> Result<Transaction, EditorError> {
        let changes = ChangeSet::new(spec.changes, self.len_chars())?;
        let mut doc = self.state.doc.clone();
        changes.apply(&mut doc);

        let selection_set = spec.selection.is_some();
        let selection = match spec.selection {
            Some(selection) => {
                let max = selection.max_offset();
                if max > doc.len_chars() {
                    return Err(EditorError::OutOfBounds {
                        pos: max,
                        len: doc.len_chars(),
                    });
                }
                selection
            }
            None => self.state.selection.map(&changes),
        };

        if record && !changes.is_empty() {
            self.history.push(HistoryEntry {
                inverse: changes.invert(&self.state.doc),
                selection: self.state.selection.clone(),
            });
        }

        let start = std::mem::replace(&mut self.state, DocState { doc, selection });
        let tr = Transaction {
            start,
            state: self.state.clone(),
            changes,
            selection_set,
            user_event: spec.user_event,
        };
        trace!(
            "Transaction: {} change(s), selection_set={}, event={:?}",
            tr.changes.changes().len(),
            tr.selection_set,
            tr.user_event
        );

        for listener in &mut self.listeners {
            listener(&tr);
        }
        Ok(tr)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_type_text_moves_cursor() {
        let mut editor = Editor::from_text("ab");
        let tr = editor.type_text("cd").unwrap();
        assert_eq!(editor.text(), "abcd");
        assert_eq!(editor.current_offset(), 4);
        assert_eq!(tr.kind(), TransactionKind::TypedInput);
    }

    #[test]
    fn test_type_text_replaces_selection() {
        let mut editor = Editor::from_text("hello world");
        editor
            .dispatch_selection(EditorSelection::single(SelectionRange::new(0, 5)))
            .unwrap();
        editor.type_text("bye").unwrap();
        assert_eq!(editor.text(), "bye world");
        assert_eq!(editor.current_offset(), 3);
    }

    #[test]
    fn test_type_text_multi_cursor() {
        let mut editor = Editor::from_text("a\nb");
        editor
            .dispatch_selection(EditorSelection::create(
                vec![SelectionRange::cursor(1), SelectionRange::cursor(3)],
                1,
            ))
            .unwrap();
        editor.type_text("x").unwrap();
        assert_eq!(editor.text(), "ax\nbx");
        assert_eq!(editor.selection().ranges()[0].head, 2);
        assert_eq!(editor.current_offset(), 5);
    }

    #[test]
    fn test_delete_backward() {
        let mut editor = Editor::from_text("abc");
        let tr = editor.delete_backward().unwrap().unwrap();
        assert_eq!(editor.text(), "ab");
        assert_eq!(editor.current_offset(), 2);
        assert_eq!(tr.kind(), TransactionKind::Deletion);

        editor.move_cursor(0).unwrap();
        assert!(editor.delete_backward().unwrap().is_none());
    }

    #[test]
    fn test_replace_range_is_reset() {
        let mut editor = Editor::from_text("hello");
        let tr = editor.replace_range(0, 1, "J").unwrap();
        assert_eq!(editor.text(), "Jello");
        assert!(tr.is_reset());
        assert_eq!(tr.kind(), TransactionKind::Other);
    }

    #[test]
    fn test_move_cursor_out_of_bounds() {
        let mut editor = Editor::from_text("abc");
        assert!(matches!(
            editor.move_cursor(10),
            Err(EditorError::OutOfBounds { pos: 10, len: 3 })
        ));
        assert_eq!(editor.current_offset(), 3);
    }

    #[test]
    fn test_undo_restores_text_and_selection() {
        let mut editor = Editor::from_text("abc");
        editor.type_text("d").unwrap();
        editor.type_text("e").unwrap();

        let tr = editor.undo().unwrap().unwrap();
        assert_eq!(editor.text(), "abcd");
        assert_eq!(editor.current_offset(), 4);
        assert!(tr.is_reset());

        editor.undo().unwrap();
        assert_eq!(editor.text(), "abc");
        assert!(editor.undo().unwrap().is_none());
    }

    #[test]
    fn test_failed_undo_keeps_history_entry() {
        let mut editor = Editor::from_text("abc");
        editor.history.push(HistoryEntry {
            inverse: ChangeSet::new(vec![Change::new(10, 15, "")], 20).unwrap(),
            selection: EditorSelection::cursor(0),
        });

        assert!(editor.undo().is_err());
        assert!(editor.can_undo());
        assert_eq!(editor.history.len(), 1);
        assert_eq!(editor.text(), "abc");
    }

    #[test]
    fn test_listeners_see_consistent_transactions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut editor = Editor::from_text("fn main");
        editor.on_transaction(Box::new(move |tr| {
            let mut doc = tr.start.doc.clone();
            tr.changes.apply(&mut doc);
            sink.lock().unwrap().push(doc == tr.state.doc);
        }));

        editor.type_text("()").unwrap();
        editor.replace_range(0, 2, "pub fn").unwrap();
        editor.delete_backward().unwrap();
        editor.undo().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|ok| *ok));
    }
}
