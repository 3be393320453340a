//! Transactions: one atomic step from one document state to the next.

use super::buffer::DocState;
use super::change::{Change, ChangeSet};
use super::selection::EditorSelection;

/// The user action that produced a transaction, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// Characters typed at the cursor.
    Input,
    /// Backward deletion (backspace).
    Delete,
    /// Text inserted by accepting a completion or snippet.
    Complete,
}

/// Coarse classification used by the completion machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Recognized typing.
    TypedInput,
    /// Recognized backward deletion.
    Deletion,
    /// Selection moved without touching the text, not from typing.
    SelectionOnly,
    /// Anything else: programmatic edits, undo, completion insertion, or
    /// a transaction that changed nothing.
    Other,
}

/// Description of a transaction to dispatch.
#[derive(Debug, Clone, Default)]
pub struct TransactionSpec {
    /// Changes in the coordinates of the current document.
    pub changes: Vec<Change>,
    /// New selection; when `None` the old selection is mapped.
    pub selection: Option<EditorSelection>,
    /// User action annotation.
    pub user_event: Option<UserEvent>,
}

impl TransactionSpec {
    /// Creates a spec with the given changes.
    #[must_use]
    pub fn changes(changes: Vec<Change>) -> Self {
        Self {
            changes,
            ..Self::default()
        }
    }

    /// Sets the selection.
    #[must_use]
    pub fn with_selection(mut self, selection: EditorSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Sets the user event.
    #[must_use]
    pub const fn with_user_event(mut self, event: UserEvent) -> Self {
        self.user_event = Some(event);
        self
    }
}

/// An applied transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// State before the transaction.
    pub start: DocState,
    /// State after the transaction.
    pub state: DocState,
    /// The document changes.
    pub changes: ChangeSet,
    /// Whether the transaction set the selection explicitly.
    pub selection_set: bool,
    /// User action annotation.
    pub user_event: Option<UserEvent>,
}

impl Transaction {
    /// Creates a transaction that changes nothing.
    #[must_use]
    pub fn unchanged(state: DocState) -> Self {
        Self {
            changes: ChangeSet::empty(state.len_chars()),
            start: state.clone(),
            state,
            selection_set: false,
            user_event: None,
        }
    }

    /// Returns whether the document text changed.
    #[must_use]
    pub fn doc_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Returns the typing event, if this is recognized typing or deletion.
    #[must_use]
    pub fn typing_event(&self) -> Option<UserEvent> {
        match self.user_event {
            Some(UserEvent::Input) => Some(UserEvent::Input),
            Some(UserEvent::Delete) => Some(UserEvent::Delete),
            _ => None,
        }
    }

    /// Classifies the transaction.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        match self.typing_event() {
            Some(UserEvent::Input) => TransactionKind::TypedInput,
            Some(_) => TransactionKind::Deletion,
            None if !self.doc_changed() && self.selection_set => TransactionKind::SelectionOnly,
            None => TransactionKind::Other,
        }
    }

    /// Returns whether this transaction invalidates running queries: it
    /// moved the selection or changed the text without being typing.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        (self.selection_set || self.doc_changed()) && self.typing_event().is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn transaction(user_event: Option<UserEvent>, changed: bool, selection_set: bool) -> Transaction {
        let start = DocState::from_str("abc");
        let changes = if changed {
            ChangeSet::new(vec![Change::insert(3, "d")], 3).unwrap()
        } else {
            ChangeSet::empty(3)
        };
        let mut doc = start.doc.clone();
        changes.apply(&mut doc);
        Transaction {
            state: DocState {
                doc,
                selection: start.selection.map(&changes),
            },
            start,
            changes,
            selection_set,
            user_event,
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            transaction(Some(UserEvent::Input), true, true).kind(),
            TransactionKind::TypedInput
        );
        assert_eq!(
            transaction(Some(UserEvent::Delete), true, true).kind(),
            TransactionKind::Deletion
        );
        assert_eq!(
            transaction(None, false, true).kind(),
            TransactionKind::SelectionOnly
        );
        assert_eq!(
            transaction(Some(UserEvent::Complete), true, true).kind(),
            TransactionKind::Other
        );
    }

    #[test]
    fn test_reset_detection() {
        assert!(!transaction(Some(UserEvent::Input), true, true).is_reset());
        assert!(transaction(None, false, true).is_reset());
        assert!(transaction(None, true, false).is_reset());
        assert!(transaction(Some(UserEvent::Complete), true, true).is_reset());
        assert!(!transaction(None, false, false).is_reset());
    }
}
