//! Applying a chosen completion to the document.

use crate::editor::{
    Assoc, Change, ChangeSet, Editor, EditorError, EditorSelection, SelectionRange, Transaction,
    TransactionSpec, UserEvent,
};
use crate::snippet::SnippetNavigator;

use super::source::{Apply, Completion};

/// Replaces `[from, to)` with `text` at the main cursor.
///
/// Every other cursor preceded by the same text, at the same offsets
/// relative to it, gets the same replacement. Non-empty secondary ranges
/// are left alone. Cursors land after the inserted text.
///
/// # Errors
/// Returns an error if the range is invalid.
pub fn insert_completion_text(
    editor: &mut Editor,
    text: &str,
    from: usize,
    to: usize,
) -> Result<Transaction, EditorError> {
    if from > to {
        return Err(EditorError::InvalidRange { from, to });
    }
    let state = editor.state();
    let len = state.len_chars();
    if to > len {
        return Err(EditorError::OutOfBounds { pos: to, len });
    }

    let selection = &state.selection;
    let main_index = selection.main_index();
    let main = selection.main();
    let replaced = state.slice(from, to);
    let text_len = text.chars().count();

    let from_off = offset(from) - offset(main.from());
    let to_off = offset(to) - offset(main.from());
    let change_for = |range: &SelectionRange| -> Option<(usize, usize)> {
        let start = offset(range.from()) + from_off;
        let end = if to == main.from() {
            offset(range.to())
        } else {
            offset(range.from()) + to_off
        };
        let start = usize::try_from(start).ok()?;
        let end = usize::try_from(end).ok()?;
        (start <= end && end <= len).then_some((start, end))
    };

    let main_change = change_for(&main).unwrap_or((from, to));
    let mut accepted = vec![main_change];
    let mut targets: Vec<Option<(usize, usize)>> = Vec::with_capacity(selection.ranges().len());

    for (i, range) in selection.ranges().iter().enumerate() {
        if i == main_index {
            targets.push(Some(main_change));
            continue;
        }
        let target = change_for(range).filter(|&(start, end)| {
            range.is_empty()
                && (from == to || state.slice(start, end) == replaced)
                && !accepted
                    .iter()
                    .any(|&(a, b)| (start < b && a < end) || start == a)
        });
        if let Some(change) = target {
            accepted.push(change);
        }
        targets.push(target);
    }

    let changes: Vec<Change> = targets
        .iter()
        .flatten()
        .map(|&(start, end)| Change::new(start, end, text))
        .collect();
    let set = ChangeSet::new(changes.clone(), len)?;
    let ranges = selection
        .ranges()
        .iter()
        .zip(&targets)
        .map(|(range, target)| match target {
            Some((start, _)) => SelectionRange::cursor(set.map(*start, Assoc::Before) + text_len),
            None => range.map(&set),
        })
        .collect();

    editor.dispatch(
        TransactionSpec::changes(changes)
            .with_selection(EditorSelection::create(ranges, main_index))
            .with_user_event(UserEvent::Complete),
    )
}

#[allow(clippy::cast_possible_wrap)]
const fn offset(pos: usize) -> isize {
    pos as isize
}

/// How a completion was applied.
#[derive(Debug)]
pub struct Applied {
    /// The transaction that applied it.
    pub transaction: Transaction,
    /// Whether a snippet was inserted; snippet state is already updated.
    pub snippet: bool,
}

/// Applies `completion` over `[from, to)`.
///
/// Text completions go through [`insert_completion_text`], snippets through
/// the navigator, custom appliers are called as is.
///
/// # Errors
/// Returns an error if the edit is invalid.
pub fn apply_completion(
    editor: &mut Editor,
    snippets: &mut SnippetNavigator,
    completion: &Completion,
    from: usize,
    to: usize,
) -> Result<Applied, EditorError> {
    let (transaction, snippet) = match &completion.apply {
        None => (
            insert_completion_text(editor, &completion.label, from, to)?,
            false,
        ),
        Some(Apply::Text(text)) => (insert_completion_text(editor, text, from, to)?, false),
        Some(Apply::Snippet(snippet)) => (snippets.insert(editor, snippet, from, to)?, true),
        Some(Apply::Custom(apply)) => (apply(editor, completion, from, to)?, false),
    };
    Ok(Applied {
        transaction,
        snippet,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn cursors(editor: &Editor) -> Vec<usize> {
        editor.selection().ranges().iter().map(|r| r.head).collect()
    }

    #[test]
    fn test_replaces_range() {
        let mut editor = Editor::from_text("let x = pr");
        let tr = insert_completion_text(&mut editor, "print", 8, 10).unwrap();
        assert_eq!(editor.text(), "let x = print");
        assert_eq!(cursors(&editor), vec![13]);
        assert_eq!(tr.user_event, Some(UserEvent::Complete));
    }

    #[test]
    fn test_applies_to_matching_cursors() {
        let mut editor = Editor::from_text("pr\npr\nxy");
        let selection = EditorSelection::create(
            vec![
                SelectionRange::cursor(2),
                SelectionRange::cursor(5),
                SelectionRange::cursor(8),
            ],
            0,
        );
        editor.dispatch_selection(selection).unwrap();

        insert_completion_text(&mut editor, "print", 0, 2).unwrap();
        assert_eq!(editor.text(), "print\nprint\nxy");
        assert_eq!(cursors(&editor), vec![5, 11, 14]);
    }

    #[test]
    fn test_empty_range_inserts_at_every_cursor() {
        let mut editor = Editor::from_text("a\nb");
        let selection =
            EditorSelection::create(vec![SelectionRange::cursor(1), SelectionRange::cursor(3)], 1);
        editor.dispatch_selection(selection).unwrap();

        insert_completion_text(&mut editor, "()", 3, 3).unwrap();
        assert_eq!(editor.text(), "a()\nb()");
        assert_eq!(editor.selection().main().head, 7);
    }

    #[test]
    fn test_selected_secondary_range_is_kept() {
        let mut editor = Editor::from_text("ab\nxyz");
        let selection =
            EditorSelection::create(vec![SelectionRange::cursor(2), SelectionRange::new(3, 6)], 0);
        editor.dispatch_selection(selection).unwrap();

        insert_completion_text(&mut editor, "()", 2, 2).unwrap();
        assert_eq!(editor.text(), "ab()\nxyz");
        let ranges = editor.selection().ranges().to_vec();
        assert_eq!(ranges[0].head, 4);
        assert_eq!((ranges[1].from(), ranges[1].to()), (5, 8));
    }

    #[test]
    fn test_invalid_range() {
        let mut editor = Editor::from_text("abc");
        assert!(insert_completion_text(&mut editor, "x", 2, 1).is_err());
        assert!(insert_completion_text(&mut editor, "x", 0, 9).is_err());
    }

    #[test]
    fn test_apply_text_and_label() {
        let mut editor = Editor::from_text("fo");
        let mut snippets = SnippetNavigator::new();
        let completion = Completion::new("foo").with_apply_text("foo()");
        let applied = apply_completion(&mut editor, &mut snippets, &completion, 0, 2).unwrap();
        assert_eq!(editor.text(), "foo()");
        assert!(!applied.snippet);

        let mut editor = Editor::from_text("fo");
        apply_completion(&mut editor, &mut snippets, &Completion::new("foo"), 0, 2).unwrap();
        assert_eq!(editor.text(), "foo");
    }

    #[test]
    fn test_apply_snippet() {
        let mut editor = Editor::from_text("f");
        let mut snippets = SnippetNavigator::new();
        let completion = Completion::new("fn").with_apply(Apply::snippet("fn ${1:name}() {\n\t${2}\n}"));
        let applied = apply_completion(&mut editor, &mut snippets, &completion, 0, 1).unwrap();
        assert!(applied.snippet);
        assert_eq!(editor.text(), "fn name() {\n    \n}");
        assert!(snippets.is_active());
    }

    #[test]
    fn test_apply_custom() {
        let mut editor = Editor::from_text("x");
        let mut snippets = SnippetNavigator::new();
        let completion = Completion::new("upper").with_apply(Apply::Custom(Arc::new(
            |editor: &mut Editor, completion: &Completion, from: usize, to: usize| {
                editor.replace_range(from, to, &completion.label.to_uppercase())
            },
        )));
        apply_completion(&mut editor, &mut snippets, &completion, 0, 1).unwrap();
        assert_eq!(editor.text(), "UPPER");
    }
}
