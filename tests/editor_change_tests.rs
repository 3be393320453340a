//! Tests for position mapping through document changes.
//!
//! Tests cover: range mapping, replaying edits one by one against the
//! combined edit, and undo through inverted change sets.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ropey::Rope;

use ratcomplete::editor::{Assoc, Change, ChangeSet, Editor, MapMode};

/// Maps `[from, to)` through each change set in turn.
fn replay(sets: &[ChangeSet], from: usize, to: usize) -> Option<(usize, usize)> {
    sets.iter()
        .try_fold((from, to), |(f, t), set| set.map_range(f, t, MapMode::TrackDel))
}

/// Test that edits around a range shift it without resizing it.
#[test]
fn test_range_shifts_with_edits_before_it() {
    let set = ChangeSet::new(vec![Change::insert(0, "abc"), Change::delete(20, 22)], 30).unwrap();
    assert_eq!(set.map_range(5, 10, MapMode::TrackDel), Some((8, 13)));
}

/// Test that deleting across a range drops it under TrackDel.
#[test]
fn test_deleted_range_is_dropped() {
    let set = ChangeSet::new(vec![Change::delete(4, 12)], 30).unwrap();
    assert_eq!(set.map_range(5, 10, MapMode::TrackDel), None);
    assert_eq!(set.map_range(5, 10, MapMode::Simple), Some((4, 4)));
}

/// Test that typing at the end of a range extends it.
#[test]
fn test_insert_at_range_end_extends_it() {
    let set = ChangeSet::new(vec![Change::insert(10, "x")], 30).unwrap();
    assert_eq!(set.map_range(5, 10, MapMode::TrackDel), Some((5, 11)));
    assert_eq!(set.map(10, Assoc::Before), 10);
}

/// Test that undo restores the text through the inverted changes.
#[test]
fn test_undo_restores_text() {
    let mut editor = Editor::from_text("let value = 1;");
    editor.replace_range(4, 9, "count").unwrap();
    editor.type_text(" + 2").unwrap();
    assert_eq!(editor.text(), "let count = 1; + 2");

    editor.undo().unwrap();
    editor.undo().unwrap();
    assert_eq!(editor.text(), "let value = 1;");
    assert!(editor.undo().unwrap().is_none());
}

/// Test that every transaction reproduces its end state from its start.
#[test]
fn test_transactions_apply_to_start_state() {
    let mut editor = Editor::from_text("alpha\nbeta");
    let trs = vec![
        editor.type_text("!").unwrap(),
        editor.replace_range(0, 5, "gamma").unwrap(),
        editor.delete_backward().unwrap().unwrap(),
    ];
    for tr in trs {
        let mut doc: Rope = tr.start.doc.clone();
        tr.changes.apply(&mut doc);
        assert_eq!(doc, tr.state.doc);
    }
}

proptest! {
    /// Replaying edits that leave a range alone matches mapping it through
    /// one combined edit.
    #[test]
    fn prop_replay_matches_combined_edit(
        edits in prop::collection::vec((any::<bool>(), "[a-z]{1,4}"), 1..20),
    ) {
        let text = "0123456789abcdefghij";
        let (from, to) = (5, 10);
        let mut len = text.chars().count();
        let mut sets = Vec::new();
        let mut prefix = String::new();
        let mut suffix = String::new();

        for (before, insert) in &edits {
            let pos = if *before { 0 } else { len };
            sets.push(ChangeSet::new(vec![Change::insert(pos, insert.as_str())], len).unwrap());
            len += insert.chars().count();
            if *before {
                prefix.insert_str(0, insert);
            } else {
                suffix.push_str(insert);
            }
        }

        let base = text.chars().count();
        let combined = ChangeSet::new(
            vec![Change::insert(0, prefix), Change::insert(base, suffix)],
            base,
        )
        .unwrap();

        prop_assert_eq!(replay(&sets, from, to), combined.map_range(from, to, MapMode::TrackDel));
        prop_assert_eq!(combined.len_after(), len);
    }
}
