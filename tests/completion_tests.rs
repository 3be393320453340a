//! Integration tests for the completion engine.
//!
//! These tests drive a `CompletionHandle` with a paused Tokio clock, so
//! debounce and source delays elapse deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use regex::Regex;

use ratcomplete::completion::{
    Apply, Completion, CompletionConfig, CompletionContext, CompletionEngine, CompletionFuture,
    CompletionHandle, CompletionResult, CompletionSource, CompletionStatus, SourceError,
    WordSource, complete_from_labels, from_fn, window_around,
};
use ratcomplete::editor::Editor;

/// Source answering after `delay`, counting queries and aborts.
struct CountingSource {
    id: String,
    labels: Vec<&'static str>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    aborted: Arc<AtomicUsize>,
}

impl CountingSource {
    fn new(id: &str, labels: &[&'static str], delay: Duration) -> Self {
        Self {
            id: id.to_string(),
            labels: labels.to_vec(),
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
            aborted: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl CompletionSource for CountingSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self, context: CompletionContext) -> CompletionFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let aborted = Arc::clone(&self.aborted);
        context.on_abort(move || {
            aborted.fetch_add(1, Ordering::SeqCst);
        });

        let delay = self.delay;
        let options: Vec<Completion> = self.labels.iter().map(|l| Completion::new(*l)).collect();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            let token = Regex::new(r"\w+$")?;
            let from = context.match_before(&token).map_or(context.pos, |t| t.from);
            Ok(Some(CompletionResult::new(from, options)))
        })
    }
}

/// Source that always fails.
struct FailingSource;

impl CompletionSource for FailingSource {
    fn id(&self) -> &str {
        "failing"
    }

    fn query(&self, _context: CompletionContext) -> CompletionFuture {
        Box::pin(async { Err(SourceError::failed("failing", "backend unavailable")) })
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn type_chars(handle: &CompletionHandle, text: &str, gap: Duration) {
    for c in text.chars() {
        handle.type_text(&c.to_string()).await.expect("type");
        tokio::time::sleep(gap).await;
    }
}

// ============================================================================
// Query Scheduling Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fast_typing_dispatches_one_query_per_source() {
    let first = CountingSource::new("first", &["print", "private"], Duration::ZERO);
    let second = CountingSource::new("second", &["primary"], Duration::from_millis(20));
    let first_calls = Arc::clone(&first.calls);
    let second_calls = Arc::clone(&second.calls);

    let handle = CompletionHandle::spawn(
        Editor::new(),
        vec![Arc::new(first), Arc::new(second)],
        CompletionConfig::default(),
    );

    type_chars(&handle, "pri", Duration::from_millis(10)).await;
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    settle().await;

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    let dialog = handle.dialog().expect("dialog open");
    assert_eq!(dialog.total, 3);
    assert_eq!(handle.status().await.unwrap(), Some(CompletionStatus::Active));
}

#[tokio::test(start_paused = true)]
async fn test_ranking_prefers_declaration_order_on_ties() {
    let source = CountingSource::new("words", &["print", "private", "primary"], Duration::ZERO);
    let handle =
        CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], CompletionConfig::default());

    handle.type_text("pri").await.unwrap();
    settle().await;

    let dialog = handle.dialog().expect("dialog open");
    assert_eq!(dialog.labels(), vec!["print", "private", "primary"]);
    assert_eq!(dialog.selected, Some(0));
    assert_eq!(dialog.options[0].spans, vec![(0, 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_aborts_running_query() {
    let source = CountingSource::new("slow", &["print"], Duration::from_millis(500));
    let calls = Arc::clone(&source.calls);
    let aborted = Arc::clone(&source.aborted);
    let handle =
        CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], CompletionConfig::default());

    handle.type_text("pr").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    handle.replace_range(0, 2, "xy").await.unwrap();
    assert_eq!(aborted.load(Ordering::SeqCst), 1);

    // The abandoned query still finishes; its result must not surface.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(handle.dialog().is_none());
    assert_eq!(handle.status().await.unwrap(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_long_query_abandoned_after_too_many_edits() {
    let source = CountingSource::new("slow", &["aardvark"], Duration::from_millis(2000));
    let calls = Arc::clone(&source.calls);
    let aborted = Arc::clone(&source.aborted);
    let handle =
        CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], CompletionConfig::default());

    handle.type_text("a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 60 edits, 30ms apart: the buffer passes 50 edits once the query is
    // older than a second, well before the source would answer.
    type_chars(&handle, &"a".repeat(60), Duration::from_millis(30)).await;
    assert_eq!(aborted.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().await.unwrap(), Some(CompletionStatus::Pending));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failing_source_reports_and_deactivates() {
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    let handle = CompletionEngine::new(
        Editor::new(),
        vec![Arc::new(FailingSource)],
        CompletionConfig::default(),
    )
    .with_error_sink(Arc::new(move |_: &SourceError| {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .spawn();

    handle.type_text("x").await.unwrap();
    settle().await;

    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().await.unwrap(), None);
    assert!(handle.dialog().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_source_leaves_engine_running() {
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    let broken = from_fn("broken", |_: &CompletionContext| -> Option<CompletionResult> {
        panic!("source bug")
    });
    let healthy = complete_from_labels("healthy", &["alpha"]).unwrap();
    let handle = CompletionEngine::new(
        Editor::new(),
        vec![Arc::new(broken), Arc::new(healthy)],
        CompletionConfig::default(),
    )
    .with_error_sink(Arc::new(move |err: &SourceError| {
        if matches!(err, SourceError::Interrupted { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }))
    .spawn();

    handle.type_text("a").await.unwrap();
    settle().await;

    assert!(!handle.is_closed());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(handle.dialog().unwrap().labels(), vec!["alpha"]);

    handle.type_text("l").await.unwrap();
    assert_eq!(handle.text().await.unwrap(), "al");
}

#[tokio::test(start_paused = true)]
async fn test_typing_disabled_requires_explicit_start() {
    let source = complete_from_labels("items", &["alpha", "beta"]).unwrap();
    let config = CompletionConfig::default().with_activate_on_typing(false);
    let handle = CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], config);

    handle.type_text("al").await.unwrap();
    settle().await;
    assert!(handle.dialog().is_none());

    assert!(handle.start_completion().await.unwrap());
    settle().await;
    assert_eq!(handle.dialog().unwrap().labels(), vec!["alpha"]);

    assert!(handle.close_completion().await.unwrap());
    assert!(handle.dialog().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_dialog_open() {
    let source = complete_from_labels("items", &["alpha"]).unwrap();
    let handle =
        CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], CompletionConfig::default());
    let mut dialog_rx = handle.subscribe();

    handle.type_text("a").await.unwrap();
    dialog_rx.changed().await.unwrap();
    assert!(dialog_rx.borrow().is_some());
}

// ============================================================================
// Dialog Interaction Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_accept_waits_for_interaction_delay() {
    let handle = CompletionHandle::spawn(
        Editor::from_text("println\nprintf\n"),
        vec![Arc::new(WordSource::new())],
        CompletionConfig::default(),
    );

    handle.type_text("pr").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(handle.dialog().is_some());
    assert!(!handle.accept_completion().await.unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let label = handle
        .dialog()
        .and_then(|d| d.selected_option().map(|o| o.label.clone()))
        .expect("selected option");
    assert!(handle.accept_completion().await.unwrap());

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, format!("println\nprintf\n{label}"));
    assert_eq!(snapshot.cursor, snapshot.text.chars().count());
    assert!(snapshot.dialog.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_move_selection_wraps_and_pages() {
    let labels: Vec<String> = (0..10).map(|i| format!("item{i}")).collect();
    let source = complete_from_labels("items", &labels).unwrap();
    let config = CompletionConfig::default().with_max_rendered_options(4);
    let handle = CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], config);

    handle.type_text("item").await.unwrap();
    settle().await;
    let selected = || handle.dialog().and_then(|d| d.selected);
    assert_eq!(selected(), Some(0));

    assert!(handle.move_selection(false, false).await.unwrap());
    assert_eq!(selected(), Some(9));
    assert!(handle.move_selection(true, false).await.unwrap());
    assert_eq!(selected(), Some(0));

    assert!(handle.move_selection(true, true).await.unwrap());
    assert_eq!(selected(), Some(3));
    let dialog = handle.dialog().unwrap();
    assert!(dialog.window_from <= 3 && 3 < dialog.window_to);

    for _ in 0..3 {
        handle.move_selection(true, true).await.unwrap();
    }
    assert_eq!(selected(), Some(9));

    handle.move_selection(false, true).await.unwrap();
    assert_eq!(selected(), Some(6));
}

#[tokio::test(start_paused = true)]
async fn test_move_selection_without_dialog() {
    let handle = CompletionHandle::spawn(Editor::new(), Vec::new(), CompletionConfig::default());
    assert!(!handle.move_selection(true, false).await.unwrap());
    assert!(!handle.accept_completion().await.unwrap());
}

// ============================================================================
// Snippet Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_snippet_completion_fields() {
    let token = Regex::new(r"\w+$").unwrap();
    let source = from_fn("snippets", move |context: &CompletionContext| {
        let from = context.match_before(&token)?.from;
        let completion = Completion::new("for")
            .with_apply(Apply::snippet("for ${1:item} in ${2:iter} {\n\t${}\n}"));
        Some(CompletionResult::new(from, vec![completion]))
    });
    let handle =
        CompletionHandle::spawn(Editor::new(), vec![Arc::new(source)], CompletionConfig::default());

    handle.type_text("fo").await.unwrap();
    settle().await;
    assert!(handle.accept_completion().await.unwrap());

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "for item in iter {\n    \n}");
    assert_eq!(snapshot.selection, vec![(4, 8)]);
    assert_eq!(snapshot.snippet_field, Some(0));

    assert!(handle.next_snippet_field().await.unwrap());
    assert_eq!(handle.snapshot().await.unwrap().selection, vec![(12, 16)]);
    assert!(handle.prev_snippet_field().await.unwrap());
    assert_eq!(handle.snapshot().await.unwrap().selection, vec![(4, 8)]);

    // Clicking into the last field selects it and ends the session.
    assert!(handle.click_at(23).await.unwrap());
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.selection, vec![(23, 23)]);
    assert_eq!(snapshot.snippet_field, None);
    assert!(!handle.next_snippet_field().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_click_outside_snippet_moves_cursor() {
    let handle = CompletionHandle::spawn(
        Editor::from_text("abc"),
        Vec::new(),
        CompletionConfig::default(),
    );
    assert!(!handle.click_at(1).await.unwrap());
    assert_eq!(handle.snapshot().await.unwrap().cursor, 1);
    assert!(!handle.clear_snippet().await.unwrap());
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_window_contains_selection(
        total in 1usize..400,
        max in 1usize..60,
        selected in 0usize..400,
    ) {
        let selected = selected % total;
        let (from, to) = window_around(total, Some(selected), max);
        prop_assert!(from <= selected && selected < to);
        prop_assert_eq!(to - from, total.min(max));
        prop_assert!(to <= total);
    }
}
