//! Dialog state: the ranked list, the selection, and the visible window.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::config::CompletionConfig;
use super::ranker::{CompletionOption, rank};
use super::source::{Completion, CompletionKind};
use super::state::ActiveSource;
use crate::editor::{Assoc, ChangeSet, DocState};

/// Returns the window of at most `max` options containing `selected`.
///
/// Selections in the first half of the list get a window aligned to a
/// multiple of `max` from the start; selections in the second half get one
/// aligned from the end, so the last page is always full. No selection is
/// treated as the first option.
#[must_use]
pub fn window_around(total: usize, selected: Option<usize>, max: usize) -> (usize, usize) {
    let max = max.max(1);
    if total <= max {
        return (0, total);
    }
    let selected = selected.unwrap_or(0).min(total - 1);
    if selected <= total / 2 {
        let page = selected / max;
        (page * max, (page + 1) * max)
    } else {
        let page = (total - 1 - selected) / max;
        (total - (page + 1) * max, total - page * max)
    }
}

/// The open completion dialog.
#[derive(Debug, Clone)]
pub struct DialogState {
    /// Ranked options.
    options: Arc<Vec<CompletionOption>>,
    /// Selected index.
    selected: Option<usize>,
    /// Visible window `[from, to)`.
    window: (usize, usize),
    /// Window size limit.
    max_rendered: usize,
    /// When the dialog first opened.
    timestamp: Instant,
    /// Document offset the dialog is attached to.
    anchor: usize,
    /// Shown while sources are still pending but no option matches.
    disabled: bool,
}

impl DialogState {
    /// Builds the dialog from the sources holding results.
    ///
    /// Returns `None` when nothing matches, unless a source is still
    /// pending, in which case the previous dialog stays up disabled.
    #[must_use]
    pub fn build(
        active: &[ActiveSource],
        state: &DocState,
        prev: Option<&Self>,
        config: &CompletionConfig,
        now: Instant,
    ) -> Option<Self> {
        let options = rank(active, &state.doc, &config.tie_break);
        if options.is_empty() {
            let pending = active.iter().any(ActiveSource::is_pending);
            return prev.filter(|_| pending).map(|p| Self {
                disabled: true,
                ..p.clone()
            });
        }

        let mut selected = config.select_on_open.then_some(0);
        if let Some(prev) = prev {
            if let Some(prev_selected) = prev.selected.filter(|s| Some(*s) != selected) {
                let value = &prev.options[prev_selected].completion;
                if let Some(i) = options
                    .iter()
                    .position(|o| Arc::ptr_eq(&o.completion, value))
                {
                    selected = Some(i);
                }
            }
        }

        let anchor = active
            .iter()
            .filter_map(|a| a.result().map(|r| r.from))
            .min()
            .unwrap_or_else(|| state.cursor());
        let max_rendered = config.max_rendered_options.max(1);

        Some(Self {
            window: window_around(options.len(), selected, max_rendered),
            options: Arc::new(options),
            selected,
            max_rendered,
            timestamp: prev.map_or(now, |p| p.timestamp),
            anchor,
            disabled: false,
        })
    }

    /// Maps the anchor through a document change.
    #[must_use]
    pub fn map(&self, changes: &ChangeSet) -> Self {
        Self {
            anchor: changes.map(self.anchor, Assoc::Before),
            ..self.clone()
        }
    }

    /// Selects `index`, moving the window only if `index` falls outside it.
    ///
    /// Out-of-range indices leave the dialog unchanged.
    #[must_use]
    pub fn set_selected(&self, index: usize) -> Self {
        if self.selected == Some(index) || index >= self.options.len() {
            return self.clone();
        }
        let window = if self.window.0 <= index && index < self.window.1 {
            self.window
        } else {
            window_around(self.options.len(), Some(index), self.max_rendered)
        };
        Self {
            selected: Some(index),
            window,
            ..self.clone()
        }
    }

    /// Returns the ranked options.
    #[must_use]
    pub fn options(&self) -> &[CompletionOption] {
        &self.options
    }

    /// Returns the selected index.
    #[must_use]
    pub const fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Returns the selected option.
    #[must_use]
    pub fn selected_option(&self) -> Option<&CompletionOption> {
        self.selected.and_then(|i| self.options.get(i))
    }

    /// Returns the visible window.
    #[must_use]
    pub const fn window(&self) -> (usize, usize) {
        self.window
    }

    /// Returns when the dialog opened.
    #[must_use]
    pub const fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the anchor offset.
    #[must_use]
    pub const fn anchor(&self) -> usize {
        self.anchor
    }

    /// Returns whether the dialog is disabled.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the page step used by page-wise selection moves.
    #[must_use]
    pub fn page_step(&self) -> usize {
        (self.window.1 - self.window.0).saturating_sub(1).max(2)
    }

    /// Returns the completions in ranked order.
    #[must_use]
    pub fn completions(&self) -> Vec<Arc<Completion>> {
        self.options
            .iter()
            .map(|o| Arc::clone(&o.completion))
            .collect()
    }

    /// Returns a render snapshot of the visible window.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> DialogSnapshot {
        let (from, to) = self.window;
        DialogSnapshot {
            id: id.to_string(),
            selected: self.selected,
            window_from: from,
            window_to: to,
            total: self.options.len(),
            anchor: self.anchor,
            disabled: self.disabled,
            options: self.options[from..to]
                .iter()
                .enumerate()
                .map(|(i, o)| OptionView {
                    index: from + i,
                    label: o.completion.label.clone(),
                    detail: o.completion.detail.clone(),
                    kind: o.completion.kind,
                    source: o.source_id.clone(),
                    spans: o.spans.clone(),
                })
                .collect(),
        }
    }
}

/// One visible option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    /// Index in the full ranked list.
    pub index: usize,
    /// Label.
    pub label: String,
    /// Detail.
    pub detail: Option<String>,
    /// Kind.
    pub kind: Option<CompletionKind>,
    /// Source id.
    pub source: String,
    /// Matched character ranges of the label.
    pub spans: Vec<(usize, usize)>,
}

/// Read-only view of the dialog for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSnapshot {
    /// Stable id of the completion state.
    pub id: String,
    /// Selected index in the full list.
    pub selected: Option<usize>,
    /// Start of the visible window.
    pub window_from: usize,
    /// End of the visible window (exclusive).
    pub window_to: usize,
    /// Total number of options.
    pub total: usize,
    /// Document offset the dialog is attached to.
    pub anchor: usize,
    /// Whether the dialog is disabled.
    pub disabled: bool,
    /// Visible options.
    pub options: Vec<OptionView>,
}

impl DialogSnapshot {
    /// Returns the visible labels.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.label.as_str()).collect()
    }

    /// Returns the selected option if it is visible.
    #[must_use]
    pub fn selected_option(&self) -> Option<&OptionView> {
        let selected = self.selected?;
        self.options.iter().find(|o| o.index == selected)
    }
}
