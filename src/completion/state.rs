//! Per-source activation state and the aggregate completion state.
//!
//! Every transaction produces a new [`CompletionState`]; sources are never
//! mutated in place. Each [`ActiveSource`] moves between `Inactive`,
//! `Pending` and `Result` as edits, caret moves and [`Effect`]s arrive.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::config::CompletionConfig;
use super::dialog::{DialogSnapshot, DialogState};
use super::ranker::CompletionOption;
use super::source::{Completion, CompletionContext, CompletionResult, CompletionSource};
use crate::editor::{Assoc, ChangeSet, Transaction, UserEvent};

/// A result held by a source, with its range in the current document.
#[derive(Debug, Clone)]
pub struct ActiveResult {
    /// The source's answer.
    pub result: Arc<CompletionResult>,
    /// Start of the completed range.
    pub from: usize,
    /// End of the completed range.
    pub to: usize,
}

/// Lifecycle of one source.
#[derive(Debug, Clone)]
pub enum SourceState {
    /// No query, no result.
    Inactive,
    /// A query should be dispatched.
    Pending,
    /// Holds a live result.
    Result(ActiveResult),
}

/// Explicit requests carried alongside a transaction.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Move every source to `Pending`.
    Start {
        /// Whether the user asked for completion rather than typing.
        explicit: bool,
    },
    /// Move every source to `Inactive`.
    Close,
    /// Replace the state of the listed sources.
    SetActive(Vec<ActiveSource>),
    /// Select an option of the open dialog.
    SetSelected(usize),
}

/// Tracked state of one source.
#[derive(Clone)]
pub struct ActiveSource {
    /// The source.
    pub source: Arc<dyn CompletionSource>,
    /// Current state.
    pub state: SourceState,
    /// Cursor offset of an explicit activation.
    pub explicit_pos: Option<usize>,
}

impl fmt::Debug for ActiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSource")
            .field("source", &self.id())
            .field("state", &self.state)
            .field("explicit_pos", &self.explicit_pos)
            .finish()
    }
}

impl ActiveSource {
    /// Creates a tracked source in `state`.
    #[must_use]
    pub fn new(source: Arc<dyn CompletionSource>, state: SourceState) -> Self {
        Self {
            source,
            state,
            explicit_pos: None,
        }
    }

    /// Returns the source id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.source.id()
    }

    /// Returns whether the source is inactive.
    #[must_use]
    pub const fn is_inactive(&self) -> bool {
        matches!(self.state, SourceState::Inactive)
    }

    /// Returns whether the source is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, SourceState::Pending)
    }

    /// Returns whether the source holds a result.
    #[must_use]
    pub const fn has_result(&self) -> bool {
        matches!(self.state, SourceState::Result(_))
    }

    /// Returns the held result.
    #[must_use]
    pub const fn result(&self) -> Option<&ActiveResult> {
        match &self.state {
            SourceState::Result(result) => Some(result),
            _ => None,
        }
    }

    /// Returns whether two values describe the same source in the same state,
    /// with the same result object.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
            && self.explicit_pos == other.explicit_pos
            && match (&self.state, &other.state) {
                (SourceState::Inactive, SourceState::Inactive)
                | (SourceState::Pending, SourceState::Pending) => true,
                (SourceState::Result(a), SourceState::Result(b)) => {
                    Arc::ptr_eq(&a.result, &b.result) && a.from == b.from && a.to == b.to
                }
                _ => false,
            }
    }

    pub(crate) fn with_state(&self, state: SourceState, explicit_pos: Option<usize>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state,
            explicit_pos,
        }
    }

    /// Computes the state after `tr` and `effects`.
    #[must_use]
    pub fn update(&self, tr: &Transaction, effects: &[Effect], config: &CompletionConfig) -> Self {
        let mut value = match tr.typing_event() {
            Some(event) => self.handle_user_event(tr, event, config),
            None if tr.doc_changed() => self.handle_change(tr),
            None if tr.selection_set && !self.is_inactive() => self.handle_caret_move(tr),
            None => self.clone(),
        };

        for effect in effects {
            match effect {
                Effect::Start { explicit } => {
                    let explicit_pos = explicit.then(|| tr.state.cursor());
                    value = value.with_state(SourceState::Pending, explicit_pos);
                }
                Effect::Close => value = value.with_state(SourceState::Inactive, None),
                Effect::SetActive(list) => {
                    if let Some(replacement) = list.iter().find(|a| a.id() == value.id()) {
                        value = replacement.clone();
                    }
                }
                Effect::SetSelected(_) => {}
            }
        }
        value
    }

    fn map(&self, changes: &ChangeSet) -> Self {
        if changes.is_empty() {
            return self.clone();
        }
        let explicit_pos = self.explicit_pos.map(|p| changes.map(p, Assoc::Before));
        let state = match &self.state {
            SourceState::Result(res) => SourceState::Result(ActiveResult {
                result: Arc::clone(&res.result),
                from: changes.map(res.from, Assoc::Before),
                to: changes.map(res.to, Assoc::After),
            }),
            other => other.clone(),
        };
        self.with_state(state, explicit_pos)
    }

    fn handle_user_event(
        &self,
        tr: &Transaction,
        event: UserEvent,
        config: &CompletionConfig,
    ) -> Self {
        let SourceState::Result(res) = &self.state else {
            return if event == UserEvent::Delete || !config.activate_on_typing {
                self.map(&tr.changes)
            } else {
                self.with_state(SourceState::Pending, None)
            };
        };

        let from = tr.changes.map(res.from, Assoc::Before);
        let to = tr.changes.map(res.to, Assoc::After);
        let pos = tr.state.cursor();
        let before_start = if self.explicit_pos.is_some() {
            pos < from
        } else {
            pos <= from
        };
        if before_start
            || pos > to
            || (event == UserEvent::Delete && tr.start.cursor() == res.from)
        {
            let state = if event == UserEvent::Input && config.activate_on_typing {
                SourceState::Pending
            } else {
                SourceState::Inactive
            };
            return self.with_state(state, None);
        }

        let explicit_pos = self.explicit_pos.map(|p| tr.changes.map(p, Assoc::Before));
        if let Some(valid_for) = &res.result.valid_for {
            let text = tr.state.slice(from, to);
            if valid_for.is_valid(&text, from, to, &tr.state.doc) {
                let kept = ActiveResult {
                    result: Arc::clone(&res.result),
                    from,
                    to,
                };
                return self.with_state(SourceState::Result(kept), explicit_pos);
            }
        }

        if let Some(update) = &res.result.update {
            let context = CompletionContext::new(tr.state.doc.clone(), pos, explicit_pos.is_some());
            if let Some(updated) = update(&res.result, from, to, &context) {
                let from = updated.from;
                let to = updated.to.unwrap_or(pos).max(from);
                let refreshed = ActiveResult {
                    result: Arc::new(updated),
                    from,
                    to,
                };
                return self.with_state(SourceState::Result(refreshed), explicit_pos);
            }
        }

        self.with_state(SourceState::Pending, explicit_pos)
    }

    fn handle_change(&self, tr: &Transaction) -> Self {
        let touched = match &self.state {
            SourceState::Result(res) => tr.changes.touches_range(res.from, res.to),
            _ => {
                let cursor = tr.start.cursor();
                tr.changes.touches_range(cursor, cursor)
            }
        };
        if touched {
            self.with_state(SourceState::Inactive, None)
        } else {
            self.map(&tr.changes)
        }
    }

    fn handle_caret_move(&self, tr: &Transaction) -> Self {
        let SourceState::Result(res) = &self.state else {
            return self.with_state(SourceState::Inactive, None);
        };
        let pos = tr.state.cursor();
        let before_start = if self.explicit_pos.is_some() {
            pos < res.from
        } else {
            pos <= res.from
        };
        if before_start || pos > res.to {
            self.with_state(SourceState::Inactive, None)
        } else {
            self.clone()
        }
    }
}

/// Compares the result objects held by two source lists, in order.
fn same_results(a: &[ActiveSource], b: &[ActiveSource]) -> bool {
    let mut a = a.iter().filter_map(ActiveSource::result);
    let mut b = b.iter().filter_map(ActiveSource::result);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if Arc::ptr_eq(&x.result, &y.result) => {}
            _ => return false,
        }
    }
}

/// Coarse completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Some source is waiting for a query.
    Pending,
    /// Some source holds a result.
    Active,
}

/// Aggregate completion state: every source plus the open dialog.
#[derive(Debug, Clone)]
pub struct CompletionState {
    /// Tracked sources, in registration order.
    active: Vec<ActiveSource>,
    /// Stable id.
    id: String,
    /// Open dialog.
    open: Option<DialogState>,
}

impl CompletionState {
    /// Creates a state with every source inactive.
    #[must_use]
    pub fn new(sources: &[Arc<dyn CompletionSource>]) -> Self {
        Self {
            active: sources
                .iter()
                .map(|s| ActiveSource::new(Arc::clone(s), SourceState::Inactive))
                .collect(),
            id: format!("ratc-ac-{}", Uuid::new_v4().simple()),
            open: None,
        }
    }

    /// Computes the state after `tr` and `effects`.
    ///
    /// `sources` is the current source list; sources not tracked yet start
    /// `Pending` if any tracked source is active, otherwise `Inactive`.
    #[must_use]
    pub fn update(
        &self,
        tr: &Transaction,
        effects: &[Effect],
        sources: &[Arc<dyn CompletionSource>],
        config: &CompletionConfig,
        now: Instant,
    ) -> Self {
        let any_active = self.active.iter().any(|a| !a.is_inactive());
        let mut active: Vec<ActiveSource> = sources
            .iter()
            .map(|source| {
                self.active
                    .iter()
                    .find(|a| a.id() == source.id())
                    .cloned()
                    .unwrap_or_else(|| {
                        let state = if any_active {
                            SourceState::Pending
                        } else {
                            SourceState::Inactive
                        };
                        ActiveSource::new(Arc::clone(source), state)
                    })
                    .update(tr, effects, config)
            })
            .collect();

        let mut open = self.open.as_ref().map(|o| {
            if tr.doc_changed() {
                o.map(&tr.changes)
            } else {
                o.clone()
            }
        });
        let touched = self
            .active
            .iter()
            .filter_map(ActiveSource::result)
            .any(|r| tr.changes.touches_range(r.from, r.to));
        if tr.selection_set || touched || !same_results(&active, &self.active) {
            open = DialogState::build(&active, &tr.state, open.as_ref(), config, now);
        } else if open.as_ref().is_some_and(DialogState::disabled)
            && !active.iter().any(ActiveSource::is_pending)
        {
            open = None;
        }

        if open.is_none()
            && !active.iter().any(ActiveSource::is_pending)
            && active.iter().any(ActiveSource::has_result)
        {
            active = active
                .into_iter()
                .map(|a| {
                    if a.has_result() {
                        a.with_state(SourceState::Inactive, None)
                    } else {
                        a
                    }
                })
                .collect();
        }

        for effect in effects {
            if let Effect::SetSelected(index) = effect {
                open = open.map(|o| o.set_selected(*index));
            }
        }

        Self {
            active,
            id: self.id.clone(),
            open,
        }
    }

    /// Returns the tracked sources.
    #[must_use]
    pub fn active(&self) -> &[ActiveSource] {
        &self.active
    }

    /// Returns the tracked state of source `id`.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ActiveSource> {
        self.active.iter().find(|a| a.id() == id)
    }

    /// Returns the stable id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the open dialog.
    #[must_use]
    pub const fn open(&self) -> Option<&DialogState> {
        self.open.as_ref()
    }

    /// Returns the coarse status.
    #[must_use]
    pub fn status(&self) -> Option<CompletionStatus> {
        if self.active.iter().any(ActiveSource::is_pending) {
            Some(CompletionStatus::Pending)
        } else if self.active.iter().any(|a| !a.is_inactive()) {
            Some(CompletionStatus::Active)
        } else {
            None
        }
    }

    /// Returns the options of the open dialog, in ranked order.
    #[must_use]
    pub fn current_completions(&self) -> Vec<Arc<Completion>> {
        self.open
            .as_ref()
            .map(DialogState::completions)
            .unwrap_or_default()
    }

    /// Returns the selected option.
    #[must_use]
    pub fn selected_option(&self) -> Option<&CompletionOption> {
        self.open.as_ref().and_then(DialogState::selected_option)
    }

    /// Returns the selected completion.
    #[must_use]
    pub fn selected_completion(&self) -> Option<Arc<Completion>> {
        self.selected_option().map(|o| Arc::clone(&o.completion))
    }

    /// Returns a render snapshot of the open dialog.
    #[must_use]
    pub fn snapshot(&self) -> Option<DialogSnapshot> {
        self.open.as_ref().map(|o| o.snapshot(&self.id))
    }
}
