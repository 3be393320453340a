//! Query bookkeeping: dispatch, cancellation, and merging of late results.
//!
//! Every query records the transactions that arrive while it runs. When
//! its result is accepted, those transactions are replayed over it so the
//! result lands in the current document. The orchestrator owns no tasks;
//! the engine runs the futures and reports back through [`resolve`].
//!
//! [`resolve`]: QueryOrchestrator::resolve

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::config::CompletionConfig;
use super::debounce::Debounce;
use super::source::{CompletionContext, CompletionResult, CompletionSource};
use super::state::{ActiveResult, ActiveSource, CompletionState, Effect, SourceState};
use crate::editor::{DocState, Transaction};

/// Identifier of a dispatched query.
pub type QueryId = u64;

/// A transaction observed while a query was running.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    /// The transaction.
    pub transaction: Transaction,
    /// Effects dispatched with it.
    pub effects: Vec<Effect>,
}

/// A query in flight, or finished and waiting to be accepted.
#[derive(Debug)]
struct RunningQuery {
    /// Query id.
    id: QueryId,
    /// Source state when the query started.
    active: ActiveSource,
    /// Context handed to the source.
    context: CompletionContext,
    /// Dispatch time.
    started: Instant,
    /// Transactions since dispatch.
    updates: Vec<StateUpdate>,
    /// Outcome, once resolved.
    done: Option<Option<CompletionResult>>,
}

/// A query the engine must run.
#[derive(Clone)]
pub struct DispatchedQuery {
    /// Query id to report back with.
    pub id: QueryId,
    /// Source to query.
    pub source: Arc<dyn CompletionSource>,
    /// Query context.
    pub context: CompletionContext,
}

impl std::fmt::Debug for DispatchedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchedQuery")
            .field("id", &self.id)
            .field("source", &self.source.id())
            .field("pos", &self.context.pos)
            .field("explicit", &self.context.explicit)
            .finish()
    }
}

/// What to do after a query resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The query was aborted or is unknown.
    Ignored,
    /// Every running query is done; accept now.
    AcceptNow,
    /// Others are still running; accept when the accept timer fires.
    Scheduled,
}

/// Outcome of accepting finished queries.
#[derive(Debug, Default)]
pub struct Acceptance {
    /// Source states to install with [`Effect::SetActive`].
    pub updated: Vec<ActiveSource>,
    /// Queries restarted because their result went stale.
    pub restarted: Vec<DispatchedQuery>,
}

impl Acceptance {
    /// Returns whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.restarted.is_empty()
    }
}

/// Tracks running queries and the two debounce timers.
#[derive(Debug)]
pub struct QueryOrchestrator {
    /// Running and finished queries.
    running: Vec<RunningQuery>,
    /// Delay before dispatching pending sources.
    query_debounce: Debounce,
    /// Delay before accepting finished queries.
    accept_debounce: Debounce,
    /// Next query id.
    next_id: QueryId,
    /// Replay buffer limit before a long query is aborted.
    max_update_count: usize,
    /// Minimum age before a query may be aborted for buffering too much.
    min_abort_time: Duration,
}

impl QueryOrchestrator {
    /// Creates an orchestrator with timers from `config`.
    #[must_use]
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            running: Vec::new(),
            query_debounce: Debounce::new(config.debounce),
            accept_debounce: Debounce::new(config.accept_debounce),
            next_id: 0,
            max_update_count: config.max_update_count.max(1),
            min_abort_time: config.min_abort_time,
        }
    }

    /// Returns the number of tracked queries.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Returns whether a query for `source_id` is tracked.
    #[must_use]
    pub fn is_running(&self, source_id: &str) -> bool {
        self.running.iter().any(|q| q.active.id() == source_id)
    }

    /// Returns the earliest timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.query_debounce.deadline(), self.accept_debounce.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Records a transaction that produced `state`.
    ///
    /// Resets abort every running query. So does buffering too many
    /// transactions for a query older than the minimum abort time.
    /// Returns the ids of aborted queries.
    pub fn observe(
        &mut self,
        tr: &Transaction,
        effects: &[Effect],
        state: &CompletionState,
        now: Instant,
    ) -> Vec<QueryId> {
        if !tr.selection_set && !tr.doc_changed() && effects.is_empty() {
            return Vec::new();
        }

        let reset = tr.is_reset();
        let max_update_count = self.max_update_count;
        let min_abort_time = self.min_abort_time;
        let mut aborted = Vec::new();

        self.running.retain_mut(|query| {
            let overloaded = query.updates.len() + 1 > max_update_count
                && now.duration_since(query.started) > min_abort_time;
            if reset || overloaded {
                query.context.abort_signal().abort();
                debug!(
                    "Aborting query {} for source {} (reset: {})",
                    query.id,
                    query.active.id(),
                    reset
                );
                aborted.push(query.id);
                false
            } else {
                query.updates.push(StateUpdate {
                    transaction: tr.clone(),
                    effects: effects.to_vec(),
                });
                true
            }
        });

        self.schedule_queries(state, now);
        aborted
    }

    /// Arms the query timer when some pending source has no query.
    pub fn schedule_queries(&mut self, state: &CompletionState, now: Instant) {
        let waiting = state
            .active()
            .iter()
            .any(|a| a.is_pending() && !self.is_running(a.id()));
        if waiting {
            self.query_debounce.trigger(now);
        } else {
            self.query_debounce.cancel();
        }
    }

    /// Dispatches queries for pending sources once the query timer fired.
    pub fn start_due(
        &mut self,
        state: &CompletionState,
        doc: &DocState,
        now: Instant,
    ) -> Vec<DispatchedQuery> {
        if !self.query_debounce.fire_if_due(now) {
            return Vec::new();
        }
        let waiting: Vec<ActiveSource> = state
            .active()
            .iter()
            .filter(|a| a.is_pending() && !self.is_running(a.id()))
            .cloned()
            .collect();
        waiting
            .iter()
            .map(|active| self.start_query(active, doc, now))
            .collect()
    }

    fn start_query(&mut self, active: &ActiveSource, doc: &DocState, now: Instant) -> DispatchedQuery {
        let pos = doc.cursor();
        let context = CompletionContext::new(doc.doc.clone(), pos, active.explicit_pos == Some(pos));
        self.next_id += 1;
        let id = self.next_id;

        debug!(
            "Dispatching query {} to source {} at {} (explicit: {})",
            id,
            active.id(),
            pos,
            context.explicit
        );
        self.running.push(RunningQuery {
            id,
            active: active.clone(),
            context: context.clone(),
            started: now,
            updates: Vec::new(),
            done: None,
        });
        DispatchedQuery {
            id,
            source: Arc::clone(&active.source),
            context,
        }
    }

    /// Records the outcome of query `id`.
    ///
    /// Failed queries resolve with `None`.
    pub fn resolve(
        &mut self,
        id: QueryId,
        result: Option<CompletionResult>,
        now: Instant,
    ) -> Resolution {
        let Some(query) = self
            .running
            .iter_mut()
            .find(|q| q.id == id && !q.context.is_aborted())
        else {
            debug!("Ignoring result of abandoned query {}", id);
            return Resolution::Ignored;
        };
        query.done = Some(result);

        if self.running.iter().all(|q| q.done.is_some()) {
            Resolution::AcceptNow
        } else {
            self.accept_debounce.arm_if_idle(now);
            Resolution::Scheduled
        }
    }

    /// Returns whether the accept timer fired.
    pub fn accept_due(&mut self, now: Instant) -> bool {
        self.accept_debounce.fire_if_due(now)
    }

    /// Merges every finished query into the current state.
    ///
    /// Results are replayed through the transactions buffered since their
    /// dispatch. A result that does not survive the replay, or a query
    /// that came back empty, only changes its source if that source is
    /// still pending: an empty answer deactivates it, a stale one restarts
    /// the query from the current document.
    pub fn accept(
        &mut self,
        state: &CompletionState,
        doc: &DocState,
        config: &CompletionConfig,
        now: Instant,
    ) -> Acceptance {
        self.accept_debounce.cancel();

        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.running)
            .into_iter()
            .partition(|q| q.done.is_some());
        self.running = running;

        let mut acceptance = Acceptance::default();
        for query in done {
            let RunningQuery {
                id,
                active,
                updates,
                done: Some(outcome),
                ..
            } = query
            else {
                continue;
            };
            let empty = outcome.is_none();

            if let Some(result) = outcome {
                let to = result.to.unwrap_or_else(|| {
                    updates
                        .first()
                        .map_or_else(|| doc.cursor(), |u| u.transaction.start.cursor())
                });
                let from = result.from;
                let mut value = active.with_state(
                    SourceState::Result(ActiveResult {
                        result: Arc::new(result),
                        from,
                        to: to.max(from),
                    }),
                    active.explicit_pos,
                );
                for update in &updates {
                    value = value.update(&update.transaction, &update.effects, config);
                }
                if value.has_result() {
                    debug!(
                        "Accepted query {} from source {} after {} updates",
                        id,
                        value.id(),
                        updates.len()
                    );
                    acceptance.updated.push(value);
                    continue;
                }
            }

            let Some(current) = state.find(active.id()) else {
                continue;
            };
            if !current.is_pending() {
                debug!("Dropping stale result of query {}", id);
                continue;
            }

            if empty {
                let mut value = active.with_state(SourceState::Inactive, None);
                for update in &updates {
                    value = value.update(&update.transaction, &update.effects, config);
                }
                if !value.is_pending() {
                    acceptance.updated.push(value);
                }
            } else {
                let current = current.clone();
                acceptance
                    .restarted
                    .push(self.start_query(&current, doc, now));
            }
        }
        acceptance
    }

    /// Aborts every running query.
    pub fn abort_all(&mut self) {
        for query in self.running.drain(..) {
            query.context.abort_signal().abort();
        }
        self.query_debounce.cancel();
        self.accept_debounce.cancel();
    }
}
