//! Incremental completion engine.
//!
//! ## Architecture
//!
//! - [`CompletionSource`] produces options for a position, synchronously or
//!   asynchronously.
//! - [`CompletionState`] tracks every source through `Inactive`, `Pending`
//!   and `Result`, and owns the open dialog.
//! - [`QueryOrchestrator`] decides when queries run, aborts stale ones and
//!   replays edits over late results.
//! - [`CompletionEngine`] owns the editor and runs all of the above in one
//!   background task; [`CompletionHandle`] is the cloneable front end.
//!
//! ## Usage
//!
//! ```ignore
//! let handle = CompletionHandle::spawn(editor, vec![Arc::new(WordSource::new())], config);
//! handle.type_text("pri").await?;
//!
//! // In render loop
//! if let Some(dialog) = handle.dialog() {
//!     render_dialog(&dialog);
//! }
//!
//! // On Enter
//! handle.accept_completion().await?;
//! ```

pub mod accept;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod dialog;
pub mod filter;
pub mod keyword;
pub mod list;
pub mod orchestrator;
pub mod ranker;
pub mod source;
pub mod state;
pub mod word;

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

pub use accept::{Applied, apply_completion, insert_completion_text};
pub use cache::{CacheStats, WordCache};
pub use config::{CompletionConfig, TieBreak};
pub use debounce::Debounce;
pub use dialog::{DialogSnapshot, DialogState, OptionView, window_around};
pub use filter::{FilterMatch, FuzzyFilter};
pub use keyword::{keyword_source, language_keywords};
pub use list::{ListSource, SourceCache, complete_from_labels, complete_from_list};
pub use orchestrator::{Acceptance, DispatchedQuery, QueryId, QueryOrchestrator, Resolution};
pub use ranker::{CompletionOption, rank};
pub use source::{
    AbortSignal, Apply, Completion, CompletionContext, CompletionFuture, CompletionKind,
    CompletionResult, CompletionSource, FnSource, SourceError, TokenMatch, ValidFor, from_fn,
};
pub use state::{
    ActiveResult, ActiveSource, CompletionState, CompletionStatus, Effect, SourceState,
};
pub use word::WordSource;

use crate::editor::{Editor, EditorError, Transaction};
use crate::snippet::SnippetNavigator;

/// Channel buffer size for engine commands.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Callback receiving every source failure.
pub type ErrorSink = Arc<dyn Fn(&SourceError) + Send + Sync>;

/// Errors returned through a [`CompletionHandle`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine task has stopped.
    #[error("Completion engine is not running")]
    Closed,

    /// The editor rejected an edit.
    #[error(transparent)]
    Editor(#[from] EditorError),
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Document text.
    pub text: String,
    /// Main cursor.
    pub cursor: usize,
    /// Selection ranges as `(from, to)`.
    pub selection: Vec<(usize, usize)>,
    /// Completion status.
    pub status: Option<CompletionStatus>,
    /// Open dialog.
    pub dialog: Option<DialogSnapshot>,
    /// Active snippet field, if a snippet session is running.
    pub snippet_field: Option<usize>,
}

type Reply<T> = oneshot::Sender<T>;

/// Request sent to the engine task.
enum Command {
    Start { explicit: bool, reply: Reply<bool> },
    Close { reply: Reply<bool> },
    Accept { reply: Reply<Result<bool, EditorError>> },
    MoveSelection { forward: bool, by_page: bool, reply: Reply<bool> },
    TypeText { text: String, reply: Reply<Result<(), EditorError>> },
    DeleteBackward { reply: Reply<Result<bool, EditorError>> },
    MoveCursor { pos: usize, reply: Reply<Result<(), EditorError>> },
    ReplaceRange { from: usize, to: usize, text: String, reply: Reply<Result<(), EditorError>> },
    Undo { reply: Reply<Result<bool, EditorError>> },
    SnippetField { forward: bool, reply: Reply<Result<bool, EditorError>> },
    ClearSnippet { reply: Reply<bool> },
    Click { pos: usize, reply: Reply<Result<bool, EditorError>> },
    SetSources { sources: Vec<Arc<dyn CompletionSource>>, reply: Reply<()> },
    Snapshot { reply: Reply<EngineSnapshot> },
    Shutdown,
}

/// Outcome of a finished query task.
struct QueryResolution {
    id: QueryId,
    source_id: String,
    outcome: Result<Option<CompletionResult>, SourceError>,
}

/// Handle for driving a [`CompletionEngine`] from other tasks.
///
/// Clones share the same engine. The engine stops when every handle is
/// dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct CompletionHandle {
    /// Channel to the engine task.
    command_tx: mpsc::Sender<Command>,

    /// Latest dialog snapshot.
    dialog_rx: watch::Receiver<Option<DialogSnapshot>>,
}

impl CompletionHandle {
    /// Spawns an engine on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        editor: Editor,
        sources: Vec<Arc<dyn CompletionSource>>,
        config: CompletionConfig,
    ) -> Self {
        CompletionEngine::new(editor, sources, config).spawn()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply, response_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply))
            .await
            .map_err(|_| EngineError::Closed)?;
        response_rx.await.map_err(|_| EngineError::Closed)
    }

    /// Opens completion as if the user asked for it.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn start_completion(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::Start {
            explicit: true,
            reply,
        })
        .await
    }

    /// Activates every source without marking the request explicit.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn activate(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::Start {
            explicit: false,
            reply,
        })
        .await
    }

    /// Closes completion. Returns `false` if nothing was active.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn close_completion(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::Close { reply }).await
    }

    /// Applies the selected option. Returns `false` if no option is
    /// selected or the dialog is not interactive yet.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or the edit is invalid.
    pub async fn accept_completion(&self) -> Result<bool, EngineError> {
        Ok(self.request(|reply| Command::Accept { reply }).await??)
    }

    /// Moves the dialog selection by one option or by one page.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn move_selection(&self, forward: bool, by_page: bool) -> Result<bool, EngineError> {
        self.request(|reply| Command::MoveSelection {
            forward,
            by_page,
            reply,
        })
        .await
    }

    /// Types `text` at every cursor.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or the edit is invalid.
    pub async fn type_text(&self, text: &str) -> Result<(), EngineError> {
        let text = text.to_string();
        Ok(self
            .request(|reply| Command::TypeText { text, reply })
            .await??)
    }

    /// Deletes backward. Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or the edit is invalid.
    pub async fn delete_backward(&self) -> Result<bool, EngineError> {
        Ok(self
            .request(|reply| Command::DeleteBackward { reply })
            .await??)
    }

    /// Moves the cursor to `pos`.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or `pos` is out of bounds.
    pub async fn move_cursor(&self, pos: usize) -> Result<(), EngineError> {
        Ok(self
            .request(|reply| Command::MoveCursor { pos, reply })
            .await??)
    }

    /// Replaces `[from, to)` with `text` without a user event.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or the range is invalid.
    pub async fn replace_range(&self, from: usize, to: usize, text: &str) -> Result<(), EngineError> {
        let text = text.to_string();
        Ok(self
            .request(|reply| Command::ReplaceRange {
                from,
                to,
                text,
                reply,
            })
            .await??)
    }

    /// Reverts the last document change. Returns `false` if the history is
    /// empty.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn undo(&self) -> Result<bool, EngineError> {
        Ok(self.request(|reply| Command::Undo { reply }).await??)
    }

    /// Moves to the next snippet field.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn next_snippet_field(&self) -> Result<bool, EngineError> {
        Ok(self
            .request(|reply| Command::SnippetField {
                forward: true,
                reply,
            })
            .await??)
    }

    /// Moves to the previous snippet field.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn prev_snippet_field(&self) -> Result<bool, EngineError> {
        Ok(self
            .request(|reply| Command::SnippetField {
                forward: false,
                reply,
            })
            .await??)
    }

    /// Ends the snippet session.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn clear_snippet(&self) -> Result<bool, EngineError> {
        self.request(|reply| Command::ClearSnippet { reply }).await
    }

    /// Clicks at `pos`. Returns `true` if the click selected a snippet
    /// field; otherwise the cursor moves to `pos`.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped or `pos` is out of bounds.
    pub async fn click_at(&self, pos: usize) -> Result<bool, EngineError> {
        Ok(self.request(|reply| Command::Click { pos, reply }).await??)
    }

    /// Replaces the source list.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn set_sources(&self, sources: Vec<Arc<dyn CompletionSource>>) -> Result<(), EngineError> {
        self.request(|reply| Command::SetSources { sources, reply })
            .await
    }

    /// Returns a snapshot of the engine.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Returns the document text.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn text(&self) -> Result<String, EngineError> {
        Ok(self.snapshot().await?.text)
    }

    /// Returns the completion status.
    ///
    /// # Errors
    /// Returns an error if the engine has stopped.
    pub async fn status(&self) -> Result<Option<CompletionStatus>, EngineError> {
        Ok(self.snapshot().await?.status)
    }

    /// Returns the latest dialog snapshot without waiting for the engine.
    #[must_use]
    pub fn dialog(&self) -> Option<DialogSnapshot> {
        self.dialog_rx.borrow().clone()
    }

    /// Returns a receiver notified whenever the dialog changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<DialogSnapshot>> {
        self.dialog_rx.clone()
    }

    /// Returns whether the engine has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Stops the engine, aborting running queries.
    pub async fn shutdown(&self) {
        if self.command_tx.send(Command::Shutdown).await.is_err() {
            debug!("Completion engine already stopped");
        }
    }
}

/// Background completion engine.
///
/// Owns the editor and serializes every edit, command, query result and
/// timer through one task.
pub struct CompletionEngine {
    /// The edited document.
    editor: Editor,

    /// Registered sources, in priority order.
    sources: Vec<Arc<dyn CompletionSource>>,

    /// Completion settings.
    config: CompletionConfig,

    /// Current completion state.
    state: CompletionState,

    /// Snippet session.
    snippets: SnippetNavigator,

    /// Query bookkeeping.
    orchestrator: QueryOrchestrator,

    /// Query tasks report here.
    resolution_tx: mpsc::UnboundedSender<QueryResolution>,

    /// Query results.
    resolution_rx: mpsc::UnboundedReceiver<QueryResolution>,

    /// Dialog snapshots for handles.
    dialog_tx: watch::Sender<Option<DialogSnapshot>>,

    /// Failure callback.
    error_sink: Option<ErrorSink>,
}

impl CompletionEngine {
    /// Creates an engine; call [`spawn`](Self::spawn) to run it.
    #[must_use]
    pub fn new(
        editor: Editor,
        sources: Vec<Arc<dyn CompletionSource>>,
        config: CompletionConfig,
    ) -> Self {
        let (resolution_tx, resolution_rx) = mpsc::unbounded_channel();
        let (dialog_tx, _) = watch::channel(None);
        Self {
            state: CompletionState::new(&sources),
            orchestrator: QueryOrchestrator::new(&config),
            editor,
            sources,
            config,
            snippets: SnippetNavigator::new(),
            resolution_tx,
            resolution_rx,
            dialog_tx,
            error_sink: None,
        }
    }

    /// Sets a callback receiving every source failure.
    #[must_use]
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Spawns the engine task and returns its handle.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> CompletionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let dialog_rx = self.dialog_tx.subscribe();
        tokio::spawn(self.run(command_rx));
        CompletionHandle {
            command_tx,
            dialog_rx,
        }
    }

    /// Runs until shutdown or until every handle is dropped.
    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        debug!(
            "Completion engine started with {} sources",
            self.sources.len()
        );

        loop {
            let deadline = self.orchestrator.next_deadline();
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                Some(resolution) = self.resolution_rx.recv() => {
                    self.handle_resolution(resolution);
                }
                () = sleep_until(deadline) => {
                    self.handle_timers();
                }
            }
        }

        self.orchestrator.abort_all();
        debug!("Completion engine stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        // A dropped reply receiver means the caller stopped waiting.
        match command {
            Command::Start { explicit, reply } => {
                let _ = reply.send(self.start_completion(explicit));
            }
            Command::Close { reply } => {
                let _ = reply.send(self.close_completion());
            }
            Command::Accept { reply } => {
                let _ = reply.send(self.accept_completion());
            }
            Command::MoveSelection {
                forward,
                by_page,
                reply,
            } => {
                let _ = reply.send(self.move_selection(forward, by_page));
            }
            Command::TypeText { text, reply } => {
                let _ = reply.send(self.type_text(&text));
            }
            Command::DeleteBackward { reply } => {
                let _ = reply.send(self.delete_backward());
            }
            Command::MoveCursor { pos, reply } => {
                let _ = reply.send(self.move_cursor(pos));
            }
            Command::ReplaceRange {
                from,
                to,
                text,
                reply,
            } => {
                let _ = reply.send(self.replace_range(from, to, &text));
            }
            Command::Undo { reply } => {
                let _ = reply.send(self.undo());
            }
            Command::SnippetField { forward, reply } => {
                let _ = reply.send(self.snippet_field(forward));
            }
            Command::ClearSnippet { reply } => {
                let _ = reply.send(self.snippets.clear());
            }
            Command::Click { pos, reply } => {
                let _ = reply.send(self.click(pos));
            }
            Command::SetSources { sources, reply } => {
                self.set_sources(sources);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn handle_resolution(&mut self, resolution: QueryResolution) {
        let QueryResolution {
            id,
            source_id,
            outcome,
        } = resolution;
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!("Completion source {} failed: {}", source_id, err);
                if let Some(sink) = &self.error_sink {
                    sink(&err);
                }
                None
            }
        };

        let now = Instant::now();
        if self.orchestrator.resolve(id, result, now) == Resolution::AcceptNow {
            self.accept_queries(now);
        }
    }

    fn handle_timers(&mut self) {
        let now = Instant::now();
        let queries = self
            .orchestrator
            .start_due(&self.state, self.editor.state(), now);
        self.spawn_queries(queries);
        if self.orchestrator.accept_due(now) {
            self.accept_queries(now);
        }
    }

    fn spawn_queries(&self, queries: Vec<DispatchedQuery>) {
        for DispatchedQuery {
            id,
            source,
            context,
        } in queries
        {
            let source_id = source.id().to_string();
            let resolution_tx = self.resolution_tx.clone();
            tokio::spawn(async move {
                // Sources may panic inside `query` itself, so it runs on
                // its own task too.
                let query = tokio::spawn(async move { source.query(context).await });
                let outcome = match query.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(SourceError::Interrupted {
                        source_id: source_id.clone(),
                        message: err.to_string(),
                    }),
                };
                // Fails only after the engine stopped.
                let _ = resolution_tx.send(QueryResolution {
                    id,
                    source_id,
                    outcome,
                });
            });
        }
    }

    fn accept_queries(&mut self, now: Instant) {
        let acceptance = self
            .orchestrator
            .accept(&self.state, self.editor.state(), &self.config, now);
        self.spawn_queries(acceptance.restarted);
        if !acceptance.updated.is_empty() {
            let tr = Transaction::unchanged(self.editor.state().clone());
            self.apply_update(&tr, vec![Effect::SetActive(acceptance.updated)], true);
        }
    }

    /// Moves the completion state, snippet session and orchestrator past
    /// `tr`, then publishes the dialog.
    fn apply_update(&mut self, tr: &Transaction, effects: Vec<Effect>, update_snippets: bool) {
        let now = Instant::now();
        self.state = self
            .state
            .update(tr, &effects, &self.sources, &self.config, now);
        if update_snippets {
            self.snippets.update(tr);
        }
        self.orchestrator.observe(tr, &effects, &self.state, now);
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.state.snapshot();
        self.dialog_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn start_completion(&mut self, explicit: bool) -> bool {
        let tr = Transaction::unchanged(self.editor.state().clone());
        self.apply_update(&tr, vec![Effect::Start { explicit }], true);
        true
    }

    fn close_completion(&mut self) -> bool {
        if self.state.active().iter().all(ActiveSource::is_inactive) {
            return false;
        }
        let tr = Transaction::unchanged(self.editor.state().clone());
        self.apply_update(&tr, vec![Effect::Close], true);
        true
    }

    /// Returns the open dialog once it accepts interaction.
    fn interactive_dialog(&self, now: Instant) -> Option<&DialogState> {
        self.state.open().filter(|open| {
            !open.disabled() && now.duration_since(open.timestamp()) >= self.config.interaction_delay
        })
    }

    fn accept_completion(&mut self) -> Result<bool, EditorError> {
        let Some(option) = self
            .interactive_dialog(Instant::now())
            .and_then(DialogState::selected_option)
            .cloned()
        else {
            return Ok(false);
        };
        let Some((from, to)) = self
            .state
            .find(&option.source_id)
            .and_then(ActiveSource::result)
            .map(|r| (r.from, r.to))
        else {
            return Ok(false);
        };

        debug!(
            "Accepting {} from source {} over {}..{}",
            option.completion.label, option.source_id, from, to
        );
        let applied = apply_completion(
            &mut self.editor,
            &mut self.snippets,
            &option.completion,
            from,
            to,
        )?;
        self.apply_update(&applied.transaction, Vec::new(), !applied.snippet);
        Ok(true)
    }

    fn move_selection(&mut self, forward: bool, by_page: bool) -> bool {
        let Some(open) = self.interactive_dialog(Instant::now()) else {
            return false;
        };
        let total = open.options().len();
        if total == 0 {
            return false;
        }
        let step = if by_page { open.page_step() } else { 1 };
        let target = match open.selected() {
            None if forward => 0,
            None => total - 1,
            Some(selected) if forward => {
                let next = selected + step;
                match (next < total, by_page) {
                    (true, _) => next,
                    (false, true) => total - 1,
                    (false, false) => 0,
                }
            }
            Some(selected) => match (selected.checked_sub(step), by_page) {
                (Some(prev), _) => prev,
                (None, true) => 0,
                (None, false) => total - 1,
            },
        };

        let tr = Transaction::unchanged(self.editor.state().clone());
        self.apply_update(&tr, vec![Effect::SetSelected(target)], true);
        true
    }

    fn type_text(&mut self, text: &str) -> Result<(), EditorError> {
        let tr = self.editor.type_text(text)?;
        self.apply_update(&tr, Vec::new(), true);
        Ok(())
    }

    fn delete_backward(&mut self) -> Result<bool, EditorError> {
        let Some(tr) = self.editor.delete_backward()? else {
            return Ok(false);
        };
        self.apply_update(&tr, Vec::new(), true);
        Ok(true)
    }

    fn move_cursor(&mut self, pos: usize) -> Result<(), EditorError> {
        let tr = self.editor.move_cursor(pos)?;
        self.apply_update(&tr, Vec::new(), true);
        Ok(())
    }

    fn replace_range(&mut self, from: usize, to: usize, text: &str) -> Result<(), EditorError> {
        let tr = self.editor.replace_range(from, to, text)?;
        self.apply_update(&tr, Vec::new(), true);
        Ok(())
    }

    fn undo(&mut self) -> Result<bool, EditorError> {
        let Some(tr) = self.editor.undo()? else {
            return Ok(false);
        };
        self.apply_update(&tr, Vec::new(), true);
        Ok(true)
    }

    fn snippet_field(&mut self, forward: bool) -> Result<bool, EditorError> {
        let tr = if forward {
            self.snippets.next_field(&mut self.editor)?
        } else {
            self.snippets.prev_field(&mut self.editor)?
        };
        let Some(tr) = tr else {
            return Ok(false);
        };
        self.apply_update(&tr, Vec::new(), false);
        Ok(true)
    }

    fn click(&mut self, pos: usize) -> Result<bool, EditorError> {
        if let Some(tr) = self.snippets.click(&mut self.editor, pos)? {
            self.apply_update(&tr, Vec::new(), false);
            return Ok(true);
        }
        self.move_cursor(pos)?;
        Ok(false)
    }

    fn set_sources(&mut self, sources: Vec<Arc<dyn CompletionSource>>) {
        debug!("Reconfiguring completion with {} sources", sources.len());
        self.sources = sources;
        let tr = Transaction::unchanged(self.editor.state().clone());
        self.state = self
            .state
            .update(&tr, &[], &self.sources, &self.config, Instant::now());
        self.orchestrator.schedule_queries(&self.state, Instant::now());
        self.publish();
    }

    fn snapshot(&self) -> EngineSnapshot {
        let state = self.editor.state();
        EngineSnapshot {
            text: state.text(),
            cursor: state.cursor(),
            selection: state
                .selection
                .ranges()
                .iter()
                .map(|r| (r.from(), r.to()))
                .collect(),
            status: self.state.status(),
            dialog: self.state.snapshot(),
            snippet_field: self.snippets.active().map(|s| s.active()),
        }
    }
}

/// Sleeps until `deadline`, or forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
