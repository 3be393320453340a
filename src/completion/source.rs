//! Completion source types and trait definitions.
//!
//! Defines the interface every completion source implements and the data
//! types passed between sources and the engine: the per-query context with
//! its abort signal, the result a source returns, and the completions
//! themselves.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use ropey::Rope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::editor::buffer::{Line, line_at, slice_rope};
use crate::editor::{Editor, EditorError, Transaction};
use crate::snippet::Snippet;

/// How far back [`CompletionContext::match_before`] looks, in characters.
pub const MATCH_BEFORE_LOOKBACK: usize = 250;

/// Lowest allowed boost.
pub const MIN_BOOST: i8 = -99;

/// Highest allowed boost.
pub const MAX_BOOST: i8 = 99;

/// Completion kind, used for display and deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    Class,
    Constant,
    Enum,
    Function,
    Interface,
    Keyword,
    Method,
    Namespace,
    Property,
    Snippet,
    Text,
    Type,
    Variable,
}

impl CompletionKind {
    /// Returns a short display string for the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Constant => "const",
            Self::Enum => "enum",
            Self::Function => "fn",
            Self::Interface => "iface",
            Self::Keyword => "kw",
            Self::Method => "method",
            Self::Namespace => "ns",
            Self::Property => "prop",
            Self::Snippet => "snip",
            Self::Text => "text",
            Self::Type => "type",
            Self::Variable => "var",
        }
    }
}

/// Callback that performs a custom insertion of a completion into `[from, to)`.
pub type ApplyFn = Arc<
    dyn Fn(&mut Editor, &Completion, usize, usize) -> Result<Transaction, EditorError>
        + Send
        + Sync,
>;

/// What accepting a completion does.
#[derive(Clone)]
pub enum Apply {
    /// Replace the completed range with this text.
    Text(String),
    /// Insert a snippet template and start field navigation.
    Snippet(Arc<Snippet>),
    /// Run a custom insertion.
    Custom(ApplyFn),
}

impl Apply {
    /// Parses `template` into a snippet apply.
    #[must_use]
    pub fn snippet(template: &str) -> Self {
        Self::Snippet(Arc::new(Snippet::parse(template)))
    }
}

impl PartialEq for Apply {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Snippet(a), Self::Snippet(b)) => a.template() == b.template(),
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Snippet(snippet) => f.debug_tuple("Snippet").field(&snippet.template()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A single completion suggestion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Label shown in the list and matched against the typed text.
    pub label: String,

    /// Short detail shown after the label.
    pub detail: Option<String>,

    /// Longer documentation.
    pub info: Option<String>,

    /// Kind of completion.
    pub kind: Option<CompletionKind>,

    /// What to insert; defaults to the label.
    pub apply: Option<Apply>,

    /// Ranking adjustment in `MIN_BOOST..=MAX_BOOST`.
    pub boost: i8,
}

impl Completion {
    /// Creates a completion with just a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: None,
            info: None,
            kind: None,
            apply: None,
            boost: 0,
        }
    }

    /// Sets the detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Sets the info string.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Sets the kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: CompletionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the apply action.
    #[must_use]
    pub fn with_apply(mut self, apply: Apply) -> Self {
        self.apply = Some(apply);
        self
    }

    /// Sets the text inserted on accept.
    #[must_use]
    pub fn with_apply_text(self, text: impl Into<String>) -> Self {
        self.with_apply(Apply::Text(text.into()))
    }

    /// Sets the boost, clamped to `MIN_BOOST..=MAX_BOOST`.
    #[must_use]
    pub fn with_boost(mut self, boost: i8) -> Self {
        self.boost = boost.clamp(MIN_BOOST, MAX_BOOST);
        self
    }

    /// Returns whether two completions insert and display the same thing.
    #[must_use]
    pub fn same_entry(&self, other: &Self) -> bool {
        self.label == other.label
            && self.detail == other.detail
            && self.kind == other.kind
            && self.apply == other.apply
    }
}

/// Callback returning the matched character ranges of a completion label.
pub type MatchFn = Arc<dyn Fn(&Completion) -> Vec<(usize, usize)> + Send + Sync>;

/// Callback that refreshes a result synchronously after typing.
///
/// Receives the current result, the mapped range, and a context at the new
/// cursor; returns `None` when the result cannot be updated.
pub type UpdateFn = Arc<
    dyn Fn(&CompletionResult, usize, usize, &CompletionContext) -> Option<CompletionResult>
        + Send
        + Sync,
>;

/// Predicate deciding whether a result still covers `text` in `[from, to)`.
pub type ValidForFn = Arc<dyn Fn(&str, usize, usize, &Rope) -> bool + Send + Sync>;

/// Test for reusing a result without querying the source again.
#[derive(Clone)]
pub enum ValidFor {
    /// The completed text must match the whole pattern.
    Pattern(Regex),
    /// Custom predicate.
    Predicate(ValidForFn),
}

impl ValidFor {
    /// Compiles `pattern`, anchoring it at both ends.
    ///
    /// # Errors
    /// Returns an error if the pattern is not a valid regex.
    pub fn pattern(pattern: &str) -> Result<Self, SourceError> {
        Ok(Self::Pattern(Regex::new(&format!("^(?:{pattern})$"))?))
    }

    /// Returns whether the result is still valid for `text` at `[from, to)`.
    #[must_use]
    pub fn is_valid(&self, text: &str, from: usize, to: usize, doc: &Rope) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(text),
            Self::Predicate(f) => f(text, from, to, doc),
        }
    }
}

impl fmt::Debug for ValidFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Result from a completion source.
#[derive(Clone)]
pub struct CompletionResult {
    /// Start of the completed range.
    pub from: usize,

    /// End of the completed range; the cursor when `None`.
    pub to: Option<usize>,

    /// Completions, in the source's order.
    pub options: Vec<Arc<Completion>>,

    /// Whether the engine should fuzzy-filter and rank the options.
    pub filter: bool,

    /// Match spans for unfiltered results.
    pub get_match: Option<MatchFn>,

    /// Reuse test applied after typing.
    pub valid_for: Option<ValidFor>,

    /// Synchronous refresh applied after typing.
    pub update: Option<UpdateFn>,
}

impl CompletionResult {
    /// Creates a filtered result starting at `from`.
    #[must_use]
    pub fn new(from: usize, options: Vec<Completion>) -> Self {
        Self::from_shared(from, options.into_iter().map(Arc::new).collect())
    }

    /// Creates a filtered result from already shared completions.
    #[must_use]
    pub fn from_shared(from: usize, options: Vec<Arc<Completion>>) -> Self {
        Self {
            from,
            to: None,
            options,
            filter: true,
            get_match: None,
            valid_for: None,
            update: None,
        }
    }

    /// Sets the end of the completed range.
    #[must_use]
    pub const fn with_to(mut self, to: usize) -> Self {
        self.to = Some(to);
        self
    }

    /// Disables filtering; options keep the source's order.
    #[must_use]
    pub const fn unfiltered(mut self) -> Self {
        self.filter = false;
        self
    }

    /// Sets the match span callback.
    #[must_use]
    pub fn with_match(mut self, get_match: MatchFn) -> Self {
        self.get_match = Some(get_match);
        self
    }

    /// Sets the reuse test.
    #[must_use]
    pub fn with_valid_for(mut self, valid_for: ValidFor) -> Self {
        self.valid_for = Some(valid_for);
        self
    }

    /// Sets the synchronous refresh.
    #[must_use]
    pub fn with_update(mut self, update: UpdateFn) -> Self {
        self.update = Some(update);
        self
    }

    /// Returns whether this result has any options.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }
}

impl fmt::Debug for CompletionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionResult")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("options", &self.options.len())
            .field("filter", &self.filter)
            .field("valid_for", &self.valid_for)
            .field("update", &self.update.is_some())
            .finish()
    }
}

type AbortListener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct AbortInner {
    aborted: bool,
    listeners: Vec<AbortListener>,
}

/// Cooperative cancellation signal shared between the engine and a query.
///
/// Sources may poll [`is_aborted`](Self::is_aborted) or register a callback
/// with [`on_abort`](Self::on_abort). Only the engine aborts a signal.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Mutex<AbortInner>>,
}

impl AbortSignal {
    /// Creates a signal that has not been aborted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the query was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .aborted
    }

    /// Registers a callback run on abort. Runs it now if already aborted.
    pub fn on_abort(&self, listener: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.aborted {
            drop(inner);
            listener();
        } else {
            inner.listeners.push(Box::new(listener));
        }
    }

    /// Aborts the query and runs the registered callbacks once.
    pub(crate) fn abort(&self) {
        let listeners = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.aborted {
                return;
            }
            inner.aborted = true;
            std::mem::take(&mut inner.listeners)
        };
        for listener in listeners {
            listener();
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Text matched before the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Start offset.
    pub from: usize,
    /// End offset (the cursor).
    pub to: usize,
    /// Matched text.
    pub text: String,
}

/// Context for one completion query.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    /// Document snapshot at dispatch time.
    pub doc: Rope,

    /// Cursor offset.
    pub pos: usize,

    /// Whether completion was requested explicitly rather than by typing.
    pub explicit: bool,

    /// Abort signal for this query.
    abort: AbortSignal,
}

impl CompletionContext {
    /// Creates a context with a fresh abort signal.
    #[must_use]
    pub fn new(doc: Rope, pos: usize, explicit: bool) -> Self {
        Self {
            doc,
            pos,
            explicit,
            abort: AbortSignal::new(),
        }
    }

    /// Returns the abort signal.
    #[must_use]
    pub const fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Returns whether the query was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Registers a callback run when the query is aborted.
    pub fn on_abort(&self, listener: impl FnOnce() + Send + 'static) {
        self.abort.on_abort(listener);
    }

    /// Returns the text in `[from, to)`.
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> String {
        slice_rope(&self.doc, from, to)
    }

    /// Returns the line containing the cursor.
    #[must_use]
    pub fn line(&self) -> Line {
        line_at(&self.doc, self.pos)
    }

    /// Finds a match of `re` that ends at the cursor.
    ///
    /// Only the current line is searched, at most
    /// [`MATCH_BEFORE_LOOKBACK`] characters back.
    #[must_use]
    pub fn match_before(&self, re: &Regex) -> Option<TokenMatch> {
        let line = line_at(&self.doc, self.pos);
        let start = line.from.max(self.pos.saturating_sub(MATCH_BEFORE_LOOKBACK));
        let text = self.slice(start, self.pos);

        let m = re.find_iter(&text).find(|m| m.end() == text.len())?;
        let from = start + text[..m.start()].chars().count();
        Some(TokenMatch {
            from,
            to: self.pos,
            text: m.as_str().to_string(),
        })
    }
}

/// Completion source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The query failed.
    #[error("Completion source {source_id} failed: {message}")]
    Failed { source_id: String, message: String },

    /// The query task panicked or was cancelled by the runtime.
    #[error("Completion source {source_id} did not finish: {message}")]
    Interrupted { source_id: String, message: String },

    /// A pattern could not be compiled.
    #[error("Invalid completion pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl SourceError {
    /// Creates a failure for `source_id`.
    #[must_use]
    pub fn failed(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}

/// Type alias for the boxed future a source returns.
pub type CompletionFuture =
    Pin<Box<dyn Future<Output = Result<Option<CompletionResult>, SourceError>> + Send + 'static>>;

/// Trait for completion sources.
///
/// `query` is called at most once at a time per source. It returns
/// `Ok(None)` when the source has nothing to offer at the position.
/// Synchronous sources return an already resolved future.
pub trait CompletionSource: Send + Sync {
    /// Returns the unique identifier for this source.
    fn id(&self) -> &str;

    /// Computes completions for the given context.
    fn query(&self, context: CompletionContext) -> CompletionFuture;
}

/// A synchronous source backed by a closure.
pub struct FnSource<F> {
    id: String,
    f: F,
}

/// Wraps a synchronous closure as a completion source.
#[must_use]
pub fn from_fn<F>(id: impl Into<String>, f: F) -> FnSource<F>
where
    F: Fn(&CompletionContext) -> Option<CompletionResult> + Send + Sync,
{
    FnSource { id: id.into(), f }
}

impl<F> CompletionSource for FnSource<F>
where
    F: Fn(&CompletionContext) -> Option<CompletionResult> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self, context: CompletionContext) -> CompletionFuture {
        let result = (self.f)(&context);
        Box::pin(async move { Ok(result) })
    }
}
