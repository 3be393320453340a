//! Completion behavior settings.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::debounce::DEFAULT_DEBOUNCE_MS;
use super::source::Completion;

/// Default maximum number of options in the visible window.
pub const DEFAULT_MAX_RENDERED_OPTIONS: usize = 100;

/// Default buffered update count before a slow query may be abandoned.
pub const DEFAULT_MAX_UPDATE_COUNT: usize = 50;

/// Default minimum query age before it may be abandoned, in milliseconds.
pub const DEFAULT_MIN_ABORT_MS: u64 = 1000;

/// Default delay before accept and selection moves are honored, in milliseconds.
pub const DEFAULT_INTERACTION_DELAY_MS: u64 = 75;

/// Comparator for completions with equal scores.
pub type CompareFn = Arc<dyn Fn(&Completion, &Completion) -> Ordering + Send + Sync>;

/// How options with equal scores are ordered.
#[derive(Clone, Default)]
pub enum TieBreak {
    /// Keep the order sources declared them in.
    #[default]
    Declaration,
    /// Order by label.
    Label,
    /// Custom comparator.
    Custom(CompareFn),
}

impl TieBreak {
    /// Compares two completions.
    #[must_use]
    pub fn compare(&self, a: &Completion, b: &Completion) -> Ordering {
        match self {
            Self::Declaration => Ordering::Equal,
            Self::Label => a.label.cmp(&b.label),
            Self::Custom(f) => f(a, b),
        }
    }

    /// Parses a config value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "declaration" | "declared" => Some(Self::Declaration),
            "label" | "alphabetical" => Some(Self::Label),
            _ => None,
        }
    }

    /// Returns the config name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Declaration => "declaration",
            Self::Label => "label",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Whether typing activates completion.
    pub activate_on_typing: bool,

    /// Whether the first option is selected when the dialog opens.
    pub select_on_open: bool,

    /// Size of the visible window.
    pub max_rendered_options: usize,

    /// Quiet period before pending sources are queried.
    pub debounce: Duration,

    /// Wait for slower sources before merging finished ones.
    pub accept_debounce: Duration,

    /// Buffered update count past which an old query is abandoned.
    pub max_update_count: usize,

    /// Minimum age before a query may be abandoned for buffering too much.
    pub min_abort_time: Duration,

    /// Delay after opening before accept and selection moves work.
    pub interaction_delay: Duration,

    /// Ordering of equally scored options.
    pub tie_break: TieBreak,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            activate_on_typing: true,
            select_on_open: true,
            max_rendered_options: DEFAULT_MAX_RENDERED_OPTIONS,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            accept_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
            min_abort_time: Duration::from_millis(DEFAULT_MIN_ABORT_MS),
            interaction_delay: Duration::from_millis(DEFAULT_INTERACTION_DELAY_MS),
            tie_break: TieBreak::Declaration,
        }
    }
}

impl CompletionConfig {
    /// Sets whether typing activates completion.
    #[must_use]
    pub const fn with_activate_on_typing(mut self, enabled: bool) -> Self {
        self.activate_on_typing = enabled;
        self
    }

    /// Sets whether the first option is selected on open.
    #[must_use]
    pub const fn with_select_on_open(mut self, enabled: bool) -> Self {
        self.select_on_open = enabled;
        self
    }

    /// Sets the visible window size (at least 1).
    #[must_use]
    pub fn with_max_rendered_options(mut self, max: usize) -> Self {
        self.max_rendered_options = max.max(1);
        self
    }

    /// Sets the query debounce delay.
    #[must_use]
    pub const fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Sets the interaction delay.
    #[must_use]
    pub const fn with_interaction_delay(mut self, delay: Duration) -> Self {
        self.interaction_delay = delay;
        self
    }

    /// Sets the tie-break comparator.
    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}
