//! Completion from the words in the document.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use ropey::Rope;

use super::cache::{CacheStats, WordCache, is_word_char};
use super::source::{
    Completion, CompletionContext, CompletionFuture, CompletionKind, CompletionResult,
    CompletionSource, ValidFor,
};

/// Maximum number of words offered.
pub const MAX_WORD_OPTIONS: usize = 2000;

/// Source id used by [`WordSource::new`].
const SOURCE_ID: &str = "words";

/// Offers every distinct word in the document.
///
/// The word being typed is excluded at its own position but still offered
/// if it occurs elsewhere.
#[derive(Debug)]
pub struct WordSource {
    /// Source id.
    id: String,
    /// Scanned lines.
    cache: Mutex<WordCache>,
}

impl WordSource {
    /// Creates a word source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(SOURCE_ID)
    }

    /// Creates a word source with a custom id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cache: Mutex::new(WordCache::new()),
        }
    }

    /// Returns line cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    fn complete(&self, context: &CompletionContext) -> Option<CompletionResult> {
        let line = context.line();
        let before: Vec<char> = line.text.chars().take(context.pos - line.from).collect();
        let token_len = before
            .iter()
            .rev()
            .take_while(|c| is_word_char(**c))
            .count();
        if token_len == 0 && !context.explicit {
            return None;
        }
        let from = context.pos - token_len;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut options = Vec::new();
        let mut line_start = 0;

        'lines: for line in context.doc.lines() {
            let width = line.len_chars();
            let text: String = line.chars().filter(|c| *c != '\n' && *c != '\r').collect();
            for word in cache.words(&text).iter() {
                if line_start + word.start == from || !seen.insert(word.text.clone()) {
                    continue;
                }
                options.push(Completion::new(word.text.clone()).with_kind(CompletionKind::Text));
                if options.len() >= MAX_WORD_OPTIONS {
                    break 'lines;
                }
            }
            line_start += width;
        }

        let valid_for = ValidFor::Predicate(Arc::new(|text: &str, _: usize, _: usize, _: &Rope| {
            !text.is_empty() && text.chars().all(is_word_char)
        }));
        Some(CompletionResult::new(from, options).with_valid_for(valid_for))
    }
}

impl Default for WordSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSource for WordSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self, context: CompletionContext) -> CompletionFuture {
        let result = self.complete(&context);
        Box::pin(async move { Ok(result) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use ropey::Rope;

    use super::*;

    fn context_at(text: &str, pos: usize, explicit: bool) -> CompletionContext {
        CompletionContext::new(Rope::from_str(text), pos, explicit)
    }

    fn labels(result: &CompletionResult) -> Vec<&str> {
        result.options.iter().map(|o| o.label.as_str()).collect()
    }

    #[test]
    fn test_collects_distinct_words() {
        let text = "alpha beta\nalpha gamma\nal";
        let source = WordSource::new();
        let result = source.complete(&context_at(text, text.len(), false)).unwrap();
        assert_eq!(result.from, text.len() - 2);
        assert_eq!(labels(&result), vec!["alpha", "beta", "gamma"]);
        assert!(result.options.iter().all(|o| o.kind == Some(CompletionKind::Text)));
    }

    #[test]
    fn test_current_word_skipped_at_its_position() {
        let text = "foo fo";
        let source = WordSource::new();
        let result = source.complete(&context_at(text, 6, false)).unwrap();
        assert_eq!(labels(&result), vec!["foo"]);

        let repeated = "fo fo";
        let result = source.complete(&context_at(repeated, 5, false)).unwrap();
        assert_eq!(labels(&result), vec!["fo"]);
    }

    #[test]
    fn test_no_token_requires_explicit() {
        let source = WordSource::new();
        assert!(source.complete(&context_at("foo ", 4, false)).is_none());
        let result = source.complete(&context_at("foo ", 4, true)).unwrap();
        assert_eq!(result.from, 4);
        assert_eq!(labels(&result), vec!["foo"]);
    }

    #[test]
    fn test_valid_for_word_text() {
        let source = WordSource::new();
        let result = source.complete(&context_at("bar b", 5, false)).unwrap();
        let valid = result.valid_for.unwrap();
        assert!(valid.is_valid("ba", 4, 6, &Rope::new()));
        assert!(!valid.is_valid("ba.", 4, 7, &Rope::new()));
        assert!(!valid.is_valid("", 4, 4, &Rope::new()));
    }

    #[test]
    fn test_option_limit() {
        let text: String = (0..2500).map(|i| format!("w{i} ")).collect();
        let source = WordSource::new();
        let result = source.complete(&context_at(&text, 0, true)).unwrap();
        assert_eq!(result.len(), MAX_WORD_OPTIONS);
    }

    #[test]
    fn test_lines_are_cached() {
        let source = WordSource::new();
        let _ = source.complete(&context_at("one\ntwo\nt", 9, false));
        let _ = source.complete(&context_at("one\ntwo\nth", 10, false));
        let stats = source.stats();
        assert_eq!(stats.hit_count, 2);
    }
}
