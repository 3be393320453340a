//! Completion from a fixed list of options.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::cache::is_word_char;
use super::source::{
    Completion, CompletionContext, CompletionFuture, CompletionResult, CompletionSource,
    SourceError, ValidFor,
};

/// A source offering the same options everywhere.
///
/// A result is produced when the text before the cursor looks like the
/// start of an option, or when completion was requested explicitly.
#[derive(Debug)]
pub struct ListSource {
    /// Source id.
    id: String,
    /// The options.
    options: Vec<Arc<Completion>>,
    /// Reuse test for results.
    valid_for: ValidFor,
    /// Token matched before the cursor.
    token: Regex,
}

/// Builds a list source with id `id`.
///
/// When every label consists of word characters the token is `\w+`;
/// otherwise it is derived from the characters the labels start with and
/// contain.
///
/// # Errors
/// Returns an error if the derived pattern does not compile.
pub fn complete_from_list(
    id: impl Into<String>,
    options: Vec<Completion>,
) -> Result<ListSource, SourceError> {
    let word_labels = options
        .iter()
        .all(|o| !o.label.is_empty() && o.label.chars().all(is_word_char));

    let (valid_for, token) = if word_labels {
        (ValidFor::pattern(r"\w*")?, Regex::new(r"\w+$")?)
    } else {
        let source = prefix_pattern(&options);
        (ValidFor::pattern(&source)?, Regex::new(&format!("{source}$"))?)
    };

    Ok(ListSource {
        id: id.into(),
        options: options.into_iter().map(Arc::new).collect(),
        valid_for,
        token,
    })
}

/// Builds a list source from bare labels.
///
/// # Errors
/// Returns an error if the derived pattern does not compile.
pub fn complete_from_labels<S: AsRef<str>>(
    id: impl Into<String>,
    labels: &[S],
) -> Result<ListSource, SourceError> {
    let options = labels.iter().map(|l| Completion::new(l.as_ref())).collect();
    complete_from_list(id, options)
}

/// Returns a character class matching any of `chars`.
fn char_class(chars: &BTreeSet<char>) -> String {
    let words = chars.iter().any(|c| is_word_char(*c));
    let mut class = String::from("[");
    if words {
        class.push_str(r"\w");
    }
    for c in chars.iter().filter(|c| !words || !is_word_char(**c)) {
        class.push_str(&regex::escape(&c.to_string()));
    }
    class.push(']');
    class
}

/// Pattern matching a prefix of any label: a first character, then any
/// characters that occur later in a label.
fn prefix_pattern(options: &[Completion]) -> String {
    let mut first = BTreeSet::new();
    let mut rest = BTreeSet::new();
    for option in options {
        let mut chars = option.label.chars();
        if let Some(c) = chars.next() {
            first.insert(c);
        }
        rest.extend(chars);
    }

    let mut pattern = if first.is_empty() {
        String::from(r"\w")
    } else {
        char_class(&first)
    };
    if !rest.is_empty() {
        pattern.push_str(&char_class(&rest));
        pattern.push('*');
    }
    pattern
}

impl ListSource {
    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &[Arc<Completion>] {
        &self.options
    }

    fn complete(&self, context: &CompletionContext) -> Option<CompletionResult> {
        let token = context.match_before(&self.token);
        if token.is_none() && !context.explicit {
            return None;
        }
        let from = token.map_or(context.pos, |t| t.from);
        Some(
            CompletionResult::from_shared(from, self.options.clone())
                .with_valid_for(self.valid_for.clone()),
        )
    }
}

impl CompletionSource for ListSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self, context: CompletionContext) -> CompletionFuture {
        let result = self.complete(&context);
        Box::pin(async move { Ok(result) })
    }
}

/// Memoizes list sources by a stable id.
///
/// Owned by whatever builds the source list, so reconfiguring with the
/// same id hands the engine the same source instance.
#[derive(Debug, Default)]
pub struct SourceCache {
    sources: HashMap<String, Arc<ListSource>>,
}

impl SourceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source cached under `id`, building it from `options`
    /// on first use.
    ///
    /// # Errors
    /// Returns an error if the list pattern does not compile.
    pub fn get_or_build(
        &mut self,
        id: &str,
        options: impl FnOnce() -> Vec<Completion>,
    ) -> Result<Arc<ListSource>, SourceError> {
        if let Some(source) = self.sources.get(id) {
            return Ok(Arc::clone(source));
        }
        let source = Arc::new(complete_from_list(id, options())?);
        debug!(
            "Cached list source {} with {} options",
            id,
            source.options.len()
        );
        self.sources.insert(id.to_string(), Arc::clone(&source));
        Ok(source)
    }

    /// Drops the source cached under `id`.
    pub fn invalidate(&mut self, id: &str) -> bool {
        self.sources.remove(id).is_some()
    }

    /// Returns the number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
