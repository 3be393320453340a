//! Fuzzy matching of typed text against completion labels.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMatch {
    /// Match quality; higher is better.
    pub score: i64,
    /// Matched character ranges of the label, merged and sorted.
    pub spans: Vec<(usize, usize)>,
}

/// Matches one pattern against many labels.
pub struct FuzzyFilter {
    /// The typed text.
    pattern: String,
    /// Pattern length in characters.
    pattern_len: usize,
    /// Skim matcher.
    matcher: SkimMatcherV2,
}

impl FuzzyFilter {
    /// Creates a filter for `pattern`.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let pattern_len = pattern.chars().count();
        Self {
            pattern,
            pattern_len,
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Returns the pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matches `label`, returning `None` when it does not match.
    ///
    /// An empty pattern matches everything with score 0. A single-character
    /// pattern only matches at the start of the label.
    #[must_use]
    pub fn matches(&self, label: &str) -> Option<FilterMatch> {
        if self.pattern_len == 0 {
            return Some(FilterMatch {
                score: 0,
                spans: Vec::new(),
            });
        }
        if label.chars().count() < self.pattern_len {
            return None;
        }

        if self.pattern_len == 1 {
            let first = label.chars().next()?;
            let (score, _) = self
                .matcher
                .fuzzy_indices(first.encode_utf8(&mut [0; 4]), &self.pattern)?;
            return Some(FilterMatch {
                score,
                spans: vec![(0, 1)],
            });
        }

        let (score, indices) = self.matcher.fuzzy_indices(label, &self.pattern)?;
        Some(FilterMatch {
            score,
            spans: merge_indices(&indices),
        })
    }
}

/// Merges sorted character indices into half-open ranges.
fn merge_indices(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for &i in indices {
        match spans.last_mut() {
            Some(last) if last.1 == i => last.1 = i + 1,
            _ => spans.push((i, i + 1)),
        }
    }
    spans
}
