//! LRU cache of words scanned from document lines.
//!
//! Lines are keyed by their text, so unchanged lines are never rescanned
//! while the rest of the document is edited.

use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of cached lines.
const MAX_CACHE_ENTRIES: usize = 4096;

/// A word found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWord {
    /// Character offset of the word within its line.
    pub start: usize,
    /// The word.
    pub text: String,
}

/// Returns whether `c` belongs to a word.
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric() || c == '_'
}

/// Splits a line into its words.
#[must_use]
pub fn scan_words(line: &str) -> Vec<LineWord> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut start = 0;

    for (i, ch) in line.chars().enumerate() {
        if is_word_char(ch) {
            if word.is_empty() {
                start = i;
            }
            word.push(ch);
        } else if !word.is_empty() {
            words.push(LineWord {
                start,
                text: std::mem::take(&mut word),
            });
        }
    }

    if !word.is_empty() {
        words.push(LineWord { start, text: word });
    }
    words
}

/// Cached entry with its access count.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Words of the line.
    words: Arc<Vec<LineWord>>,

    /// Access count for LRU ordering.
    access_count: u64,
}

impl CacheEntry {
    fn touch(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// LRU cache of scanned lines.
#[derive(Debug)]
pub struct WordCache {
    /// Entries by line text.
    entries: HashMap<String, CacheEntry>,

    /// Maximum number of entries.
    max_entries: usize,

    /// Total hit count.
    hit_count: u64,

    /// Total miss count.
    miss_count: u64,
}

impl WordCache {
    /// Creates a cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_ENTRIES)
    }

    /// Creates a cache holding at most `max_entries` lines.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: HashMap::with_capacity(max_entries.min(MAX_CACHE_ENTRIES)),
            max_entries,
            hit_count: 0,
            miss_count: 0,
        }
    }

    /// Returns the words of `line`, scanning it on a miss.
    pub fn words(&mut self, line: &str) -> Arc<Vec<LineWord>> {
        if let Some(entry) = self.entries.get_mut(line) {
            entry.touch();
            self.hit_count = self.hit_count.saturating_add(1);
            return Arc::clone(&entry.words);
        }

        self.miss_count = self.miss_count.saturating_add(1);
        if self.entries.len() >= self.max_entries {
            self.evict();
        }

        let words = Arc::new(scan_words(line));
        self.entries.insert(
            line.to_string(),
            CacheEntry {
                words: Arc::clone(&words),
                access_count: 0,
            },
        );
        words
    }

    /// Evicts the least accessed half of the entries.
    fn evict(&mut self) {
        let target_size = self.max_entries / 2;
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, e)| e.access_count);

        let to_remove: Vec<String> = entries
            .iter()
            .take(self.entries.len().saturating_sub(target_size))
            .map(|(k, _)| (*k).clone())
            .collect();

        for key in to_remove {
            self.entries.remove(&key);
        }
    }

    /// Clears all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of cached lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the hit rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            hit_rate: self.hit_rate(),
        }
    }
}

impl Default for WordCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of entries.
    pub entries: usize,

    /// Maximum number of entries.
    pub max_entries: usize,

    /// Total cache hits.
    pub hit_count: u64,

    /// Total cache misses.
    pub miss_count: u64,

    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}
