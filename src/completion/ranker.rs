//! Merging and ranking of options across sources.

use std::sync::Arc;

use ropey::Rope;

use super::config::TieBreak;
use super::filter::FuzzyFilter;
use super::source::Completion;
use super::state::{ActiveSource, SourceState};
use crate::editor::buffer::slice_rope;

/// Base score of options from unfiltered results, above any fuzzy score.
pub const UNFILTERED_BASE_SCORE: i64 = 1_000_000_000;

/// A ranked option ready for display.
#[derive(Debug, Clone)]
pub struct CompletionOption {
    /// The completion.
    pub completion: Arc<Completion>,
    /// Id of the source that produced it.
    pub source_id: String,
    /// Ranking score; higher sorts first.
    pub score: i64,
    /// Matched character ranges of the label.
    pub spans: Vec<(usize, usize)>,
}

/// Returns the priority used to pick between duplicate entries.
#[must_use]
pub fn dedup_priority(completion: &Completion) -> i32 {
    i32::from(completion.boost) * 100
        + if completion.apply.is_some() { 10 } else { 0 }
        + if completion.info.is_some() { 5 } else { 0 }
        + i32::from(completion.kind.is_some())
}

/// Ranks the options of every source holding a result.
///
/// Unfiltered results keep their order and sort above filtered ones.
/// Filtered results are fuzzy-matched against the text in their range and
/// scored by match quality plus boost. Equal scores are ordered by
/// `tie_break`, then by declaration order. Adjacent duplicates collapse to
/// the one with the higher [`dedup_priority`].
#[must_use]
pub fn rank(active: &[ActiveSource], doc: &Rope, tie_break: &TieBreak) -> Vec<CompletionOption> {
    let mut options = Vec::new();
    let mut unfiltered_index: i64 = 0;

    for source in active {
        let SourceState::Result(ref res) = source.state else {
            continue;
        };
        let source_id = source.id().to_string();

        if res.result.filter {
            let filter = FuzzyFilter::new(slice_rope(doc, res.from, res.to));
            for completion in &res.result.options {
                if let Some(m) = filter.matches(&completion.label) {
                    options.push(CompletionOption {
                        completion: Arc::clone(completion),
                        source_id: source_id.clone(),
                        score: m.score + i64::from(completion.boost),
                        spans: m.spans,
                    });
                }
            }
        } else {
            for completion in &res.result.options {
                let spans = res
                    .result
                    .get_match
                    .as_ref()
                    .map(|get_match| get_match(completion))
                    .unwrap_or_default();
                options.push(CompletionOption {
                    completion: Arc::clone(completion),
                    source_id: source_id.clone(),
                    score: UNFILTERED_BASE_SCORE - unfiltered_index,
                    spans,
                });
                unfiltered_index += 1;
            }
        }
    }

    options.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| tie_break.compare(&a.completion, &b.completion))
    });

    let mut ranked: Vec<CompletionOption> = Vec::with_capacity(options.len());
    let mut prev: Option<Arc<Completion>> = None;
    for option in options {
        let duplicate = prev
            .as_ref()
            .is_some_and(|p| p.same_entry(&option.completion));
        let current = Arc::clone(&option.completion);
        if !duplicate {
            ranked.push(option);
        } else if prev
            .as_ref()
            .is_some_and(|p| dedup_priority(&option.completion) > dedup_priority(p))
        {
            if let Some(last) = ranked.last_mut() {
                *last = option;
            }
        }
        prev = Some(current);
    }
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::completion::source::{CompletionKind, CompletionResult, from_fn};
    use crate::completion::state::ActiveResult;

    fn result_source(id: &str, result: CompletionResult, to: usize) -> ActiveSource {
        let from = result.from;
        let source = Arc::new(from_fn(id.to_string(), |_: &crate::completion::CompletionContext| None));
        ActiveSource {
            source,
            state: SourceState::Result(ActiveResult {
                result: Arc::new(result),
                from,
                to,
            }),
            explicit_pos: None,
        }
    }

    fn labels(options: &[CompletionOption]) -> Vec<&str> {
        options.iter().map(|o| o.completion.label.as_str()).collect()
    }

    #[test]
    fn test_prefix_ties_keep_declaration_order() {
        let doc = Rope::from_str("pri");
        let source = result_source(
            "words",
            CompletionResult::new(
                0,
                vec![
                    Completion::new("print"),
                    Completion::new("private"),
                    Completion::new("primary"),
                ],
            ),
            3,
        );

        let ranked = rank(&[source], &doc, &TieBreak::Declaration);
        assert_eq!(labels(&ranked), vec!["print", "private", "primary"]);
    }

    #[test]
    fn test_non_matching_options_dropped() {
        let doc = Rope::from_str("zz");
        let source = result_source(
            "words",
            CompletionResult::new(0, vec![Completion::new("print"), Completion::new("fizz")]),
            2,
        );
        let ranked = rank(&[source], &doc, &TieBreak::Declaration);
        assert_eq!(labels(&ranked), vec!["fizz"]);
    }

    #[test]
    fn test_boost_reorders() {
        let doc = Rope::from_str("");
        let source = result_source(
            "words",
            CompletionResult::new(
                0,
                vec![Completion::new("alpha"), Completion::new("beta").with_boost(10)],
            ),
            0,
        );
        let ranked = rank(&[source], &doc, &TieBreak::Declaration);
        assert_eq!(labels(&ranked), vec!["beta", "alpha"]);
    }

    #[test]
    fn test_unfiltered_sorts_first_in_order() {
        let doc = Rope::from_str("a");
        let filtered = result_source(
            "filtered",
            CompletionResult::new(0, vec![Completion::new("apple")]),
            1,
        );
        let unfiltered = result_source(
            "unfiltered",
            CompletionResult::new(0, vec![Completion::new("zeta"), Completion::new("eta")])
                .unfiltered(),
            1,
        );
        let ranked = rank(&[filtered, unfiltered], &doc, &TieBreak::Declaration);
        assert_eq!(labels(&ranked), vec!["zeta", "eta", "apple"]);
        assert_eq!(ranked[0].score, UNFILTERED_BASE_SCORE);
        assert_eq!(ranked[1].score, UNFILTERED_BASE_SCORE - 1);
    }

    #[test]
    fn test_duplicates_keep_higher_priority() {
        let doc = Rope::from_str("");
        let first = result_source(
            "one",
            CompletionResult::new(0, vec![Completion::new("foo")]),
            0,
        );
        let second = result_source(
            "two",
            CompletionResult::new(0, vec![Completion::new("foo").with_boost(1)]),
            0,
        );
        let ranked = rank(&[first, second], &doc, &TieBreak::Declaration);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].completion.boost, 1);
        assert_eq!(ranked[0].source_id, "two");
    }

    #[test]
    fn test_different_kind_not_deduplicated() {
        let doc = Rope::from_str("");
        let source = result_source(
            "kinds",
            CompletionResult::new(
                0,
                vec![
                    Completion::new("foo").with_kind(CompletionKind::Function),
                    Completion::new("foo").with_kind(CompletionKind::Variable),
                ],
            ),
            0,
        );
        assert_eq!(rank(&[source], &doc, &TieBreak::Declaration).len(), 2);
    }

    #[test]
    fn test_label_tie_break() {
        let doc = Rope::from_str("");
        let source = result_source(
            "words",
            CompletionResult::new(0, vec![Completion::new("b"), Completion::new("a")]),
            0,
        );
        let ranked = rank(&[source], &doc, &TieBreak::Label);
        assert_eq!(labels(&ranked), vec!["a", "b"]);
    }

    #[test]
    fn test_dedup_priority() {
        let plain = Completion::new("x");
        let rich = Completion::new("x")
            .with_apply_text("x()")
            .with_info("doc")
            .with_kind(CompletionKind::Function);
        assert_eq!(dedup_priority(&plain), 0);
        assert_eq!(dedup_priority(&rich), 16);
        assert_eq!(dedup_priority(&plain.with_boost(-2)), -200);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let doc = Rope::from_str("ma");
        let make = || {
            result_source(
                "words",
                CompletionResult::new(
                    0,
                    vec![
                        Completion::new("map"),
                        Completion::new("match"),
                        Completion::new("format"),
                        Completion::new("max"),
                    ],
                ),
                2,
            )
        };
        let first = rank(&[make()], &doc, &TieBreak::Declaration);
        let second = rank(&[make()], &doc, &TieBreak::Declaration);
        assert_eq!(labels(&first), labels(&second));
    }
}
