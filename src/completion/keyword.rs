//! Language keyword lists.

use super::list::{ListSource, complete_from_list};
use super::source::{Completion, CompletionKind, SourceError};

/// Returns the keywords of `language_id`, or an empty list.
#[must_use]
pub fn language_keywords(language_id: &str) -> &'static [&'static str] {
    match language_id {
        "rust" | "rs" => RUST_KEYWORDS,
        "python" | "py" => PYTHON_KEYWORDS,
        "javascript" | "typescript" | "js" | "ts" => JS_KEYWORDS,
        _ => &[],
    }
}

/// Builds a list source offering the keywords of `language_id`.
///
/// Returns `None` for languages without a keyword list.
///
/// # Errors
/// Returns an error if the list pattern does not compile.
pub fn keyword_source(language_id: &str) -> Result<Option<ListSource>, SourceError> {
    let keywords = language_keywords(language_id);
    if keywords.is_empty() {
        return Ok(None);
    }
    let options = keywords
        .iter()
        .map(|kw| Completion::new(*kw).with_kind(CompletionKind::Keyword))
        .collect();
    complete_from_list(format!("keywords:{language_id}"), options).map(Some)
}

/// Rust keywords.
static RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];

/// Python keywords.
static PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// JavaScript/TypeScript keywords.
static JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
    "function", "if", "import", "in", "instanceof", "interface", "let", "new", "null", "return",
    "static", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while",
    "yield",
];
