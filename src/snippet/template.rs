//! Snippet template parsing and instantiation.
//!
//! Templates mark fields with `${}` or `#{}`: `${1}` and `${1:name}` are
//! numbered, `${name}` is named. Fields with the same number or name are
//! one field edited in several places. `$\{` and `#\{` escape a literal
//! brace. Fields are ordered by number first, then by first appearance of
//! unnumbered fields, so `${}` without a number can serve as a final stop.

use crate::editor::{ChangeSet, MapMode};

/// A field occurrence inside the template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldPos {
    /// Field index.
    field: usize,
    /// Template line.
    line: usize,
    /// Start column (characters).
    from: usize,
    /// End column (characters).
    to: usize,
}

/// A field occurrence in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    /// Field index.
    pub field: usize,
    /// Start offset.
    pub from: usize,
    /// End offset.
    pub to: usize,
}

impl FieldRange {
    /// Maps the range through `changes`.
    ///
    /// Returns `None` if a change deleted the range.
    #[must_use]
    pub fn map(&self, changes: &ChangeSet) -> Option<Self> {
        let (from, to) = changes.map_range(self.from, self.to, MapMode::TrackDel)?;
        Some(Self {
            field: self.field,
            from,
            to,
        })
    }
}

/// A field definition collected while parsing.
#[derive(Debug)]
struct FieldSpec {
    seq: Option<u64>,
    name: String,
}

/// A placeholder found in a template line.
#[derive(Debug)]
struct Placeholder {
    /// Column of the `$` or `#`.
    start: usize,
    /// Column past the closing brace.
    end: usize,
    seq: Option<u64>,
    name: String,
}

/// A parsed snippet template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// Source template.
    template: String,
    /// Lines with placeholders replaced by their names.
    lines: Vec<String>,
    /// Field occurrences, in parse order.
    positions: Vec<FieldPos>,
}

/// Finds the leftmost placeholder in `line`.
fn find_placeholder(line: &[char]) -> Option<Placeholder> {
    let start = line
        .windows(2)
        .position(|w| (w[0] == '$' || w[0] == '#') && w[1] == '{')?;
    let close = line[start + 2..].iter().position(|c| *c == '}')?;
    let content = &line[start + 2..start + 2 + close];

    let digits = content.iter().take_while(|c| c.is_ascii_digit()).count();
    let numbered = digits > 0 && (digits == content.len() || content[digits] == ':');
    let seq = if numbered {
        content[..digits].iter().collect::<String>().parse().ok()
    } else {
        None
    };
    let name: String = match seq {
        Some(_) => content[(digits + 1).min(content.len())..].iter().collect(),
        None => content.iter().collect(),
    };

    Some(Placeholder {
        start,
        end: start + 2 + close + 1,
        seq,
        name,
    })
}

/// Finds an escaped brace (`$\{` or `#\{`), returning the column of its
/// backslash.
fn find_escape(line: &[char]) -> Option<usize> {
    line.windows(3)
        .position(|w| (w[0] == '$' || w[0] == '#') && w[1] == '\\' && w[2] == '{')
        .map(|i| i + 1)
}

/// Splits on `\r\n`, `\r` or `\n`.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

impl Snippet {
    /// Parses `template`. Parsing never fails; malformed placeholders are
    /// kept as literal text.
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let mut fields: Vec<FieldSpec> = Vec::new();
        let mut lines = Vec::new();
        let mut positions: Vec<FieldPos> = Vec::new();

        for raw in split_lines(template) {
            let line_no = lines.len();
            let mut line: Vec<char> = raw.chars().collect();

            while let Some(ph) = find_placeholder(&line) {
                let existing = fields.iter().rposition(|f| match ph.seq {
                    Some(seq) => f.seq == Some(seq),
                    None => !ph.name.is_empty() && f.name == ph.name,
                });
                let field = existing.unwrap_or_else(|| {
                    let mut i = 0;
                    while i < fields.len()
                        && (ph.seq.is_none() || fields[i].seq.is_some_and(|s| Some(s) < ph.seq))
                    {
                        i += 1;
                    }
                    fields.insert(
                        i,
                        FieldSpec {
                            seq: ph.seq,
                            name: ph.name.clone(),
                        },
                    );
                    for pos in &mut positions {
                        if pos.field >= i {
                            pos.field += 1;
                        }
                    }
                    i
                });

                let name: Vec<char> = ph.name.chars().collect();
                positions.push(FieldPos {
                    field,
                    line: line_no,
                    from: ph.start,
                    to: ph.start + name.len(),
                });
                line.splice(ph.start..ph.end, name);
            }

            while let Some(backslash) = find_escape(&line) {
                line.remove(backslash);
                for pos in positions
                    .iter_mut()
                    .filter(|p| p.line == line_no && p.from >= backslash)
                {
                    pos.from -= 1;
                    pos.to -= 1;
                }
            }

            lines.push(line.into_iter().collect());
        }

        Self {
            template: template.to_string(),
            lines,
            positions,
        }
    }

    /// Returns the source template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the lines with placeholders replaced by their names.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns the number of distinct fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.positions.iter().map(|p| p.field + 1).max().unwrap_or(0)
    }

    /// Returns the field of each occurrence, in template order.
    #[must_use]
    pub fn occurrence_fields(&self) -> Vec<usize> {
        let mut positions: Vec<&FieldPos> = self.positions.iter().collect();
        positions.sort_by_key(|p| (p.line, p.from));
        positions.iter().map(|p| p.field).collect()
    }

    /// Produces the text to insert at `pos` and the field ranges in the
    /// resulting document.
    ///
    /// Lines after the first get `base_indent`, plus one `indent_unit` per
    /// leading tab in the template line.
    #[must_use]
    pub fn instantiate(
        &self,
        base_indent: &str,
        indent_unit: &str,
        pos: usize,
    ) -> (String, Vec<FieldRange>) {
        let mut text = String::new();
        // Offset where the template text of each line starts, and how many
        // leading tabs it replaced.
        let mut starts: Vec<(usize, usize)> = Vec::with_capacity(self.lines.len());
        let mut offset = pos;

        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
                offset += 1;
            }
            if i == 0 {
                starts.push((offset, 0));
                text.push_str(line);
                offset += line.chars().count();
                continue;
            }

            let tabs = line.chars().take_while(|c| *c == '\t').count();
            let mut indent = base_indent.to_string();
            for _ in 0..tabs {
                indent.push_str(indent_unit);
            }
            let indent_len = indent.chars().count();
            starts.push((offset + indent_len, tabs));

            text.push_str(&indent);
            text.push_str(&line[tabs..]);
            offset += indent_len + line.chars().count() - tabs;
        }

        let ranges = self
            .positions
            .iter()
            .map(|p| {
                let (start, tabs) = starts[p.line];
                FieldRange {
                    field: p.field,
                    from: start + p.from.saturating_sub(tabs),
                    to: start + p.to.saturating_sub(tabs),
                }
            })
            .collect();
        (text, ranges)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::editor::Change;

    #[test]
    fn test_plain_text() {
        let snippet = Snippet::parse("hello");
        assert_eq!(snippet.lines(), &["hello".to_string()]);
        assert_eq!(snippet.field_count(), 0);
        let (text, ranges) = snippet.instantiate("", "    ", 3);
        assert_eq!(text, "hello");
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_numbered_fields() {
        let snippet = Snippet::parse("fn ${1:name}(${2:args})");
        assert_eq!(snippet.lines(), &["fn name(args)".to_string()]);
        let (_, ranges) = snippet.instantiate("", "    ", 0);
        assert_eq!(
            ranges,
            vec![
                FieldRange { field: 0, from: 3, to: 7 },
                FieldRange { field: 1, from: 8, to: 12 },
            ]
        );
    }

    #[test]
    fn test_unnumbered_field_sorts_last() {
        let snippet = Snippet::parse("${} = ${2:b} + ${1:a}");
        assert_eq!(snippet.occurrence_fields(), vec![2, 1, 0]);
    }

    #[test]
    fn test_repeated_name_shares_field() {
        let snippet = Snippet::parse("${x} + ${x}");
        assert_eq!(snippet.occurrence_fields(), vec![0, 0]);
        assert_eq!(snippet.lines(), &["x + x".to_string()]);
    }

    #[test]
    fn test_empty_unnumbered_fields_are_distinct() {
        let snippet = Snippet::parse("${}, ${}");
        assert_eq!(snippet.field_count(), 2);
    }

    #[test]
    fn test_hash_placeholder() {
        let snippet = Snippet::parse("#{1:x}");
        assert_eq!(snippet.lines(), &["x".to_string()]);
        assert_eq!(snippet.field_count(), 1);
    }

    #[test]
    fn test_escaped_brace() {
        let snippet = Snippet::parse(r"${1:a} $\{literal}");
        assert_eq!(snippet.lines(), &["a ${literal}".to_string()]);
        assert_eq!(snippet.field_count(), 1);
    }

    #[test]
    fn test_escape_before_field_shifts_it() {
        let snippet = Snippet::parse(r"$\{ ${1:a}");
        assert_eq!(snippet.lines(), &["${ a".to_string()]);
        let (_, ranges) = snippet.instantiate("", "", 0);
        assert_eq!(ranges[0], FieldRange { field: 0, from: 3, to: 4 });
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let snippet = Snippet::parse("${1:oops");
        assert_eq!(snippet.lines(), &["${1:oops".to_string()]);
        assert_eq!(snippet.field_count(), 0);
    }

    #[test]
    fn test_multiline_indent() {
        let snippet = Snippet::parse("if ${1:cond} {\n\t${2}\n}");
        let (text, ranges) = snippet.instantiate("  ", "    ", 10);
        assert_eq!(text, "if cond {\n      \n  }");
        assert_eq!(ranges[0], FieldRange { field: 0, from: 13, to: 17 });
        assert_eq!(ranges[1], FieldRange { field: 1, from: 26, to: 26 });
    }

    #[test]
    fn test_crlf_lines() {
        let snippet = Snippet::parse("a\r\nb\rc");
        assert_eq!(snippet.lines().len(), 3);
        assert_eq!(snippet.instantiate("", "", 0).0, "a\nb\nc");
    }

    #[test]
    fn test_for_loop_fields() {
        let snippet = Snippet::parse("for (let ${i} = 0; ${i} < ${end}; ${i}++) {\n\t${}\n}");
        assert_eq!(snippet.occurrence_fields(), vec![0, 0, 1, 0, 2]);
        assert_eq!(snippet.field_count(), 3);
    }

    #[test]
    fn test_field_range_map() {
        let range = FieldRange { field: 0, from: 2, to: 4 };
        let typed = ChangeSet::new(vec![Change::insert(4, "x")], 6).unwrap();
        assert_eq!(range.map(&typed), Some(FieldRange { field: 0, from: 2, to: 5 }));

        let deleted = ChangeSet::new(vec![Change::delete(1, 5)], 6).unwrap();
        assert_eq!(range.map(&deleted), None);
    }
}
