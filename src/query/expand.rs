//! Expansion of the document query's id list placeholder.
//!
//! The document template holds a single placeholder standing for the whole
//! list of wanted ids, for example
//!
//! ```sql
//! select id, updatedNanos, title, txt, alive from docs where id in (?)
//! ```
//!
//! At request time the placeholder is replaced with one placeholder per id.
//! Templates may instead use the named marker `:wanted`, which works for
//! every dialect and may appear more than once.
//!
//! The scanner knows just enough SQL to skip quoted text and comments.

use std::ops::Range;

use crate::driver::{Dialect, PlaceholderStyle};
use crate::error::{AdapterError, Result};

/// Name of the list marker, written `:wanted` in templates.
pub const WANTED_MARKER: &str = "wanted";

/// A document query with its list placeholder expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuery {
    pub sql: String,
    /// How many times the id list must be bound, in order.
    pub repeat: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Marker<'a> {
    Positional { span: Range<usize>, text: &'a str },
    Named { span: Range<usize>, name: &'a str },
}

impl Marker<'_> {
    fn span(&self) -> Range<usize> {
        match self {
            Marker::Positional { span, .. } | Marker::Named { span, .. } => span.clone(),
        }
    }
}

/// Replace the list placeholder with `count` placeholders in `dialect` syntax.
pub fn expand_list(sql: &str, dialect: &Dialect, count: usize) -> Result<ExpandedQuery> {
    if count == 0 {
        return Err(build_error("cannot expand an empty id list"));
    }

    let style = dialect.placeholders;
    let markers = scan(sql, style, dialect.backslash_escapes)?;
    let named = markers
        .iter()
        .filter(|m| matches!(m, Marker::Named { .. }))
        .count();
    let positional = markers.len() - named;

    if named > 0 && positional > 0 {
        return Err(build_error(
            "template mixes named and positional placeholders",
        ));
    }

    for marker in &markers {
        match marker {
            Marker::Named { name, .. } if *name != WANTED_MARKER => {
                return Err(build_error(format!(
                    "unknown named parameter ':{name}', expected ':{WANTED_MARKER}'"
                )));
            }
            Marker::Positional { text, .. } if style == PlaceholderStyle::Dollar && *text != "$1" => {
                return Err(build_error(format!(
                    "list placeholder must be $1, found {text}"
                )));
            }
            _ => {}
        }
    }

    if named == 0 && positional != 1 {
        return Err(build_error(format!(
            "expected exactly one list placeholder, found {positional}"
        )));
    }

    let mut expanded = String::with_capacity(sql.len() + markers.len() * count * 4);
    let mut next = 1;
    let mut copied = 0;
    for marker in &markers {
        let span = marker.span();
        expanded.push_str(&sql[copied..span.start]);
        for i in 0..count {
            if i > 0 {
                expanded.push_str(", ");
            }
            match style {
                PlaceholderStyle::Question => expanded.push('?'),
                PlaceholderStyle::Dollar => {
                    expanded.push('$');
                    expanded.push_str(&next.to_string());
                }
            }
            next += 1;
        }
        copied = span.end;
    }
    expanded.push_str(&sql[copied..]);

    Ok(ExpandedQuery {
        sql: expanded,
        repeat: markers.len(),
    })
}

fn build_error(reason: impl Into<String>) -> AdapterError {
    AdapterError::QueryBuild(reason.into())
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn scan(sql: &str, style: PlaceholderStyle, backslash_escapes: bool) -> Result<Vec<Marker<'_>>> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote, backslash_escapes)?;
            }
            b'-' if next == Some(b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if next == Some(b'*') => {
                i = sql[i + 2..]
                    .find("*/")
                    .map(|p| i + 2 + p + 2)
                    .ok_or_else(|| build_error("unterminated block comment"))?;
            }
            b':' if next == Some(b':') => i += 2,
            b':' if next.is_some_and(is_ident_start) => {
                let end = ident_end(bytes, i + 1);
                markers.push(Marker::Named {
                    span: i..end,
                    name: &sql[i + 1..end],
                });
                i = end;
            }
            b'?' if style == PlaceholderStyle::Question => {
                let end = digits_end(bytes, i + 1);
                markers.push(Marker::Positional {
                    span: i..end,
                    text: &sql[i..end],
                });
                i = end;
            }
            b'$' if style == PlaceholderStyle::Dollar && next.is_some_and(|b| b.is_ascii_digit()) => {
                let end = digits_end(bytes, i + 1);
                markers.push(Marker::Positional {
                    span: i..end,
                    text: &sql[i..end],
                });
                i = end;
            }
            _ => i += 1,
        }
    }

    Ok(markers)
}

/// Index just past the closing quote. Doubled quotes are escapes, and so is
/// a backslash when `backslash_escapes` is set.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> Result<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(build_error("unterminated quoted text"))
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| !is_ident(b))
        .map_or(bytes.len(), |p| start + p)
}

fn digits_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |p| start + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: Dialect = Dialect {
        name: "question",
        schemes: &["question"],
        placeholders: PlaceholderStyle::Question,
        line_comment: "--",
        backslash_escapes: false,
    };

    const DOLLAR: Dialect = Dialect {
        name: "dollar",
        schemes: &["dollar"],
        placeholders: PlaceholderStyle::Dollar,
        line_comment: "--",
        backslash_escapes: false,
    };

    const BACKSLASH: Dialect = Dialect {
        name: "backslash",
        schemes: &["backslash"],
        placeholders: PlaceholderStyle::Question,
        line_comment: "--",
        backslash_escapes: true,
    };

    fn reason(result: Result<ExpandedQuery>) -> String {
        match result {
            Err(AdapterError::QueryBuild(reason)) => reason,
            other => panic!("expected query build error, got {other:?}"),
        }
    }

    #[test]
    fn test_question_placeholder_expands() {
        let expanded = expand_list(
            "select * from docs where id in (?)",
            &QUESTION,
            3,
        )
        .unwrap();
        assert_eq!(expanded.sql, "select * from docs where id in (?, ?, ?)");
        assert_eq!(expanded.repeat, 1);
    }

    #[test]
    fn test_numbered_question_placeholder_expands() {
        let expanded =
            expand_list("select * from docs where id in (?1)", &QUESTION, 2)
                .unwrap();
        assert_eq!(expanded.sql, "select * from docs where id in (?, ?)");
    }

    #[test]
    fn test_dollar_placeholder_expands() {
        let expanded = expand_list(
            "select * from docs where id in ($1) and body::text <> ''",
            &DOLLAR,
            3,
        )
        .unwrap();
        assert_eq!(
            expanded.sql,
            "select * from docs where id in ($1, $2, $3) and body::text <> ''"
        );
    }

    #[test]
    fn test_named_marker_expands_per_occurrence() {
        let expanded = expand_list(
            "select * from docs where id in (:wanted) or alias in (:wanted)",
            &DOLLAR,
            2,
        )
        .unwrap();
        assert_eq!(
            expanded.sql,
            "select * from docs where id in ($1, $2) or alias in ($3, $4)"
        );
        assert_eq!(expanded.repeat, 2);
    }

    #[test]
    fn test_named_marker_with_question_style() {
        let expanded = expand_list(
            "select * from docs where id in (:wanted)",
            &QUESTION,
            2,
        )
        .unwrap();
        assert_eq!(expanded.sql, "select * from docs where id in (?, ?)");
    }

    #[test]
    fn test_literals_and_comments_are_skipped() {
        let sql = "-- which docs? all of them: ?\n\
                   select '?', \"a?b\", 'it''s ?' /* :nope ? */ from docs where id in (?)";
        let expanded = expand_list(sql, &QUESTION, 2).unwrap();
        assert!(expanded.sql.ends_with("where id in (?, ?)"));
        assert!(expanded.sql.contains("'it''s ?'"));
        assert!(expanded.sql.starts_with("-- which docs? all of them: ?\n"));
    }

    #[test]
    fn test_question_mark_is_literal_for_dollar_style() {
        let expanded = expand_list(
            "select * from docs where meta ? 'k' and id = any(array[$1])",
            &DOLLAR,
            1,
        )
        .unwrap();
        assert_eq!(
            expanded.sql,
            "select * from docs where meta ? 'k' and id = any(array[$1])"
        );
    }

    #[test]
    fn test_unicode_text_is_preserved() {
        let expanded = expand_list(
            "select 'räksmörgås' from docs where id in (?)",
            &QUESTION,
            1,
        )
        .unwrap();
        assert_eq!(expanded.sql, "select 'räksmörgås' from docs where id in (?)");
    }

    #[test]
    fn test_unknown_named_marker_fails() {
        let reason = reason(expand_list(
            "select * from docs where id in (:ids)",
            &QUESTION,
            1,
        ));
        assert!(reason.contains(":ids"), "{reason}");
    }

    #[test]
    fn test_mixed_placeholders_fail() {
        let reason = reason(expand_list(
            "select * from docs where id in (:wanted) and x = ?",
            &QUESTION,
            1,
        ));
        assert!(reason.contains("mixes"), "{reason}");
    }

    #[test]
    fn test_missing_placeholder_fails() {
        let reason = reason(expand_list("select * from docs", &QUESTION, 1));
        assert!(reason.contains("found 0"), "{reason}");
    }

    #[test]
    fn test_multiple_positional_placeholders_fail() {
        let reason = reason(expand_list(
            "select * from docs where id in (?) and title = ?",
            &QUESTION,
            1,
        ));
        assert!(reason.contains("found 2"), "{reason}");
    }

    #[test]
    fn test_dollar_placeholder_must_be_first() {
        let reason = reason(expand_list(
            "select * from docs where id in ($2)",
            &DOLLAR,
            1,
        ));
        assert!(reason.contains("$2"), "{reason}");
    }

    #[test]
    fn test_unterminated_quote_fails() {
        let reason = reason(expand_list(
            "select * from docs where id in (?) and title = 'open",
            &QUESTION,
            1,
        ));
        assert!(reason.contains("unterminated"), "{reason}");
    }

    #[test]
    fn test_empty_list_fails() {
        let reason = reason(expand_list(
            "select * from docs where id in (?)",
            &QUESTION,
            0,
        ));
        assert!(reason.contains("empty"), "{reason}");
    }

    #[test]
    fn test_backslash_escaped_quote_is_skipped() {
        let sql = r"select * from docs where title <> 'it\'s ?' and id in (?)";
        let expanded = expand_list(sql, &BACKSLASH, 2).unwrap();
        assert_eq!(
            expanded.sql,
            r"select * from docs where title <> 'it\'s ?' and id in (?, ?)"
        );
    }

    #[test]
    fn test_trailing_backslash_keeps_quote_open() {
        let reason = reason(expand_list(
            r"select * from docs where id in (?) and title = 'dir\'",
            &BACKSLASH,
            1,
        ));
        assert!(reason.contains("unterminated"), "{reason}");
    }

    #[test]
    fn test_backslash_is_literal_without_escapes() {
        let sql = r"select * from docs where path = 'C:\' and id in (?)";
        let expanded = expand_list(sql, &QUESTION, 2).unwrap();
        assert!(expanded.sql.ends_with("id in (?, ?)"));

        let reason = reason(expand_list(sql, &BACKSLASH, 2));
        assert!(reason.contains("unterminated"), "{reason}");
    }
}
