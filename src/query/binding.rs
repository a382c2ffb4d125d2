//! Bind order of the change-feed query parameters.
//!
//! The index template receives three values: the document cursor, the
//! update time in nanoseconds and the row limit. Dialects that bind
//! positionally may need them in another order, declared in a comment line:
//!
//! ```sql
//! -- @[documentLimit, afterDocument, fromTimeNanos]
//! select id, updatedNanos from docs where ...
//! ```
//!
//! Without such a line the natural order is used.

use std::fmt;
use std::str::FromStr;

use crate::error::{AdapterError, Result};

const ANNOTATION_OPEN: &str = "@[";
const ANNOTATION_CLOSE: char = ']';

/// Semantic change-feed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexParam {
    AfterDocument,
    FromTimeNanos,
    DocumentLimit,
}

impl IndexParam {
    pub const ALL: [IndexParam; 3] = [
        IndexParam::AfterDocument,
        IndexParam::FromTimeNanos,
        IndexParam::DocumentLimit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexParam::AfterDocument => "afterDocument",
            IndexParam::FromTimeNanos => "fromTimeNanos",
            IndexParam::DocumentLimit => "documentLimit",
        }
    }

    /// Position in the natural order.
    fn index(self) -> usize {
        match self {
            IndexParam::AfterDocument => 0,
            IndexParam::FromTimeNanos => 1,
            IndexParam::DocumentLimit => 2,
        }
    }
}

impl fmt::Display for IndexParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexParam {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        IndexParam::ALL
            .into_iter()
            .find(|param| param.as_str() == s)
            .ok_or_else(|| format!("unknown parameter {s:?}"))
    }
}

/// Order in which the three change-feed values are bound.
///
/// Always a permutation of [`IndexParam::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingOrder([IndexParam; 3]);

impl Default for BindingOrder {
    fn default() -> Self {
        Self(IndexParam::ALL)
    }
}

impl BindingOrder {
    /// Build an order, rejecting anything but a permutation.
    pub fn new(params: [IndexParam; 3]) -> std::result::Result<Self, String> {
        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                return Err(format!("parameter {param} given more than once"));
            }
        }
        Ok(Self(params))
    }

    pub fn params(&self) -> [IndexParam; 3] {
        self.0
    }

    /// Rearrange values given in natural order into bind order.
    pub fn arrange<T: Clone>(&self, natural: [T; 3]) -> [T; 3] {
        self.0.map(|param| natural[param.index()].clone())
    }
}

impl fmt::Display for BindingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// A value bound to a query placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    Integer(i64),
}

/// Annotation carried by one template line, if any.
///
/// `None` when the line is not a comment or has no `@[`.
fn line_annotation(
    line: &str,
    comment_marker: &str,
) -> Option<std::result::Result<BindingOrder, String>> {
    let comment = line.trim().strip_prefix(comment_marker)?;
    let start = comment.find(ANNOTATION_OPEN)?;
    Some(parse_annotation(&comment[start + ANNOTATION_OPEN.len()..]))
}

/// Whether comment stripping must keep `line`: it holds a well-formed
/// annotation. Comments with a malformed `@[` are dropped.
pub(crate) fn keeps_annotation(line: &str, comment_marker: &str) -> bool {
    matches!(line_annotation(line, comment_marker), Some(Ok(_)))
}

/// Find the binding annotation in an index template.
///
/// Only comment lines are considered and the first one containing `@[`
/// decides. No annotation yields the natural order.
pub fn resolve_binding_order(sql: &str, comment_marker: &str) -> Result<BindingOrder> {
    for line in sql.lines() {
        if let Some(parsed) = line_annotation(line, comment_marker) {
            return parsed.map_err(|reason| AdapterError::BindingSyntax {
                line: line.trim().to_string(),
                reason,
            });
        }
    }

    Ok(BindingOrder::default())
}

/// Parse the text following `@[`.
fn parse_annotation(rest: &str) -> std::result::Result<BindingOrder, String> {
    let Some(end) = rest.find(ANNOTATION_CLOSE) else {
        return Err("missing closing bracket".to_string());
    };

    let tokens: Vec<&str> = rest[..end].split(',').map(str::trim).collect();
    if tokens.len() != 3 {
        return Err(format!(
            "expected 3 bind parameters, found {}",
            tokens.len()
        ));
    }

    let mut params = IndexParam::ALL;
    for (slot, token) in params.iter_mut().zip(&tokens) {
        *slot = token.parse()?;
    }

    BindingOrder::new(params)
}
