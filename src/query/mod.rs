//! Query templates.
//!
//! Two SQL files are read once at startup: the change-feed (index) query and
//! the document fetch query. They are never reloaded; restart the adapter to
//! pick up edits.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::SqlConfig;
use crate::driver::Dialect;
use crate::error::{AdapterError, Result};

pub mod binding;
pub mod expand;

pub use binding::{resolve_binding_order, BindValue, BindingOrder, IndexParam};
pub use expand::{expand_list, ExpandedQuery, WANTED_MARKER};

/// Raw text of one SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    path: PathBuf,
    sql: String,
}

impl QueryTemplate {
    /// Template from in-memory text.
    pub fn new(path: impl Into<PathBuf>, sql: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sql: sql.into(),
        }
    }

    /// Read a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sql = std::fs::read_to_string(path).map_err(|source| AdapterError::QueryLoad {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = sql.len(), "Loaded query template");
        Ok(Self::new(path, sql))
    }

    /// Copy of this template without comment lines.
    pub fn without_comments(&self, marker: &str) -> Self {
        Self {
            path: self.path.clone(),
            sql: strip_comments(&self.sql, marker),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Remove lines whose trimmed content starts with `marker`.
///
/// Lines carrying a well-formed binding annotation are kept, so a template
/// that resolves without stripping resolves to the same order with it.
pub fn strip_comments(sql: &str, marker: &str) -> String {
    sql.lines()
        .filter(|line| {
            !line.trim().starts_with(marker) || binding::keeps_annotation(line, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Both templates and the resolved change-feed binding order.
#[derive(Debug, Clone)]
pub struct Templates {
    pub index: QueryTemplate,
    pub document: QueryTemplate,
    pub binding: BindingOrder,
}

impl Templates {
    /// Load and prepare both templates for `dialect`.
    pub fn load(config: &SqlConfig, dialect: &Dialect) -> Result<Self> {
        let index = QueryTemplate::load(&config.index_sql_file)?;
        let document = QueryTemplate::load(&config.document_sql_file)?;
        Self::prepare(index, document, config.strip_comments, dialect)
    }

    /// Apply comment stripping and resolve the binding order.
    pub fn prepare(
        index: QueryTemplate,
        document: QueryTemplate,
        strip_comments: bool,
        dialect: &Dialect,
    ) -> Result<Self> {
        let (index, document) = if strip_comments {
            (
                index.without_comments(dialect.line_comment),
                document.without_comments(dialect.line_comment),
            )
        } else {
            (index, document)
        };

        let binding = resolve_binding_order(index.sql(), dialect.line_comment)?;
        info!(
            index = %index.path().display(),
            document = %document.path().display(),
            binding = %binding,
            "Query templates ready"
        );

        Ok(Self {
            index,
            document,
            binding,
        })
    }
}
