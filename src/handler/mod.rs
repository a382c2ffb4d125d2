//! SQL-backed document handler.
//!
//! Turns change-feed and document fetch requests into executions of the
//! two query templates and maps the rows back into protocol records.
//! Holds no mutable state besides the lifecycle flag, so it can be shared
//! freely between dispatch workers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::driver::{DbPool, Dialect};
use crate::error::{AdapterError, Result};
use crate::manager::{DocumentHandler, ErrorHandler, RequestScope};
use crate::protocol::{
    ChangeFeedRequest, ChangeFeedResult, DocumentFetchRequest, DocumentFetchResult,
};
use crate::query::{expand_list, BindValue, Templates};

pub mod rows;

/// Run `sql` on a concrete pool with `values` bound in order and decode
/// every row with `decode`.
macro_rules! fetch_rows {
    ($db:ty, $pool:expr, $sql:expr, $values:expr, $decode:path) => {{
        let mut query = sqlx::query::<$db>($sql);
        for value in $values {
            query = match value {
                BindValue::Text(text) => query.bind(text),
                BindValue::Integer(number) => query.bind(number),
            };
        }

        let mut stream = query.fetch($pool);
        let mut decoded = Vec::new();
        while let Some(row) = stream
            .try_next()
            .await
            .map_err(AdapterError::QueryExecution)?
        {
            decoded.push($decode(&row)?);
        }
        decoded
    }};
}

/// Dispatch [`fetch_rows!`] on the pool's dialect.
macro_rules! fetch_from {
    ($pool:expr, $sql:expr, $values:expr, $decode:path) => {
        match $pool {
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => fetch_rows!(sqlx::Sqlite, pool, $sql, $values, $decode),
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => fetch_rows!(sqlx::Postgres, pool, $sql, $values, $decode),
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => fetch_rows!(sqlx::MySql, pool, $sql, $values, $decode),
        }
    };
}

/// Adapter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterState {
    Initializing = 0,
    Serving = 1,
    Closing = 2,
    Closed = 3,
}

impl AdapterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AdapterState::Initializing,
            1 => AdapterState::Serving,
            2 => AdapterState::Closing,
            _ => AdapterState::Closed,
        }
    }
}

/// Answers document manager requests from a SQL database.
pub struct SqlHandler {
    space: String,
    dialect: Dialect,
    pool: DbPool,
    templates: Templates,
    error_handler: ErrorHandler,
    state: AtomicU8,
}

impl SqlHandler {
    pub fn new(
        space: impl Into<String>,
        dialect: Dialect,
        pool: impl Into<DbPool>,
        templates: Templates,
        error_handler: ErrorHandler,
    ) -> Self {
        Self {
            space: space.into(),
            dialect,
            pool: pool.into(),
            templates,
            error_handler,
            state: AtomicU8::new(AdapterState::Initializing as u8),
        }
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: AdapterState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `Serving` to `Closing`. False if already closing.
    pub(crate) fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                AdapterState::Serving as u8,
                AdapterState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Database handle shared by all requests.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn ensure_serving(&self) -> Result<()> {
        match self.state() {
            AdapterState::Serving => Ok(()),
            _ => Err(AdapterError::Closed),
        }
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(space = %self.space, error = %err, "Request failed");
            (self.error_handler)(err);
        }
        result
    }

    async fn change_feed(
        &self,
        scope: &RequestScope,
        request: ChangeFeedRequest,
    ) -> Result<ChangeFeedResult> {
        self.ensure_serving()?;
        if request.space != self.space {
            debug!(requested = %request.space, "Ignoring change feed for foreign space");
            return Ok(ChangeFeedResult::empty(&self.space));
        }

        let bound = self.templates.binding.arrange([
            BindValue::Text(request.after_document),
            BindValue::Integer(rows::to_nanos(&request.from_time)?),
            BindValue::Integer(i64::from(request.limit)),
        ]);

        let sql = self.templates.index.sql();
        let updates = scope
            .run(async {
                Ok(fetch_from!(
                    &self.pool,
                    sql,
                    bound,
                    rows::document_reference
                ))
            })
            .await?;

        debug!(count = updates.len(), "Returning updates to indexer");
        Ok(ChangeFeedResult {
            space: self.space.clone(),
            updates,
        })
    }

    async fn document_fetch(
        &self,
        scope: &RequestScope,
        request: DocumentFetchRequest,
    ) -> Result<DocumentFetchResult> {
        self.ensure_serving()?;
        if request.space != self.space {
            debug!(requested = %request.space, "Ignoring document request for foreign space");
            return Ok(DocumentFetchResult::empty(&self.space));
        }

        let wanted = unique(request.wanted);
        if wanted.is_empty() {
            return Ok(DocumentFetchResult::empty(&self.space));
        }

        let expanded = expand_list(self.templates.document.sql(), &self.dialect, wanted.len())?;

        let values: Vec<BindValue> = (0..expanded.repeat)
            .flat_map(|_| wanted.iter().cloned().map(BindValue::Text))
            .collect();

        let fetched = scope
            .run(async {
                Ok(fetch_from!(
                    &self.pool,
                    expanded.sql.as_str(),
                    values,
                    rows::document
                ))
            })
            .await?;

        let mut seen = HashSet::new();
        let documents: Vec<_> = fetched
            .into_iter()
            .filter(|document| seen.insert(document.id.clone()))
            .collect();

        debug!(
            wanted = wanted.len(),
            count = documents.len(),
            "Sending documents to indexer"
        );
        Ok(DocumentFetchResult {
            space: self.space.clone(),
            documents,
        })
    }
}

/// Drop repeated ids, keeping first occurrences in order.
fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[async_trait]
impl DocumentHandler for SqlHandler {
    #[tracing::instrument(name = "handler.change_feed", skip_all, fields(space = %request.space))]
    async fn handle_change_feed(
        &self,
        scope: &RequestScope,
        request: ChangeFeedRequest,
    ) -> Result<ChangeFeedResult> {
        let result = self.change_feed(scope, request).await;
        self.report(result)
    }

    #[tracing::instrument(name = "handler.document_fetch", skip_all, fields(space = %request.space))]
    async fn handle_document_fetch(
        &self,
        scope: &RequestScope,
        request: DocumentFetchRequest,
    ) -> Result<DocumentFetchResult> {
        let result = self.document_fetch(scope, request).await;
        self.report(result)
    }
}
