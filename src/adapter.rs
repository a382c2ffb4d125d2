//! Adapter lifecycle.
//!
//! `Adapter::new` performs the whole initialization: configuration check,
//! template loading, binding resolution, database connection and handler
//! registration. Any failure aborts construction. The returned adapter is
//! serving until [`Adapter::close`] is called.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::driver::{DbPool, DriverRegistry};
use crate::error::Result;
use crate::handler::{AdapterState, SqlHandler};
use crate::manager::{DocumentManager, ErrorHandler};
use crate::query::Templates;

/// Bridge between a document manager and a SQL database.
pub struct Adapter {
    handler: Arc<SqlHandler>,
    manager: Arc<dyn DocumentManager>,
}

impl Adapter {
    /// Build an adapter and register its handlers with `manager`.
    pub async fn new(
        config: &Config,
        registry: &DriverRegistry,
        manager: Arc<dyn DocumentManager>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let dialect = *config.validate(registry)?;
        let templates = Templates::load(&config.sql, &dialect)?;
        let pool = DbPool::connect(&dialect, &config.db).await?;

        let handler = Arc::new(SqlHandler::new(
            config.index.space.clone(),
            dialect,
            pool,
            templates,
            error_handler,
        ));

        manager.register(handler.clone()).await?;
        handler.set_state(AdapterState::Serving);
        info!(space = %config.index.space, driver = dialect.name, "Adapter serving");

        Ok(Self { handler, manager })
    }

    pub fn handler(&self) -> &Arc<SqlHandler> {
        &self.handler
    }

    pub fn state(&self) -> AdapterState {
        self.handler.state()
    }

    /// Stop accepting requests, leave the document manager and close the
    /// database pool.
    pub async fn close(&self) {
        if !self.handler.begin_close() {
            return;
        }
        self.manager.close().await;
        self.handler.pool().close().await;
        self.handler.set_state(AdapterState::Closed);
        info!(space = %self.handler.space(), "Adapter closed");
    }
}
