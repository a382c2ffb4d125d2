//! Database pools.
//!
//! One concrete sqlx pool type per compiled-in dialect, selected by the
//! configured driver name at startup.

use sqlx::pool::PoolOptions;
use sqlx::{Database, Pool};
use tracing::info;

use super::Dialect;
use crate::config::DbConfig;
use crate::error::{AdapterError, Result};

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("enable at least one of the `sqlite`, `postgres` or `mysql` features");

/// Connection pool for the configured dialect.
#[derive(Debug, Clone)]
pub enum DbPool {
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgPool),
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlPool),
}

impl DbPool {
    /// Open a pool for `dialect`, bounded by the configured connect timeout.
    pub async fn connect(dialect: &Dialect, db: &DbConfig) -> Result<Self> {
        let timeout = db.connect_timeout();
        let connecting = async {
            match dialect.name {
                #[cfg(feature = "sqlite")]
                "sqlite" => open(db).await.map(DbPool::Sqlite),
                #[cfg(feature = "postgres")]
                "postgres" => open(db).await.map(DbPool::Postgres),
                #[cfg(feature = "mysql")]
                "mysql" => open(db).await.map(DbPool::MySql),
                other => Err(sqlx::Error::Configuration(
                    format!("no connection pool for driver \"{other}\"").into(),
                )),
            }
        };

        let pool = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| AdapterError::ConnectTimeout {
                driver: dialect.name.to_string(),
                timeout,
            })?
            .map_err(|source| AdapterError::Connection {
                driver: dialect.name.to_string(),
                source,
            })?;

        info!(driver = dialect.name, "Connected to database");
        Ok(pool)
    }

    pub async fn close(&self) {
        match self {
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => pool.close().await,
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => pool.close().await,
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => pool.is_closed(),
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => pool.is_closed(),
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => pool.is_closed(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::SqlitePool> for DbPool {
    fn from(pool: sqlx::SqlitePool) -> Self {
        DbPool::Sqlite(pool)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::PgPool> for DbPool {
    fn from(pool: sqlx::PgPool) -> Self {
        DbPool::Postgres(pool)
    }
}

#[cfg(feature = "mysql")]
impl From<sqlx::MySqlPool> for DbPool {
    fn from(pool: sqlx::MySqlPool) -> Self {
        DbPool::MySql(pool)
    }
}

async fn open<DB: Database>(db: &DbConfig) -> std::result::Result<Pool<DB>, sqlx::Error> {
    let mut options = PoolOptions::<DB>::new().acquire_timeout(db.connect_timeout());
    if let Some(max) = db.max_connections {
        options = options.max_connections(max);
    }
    options.connect(&db.connection).await
}
