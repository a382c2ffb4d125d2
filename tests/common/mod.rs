//! Shared utilities for integration tests.
//!
//! Provides a file-backed SQLite database with a `docs` table and a
//! configuration pointing at freshly written query templates.

#![allow(dead_code)]

use std::path::Path;

use sqlx::SqlitePool;
use tempfile::TempDir;

use letarette_sql::Config;

/// Change-feed template in natural binding order.
pub const INDEX_SQL: &str = "\
-- Change feed for the docs space.
select id, updatedNanos from docs
where id > ? and updatedNanos >= ?
order by id
limit ?
";

/// Document fetch template.
pub const DOCUMENT_SQL: &str = "\
-- Documents by id: title, body and tombstone flag.
select id, updatedNanos, title, txt, alive from docs
where id in (?)
";

/// Database, templates and configuration living in one temp directory.
pub struct Deployment {
    pub dir: TempDir,
    pub config: Config,
}

impl Deployment {
    pub fn new(index_sql: &str, document_sql: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index_path = dir.path().join("indexrequest.sql");
        let document_path = dir.path().join("documentrequest.sql");
        std::fs::write(&index_path, index_sql).expect("Failed to write index template");
        std::fs::write(&document_path, document_sql).expect("Failed to write document template");

        let mut config = Config::default();
        config.db.driver = "sqlite".to_string();
        config.db.connection = sqlite_url(&dir.path().join("docs.db"));
        config.db.connect_timeout_secs = 5;
        config.sql.index_sql_file = index_path;
        config.sql.document_sql_file = document_path;

        Self { dir, config }
    }

    pub fn standard() -> Self {
        Self::new(INDEX_SQL, DOCUMENT_SQL)
    }

    /// Open a separate pool on the deployment database.
    pub async fn pool(&self) -> SqlitePool {
        SqlitePool::connect(&self.config.db.connection)
            .await
            .expect("Failed to open test database")
    }

    /// Create the `docs` table and insert `(id, updatedNanos, alive)` rows.
    pub async fn seed(&self, docs: &[(&str, i64, bool)]) -> SqlitePool {
        let pool = self.pool().await;
        sqlx::query(
            "create table if not exists docs (
                id text primary key,
                updatedNanos integer not null,
                title text not null,
                txt text not null,
                alive boolean not null
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create docs table");

        for (id, updated, alive) in docs {
            sqlx::query("insert into docs values (?, ?, ?, ?, ?)")
                .bind(id.to_string())
                .bind(*updated)
                .bind(format!("Title of {id}"))
                .bind(format!("Body of {id}"))
                .bind(*alive)
                .execute(&pool)
                .await
                .expect("Failed to insert doc");
        }
        pool
    }
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}
