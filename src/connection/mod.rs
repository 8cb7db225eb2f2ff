// ABOUTME: Database connection trait consumed by the synchronizer and query layer
// ABOUTME: SQLite and PostgreSQL implementations, all row values surfaced as text

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::query::{self, SelectSpec};

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;

/// Which database engine a connection talks to.
///
/// Schema rules differ: SQLite has no schemas, PostgreSQL requires one for
/// staging-table resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sqlite,
    Postgres,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Sqlite => write!(f, "sqlite"),
            Engine::Postgres => write!(f, "postgres"),
        }
    }
}

/// A rectangular query result: one `Vec` per row, one entry per column,
/// `None` for SQL NULL. All values surface as their text rendering.
pub type TextRows = Vec<Vec<Option<String>>>;

/// The connection contract the synchronizer operates through.
///
/// Statement execution and reads are synchronous from the caller's point of
/// view: each statement is awaited before the next is constructed. The trait
/// performs no transaction demarcation; multi-statement atomicity, if
/// required, is the caller's responsibility.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    fn engine(&self) -> Engine;

    /// Run one or more DDL/DML statements.
    async fn execute_statement(&self, sql: &str) -> Result<()>;

    /// Run a read query, surfacing every value as text.
    async fn query_rows(&self, sql: &str) -> Result<TextRows>;

    /// List base table names, optionally restricted to a schema.
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>>;

    /// Run a query whose first column of the first row is a count.
    async fn query_count(&self, sql: &str) -> Result<i64> {
        let rows = self.query_rows(sql).await?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(|value| value.as_deref())
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or_else(|| Error::NotACount {
                query: sql.to_string(),
            })
    }

    /// Run a structured read query built from a [`SelectSpec`].
    async fn select(&self, spec: &SelectSpec) -> Result<TextRows> {
        let sql = query::build_select(spec)?;
        tracing::debug!(%sql, "running structured select");
        self.query_rows(&sql).await
    }
}
