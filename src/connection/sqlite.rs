// ABOUTME: SQLite implementation of the connection trait via rusqlite
// ABOUTME: Synchronous driver behind the async seam, values read as text

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::connection::{DatabaseConnection, Engine, TextRows};
use crate::error::Result;

/// A SQLite database connection.
///
/// Opening a path that does not exist creates the database file. The
/// underlying rusqlite connection is synchronous; calls complete before the
/// future resolves, so statement ordering is preserved.
pub struct SqliteConnection {
    conn: Mutex<Connection>,
}

impl SqliteConnection {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite connection mutex poisoned")
    }
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn execute_statement(&self, sql: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(sql)?;
        Ok(())
    }

    async fn query_rows(&self, sql: &str) -> Result<TextRows> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(value_to_text(row.get_ref(index)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        if let Some(schema) = schema {
            tracing::warn!(
                "schema '{}' was passed in but is ignored for the sqlite engine",
                schema
            );
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_query_round_trip() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_statement(
            "CREATE TABLE t (id INTEGER, name TEXT); \
             INSERT INTO t VALUES (1, 'a'), (2, NULL);",
        )
        .await
        .unwrap();

        let rows = conn.query_rows("SELECT id, name FROM t ORDER BY id").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Some("1".to_string()), Some("a".to_string())]);
        assert_eq!(rows[1], vec![Some("2".to_string()), None]);
    }

    #[tokio::test]
    async fn test_query_count() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_statement("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1), (2);")
            .await
            .unwrap();
        let count = conn.query_count("SELECT COUNT(*) FROM t").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_list_tables_excludes_internal() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_statement(
            "CREATE TABLE b (id INTEGER); \
             CREATE TABLE a (id INTEGER); \
             CREATE VIEW v AS SELECT * FROM b;",
        )
        .await
        .unwrap();

        let tables = conn.list_tables(None).await.unwrap();
        assert!(tables.contains(&"a".to_string()));
        assert!(tables.contains(&"b".to_string()));
        assert!(!tables.contains(&"v".to_string()));
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        assert!(!path.exists());
        let conn = SqliteConnection::open(&path).unwrap();
        conn.execute_statement("CREATE TABLE t (id INTEGER);")
            .await
            .unwrap();
        assert!(path.exists());
    }
}
