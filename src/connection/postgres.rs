// ABOUTME: PostgreSQL implementation of the connection trait via tokio-postgres
// ABOUTME: Uses the simple-query protocol so every value arrives as text

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use crate::connection::{DatabaseConnection, Engine, TextRows};
use crate::error::Result;
use crate::sql::quote_literal;

/// A PostgreSQL database connection.
///
/// Reads go through the simple-query protocol, which returns every column in
/// text format; that matches the text-valued row contract of
/// [`DatabaseConnection`] without per-type conversion.
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect without TLS using a connection string
    /// (e.g. `host=localhost user=postgres dbname=mydb`).
    ///
    /// The connection task is spawned onto the current tokio runtime; a
    /// failure there surfaces as an error on the next statement.
    pub async fn connect(params: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(params, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("postgres connection error: {}", e);
            }
        });
        Ok(Self { client })
    }

    /// Wrap an existing client (e.g. one connected over TLS).
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Access the underlying client for queries outside this trait.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn query_rows(&self, sql: &str) -> Result<TextRows> {
        let messages = self.client.simple_query(sql).await?;

        let mut out = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let values = (0..row.len())
                    .map(|index| row.get(index).map(str::to_string))
                    .collect();
                out.push(values);
            }
        }
        Ok(out)
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        // simple_query has no parameter binding, so the schema name is
        // escaped as a literal.
        let sql = match schema {
            Some(schema) => format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' AND table_schema = {} \
                 ORDER BY table_name",
                quote_literal(schema)
            ),
            None => "SELECT table_name FROM information_schema.tables \
                     WHERE table_type = 'BASE TABLE' \
                     AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                     ORDER BY table_name"
                .to_string(),
        };

        let rows = self.query_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }
}
