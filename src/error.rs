// ABOUTME: Error taxonomy for filter compilation and staging synchronization
// ABOUTME: Distinct kinds so callers can match on what went wrong

use thiserror::Error;

/// Errors produced by filter compilation, staging-table resolution, and the
/// underlying database drivers.
///
/// Filter and staging-shape errors are raised before any SQL is sent; driver
/// errors propagate unchanged, with no retry or suppression.
#[derive(Debug, Error)]
pub enum Error {
    /// A comparator-map filter used a key outside the allowed set.
    #[error(
        "'{comparator}' is not an allowed comparator for column '{column}'. \
         Allowed comparators are: >, >=, <, <=, =, !=, <>"
    )]
    InvalidComparator { comparator: String, column: String },

    /// A column set that must be non-empty was empty.
    #[error("{role} columns must not be empty for table '{table}'")]
    EmptyColumnSet { role: &'static str, table: String },

    /// The expected staging table does not exist.
    #[error(
        "staging table for '{table}' does not exist. \
         The expected staging table name is '{expected}'"
    )]
    MissingStagingTable { table: String, expected: String },

    /// More than one catalog object matched the expected staging table name.
    #[error(
        "{count} staging tables found for '{table}'. \
         The expected staging table name is '{expected}'"
    )]
    MultipleStagingTables {
        table: String,
        expected: String,
        count: usize,
    },

    /// A schema name is required for this engine but was not provided.
    #[error("a schema name is required for non-SQLite engines (table '{table}')")]
    MissingSchema { table: String },

    /// A count query returned something that was not a count.
    #[error("query did not return a count: {query}")]
    NotACount { query: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
