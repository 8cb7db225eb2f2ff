// ABOUTME: Staging-table reconciliation and filter-to-SQL compilation
// ABOUTME: Library crate - no CLI surface, callers own the connection and transactions

//! Reconcile pre-populated staging tables into their target tables, and
//! compile structured filter values into SQL predicates.
//!
//! Two independent pieces:
//!
//! - [`filter`] / [`query`]: translate typed filter values bound to column
//!   names into WHERE-clause fragments and full SELECT statements.
//! - [`staging`]: classify staging rows as `new`, `update`, or `old`
//!   relative to a target table, then merge new and changed rows in, all as
//!   bulk SQL pushed through a [`connection::DatabaseConnection`].
//!
//! ```no_run
//! use staging_sync::{SqliteConnection, StagingSynchronizer, TableRef};
//!
//! # async fn example() -> staging_sync::Result<()> {
//! let conn = SqliteConnection::open("data.db")?;
//! let sync = StagingSynchronizer::new(
//!     &conn,
//!     TableRef::new("orders"),
//!     vec!["id".to_string()],
//!     vec!["amount".to_string()],
//! )
//! .await?
//! .with_audit_columns(vec![]);
//!
//! sync.synchronize().await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod connection;
pub mod error;
pub mod filter;
pub mod query;
pub mod sql;
pub mod staging;

pub use connection::{DatabaseConnection, Engine, PostgresConnection, SqliteConnection};
pub use error::{Error, Result};
pub use filter::{Comparator, FilterValue, Scalar};
pub use query::{build_select, SelectSpec};
pub use staging::{
    derive_staging_table_name, resolve_staging_table, RowStatus, StagingSynchronizer, TableRef,
};
