// ABOUTME: Staging-table synchronizer - classify staged rows as new/update/old
// ABOUTME: then merge new and changed rows into the target, all as bulk SQL

use crate::audit;
use crate::connection::{DatabaseConnection, Engine};
use crate::error::{Error, Result};
use crate::filter::Scalar;
use crate::sql::quote_ident;

/// Every table that takes staged loads has a companion staging table named
/// after it with this suffix.
pub const STAGING_TABLE_SUFFIX: &str = "_staging";

/// The staging-table column that carries the classification result.
pub const STATUS_COLUMN: &str = "status";

/// Classification outcome for a staged row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    New,
    Update,
    Old,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::New => "new",
            RowStatus::Update => "update",
            RowStatus::Old => "old",
        }
    }
}

/// Derive the staging table name from a target table name.
///
/// Bracket characters are stripped (the only sanitization performed), then
/// the fixed suffix is appended.
pub fn derive_staging_table_name(table_name: &str) -> String {
    let sanitized: String = table_name
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect();
    format!("{sanitized}{STAGING_TABLE_SUFFIX}")
}

/// A table identified by name and optional schema.
///
/// SQLite tables never carry a schema; PostgreSQL tables must.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// The quoted, optionally schema-qualified name for use in SQL text.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }

    /// The staging companion of this table: derived name, inherited schema.
    pub fn staging(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: derive_staging_table_name(&self.name),
        }
    }
}

/// Resolve and verify the staging table for a target table against the live
/// catalog.
///
/// PostgreSQL requires a schema; a schema passed alongside a SQLite
/// connection is ignored with a warning. Fails with
/// [`Error::MissingStagingTable`] when no catalog object matches and
/// [`Error::MultipleStagingTables`] when more than one does.
pub async fn resolve_staging_table(
    conn: &dyn DatabaseConnection,
    table: &TableRef,
) -> Result<TableRef> {
    let mut staging = table.staging();

    match conn.engine() {
        Engine::Postgres => {
            if staging.schema.is_none() {
                return Err(Error::MissingSchema {
                    table: table.name.clone(),
                });
            }
        }
        Engine::Sqlite => {
            if let Some(schema) = staging.schema.take() {
                tracing::warn!(
                    "schema '{}' was passed in but is ignored for the sqlite engine",
                    schema
                );
            }
        }
    }

    let tables = conn.list_tables(staging.schema.as_deref()).await?;
    let count = tables.iter().filter(|name| **name == staging.name).count();

    match count {
        1 => Ok(staging),
        0 => Err(Error::MissingStagingTable {
            table: table.name.clone(),
            expected: staging.name,
        }),
        count => Err(Error::MultipleStagingTables {
            table: table.name.clone(),
            expected: staging.name,
            count,
        }),
    }
}

/// Reconciles a staging table into its target table.
///
/// Classification and merge run as bulk SQL statements in strict order; no
/// row data is held in memory. The synchronizer issues no BEGIN/COMMIT of
/// its own: callers wanting multi-statement atomicity wrap the calls in a
/// transaction on the underlying connection. Re-running the full sequence
/// against an unchanged staging table is a no-op (every row reclassifies as
/// old), which is also the recovery path after a mid-sequence failure.
///
/// Concurrent writers racing on the same staging/target pair are unsafe:
/// classification reads tables the merge steps mutate.
pub struct StagingSynchronizer<'a> {
    conn: &'a dyn DatabaseConnection,
    target: TableRef,
    staging: TableRef,
    matching_columns: Vec<String>,
    nonmatching_columns: Vec<String>,
    audit_columns: Vec<String>,
}

// Manual impl: the connection trait object has no Debug bound.
impl std::fmt::Debug for StagingSynchronizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingSynchronizer")
            .field("engine", &self.conn.engine())
            .field("target", &self.target)
            .field("staging", &self.staging)
            .field("matching_columns", &self.matching_columns)
            .field("nonmatching_columns", &self.nonmatching_columns)
            .field("audit_columns", &self.audit_columns)
            .finish_non_exhaustive()
    }
}

impl<'a> StagingSynchronizer<'a> {
    /// Build a synchronizer for a target table, verifying its staging
    /// companion exists.
    ///
    /// `matching_columns` form the identity key between staging and target
    /// and must be non-empty. `nonmatching_columns` are compared for drift.
    /// Audit columns default to [`audit::default_audit_columns`]; pass an
    /// empty list via [`with_audit_columns`](Self::with_audit_columns) for
    /// tables without them.
    pub async fn new(
        conn: &'a dyn DatabaseConnection,
        target: TableRef,
        matching_columns: Vec<String>,
        nonmatching_columns: Vec<String>,
    ) -> Result<StagingSynchronizer<'a>> {
        if matching_columns.is_empty() {
            return Err(Error::EmptyColumnSet {
                role: "matching",
                table: target.name.clone(),
            });
        }

        let staging = resolve_staging_table(conn, &target).await?;
        let target = TableRef {
            // resolve_staging_table already validated the schema rules;
            // keep target and staging consistent for sqlite.
            schema: staging.schema.clone(),
            name: target.name,
        };

        Ok(Self {
            conn,
            target,
            staging,
            matching_columns,
            nonmatching_columns,
            audit_columns: audit::default_audit_columns(),
        })
    }

    /// Replace the default audit column list.
    pub fn with_audit_columns(mut self, audit_columns: Vec<String>) -> Self {
        self.audit_columns = audit_columns;
        self
    }

    pub fn staging_table(&self) -> &TableRef {
        &self.staging
    }

    pub fn target_table(&self) -> &TableRef {
        &self.target
    }

    fn key_join(&self, left: &str, right: &str) -> String {
        self.matching_columns
            .iter()
            .map(|c| format!("{left}.{q} = {right}.{q}", q = quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    /// NULL-safe inequality over the nonmatching columns, joined with OR: a
    /// row is drifted when any compared column differs.
    fn drift_predicate(&self) -> String {
        let operator = match self.conn.engine() {
            Engine::Sqlite => "is not",
            Engine::Postgres => "is distinct from",
        };
        self.nonmatching_columns
            .iter()
            .map(|c| format!("stg.{q} {operator} src.{q}", q = quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Classify every staging row as new, update, or old.
    ///
    /// Bulk statements, each awaited before the next is built:
    /// 1. clear any status left over from an earlier pass;
    /// 2. rows whose key is absent from the target become `new`;
    /// 3. rows whose key is present but whose nonmatching columns drifted
    ///    become `update`;
    /// 4. everything else becomes `old`.
    ///
    /// Status is recomputed from scratch on every pass: labels left over
    /// from an earlier run are cleared first, so a second pass against an
    /// unchanged staging table reclassifies every row as `old`.
    pub async fn classify(&self) -> Result<()> {
        let stg = self.staging.qualified();
        let tgt = self.target.qualified();

        let reset = format!(
            "update {stg} set {status} = null",
            status = STATUS_COLUMN,
        );
        tracing::debug!(sql = %reset, "classify: reset status");
        self.conn.execute_statement(&reset).await?;

        let keys = self
            .matching_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mark_new = format!(
            "update {stg} as stg set {status} = '{new}' \
             from (select {keys} from {stg} except select {keys} from {tgt}) as dlt \
             where {key_join}",
            status = STATUS_COLUMN,
            new = RowStatus::New.as_str(),
            key_join = self.key_join("stg", "dlt"),
        );
        tracing::debug!(sql = %mark_new, "classify: mark new");
        self.conn.execute_statement(&mark_new).await?;
        tracing::info!("Marked new records in {}", self.staging.name);

        if self.nonmatching_columns.is_empty() {
            tracing::debug!("no nonmatching columns; skipping drift detection");
        } else {
            let mark_update = format!(
                "update {stg} as stg set {status} = '{update}' \
                 from {tgt} as src \
                 where (stg.{status} is null or stg.{status} <> '{new}') \
                 and {key_join} \
                 and ({drift})",
                status = STATUS_COLUMN,
                update = RowStatus::Update.as_str(),
                new = RowStatus::New.as_str(),
                key_join = self.key_join("stg", "src"),
                drift = self.drift_predicate(),
            );
            tracing::debug!(sql = %mark_update, "classify: mark update");
            self.conn.execute_statement(&mark_update).await?;
            tracing::info!("Marked updated records in {}", self.staging.name);
        }

        let mark_old = format!(
            "update {stg} set {status} = '{old}' \
             where {status} is null or {status} not in ('{new}', '{update}')",
            status = STATUS_COLUMN,
            old = RowStatus::Old.as_str(),
            new = RowStatus::New.as_str(),
            update = RowStatus::Update.as_str(),
        );
        tracing::debug!(sql = %mark_old, "classify: mark old");
        self.conn.execute_statement(&mark_old).await?;
        tracing::info!("Marked leftover records old in {}", self.staging.name);

        Ok(())
    }

    /// Apply classified rows to the target table: insert `new` rows, then
    /// update the target from `update` rows.
    pub async fn merge(&self) -> Result<()> {
        let stg = self.staging.qualified();
        let tgt = self.target.qualified();

        let all_columns: Vec<String> = self
            .matching_columns
            .iter()
            .chain(&self.nonmatching_columns)
            .chain(&self.audit_columns)
            .map(|c| quote_ident(c))
            .collect();
        let column_list = all_columns.join(", ");

        let insert = format!(
            "insert into {tgt} ({column_list}) \
             select {column_list} from {stg} where {status} = '{new}'",
            status = STATUS_COLUMN,
            new = RowStatus::New.as_str(),
        );
        tracing::debug!(sql = %insert, "merge: insert new");
        self.conn.execute_statement(&insert).await?;
        tracing::info!("Inserted new records into {}", self.target.name);

        // Only nonmatching and audit columns are written back; the matching
        // columns already align by definition of the join.
        let assignments: Vec<String> = self
            .nonmatching_columns
            .iter()
            .chain(&self.audit_columns)
            .map(|c| format!("{q} = stg.{q}", q = quote_ident(c)))
            .collect();

        if assignments.is_empty() {
            tracing::debug!("no updatable columns; skipping update step");
            return Ok(());
        }

        let update = format!(
            "update {tgt} as tgt set {assignments} \
             from {stg} as stg \
             where stg.{status} = '{pending}' and {key_join}",
            assignments = assignments.join(", "),
            status = STATUS_COLUMN,
            pending = RowStatus::Update.as_str(),
            key_join = self.key_join("tgt", "stg"),
        );
        tracing::debug!(sql = %update, "merge: apply updates");
        self.conn.execute_statement(&update).await?;
        tracing::info!("Updated changed records in {}", self.target.name);

        Ok(())
    }

    /// Run the full pass: classify, then merge.
    pub async fn synchronize(&self) -> Result<()> {
        self.classify().await?;
        self.merge().await
    }

    /// Whether any staging row is classified `new` or `update`. Callers use
    /// this to short-circuit downstream work.
    pub async fn has_pending_changes(&self) -> Result<bool> {
        let query = format!(
            "select count(*) from {stg} where {status} in ('{new}', '{update}')",
            stg = self.staging.qualified(),
            status = STATUS_COLUMN,
            new = RowStatus::New.as_str(),
            update = RowStatus::Update.as_str(),
        );
        Ok(self.conn.query_count(&query).await? > 0)
    }

    /// Flush the staging table and load a fresh batch of candidate rows.
    ///
    /// `columns` must name a column for every value in each row; the status
    /// column is left NULL for the next classification pass. Rows are
    /// rendered as SQL literals (text quoted and escaped, numbers bare,
    /// `None` as NULL).
    pub async fn replace_rows(
        &self,
        columns: &[String],
        rows: &[Vec<Option<Scalar>>],
    ) -> Result<()> {
        let stg = self.staging.qualified();

        self.conn
            .execute_statement(&format!("delete from {stg}"))
            .await?;
        tracing::info!("Flushed staging table {}", self.staging.name);

        if rows.is_empty() {
            return Ok(());
        }

        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let values = rows
            .iter()
            .map(|row| {
                let rendered = row
                    .iter()
                    .map(|value| match value {
                        Some(scalar) => scalar.render(),
                        None => "NULL".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({rendered})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        let insert = format!("insert into {stg} ({column_list}) values {values}");
        tracing::debug!(sql = %insert, "repopulating staging table");
        self.conn.execute_statement(&insert).await?;
        tracing::info!(
            "Loaded {} rows into staging table {}",
            rows.len(),
            self.staging.name
        );

        Ok(())
    }
}
