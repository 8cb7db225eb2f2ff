// ABOUTME: Structured SELECT builder - table, columns, filters to SQL text
// ABOUTME: Compiles each filter per column and joins the fragments with AND

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::filter::{self, FilterValue};

/// A structured read query: a table, the columns to project, and a filter
/// per column.
///
/// Empty `columns` selects `*`; empty `filters` omits the WHERE clause.
/// Filters iterate in column-name order, so the generated SQL is
/// deterministic for a given spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectSpec {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
}

impl SelectSpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: BTreeMap::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(column.into(), value);
        self
    }
}

/// Build the SELECT statement for a spec.
///
/// Fails without producing SQL if any filter carries a disallowed
/// comparator key.
pub fn build_select(spec: &SelectSpec) -> Result<String> {
    let projection = if spec.columns.is_empty() {
        "*".to_string()
    } else {
        spec.columns.join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", projection, spec.table);

    let mut predicates = Vec::new();
    for (column, value) in &spec.filters {
        predicates.extend(filter::compile(column, value)?);
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    Ok(sql)
}
