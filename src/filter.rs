// ABOUTME: Filter compiler - renders typed filter values into SQL predicates
// ABOUTME: One variant per filter shape, matched exhaustively, fail-fast on bad comparators

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::sql::quote_literal;

/// A single scalar value inside a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Render for use as a comparison operand: numbers bare, text quoted.
    pub(crate) fn render(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Text(v) => quote_literal(v),
        }
    }

    /// Render for use inside an IN list: integers bare, everything else
    /// quoted.
    fn render_list_element(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => quote_literal(&v.to_string()),
            Scalar::Text(v) => quote_literal(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Comparison operators allowed in comparator-map filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    NotEq,
    Ne,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Ne => "<>",
        }
    }

    /// Parse a comparator key, rejecting anything outside the allowed set.
    pub fn parse(key: &str, column: &str) -> Result<Self> {
        match key {
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Gte),
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Lte),
            "=" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::NotEq),
            "<>" => Ok(Comparator::Ne),
            other => Err(Error::InvalidComparator {
                comparator: other.to_string(),
                column: column.to_string(),
            }),
        }
    }
}

/// A filter value bound to a column by the caller.
///
/// Deserializes untagged, so filter maps read naturally from JSON or TOML
/// config: a bare string or number means equality, a sequence means IN, and
/// a map of comparator strings to scalars means one comparison per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Scalar>),
    Compare(BTreeMap<String, Scalar>),
}

/// Compile one filter value against a column into SQL predicate fragments.
///
/// Every variant yields exactly one fragment except `Compare`, which yields
/// one per map entry. A disallowed comparator key fails with
/// [`Error::InvalidComparator`] before any fragment is produced; unsupported
/// shapes cannot be constructed in the first place.
///
/// Composing fragments across columns into a WHERE clause is the caller's
/// job (see [`crate::query::build_select`]).
pub fn compile(column: &str, value: &FilterValue) -> Result<Vec<String>> {
    match value {
        FilterValue::Int(v) => Ok(vec![format!("{column} = {v}")]),
        FilterValue::Float(v) => Ok(vec![format!("{column} = {v}")]),
        FilterValue::Text(v) => Ok(vec![format!("{column} = {}", quote_literal(v))]),
        FilterValue::List(elements) => {
            let rendered: Vec<String> = elements
                .iter()
                .map(Scalar::render_list_element)
                .collect();
            Ok(vec![format!("{column} in ({})", rendered.join(", "))])
        }
        FilterValue::Compare(entries) => {
            // Validate all keys before rendering anything.
            let comparators: Vec<Comparator> = entries
                .keys()
                .map(|key| Comparator::parse(key, column))
                .collect::<Result<_>>()?;

            Ok(comparators
                .iter()
                .zip(entries.values())
                .map(|(cmp, value)| format!("{column} {} {}", cmp.as_str(), value.render()))
                .collect())
        }
    }
}
