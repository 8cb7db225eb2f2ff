// ABOUTME: Audit column defaults and value stamping for staged rows
// ABOUTME: Creation timestamp plus actor, appended on write, excluded from diffs

use chrono::{DateTime, Utc};

use crate::filter::Scalar;

pub const CREATED_DATE_COLUMN: &str = "_created_date";
pub const CREATED_BY_COLUMN: &str = "_created_by";

/// The audit column names used when a synchronizer is built without an
/// explicit list.
pub fn default_audit_columns() -> Vec<String> {
    vec![
        CREATED_DATE_COLUMN.to_string(),
        CREATED_BY_COLUMN.to_string(),
    ]
}

/// A captured audit value pair: when the rows were written and by whom.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditStamp {
    pub created_date: DateTime<Utc>,
    pub created_by: String,
}

impl AuditStamp {
    /// Capture the current time and actor. The actor comes from the `USER`
    /// (or `USERNAME`) environment variable, falling back to "unknown".
    pub fn now() -> Self {
        let created_by = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            created_date: Utc::now(),
            created_by,
        }
    }

    /// Values in [`default_audit_columns`] order.
    pub fn values(&self) -> Vec<Scalar> {
        vec![
            Scalar::Text(self.created_date.to_rfc3339()),
            Scalar::Text(self.created_by.clone()),
        ]
    }
}

/// Append the default audit columns and this stamp's values to a column list
/// and its rows.
pub fn append_audit(
    columns: &mut Vec<String>,
    rows: &mut [Vec<Option<Scalar>>],
    stamp: &AuditStamp,
) {
    columns.extend(default_audit_columns());
    for row in rows.iter_mut() {
        row.extend(stamp.values().into_iter().map(Some));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_audit_columns_order() {
        assert_eq!(
            default_audit_columns(),
            vec!["_created_date".to_string(), "_created_by".to_string()]
        );
    }

    #[test]
    fn test_stamp_values_match_column_order() {
        let stamp = AuditStamp {
            created_date: Utc::now(),
            created_by: "tester".to_string(),
        };
        let values = stamp.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], Scalar::Text("tester".to_string()));
    }

    #[test]
    fn test_append_audit_extends_every_row() {
        let stamp = AuditStamp {
            created_date: Utc::now(),
            created_by: "tester".to_string(),
        };
        let mut columns = vec!["id".to_string()];
        let mut rows = vec![
            vec![Some(Scalar::Int(1))],
            vec![Some(Scalar::Int(2))],
        ];
        append_audit(&mut columns, &mut rows, &stamp);

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1], "_created_date");
        assert!(rows.iter().all(|row| row.len() == 3));
    }
}
