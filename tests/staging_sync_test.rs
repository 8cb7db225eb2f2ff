// ABOUTME: End-to-end staging synchronization tests against in-memory SQLite
// ABOUTME: Covers classification, merge, idempotence, and pending-change checks

use staging_sync::{
    DatabaseConnection, Error, Scalar, SqliteConnection, StagingSynchronizer, TableRef,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn setup_plain() -> SqliteConnection {
    init_tracing();
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_statement(
        "CREATE TABLE t (id INTEGER, val TEXT); \
         CREATE TABLE t_staging (id INTEGER, val TEXT, status TEXT);",
    )
    .await
    .unwrap();
    conn
}

async fn synchronizer(conn: &SqliteConnection) -> StagingSynchronizer<'_> {
    StagingSynchronizer::new(
        conn,
        TableRef::new("t"),
        vec!["id".to_string()],
        vec!["val".to_string()],
    )
    .await
    .unwrap()
    .with_audit_columns(vec![])
}

async fn staging_statuses(conn: &SqliteConnection) -> Vec<(String, Option<String>)> {
    conn.query_rows("SELECT id, status FROM t_staging ORDER BY id")
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row[0].clone().unwrap(), row[1].clone()))
        .collect()
}

async fn target_rows(conn: &SqliteConnection) -> Vec<(String, Option<String>)> {
    conn.query_rows("SELECT id, val FROM t ORDER BY id")
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row[0].clone().unwrap(), row[1].clone()))
        .collect()
}

#[tokio::test]
async fn test_unseen_rows_classify_as_new_and_insert() {
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t_staging VALUES (1, 'a', NULL), (2, 'b', NULL);",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.classify().await.unwrap();

    assert_eq!(
        staging_statuses(&conn).await,
        vec![
            ("1".to_string(), Some("new".to_string())),
            ("2".to_string(), Some("new".to_string())),
        ]
    );

    sync.merge().await.unwrap();
    assert_eq!(
        target_rows(&conn).await,
        vec![
            ("1".to_string(), Some("a".to_string())),
            ("2".to_string(), Some("b".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_drifted_row_classifies_as_update_and_applies() {
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t VALUES (1, 'a'); \
         INSERT INTO t_staging VALUES (1, 'z', NULL);",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.classify().await.unwrap();
    assert_eq!(
        staging_statuses(&conn).await,
        vec![("1".to_string(), Some("update".to_string()))]
    );

    sync.merge().await.unwrap();
    assert_eq!(
        target_rows(&conn).await,
        vec![("1".to_string(), Some("z".to_string()))]
    );
}

#[tokio::test]
async fn test_unchanged_row_classifies_as_old() {
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t VALUES (1, 'a'); \
         INSERT INTO t_staging VALUES (1, 'a', NULL);",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.classify().await.unwrap();
    assert_eq!(
        staging_statuses(&conn).await,
        vec![("1".to_string(), Some("old".to_string()))]
    );

    sync.merge().await.unwrap();
    assert_eq!(
        target_rows(&conn).await,
        vec![("1".to_string(), Some("a".to_string()))]
    );
}

#[tokio::test]
async fn test_null_drift_is_detected() {
    // NULL vs value counts as a difference.
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t VALUES (1, NULL); \
         INSERT INTO t_staging VALUES (1, 'x', NULL);",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.synchronize().await.unwrap();
    assert_eq!(
        target_rows(&conn).await,
        vec![("1".to_string(), Some("x".to_string()))]
    );
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t VALUES (1, 'a'); \
         INSERT INTO t_staging VALUES (1, 'z', NULL), (2, 'b', NULL);",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.synchronize().await.unwrap();

    let after_first = target_rows(&conn).await;
    assert_eq!(
        after_first,
        vec![
            ("1".to_string(), Some("z".to_string())),
            ("2".to_string(), Some("b".to_string())),
        ]
    );

    // Staging was not repopulated: everything reclassifies as old and the
    // merge inserts and updates nothing.
    sync.synchronize().await.unwrap();
    assert_eq!(target_rows(&conn).await, after_first);
    assert!(staging_statuses(&conn)
        .await
        .iter()
        .all(|(_, status)| status.as_deref() == Some("old")));
    assert!(!sync.has_pending_changes().await.unwrap());
}

#[tokio::test]
async fn test_stale_statuses_are_recomputed() {
    // Leftover labels from an earlier run must not survive a fresh pass.
    let conn = setup_plain().await;
    conn.execute_statement(
        "INSERT INTO t VALUES (1, 'a'); \
         INSERT INTO t_staging VALUES (1, 'a', 'new'), (2, 'b', 'old');",
    )
    .await
    .unwrap();

    let sync = synchronizer(&conn).await;
    sync.classify().await.unwrap();
    assert_eq!(
        staging_statuses(&conn).await,
        vec![
            ("1".to_string(), Some("old".to_string())),
            ("2".to_string(), Some("new".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_has_pending_changes() {
    let conn = setup_plain().await;
    let sync = synchronizer(&conn).await;

    // Empty staging table: nothing pending.
    sync.classify().await.unwrap();
    assert!(!sync.has_pending_changes().await.unwrap());

    conn.execute_statement("INSERT INTO t_staging VALUES (1, 'a', NULL);")
        .await
        .unwrap();
    sync.classify().await.unwrap();
    assert!(sync.has_pending_changes().await.unwrap());

    sync.merge().await.unwrap();
    sync.classify().await.unwrap();
    assert!(!sync.has_pending_changes().await.unwrap());
}

#[tokio::test]
async fn test_audit_columns_copied_through_merge() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_statement(
        "CREATE TABLE t (id INTEGER, val TEXT, _created_date TEXT, _created_by TEXT); \
         CREATE TABLE t_staging (id INTEGER, val TEXT, _created_date TEXT, \
                                 _created_by TEXT, status TEXT); \
         INSERT INTO t_staging VALUES (1, 'a', '2024-01-01T00:00:00Z', 'loader', NULL);",
    )
    .await
    .unwrap();

    let sync = StagingSynchronizer::new(
        &conn,
        TableRef::new("t"),
        vec!["id".to_string()],
        vec!["val".to_string()],
    )
    .await
    .unwrap();

    sync.synchronize().await.unwrap();

    let rows = conn
        .query_rows("SELECT _created_date, _created_by FROM t")
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![vec![
            Some("2024-01-01T00:00:00Z".to_string()),
            Some("loader".to_string()),
        ]]
    );
}

#[tokio::test]
async fn test_replace_rows_flushes_and_loads() {
    let conn = setup_plain().await;
    conn.execute_statement("INSERT INTO t_staging VALUES (9, 'stale', 'old');")
        .await
        .unwrap();

    let sync = synchronizer(&conn).await;
    sync.replace_rows(
        &["id".to_string(), "val".to_string()],
        &[
            vec![Some(Scalar::Int(1)), Some(Scalar::from("a"))],
            vec![Some(Scalar::Int(2)), None],
        ],
    )
    .await
    .unwrap();

    let rows = conn
        .query_rows("SELECT id, val, status FROM t_staging ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1].as_deref(), Some("a"));
    assert_eq!(rows[1][1], None);
    // Status left NULL for the next classification pass.
    assert!(rows.iter().all(|row| row[2].is_none()));

    sync.synchronize().await.unwrap();
    assert_eq!(
        target_rows(&conn).await,
        vec![
            ("1".to_string(), Some("a".to_string())),
            ("2".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_synchronizer_is_debug_formattable() {
    // unwrap_err on the constructor result needs this, as do assertion
    // failure messages.
    let conn = setup_plain().await;
    let sync = synchronizer(&conn).await;
    let rendered = format!("{sync:?}");
    assert!(rendered.contains("t_staging"));
    assert!(rendered.contains("Sqlite"));
}

#[tokio::test]
async fn test_missing_staging_table_is_a_distinct_error() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_statement("CREATE TABLE t (id INTEGER);")
        .await
        .unwrap();

    let err = StagingSynchronizer::new(&conn, TableRef::new("t"), vec!["id".to_string()], vec![])
        .await
        .unwrap_err();
    match err {
        Error::MissingStagingTable { table, expected } => {
            assert_eq!(table, "t");
            assert_eq!(expected, "t_staging");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_matching_columns_rejected() {
    let conn = setup_plain().await;
    let err = StagingSynchronizer::new(&conn, TableRef::new("t"), vec![], vec!["val".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyColumnSet { .. }));
}

#[tokio::test]
async fn test_bracketed_table_name_resolves_staging() {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_statement(
        "CREATE TABLE orders (id INTEGER, val TEXT); \
         CREATE TABLE orders_staging (id INTEGER, val TEXT, status TEXT);",
    )
    .await
    .unwrap();

    let sync = StagingSynchronizer::new(
        &conn,
        TableRef::new("[orders]"),
        vec!["id".to_string()],
        vec!["val".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(sync.staging_table().name, "orders_staging");
}

#[tokio::test]
async fn test_database_error_propagates_unchanged() {
    let conn = setup_plain().await;
    conn.execute_statement("INSERT INTO t_staging VALUES (1, 'a', NULL);")
        .await
        .unwrap();

    // A synchronizer built against a bad column name fails on the first
    // statement that references it.
    let sync = StagingSynchronizer::new(
        &conn,
        TableRef::new("t"),
        vec!["no_such_column".to_string()],
        vec!["val".to_string()],
    )
    .await
    .unwrap()
    .with_audit_columns(vec![]);

    let err = sync.classify().await.unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)));
}
