//! Synchronization against a SQLite file that outlives the connection.

mod common;

use common::assert_all_no_action;
use oxide_sync::models;
use oxide_sync::prelude::*;
use sqlx::Connection;

#[tokio::test]
async fn test_resync_after_reconnect_is_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("app.db").display());
    let tables = models::application_tables();

    let mut conn = SchemaSync::connect(&url).await.unwrap();
    let first = synchronize(&mut conn, &tables, false).await;
    assert!(first.is_success());
    conn.close().await.unwrap();

    let mut conn = SchemaSync::connect(&url).await.unwrap();
    let second = synchronize(&mut conn, &tables, false).await;
    assert_all_no_action(&second);
}

#[tokio::test]
async fn test_missing_database_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("missing.db").display());

    let err = SchemaSync::connect(&url).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection { .. }));
    assert!(err.to_string().contains("missing.db"));
}
