#![allow(dead_code)]

use oxide_sync::prelude::*;
use sqlx::AnyConnection;

pub async fn memory_connection() -> AnyConnection {
    SchemaSync::connect("sqlite::memory:")
        .await
        .unwrap_or_else(|e| panic!("Failed to open in-memory SQLite database: {e}"))
}

pub async fn execute(conn: &mut AnyConnection, sql: &str) {
    sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

pub async fn count_rows(conn: &mut AnyConnection, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(&mut *conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to count rows of {table}: {e}"));
    count
}

pub async fn live_table(conn: &mut AnyConnection, table: &str) -> LiveTable {
    Introspector::new(Dialect::Sqlite)
        .load_table(conn, table)
        .await
        .unwrap_or_else(|e| panic!("Failed to introspect {table}: {e}"))
        .unwrap_or_else(|| panic!("Table {table} does not exist"))
}

pub fn assert_all_no_action(report: &SyncReport) {
    assert!(report.is_success(), "report has failures: {report:?}");
    assert_eq!(report.statements().count(), 0, "unexpected statements: {report:?}");
    for table in &report.tables {
        for column in &table.columns {
            assert_eq!(
                column.decision,
                Decision::NoAction,
                "{}.{} was not NO_ACTION",
                table.table,
                column.column
            );
        }
    }
}
