//! Additive schema synchronization for SQLite, MySQL and PostgreSQL.
//!
//! `oxide-sync` reconciles a declared set of tables against the live
//! structure of a database and evolves the database to match:
//! - Missing tables are created with every constraint inline
//! - Missing columns are added
//! - Columns whose type, default, primary key or foreign key drifted are
//!   altered in place, or through a table rebuild on SQLite
//!
//! Columns present in the database but absent from the declaration are
//! never dropped. Every pass re-introspects the database, so running it
//! twice in a row is a no-op the second time.
//!
//! # Architecture
//!
//! - **Dialect** - Classifies the connection and generates DDL per engine
//! - **Introspect** - Reads live tables from the engine's catalog
//! - **Normalize** - Reduces declared and live columns to a canonical form
//! - **Equivalence** - Compares types across engine spellings
//! - **Rebuild** - Create/copy/drop/rename fallback for SQLite
//! - **Sync** - Drives the pass and isolates per-table failures
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_sync::prelude::*;
//!
//! let mut conn = SchemaSync::connect("sqlite:app.db?mode=rwc").await?;
//!
//! let tables = vec![
//!     TableSpec::new("feeds")
//!         .column(ColumnSpec::new("id", SqlType::Varchar(255)).primary_key())
//!         .column(ColumnSpec::new("mp_name", SqlType::Varchar(255)))
//!         .column(ColumnSpec::new("status", SqlType::Integer).default(DefaultValue::Integer(0))),
//! ];
//!
//! let report = synchronize(&mut conn, &tables, false).await;
//! assert!(report.is_success());
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Synchronize the built-in application tables
//! oxide-sync sync
//!
//! # Show the statements a sync would run
//! oxide-sync --schema tables.json plan
//!
//! # Show the live columns of a table
//! oxide-sync inspect feeds
//! ```

pub mod dialect;
pub mod equivalence;
pub mod error;
pub mod introspect;
pub mod models;
pub mod normalize;
pub mod rebuild;
pub mod report;
pub mod schema;
pub mod sync;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{DdlDialect, Dialect, MySqlDialect, PostgresDialect, SqliteDialect};
    pub use crate::equivalence::{diff_column, is_equivalent, ColumnChange, ColumnDiff, TypeName};
    pub use crate::error::{Result, SyncError};
    pub use crate::introspect::{Introspector, LiveColumn, LiveForeignKey, LiveTable};
    pub use crate::normalize::{CanonicalColumn, NormalizedDefault};
    pub use crate::rebuild::{plan_rebuild, rebuild_table_with_altered_column, RebuildPlan};
    pub use crate::report::{ColumnReport, Decision, SyncReport, TableOutcome, TableReport};
    pub use crate::schema::{ColumnSpec, DefaultValue, ForeignKeyRef, SqlType, TableSpec};
    pub use crate::sync::{synchronize, SchemaSync, SyncOptions};
}

/// Reads declared tables from a JSON file.
///
/// # Errors
///
/// Returns [`SyncError::Io`](error::SyncError::Io) if the file cannot be
/// read, or [`SyncError::Serialization`](error::SyncError::Serialization)
/// if it is not a valid table list.
pub fn load_tables(path: &std::path::Path) -> error::Result<Vec<schema::TableSpec>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_load_tables_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, serde_json::to_string(&models::application_tables()).unwrap())
            .unwrap();

        let tables = load_tables(&path).unwrap();
        assert_eq!(tables.len(), 5);
        assert_eq!(tables[0].name, "users");
    }

    #[test]
    fn test_load_tables_minimal_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(
            &path,
            r#"[{"name": "feeds", "columns": [
                {"name": "id", "sql_type": {"Varchar": 255}, "primary_key": true, "nullable": false},
                {"name": "status", "sql_type": "Integer", "default": {"Integer": 0}}
            ]}]"#,
        )
        .unwrap();

        let tables = load_tables(&path).unwrap();
        let status = tables[0].get_column("status").unwrap();
        assert!(status.nullable);
        assert_eq!(status.default, DefaultValue::Integer(0));
        assert!(tables[0].get_column("id").unwrap().primary_key);
    }

    #[test]
    fn test_load_tables_missing_file() {
        let err = load_tables(std::path::Path::new("/nonexistent/tables.json")).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
