//! SQLite table rebuild.
//!
//! SQLite cannot change a column's type, default or constraints in place.
//! The table is rebuilt instead: a scratch table with the new definition is
//! created, rows are copied over, the original is dropped, the scratch
//! table takes its name and the explicit indexes dropped with the original
//! are created again. All of it happens in one transaction, so a failure at
//! any step leaves the original table as it was.
//!
//! Everything else about the table is carried over from its live
//! structure: column types, nullability, defaults, the primary key, foreign
//! keys, UNIQUE constraints and indexes.

use sqlx::{AnyConnection, Connection};
use tracing::{debug, info, warn};

use crate::dialect::{DdlDialect, Dialect, SqliteDialect};
use crate::error::{Result, SyncError};
use crate::introspect::{Introspector, LiveColumn, LiveForeignKey, LiveTable};
use crate::schema::ColumnSpec;

const DIALECT: SqliteDialect = SqliteDialect::new();

/// The statements that rebuild one table around one altered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPlan {
    /// Table being rebuilt.
    pub table: String,
    /// Name of the scratch table that replaces it.
    pub scratch: String,
    /// Statements in execution order.
    pub statements: Vec<String>,
}

/// Name of the scratch table used while rebuilding `table`.
#[must_use]
pub fn scratch_table_name(table: &str) -> String {
    format!("{table}__rebuild")
}

/// Definition of a column that is carried over unchanged.
fn carried_column_definition(column: &LiveColumn) -> String {
    let mut sql = DIALECT.quote_identifier(&column.name);
    if !column.raw_type.is_empty() {
        sql.push(' ');
        sql.push_str(&column.raw_type);
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.auto_increment {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    // Defaults come back from the catalog as SQL text already.
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    sql
}

fn carried_foreign_key(fk: &LiveForeignKey) -> String {
    let mut sql = format!(
        "FOREIGN KEY ({}) REFERENCES {}",
        DIALECT.quote_identifier(&fk.column),
        DIALECT.quote_identifier(&fk.references_table)
    );
    if let Some(column) = &fk.references_column {
        sql.push_str(&format!(" ({})", DIALECT.quote_identifier(column)));
    }
    sql
}

fn carried_unique_constraint(columns: &[String]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| DIALECT.quote_identifier(c)).collect();
    format!("UNIQUE ({})", columns.join(", "))
}

/// Plans the rebuild of `live` with `altered` replacing the column of the
/// same name. Every other column keeps its live type, nullability, default,
/// primary key membership and foreign key; the table keeps its UNIQUE
/// constraints and indexes.
///
/// # Errors
///
/// Returns [`SyncError::MissingColumn`] if `live` has no column named
/// `altered.name`.
pub fn plan_rebuild(live: &LiveTable, altered: &ColumnSpec) -> Result<RebuildPlan> {
    let Some(current) = live.column(&altered.name) else {
        return Err(SyncError::MissingColumn {
            table: live.name.clone(),
            column: altered.name.clone(),
        });
    };
    if current.primary_key && !altered.primary_key {
        warn!(
            table = %live.name,
            column = %altered.name,
            "Column leaves the primary key during rebuild"
        );
    }

    let scratch = scratch_table_name(&live.name);
    let mut parts = Vec::with_capacity(live.columns.len() + 2);
    let mut primary_keys = Vec::new();

    for column in &live.columns {
        if column.name == altered.name {
            parts.push(DIALECT.column_definition(altered));
            if altered.primary_key && !altered.is_auto_increment_key() {
                primary_keys.push(DIALECT.quote_identifier(&altered.name));
            }
        } else {
            parts.push(carried_column_definition(column));
            if column.primary_key && !column.auto_increment {
                primary_keys.push(DIALECT.quote_identifier(&column.name));
            }
        }
    }

    if !primary_keys.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
    }

    parts.extend(
        live.foreign_keys
            .iter()
            .filter(|fk| fk.column != altered.name)
            .map(carried_foreign_key),
    );
    if let Some(target) = &altered.foreign_key {
        parts.push(DIALECT.foreign_key_clause(&altered.name, target));
    }
    parts.extend(
        live.unique_constraints
            .iter()
            .map(|columns| carried_unique_constraint(columns)),
    );

    let column_list = live
        .columns
        .iter()
        .map(|c| DIALECT.quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let q_table = DIALECT.quote_identifier(&live.name);
    let q_scratch = DIALECT.quote_identifier(&scratch);

    let mut statements = vec![
        format!("DROP TABLE IF EXISTS {q_scratch}"),
        format!("CREATE TABLE {q_scratch} (\n    {}\n)", parts.join(",\n    ")),
        format!("INSERT INTO {q_scratch} ({column_list}) SELECT {column_list} FROM {q_table}"),
        format!("DROP TABLE {q_table}"),
        format!("ALTER TABLE {q_scratch} RENAME TO {q_table}"),
    ];
    // Dropping the original dropped its indexes; their names are free again.
    statements.extend(live.indexes.iter().cloned());

    Ok(RebuildPlan {
        table: live.name.clone(),
        scratch,
        statements,
    })
}

/// Rebuilds `table` so that its column `altered.name` matches `altered`.
///
/// Foreign key enforcement is switched off for the duration of the rebuild
/// (it cannot be changed inside a transaction) and checked explicitly
/// before committing. Returns the executed statements.
///
/// # Errors
///
/// Returns [`SyncError::Rebuild`] wrapping the failing step. The
/// transaction is rolled back and the original table is left untouched.
pub async fn rebuild_table_with_altered_column(
    conn: &mut AnyConnection,
    table: &str,
    altered: &ColumnSpec,
) -> Result<Vec<String>> {
    let wrap = |source: SyncError| SyncError::Rebuild {
        table: table.to_string(),
        column: altered.name.clone(),
        source: Box::new(source),
    };

    let (foreign_keys_on,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| wrap(e.into()))?;
    let foreign_keys_on = foreign_keys_on != 0;

    if foreign_keys_on {
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await
            .map_err(|e| wrap(e.into()))?;
    }

    let result = rebuild_in_transaction(conn, table, altered).await;

    if foreign_keys_on {
        if let Err(e) = sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await {
            warn!(table, error = %e, "Failed to re-enable foreign key enforcement");
        }
    }

    result.map_err(wrap)
}

async fn rebuild_in_transaction(
    conn: &mut AnyConnection,
    table: &str,
    altered: &ColumnSpec,
) -> Result<Vec<String>> {
    let mut tx = conn.begin().await?;

    let live = Introspector::new(Dialect::Sqlite)
        .load_table(&mut *tx, table)
        .await?
        .ok_or_else(|| SyncError::MissingColumn {
            table: table.to_string(),
            column: altered.name.clone(),
        })?;
    let plan = plan_rebuild(&live, altered)?;

    for statement in &plan.statements {
        debug!(table, sql = %statement, "Executing rebuild statement");
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::ddl(table, statement, e))?;
    }

    let (violations,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pragma_foreign_key_check(?)")
        .bind(table)
        .fetch_one(&mut *tx)
        .await?;
    if violations > 0 {
        // Dropping the transaction rolls the rebuild back.
        return Err(SyncError::ForeignKeyCheck {
            table: table.to_string(),
            violations: usize::try_from(violations).unwrap_or(usize::MAX),
        });
    }

    tx.commit().await?;
    info!(table, column = %altered.name, "Rebuilt table");
    Ok(plan.statements)
}
