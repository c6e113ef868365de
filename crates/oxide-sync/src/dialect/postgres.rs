//! PostgreSQL dialect.

use tracing::warn;

use crate::error::Result;
use crate::introspect::LiveTable;
use crate::schema::{ColumnSpec, SqlType};

use super::DdlDialect;

/// PostgreSQL DDL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DdlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({len})"),
            SqlType::Char(len) => format!("CHAR({len})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::DateTime | SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal(p, s) => format!("NUMERIC({p},{s})"),
            SqlType::Blob | SqlType::Binary(_) => "BYTEA".to_string(), // PostgreSQL uses BYTEA
            SqlType::Json => "JSONB".to_string(),
            SqlType::Uuid => "UUID".to_string(),
        }
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        // PostgreSQL uses SERIAL types instead of an AUTOINCREMENT keyword
        if column.is_auto_increment_key() {
            match column.sql_type {
                SqlType::SmallInt => return "SMALLSERIAL".to_string(),
                SqlType::Integer => return "SERIAL".to_string(),
                SqlType::BigInt => return "BIGSERIAL".to_string(),
                _ => {}
            }
        }
        self.type_name(&column.sql_type)
    }

    fn autoincrement_clause(&self) -> &'static str {
        ""
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn render_bool(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    fn alter_column(&self, live: &LiveTable, column: &ColumnSpec) -> Result<Vec<String>> {
        let name = self.quote_identifier(&column.name);
        let ty = self.type_name(&column.sql_type);
        let current = live.column(&column.name);

        let mut actions = vec![format!("ALTER COLUMN {name} TYPE {ty} USING {name}::{ty}")];
        actions.push(format!(
            "ALTER COLUMN {name} {}",
            if column.nullable { "DROP NOT NULL" } else { "SET NOT NULL" }
        ));

        // A sequence-backed column keeps its nextval() default.
        if current.is_some_and(|c| c.auto_increment) {
            if !column.is_auto_increment_key() {
                warn!(
                    table = %live.name,
                    column = %column.name,
                    "Column is sequence-backed but no longer declared autoincrement, keeping sequence"
                );
            }
        } else {
            if column.is_auto_increment_key() {
                warn!(
                    table = %live.name,
                    column = %column.name,
                    "Cannot turn an existing column into SERIAL in place"
                );
            }
            actions.push(self.render_default(column).map_or_else(
                || format!("ALTER COLUMN {name} DROP DEFAULT"),
                |default| format!("ALTER COLUMN {name} SET DEFAULT {default}"),
            ));
        }

        let was_key = current.is_some_and(|c| c.primary_key);
        if column.primary_key && !was_key {
            if live.columns.iter().any(|c| c.primary_key) {
                warn!(
                    table = %live.name,
                    column = %column.name,
                    "Table already has a different primary key, not extending it"
                );
            } else {
                actions.push(format!("ADD PRIMARY KEY ({name})"));
            }
        }

        let mut statements = vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(&live.name),
            actions.join(", ")
        )];
        statements.extend(self.replace_foreign_key(live, column));
        Ok(statements)
    }
}
