//! Database dialects.
//!
//! [`Dialect`] classifies a live connection; each tag maps to a
//! [`DdlDialect`] implementation that knows how to spell DDL for that
//! engine. Unknown engines are handled by the MySQL implementation.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::introspect::LiveTable;
use crate::schema::{ColumnSpec, DefaultValue, ForeignKeyRef, SqlType, TableSpec};

/// The SQL engine family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite.
    Sqlite,
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// Any other engine, driven through the MySQL-compatible path.
    Generic,
}

static SQLITE: SqliteDialect = SqliteDialect::new();
static MYSQL: MySqlDialect = MySqlDialect::new();
static POSTGRES: PostgresDialect = PostgresDialect::new();

impl Dialect {
    /// Classifies a backend name as reported by the driver
    /// (`AnyConnection::backend_name()`).
    ///
    /// Never fails: unknown engines degrade to [`Dialect::Generic`].
    #[must_use]
    pub fn resolve(backend_name: &str) -> Self {
        match backend_name.to_ascii_lowercase().as_str() {
            "sqlite" => Self::Sqlite,
            "mysql" | "mariadb" => Self::MySql,
            "postgres" | "postgresql" => Self::Postgres,
            other => {
                warn!(
                    backend = other,
                    "Unknown database dialect, falling back to MySQL-compatible mode"
                );
                Self::Generic
            }
        }
    }

    /// Returns the dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgresql",
            Self::Generic => "generic",
        }
    }

    /// Returns the DDL generator for this dialect.
    #[must_use]
    pub fn ddl(self) -> &'static dyn DdlDialect {
        match self {
            Self::Sqlite => &SQLITE,
            Self::MySql | Self::Generic => &MYSQL,
            Self::Postgres => &POSTGRES,
        }
    }

    /// Whether column changes must go through a full table rebuild.
    #[must_use]
    pub fn rebuilds_on_alter(self) -> bool {
        !self.ddl().supports_alter_column()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Dialect-specific DDL generation.
pub trait DdlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Type written in a column definition. Differs from [`type_name`]
    /// where autoincrement is expressed through the type (PostgreSQL).
    ///
    /// [`type_name`]: DdlDialect::type_name
    fn column_type(&self, column: &ColumnSpec) -> String {
        self.type_name(&column.sql_type)
    }

    /// Clause appended after NULL/NOT NULL for autoincrement primary keys.
    fn autoincrement_clause(&self) -> &'static str;

    /// Whether the autoincrement clause already declares the primary key,
    /// so the column must be left out of the table-level `PRIMARY KEY`.
    fn autoincrement_declares_primary_key(&self) -> bool {
        false
    }

    /// Returns whether columns can be altered in place.
    fn supports_alter_column(&self) -> bool;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders a boolean literal.
    fn render_bool(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    /// Renders the DEFAULT value for a column, if one should be written.
    ///
    /// Nullable columns without an enforceable default get an explicit
    /// `NULL`.
    fn render_default(&self, column: &ColumnSpec) -> Option<String> {
        match &column.default {
            DefaultValue::None | DefaultValue::Generated(_) => {
                column.nullable.then(|| "NULL".to_string())
            }
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Bool(b) => Some(self.render_bool(*b).to_string()),
            DefaultValue::Integer(i) => Some(i.to_string()),
            DefaultValue::Float(f) => Some(f.to_string()),
            DefaultValue::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            DefaultValue::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Generates a column definition:
    /// `<name> <TYPE> <NULL|NOT NULL> [autoincrement] [DEFAULT <value>]`.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        );

        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

        if column.is_auto_increment_key() && !self.autoincrement_clause().is_empty() {
            sql.push(' ');
            sql.push_str(self.autoincrement_clause());
        }

        if let Some(default) = self.render_default(column) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }

        sql
    }

    /// Generates a `FOREIGN KEY (...) REFERENCES ...` clause.
    fn foreign_key_clause(&self, column: &str, target: &ForeignKeyRef) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(column),
            self.quote_identifier(&target.table),
            self.quote_identifier(&target.column)
        )
    }

    /// Generates SQL for CREATE TABLE, with every constraint inline.
    fn create_table(&self, table: &TableSpec) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let primary_keys: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .filter(|c| !(c.is_auto_increment_key() && self.autoincrement_declares_primary_key()))
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        if !primary_keys.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
        }

        for (column, target) in table.foreign_keys() {
            parts.push(self.foreign_key_clause(column, target));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_identifier(&table.name),
            parts.join(",\n    ")
        )
    }

    /// Deterministic constraint name for the foreign key of `table.column`.
    fn foreign_key_name(&self, table: &str, column: &str) -> String {
        format!("fk_{table}_{column}")
    }

    /// Generates SQL for adding a named foreign key to an existing table.
    fn add_foreign_key(&self, table: &str, column: &str, target: &ForeignKeyRef) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.quote_identifier(table),
            self.quote_identifier(&self.foreign_key_name(table, column)),
            self.foreign_key_clause(column, target)
        )
    }

    /// Generates SQL for dropping a named foreign key.
    fn drop_foreign_key(&self, table: &str, constraint: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(constraint)
        )
    }

    /// Generates SQL for ADD COLUMN, followed by the declared foreign key
    /// as a named constraint.
    fn add_column(&self, table: &str, column: &ColumnSpec) -> Vec<String> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )];

        if let Some(target) = &column.foreign_key {
            statements.push(self.add_foreign_key(table, &column.name, target));
        }

        statements
    }

    /// Generates the statements that bring an existing column in line with
    /// its declaration. `live` is the current structure of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be expressed against `live`,
    /// e.g. the column is missing from it.
    fn alter_column(&self, live: &LiveTable, column: &ColumnSpec) -> Result<Vec<String>>;

    /// Drops every named foreign key on `column`, then adds the declared
    /// one if there is one.
    fn replace_foreign_key(&self, live: &LiveTable, column: &ColumnSpec) -> Vec<String> {
        let mut statements: Vec<String> = live
            .foreign_keys_of(&column.name)
            .filter_map(|fk| fk.name.as_deref())
            .map(|name| self.drop_foreign_key(&live.name, name))
            .collect();
        if let Some(target) = &column.foreign_key {
            statements.push(self.add_foreign_key(&live.name, &column.name, target));
        }
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_backends() {
        assert_eq!(Dialect::resolve("SQLite"), Dialect::Sqlite);
        assert_eq!(Dialect::resolve("MySQL"), Dialect::MySql);
        assert_eq!(Dialect::resolve("MariaDB"), Dialect::MySql);
        assert_eq!(Dialect::resolve("PostgreSQL"), Dialect::Postgres);
    }

    #[test]
    fn test_resolve_unknown_backend_degrades() {
        let dialect = Dialect::resolve("Oracle");
        assert_eq!(dialect, Dialect::Generic);
        assert_eq!(dialect.ddl().name(), "mysql");
        assert!(!dialect.rebuilds_on_alter());
    }

    #[test]
    fn test_only_sqlite_rebuilds() {
        assert!(Dialect::Sqlite.rebuilds_on_alter());
        assert!(!Dialect::MySql.rebuilds_on_alter());
        assert!(!Dialect::Postgres.rebuilds_on_alter());
    }
}
