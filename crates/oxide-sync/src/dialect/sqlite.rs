//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support: columns cannot change type,
//! default or constraints in place, and named constraints cannot be added
//! after creation. Column changes therefore go through the table rebuild in
//! [`crate::rebuild`]. A foreign key on a new column is written as a
//! column-level `REFERENCES` clause, which ADD COLUMN accepts.

use crate::error::Result;
use crate::introspect::LiveTable;
use crate::rebuild::plan_rebuild;
use crate::schema::{ColumnSpec, SqlType};

use super::DdlDialect;

/// SQLite DDL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DdlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        // Types collapse to the storage class SQLite will actually use.
        match sql_type {
            // Booleans are stored as 0/1.
            SqlType::Integer | SqlType::SmallInt | SqlType::BigInt | SqlType::Boolean => "INTEGER",
            SqlType::Text
            | SqlType::Varchar(_)
            | SqlType::Char(_)
            | SqlType::DateTime
            | SqlType::Timestamp
            | SqlType::Date
            | SqlType::Time
            | SqlType::Json
            | SqlType::Uuid => "TEXT",
            SqlType::Real | SqlType::Double => "REAL",
            SqlType::Decimal(_, _) => "NUMERIC",
            SqlType::Blob | SqlType::Binary(_) => "BLOB",
        }
        .to_string()
    }

    fn autoincrement_clause(&self) -> &'static str {
        // AUTOINCREMENT is only legal directly after an inline PRIMARY KEY.
        "PRIMARY KEY AUTOINCREMENT"
    }

    fn autoincrement_declares_primary_key(&self) -> bool {
        true
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn add_column(&self, table: &str, column: &ColumnSpec) -> Vec<String> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        );
        if let Some(target) = &column.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {} ({})",
                self.quote_identifier(&target.table),
                self.quote_identifier(&target.column)
            ));
        }
        vec![sql]
    }

    fn alter_column(&self, live: &LiveTable, column: &ColumnSpec) -> Result<Vec<String>> {
        Ok(plan_rebuild(live, column)?.statements)
    }
}
