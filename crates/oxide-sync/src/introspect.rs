//! Live schema introspection.
//!
//! Reads the current structure of a table through the engine's catalog:
//! `sqlite_master` and the `pragma_*` table functions on SQLite,
//! `information_schema` on MySQL, and `pg_catalog` on PostgreSQL.
//! Nothing is cached; every call goes to the database.

use serde::Serialize;
use sqlx::AnyConnection;

use crate::dialect::Dialect;
use crate::error::{Result, SyncError};

/// A column as it currently exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Engine-native type text, e.g. `VARCHAR(255)`.
    pub raw_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default as stored by the engine, if any.
    pub default: Option<String>,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
    /// Whether the engine generates values for this column.
    pub auto_increment: bool,
}

/// A single-column foreign key as it currently exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveForeignKey {
    /// Constraint name. SQLite does not name foreign keys.
    pub name: Option<String>,
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub references_table: String,
    /// Referenced column; `None` when it implicitly targets the primary key.
    pub references_column: Option<String>,
}

/// The current structure of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    /// Table name.
    pub name: String,
    /// Columns in engine order.
    pub columns: Vec<LiveColumn>,
    /// Foreign keys declared on the table.
    pub foreign_keys: Vec<LiveForeignKey>,
    /// Column lists of the table's UNIQUE constraints. Read on SQLite only,
    /// where a rebuild has to declare them again.
    pub unique_constraints: Vec<Vec<String>>,
    /// `CREATE INDEX` statements of the table's explicit indexes. Read on
    /// SQLite only, where a rebuild has to run them again.
    pub indexes: Vec<String>,
}

impl LiveTable {
    /// Gets a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Foreign keys whose referencing column is `column`.
    pub fn foreign_keys_of<'a>(
        &'a self,
        column: &'a str,
    ) -> impl Iterator<Item = &'a LiveForeignKey> + 'a {
        self.foreign_keys.iter().filter(move |fk| fk.column == column)
    }

    /// Whether `column` carries any foreign key.
    #[must_use]
    pub fn has_foreign_key(&self, column: &str) -> bool {
        self.foreign_keys_of(column).next().is_some()
    }
}

/// Reads live table structure for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Introspector {
    dialect: Dialect,
}

impl Introspector {
    /// Creates an introspector for the given dialect.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Returns whether `table` exists. An empty database simply has no
    /// tables.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Introspection`] if the catalog query fails.
    pub async fn table_exists(&self, conn: &mut AnyConnection, table: &str) -> Result<bool> {
        let sql = match self.dialect {
            Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            Dialect::Postgres => {
                "SELECT tablename::text FROM pg_catalog.pg_tables \
                 WHERE schemaname = current_schema() AND tablename = $1"
            }
            Dialect::MySql | Dialect::Generic => {
                "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
            }
        };

        let row: Option<(String,)> = sqlx::query_as(sql)
            .bind(table)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| SyncError::introspection(table, e))?;
        Ok(row.is_some())
    }

    /// Returns the live columns of `table`, in engine order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Introspection`] if the catalog query fails.
    pub async fn get_columns(&self, conn: &mut AnyConnection, table: &str) -> Result<Vec<LiveColumn>> {
        let columns = match self.dialect {
            Dialect::Sqlite => sqlite_columns(conn, table).await,
            Dialect::Postgres => postgres_columns(conn, table).await,
            Dialect::MySql | Dialect::Generic => mysql_columns(conn, table).await,
        };
        columns.map_err(|e| SyncError::introspection(table, e))
    }

    /// Returns the foreign keys declared on `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Introspection`] if the catalog query fails.
    pub async fn get_foreign_keys(
        &self,
        conn: &mut AnyConnection,
        table: &str,
    ) -> Result<Vec<LiveForeignKey>> {
        let keys = match self.dialect {
            Dialect::Sqlite => sqlite_foreign_keys(conn, table).await,
            Dialect::Postgres => postgres_foreign_keys(conn, table).await,
            Dialect::MySql | Dialect::Generic => mysql_foreign_keys(conn, table).await,
        };
        keys.map_err(|e| SyncError::introspection(table, e))
    }

    /// Loads the full live structure of `table`, or `None` if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Introspection`] if any catalog query fails.
    pub async fn load_table(&self, conn: &mut AnyConnection, table: &str) -> Result<Option<LiveTable>> {
        if !self.table_exists(conn, table).await? {
            return Ok(None);
        }

        let columns = self.get_columns(conn, table).await?;
        let foreign_keys = self.get_foreign_keys(conn, table).await?;
        let (unique_constraints, indexes) = if self.dialect == Dialect::Sqlite {
            let unique = sqlite_unique_constraints(conn, table)
                .await
                .map_err(|e| SyncError::introspection(table, e))?;
            let indexes = sqlite_indexes(conn, table)
                .await
                .map_err(|e| SyncError::introspection(table, e))?;
            (unique, indexes)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Some(LiveTable {
            name: table.to_string(),
            columns,
            foreign_keys,
            unique_constraints,
            indexes,
        }))
    }
}

// ================================================================
// SQLite
// ================================================================

async fn sqlite_columns(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveColumn>, sqlx::Error> {
    let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    // AUTOINCREMENT is only visible in the original CREATE statement.
    let create_sql: Option<(String,)> =
        sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&mut *conn)
            .await?;
    let has_autoincrement =
        create_sql.is_some_and(|(sql,)| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));
    let single_key = rows.iter().filter(|r| r.4 > 0).count() == 1;

    Ok(rows
        .into_iter()
        .map(|(name, raw_type, notnull, default, pk)| LiveColumn {
            name,
            raw_type,
            nullable: notnull == 0,
            default,
            primary_key: pk > 0,
            auto_increment: pk > 0 && single_key && has_autoincrement,
        })
        .collect())
}

async fn sqlite_foreign_keys(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveForeignKey>, sqlx::Error> {
    let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(column, references_table, references_column)| LiveForeignKey {
            name: None,
            column,
            references_table,
            references_column,
        })
        .collect())
}

async fn sqlite_unique_constraints(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<Vec<String>>, sqlx::Error> {
    // origin 'u' marks indexes backing a UNIQUE constraint of CREATE TABLE.
    let indexes: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM pragma_index_list(?) WHERE origin = 'u' ORDER BY name")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    let mut constraints = Vec::with_capacity(indexes.len());
    for (index,) in indexes {
        let columns: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&index)
                .fetch_all(&mut *conn)
                .await?;
        constraints.push(columns.into_iter().map(|(column,)| column).collect());
    }
    Ok(constraints)
}

async fn sqlite_indexes(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<String>, sqlx::Error> {
    // Automatic indexes have no SQL; they come back with their constraint.
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT sql FROM sqlite_master \
         WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(sql,)| sql).collect())
}

// ================================================================
// MySQL / MariaDB (and the generic fallback)
// ================================================================

async fn mysql_columns(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveColumn>, sqlx::Error> {
    // CAST keeps every value textual regardless of the catalog collation.
    let rows: Vec<(String, String, String, Option<String>, String, String)> = sqlx::query_as(
        "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), \
                CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), \
                CAST(COLUMN_KEY AS CHAR), CAST(EXTRA AS CHAR) \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
         ORDER BY ORDINAL_POSITION",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(name, raw_type, is_nullable, default, key, extra)| LiveColumn {
                name,
                raw_type,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default,
                primary_key: key.eq_ignore_ascii_case("PRI"),
                auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
            },
        )
        .collect())
}

async fn mysql_foreign_keys(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveForeignKey>, sqlx::Error> {
    let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
        "SELECT CAST(CONSTRAINT_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), \
                CAST(REFERENCED_TABLE_NAME AS CHAR), CAST(REFERENCED_COLUMN_NAME AS CHAR) \
         FROM information_schema.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
           AND REFERENCED_TABLE_NAME IS NOT NULL \
         ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(name, column, references_table, references_column)| LiveForeignKey {
                name: Some(name),
                column,
                references_table,
                references_column,
            },
        )
        .collect())
}

// ================================================================
// PostgreSQL
// ================================================================

async fn postgres_columns(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveColumn>, sqlx::Error> {
    let rows: Vec<(String, String, bool, Option<String>, bool, bool)> = sqlx::query_as(
        "SELECT a.attname::text, \
                pg_catalog.format_type(a.atttypid, a.atttypmod)::text, \
                NOT a.attnotnull, \
                pg_catalog.pg_get_expr(d.adbin, d.adrelid)::text, \
                COALESCE(i.indisprimary, false), \
                a.attidentity <> '' \
         FROM pg_catalog.pg_attribute a \
         JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
         LEFT JOIN pg_catalog.pg_index i \
                ON i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey) \
         WHERE n.nspname = current_schema() AND c.relname = $1 \
           AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, raw_type, nullable, default, primary_key, identity)| {
            // SERIAL columns show up as a sequence default, not as a default
            // the application declared.
            let serial = default
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("));
            LiveColumn {
                name,
                raw_type,
                nullable,
                default: if serial { None } else { default },
                primary_key,
                auto_increment: serial || identity,
            }
        })
        .collect())
}

async fn postgres_foreign_keys(
    conn: &mut AnyConnection,
    table: &str,
) -> std::result::Result<Vec<LiveForeignKey>, sqlx::Error> {
    let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
        "SELECT con.conname::text, att.attname::text, ref.relname::text, ratt.attname::text \
         FROM pg_catalog.pg_constraint con \
         JOIN pg_catalog.pg_class cls ON cls.oid = con.conrelid \
         JOIN pg_catalog.pg_namespace n ON n.oid = cls.relnamespace \
         JOIN pg_catalog.pg_class ref ON ref.oid = con.confrelid \
         JOIN pg_catalog.pg_attribute att \
              ON att.attrelid = con.conrelid AND att.attnum = con.conkey[1] \
         LEFT JOIN pg_catalog.pg_attribute ratt \
              ON ratt.attrelid = con.confrelid AND ratt.attnum = con.confkey[1] \
         WHERE con.contype = 'f' AND n.nspname = current_schema() AND cls.relname = $1 \
         ORDER BY con.conname",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(name, column, references_table, references_column)| LiveForeignKey {
                name: Some(name),
                column,
                references_table,
                references_column,
            },
        )
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    async fn memory_connection() -> AnyConnection {
        sqlx::any::install_default_drivers();
        AnyConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite database")
    }

    #[tokio::test]
    async fn test_missing_table_on_empty_database() {
        let mut conn = memory_connection().await;
        let introspector = Introspector::new(Dialect::Sqlite);

        assert!(!introspector.table_exists(&mut conn, "feeds").await.unwrap());
        assert!(introspector.load_table(&mut conn, "feeds").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_columns() {
        let mut conn = memory_connection().await;
        sqlx::query(
            "CREATE TABLE feeds (id VARCHAR(255) NOT NULL PRIMARY KEY, \
             mp_name TEXT DEFAULT 'unnamed', status INTEGER NOT NULL)",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let introspector = Introspector::new(Dialect::Sqlite);
        let columns = introspector.get_columns(&mut conn, "feeds").await.unwrap();

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].raw_type, "VARCHAR(255)");
        assert!(columns[0].primary_key);
        assert!(!columns[0].auto_increment);
        assert_eq!(columns[1].default.as_deref(), Some("'unnamed'"));
        assert!(columns[1].nullable);
        assert!(!columns[2].nullable);
    }

    #[tokio::test]
    async fn test_sqlite_autoincrement_detection() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE message_tasks (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();

        let introspector = Introspector::new(Dialect::Sqlite);
        let table = introspector
            .load_table(&mut conn, "message_tasks")
            .await
            .unwrap()
            .unwrap();

        assert!(table.column("id").unwrap().auto_increment);
        assert!(!table.column("body").unwrap().auto_increment);
    }

    #[tokio::test]
    async fn test_sqlite_unique_constraints_and_indexes() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE users (id TEXT PRIMARY KEY, username TEXT UNIQUE, status TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("CREATE INDEX idx_users_status ON users (status)")
            .execute(&mut conn)
            .await
            .unwrap();

        let table = Introspector::new(Dialect::Sqlite)
            .load_table(&mut conn, "users")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(table.unique_constraints, vec![vec!["username".to_string()]]);
        assert_eq!(
            table.indexes,
            vec!["CREATE INDEX idx_users_status ON users (status)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sqlite_foreign_keys() {
        let mut conn = memory_connection().await;
        sqlx::query("CREATE TABLE feeds (id TEXT PRIMARY KEY)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE articles (id TEXT PRIMARY KEY, mp_id TEXT, \
             FOREIGN KEY (mp_id) REFERENCES feeds (id))",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let introspector = Introspector::new(Dialect::Sqlite);
        let table = introspector
            .load_table(&mut conn, "articles")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(table.foreign_keys.len(), 1);
        assert!(table.has_foreign_key("mp_id"));
        assert!(!table.has_foreign_key("id"));
        let fk = &table.foreign_keys[0];
        assert_eq!(fk.references_table, "feeds");
        assert_eq!(fk.references_column.as_deref(), Some("id"));
        assert!(fk.name.is_none());
    }
}
