//! Error types for the synchronization engine.

/// Errors that can occur while synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The database could not be reached at all. Fatal for the whole run.
    #[error("Failed to connect to database '{url}': {source}")]
    Connection {
        /// Connection URL with any password masked.
        url: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Reading the live structure of a table failed.
    #[error("Failed to introspect table '{table}': {source}")]
    Introspection {
        /// Table being introspected.
        table: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The engine rejected a DDL statement.
    #[error("DDL failed on table '{table}': {source}\n  statement: {statement}")]
    Ddl {
        /// Table being evolved.
        table: String,
        /// The statement that was rejected.
        statement: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A SQLite table rebuild failed part way; the transaction was rolled back.
    #[error("Rebuild of '{table}' for column '{column}' failed: {source}")]
    Rebuild {
        /// Table being rebuilt.
        table: String,
        /// Column whose change triggered the rebuild.
        column: String,
        /// The error raised by the failing step.
        #[source]
        source: Box<SyncError>,
    },

    /// Rebuilt data no longer satisfies the table's foreign keys.
    #[error("Foreign key check failed on '{table}': {violations} violating row(s)")]
    ForeignKeyCheck {
        /// Table that was rebuilt.
        table: String,
        /// Number of rows reported by `PRAGMA foreign_key_check`.
        violations: usize,
    },

    /// A column expected in the live table is missing.
    #[error("Column '{column}' does not exist in table '{table}'")]
    MissingColumn {
        /// Table that was inspected.
        table: String,
        /// Column that was expected.
        column: String,
    },

    /// A declared table spec violates one of its invariants.
    #[error("Invalid table spec: {0}")]
    InvalidSpec(String),

    /// Database error outside of a specific table.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Wraps a driver error raised while executing `statement` on `table`.
    pub(crate) fn ddl(table: &str, statement: &str, source: sqlx::Error) -> Self {
        Self::Ddl {
            table: table.to_string(),
            statement: statement.to_string(),
            source,
        }
    }

    /// Wraps a driver error raised while reading the catalog for `table`.
    pub(crate) fn introspection(table: &str, source: sqlx::Error) -> Self {
        Self::Introspection {
            table: table.to_string(),
            source,
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Masks the password component of a connection URL for logging.
#[must_use]
pub fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
