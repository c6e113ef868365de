//! Declared schema types.
//!
//! These types describe what the application expects each table to look like.
//! They are built once at startup (or loaded from a JSON file) and handed to
//! the synchronizer; nothing here talks to the database.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// SQL data types a column can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(u32),
    /// Fixed-length character string.
    Char(u32),
    /// Boolean.
    Boolean,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Timestamp.
    Timestamp,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Binary large object.
    Blob,
    /// Fixed-length binary data.
    Binary(u32),
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
}

/// Default value for a declared column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// Explicit NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression emitted verbatim (e.g. `CURRENT_TIMESTAMP`).
    Expression(String),
    /// Value produced by the application when a row is created (e.g. "now").
    ///
    /// Never written to the database and never compared against the live
    /// default.
    Generated(String),
}

impl DefaultValue {
    /// Returns whether the database can enforce this default.
    #[must_use]
    pub const fn is_enforceable(&self) -> bool {
        !matches!(self, Self::None | Self::Generated(_))
    }
}

/// Reference from a column to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

const fn default_true() -> bool {
    true
}

/// Declared column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Declared SQL type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether this column auto-increments. Only meaningful on a primary key.
    #[serde(default)]
    pub auto_increment: bool,
    /// Foreign key reference, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    /// Creates a new nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: DefaultValue::None,
            primary_key: false,
            auto_increment: false,
            foreign_key: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets the column as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false; // Primary keys are always NOT NULL
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Makes the column reference `table(column)`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Whether the autoincrement clause applies to this column.
    #[must_use]
    pub const fn is_auto_increment_key(&self) -> bool {
        self.primary_key && self.auto_increment
    }
}

/// Declared table: a name and its ordered columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Creates a new table spec without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, in declaration order.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// `(column, reference)` pairs of every declared foreign key.
    #[must_use]
    pub fn foreign_keys(&self) -> BTreeSet<(&str, &ForeignKeyRef)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c.name.as_str(), fk)))
            .collect()
    }

    /// Checks the table invariants: unique column names, finite float
    /// defaults, and at most one autoincrement column which must be a
    /// primary key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSpec`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(SyncError::InvalidSpec(format!(
                "table '{}' declares no columns",
                self.name
            )));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SyncError::InvalidSpec(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, column.name
                )));
            }
            if column.auto_increment && !column.primary_key {
                return Err(SyncError::InvalidSpec(format!(
                    "column '{}.{}' is autoincrement but not a primary key",
                    self.name, column.name
                )));
            }
            if matches!(column.default, DefaultValue::Float(f) if !f.is_finite()) {
                return Err(SyncError::InvalidSpec(format!(
                    "column '{}.{}' has a non-finite float default",
                    self.name, column.name
                )));
            }
        }

        let auto = self.columns.iter().filter(|c| c.auto_increment).count();
        if auto > 1 {
            return Err(SyncError::InvalidSpec(format!(
                "table '{}' declares {auto} autoincrement columns",
                self.name
            )));
        }

        Ok(())
    }
}
