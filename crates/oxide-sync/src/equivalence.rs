//! Type equivalence and column diffing.
//!
//! Engines never agree on type names: PostgreSQL reports `character
//! varying(255)` for a declared `VARCHAR(255)`, MySQL may report `int(11)`
//! for `INT`, and SQLite accepts any spelling and only cares about the
//! storage class. Type strings are parsed once into a [`TypeName`] and
//! compared per dialect.

use serde::Serialize;

use crate::dialect::Dialect;
use crate::introspect::LiveColumn;
use crate::normalize::{CanonicalColumn, NormalizedDefault};
use crate::schema::ColumnSpec;

/// SQLite storage-class groups. Two base types are interchangeable when
/// some group contains both.
const SQLITE_TYPE_GROUPS: &[&[&str]] = &[
    // INTEGER
    &["INT", "INTEGER", "BIGINT", "SMALLINT", "TINYINT", "MEDIUMINT", "BOOLEAN"],
    // TEXT
    &[
        "TEXT", "VARCHAR", "CHAR", "STRING", "NVARCHAR", "NCHAR", "CHARACTER", "CLOB",
        "DATETIME", "DATE", "TIME", "TIMESTAMP", "JSON", "UUID",
    ],
    // REAL
    &["REAL", "FLOAT", "DOUBLE", "DOUBLE PRECISION", "DECIMAL"],
    // BLOB
    &["BLOB", "BINARY", "VARBINARY"],
    // NUMERIC
    &["NUMERIC", "DECIMAL"],
];

/// A type string split into its base type and its length/precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeName {
    /// Uppercased base type with single spaces, e.g. `CHARACTER VARYING`.
    pub base: String,
    /// Length/precision without whitespace, e.g. `10,2`.
    pub params: Option<String>,
}

impl TypeName {
    /// Parses an engine or declared type string.
    ///
    /// Parameters may sit in the middle of the name, as in PostgreSQL's
    /// `timestamp(6) without time zone`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (base, params) = match (raw.find('('), raw.rfind(')')) {
            (Some(open), Some(close)) if open < close => {
                let params: String = raw[open + 1..close]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let base = format!("{} {}", &raw[..open], &raw[close + 1..]);
                (base, (!params.is_empty()).then_some(params))
            }
            _ => (raw.to_string(), None),
        };

        Self {
            base: base
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_ascii_uppercase(),
            params,
        }
    }

    /// Maps engine spellings onto the names the DDL generator emits.
    #[must_use]
    pub fn canonical(mut self, dialect: Dialect) -> Self {
        let base = match dialect {
            Dialect::Postgres => match self.base.as_str() {
                "CHARACTER VARYING" => "VARCHAR",
                "CHARACTER" | "BPCHAR" => "CHAR",
                "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
                "TIME WITHOUT TIME ZONE" => "TIME",
                "INT" | "INT4" | "SERIAL" | "SERIAL4" => "INTEGER",
                "INT8" | "BIGSERIAL" | "SERIAL8" => "BIGINT",
                "INT2" | "SMALLSERIAL" | "SERIAL2" => "SMALLINT",
                "BOOL" => "BOOLEAN",
                "FLOAT8" => "DOUBLE PRECISION",
                "FLOAT4" => "REAL",
                "DECIMAL" => "NUMERIC",
                _ => return self,
            },
            Dialect::MySql | Dialect::Generic => match self.base.as_str() {
                "INTEGER" => "INT",
                "NUMERIC" => "DECIMAL",
                "BOOL" | "BOOLEAN" => {
                    self.params = Some("1".to_string());
                    "TINYINT"
                }
                // MariaDB stores JSON as LONGTEXT with a CHECK constraint.
                "JSON" => "LONGTEXT",
                _ => return self,
            },
            Dialect::Sqlite => return self,
        };
        self.base = base.to_string();
        self
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.params {
            Some(params) => write!(f, "{}({params})", self.base),
            None => f.write_str(&self.base),
        }
    }
}

fn sqlite_same_group(a: &str, b: &str) -> bool {
    SQLITE_TYPE_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

/// Decides whether two parsed types denote the same type on `dialect`.
#[must_use]
pub fn type_names_equivalent(live: &TypeName, declared: &TypeName, dialect: Dialect) -> bool {
    if dialect == Dialect::Sqlite {
        return live.base == declared.base || sqlite_same_group(&live.base, &declared.base);
    }

    let live = live.clone().canonical(dialect);
    let declared = declared.clone().canonical(dialect);
    if live.base != declared.base {
        return false;
    }
    match (&live.params, &declared.params) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Decides whether a live type string and a declared type string denote
/// the same type on `dialect`.
#[must_use]
pub fn is_equivalent(live_type: &str, declared_type: &str, dialect: Dialect) -> bool {
    type_names_equivalent(&TypeName::parse(live_type), &TypeName::parse(declared_type), dialect)
}

/// One aspect of a column that differs from its declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChange {
    /// The live type is not equivalent to the declared one.
    Type,
    /// The live default differs from an enforceable declared default.
    Default,
    /// Primary key membership differs.
    PrimaryKey,
    /// One side has a foreign key and the other does not.
    ForeignKey,
    /// Autoincrement differs on a primary key column.
    AutoIncrement,
}

impl ColumnChange {
    /// Short label, for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Default => "default",
            Self::PrimaryKey => "primary_key",
            Self::ForeignKey => "foreign_key",
            Self::AutoIncrement => "autoincrement",
        }
    }
}

/// What differs between a live column and its declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    /// Differences found, in comparison order.
    pub changes: Vec<ColumnChange>,
}

impl ColumnDiff {
    /// Returns true when the column needs no DDL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns true if `change` is among the differences.
    #[must_use]
    pub fn has(&self, change: ColumnChange) -> bool {
        self.changes.contains(&change)
    }

    /// Short labels of what changed, for logs and reports.
    #[must_use]
    pub fn describe(&self) -> Vec<&'static str> {
        self.changes.iter().map(|c| c.as_str()).collect()
    }
}

/// Compares two canonical columns.
///
/// Nullability is not compared; autoincrement is only compared
/// when either side is a primary key.
#[must_use]
pub fn diff_canonical(live: &CanonicalColumn, declared: &CanonicalColumn, dialect: Dialect) -> ColumnDiff {
    let default_changed = match (&declared.default, &live.default) {
        (NormalizedDefault::Unenforced, _) => false,
        (declared, live) => declared != live,
    };

    let checks = [
        (
            ColumnChange::Type,
            !type_names_equivalent(&live.type_name, &declared.type_name, dialect),
        ),
        (ColumnChange::Default, default_changed),
        (ColumnChange::PrimaryKey, live.primary_key != declared.primary_key),
        (ColumnChange::ForeignKey, live.has_foreign_key != declared.has_foreign_key),
        (
            ColumnChange::AutoIncrement,
            (live.primary_key || declared.primary_key)
                && live.auto_increment != declared.auto_increment,
        ),
    ];

    ColumnDiff {
        changes: checks
            .into_iter()
            .filter_map(|(change, differs)| differs.then_some(change))
            .collect(),
    }
}

/// Compares a live column against its declaration.
#[must_use]
pub fn diff_column(
    live: &LiveColumn,
    live_has_foreign_key: bool,
    declared: &ColumnSpec,
    dialect: Dialect,
) -> ColumnDiff {
    diff_canonical(
        &CanonicalColumn::from_live(live, live_has_foreign_key),
        &CanonicalColumn::from_declared(declared, dialect),
        dialect,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, SqlType};

    fn live(name: &str, raw_type: &str, default: Option<&str>) -> LiveColumn {
        LiveColumn {
            name: name.to_string(),
            raw_type: raw_type.to_string(),
            nullable: true,
            default: default.map(str::to_string),
            primary_key: false,
            auto_increment: false,
        }
    }

    #[test]
    fn test_parse_type_names() {
        let t = TypeName::parse("VARCHAR(255)");
        assert_eq!(t.base, "VARCHAR");
        assert_eq!(t.params.as_deref(), Some("255"));

        let t = TypeName::parse("numeric(10, 2)");
        assert_eq!(t.base, "NUMERIC");
        assert_eq!(t.params.as_deref(), Some("10,2"));

        let t = TypeName::parse("timestamp(6) without time zone");
        assert_eq!(t.base, "TIMESTAMP WITHOUT TIME ZONE");
        assert_eq!(t.params.as_deref(), Some("6"));

        assert_eq!(TypeName::parse("double  precision").to_string(), "DOUBLE PRECISION");
    }

    #[test]
    fn test_sqlite_type_groups() {
        assert!(is_equivalent("VARCHAR(100)", "TEXT", Dialect::Sqlite));
        assert!(is_equivalent("DATETIME", "TEXT", Dialect::Sqlite));
        assert!(is_equivalent("BOOLEAN", "INTEGER", Dialect::Sqlite));
        assert!(is_equivalent("bigint", "INTEGER", Dialect::Sqlite));
        assert!(is_equivalent("DECIMAL(10,2)", "NUMERIC", Dialect::Sqlite));
        assert!(!is_equivalent("INTEGER", "REAL", Dialect::Sqlite));
        assert!(!is_equivalent("TEXT", "INTEGER", Dialect::Sqlite));
        assert!(!is_equivalent("BLOB", "TEXT", Dialect::Sqlite));
    }

    #[test]
    fn test_mysql_length_sensitivity() {
        assert!(!is_equivalent("varchar(100)", "VARCHAR(255)", Dialect::MySql));
        assert!(is_equivalent("varchar(255)", "VARCHAR(255)", Dialect::MySql));
        assert!(is_equivalent("int(11)", "INT", Dialect::MySql));
        assert!(is_equivalent("tinyint(1)", "TINYINT(1)", Dialect::MySql));
        assert!(is_equivalent("longtext", "JSON", Dialect::MySql));
        assert!(!is_equivalent("text", "LONGTEXT", Dialect::MySql));
        assert!(!is_equivalent("decimal(10,2)", "DECIMAL(12,2)", Dialect::MySql));
    }

    #[test]
    fn test_postgres_synonyms() {
        assert!(is_equivalent("character varying(255)", "VARCHAR(255)", Dialect::Postgres));
        assert!(is_equivalent("timestamp without time zone", "TIMESTAMP", Dialect::Postgres));
        assert!(is_equivalent("integer", "SERIAL", Dialect::Postgres));
        assert!(is_equivalent("double precision", "DOUBLE PRECISION", Dialect::Postgres));
        assert!(!is_equivalent("character varying(100)", "VARCHAR(255)", Dialect::Postgres));
        assert!(!is_equivalent("text", "VARCHAR(255)", Dialect::Postgres));
    }

    #[test]
    fn test_generic_uses_exact_comparison() {
        assert!(is_equivalent("VARCHAR", "varchar(80)", Dialect::Generic));
        assert!(!is_equivalent("CLOB", "TEXT", Dialect::Generic));
    }

    #[test]
    fn test_diff_equivalent_column() {
        let declared = ColumnSpec::new("status", SqlType::Integer).default(DefaultValue::Integer(0));
        let diff = diff_column(&live("status", "INTEGER", Some("0")), false, &declared, Dialect::Sqlite);
        assert!(diff.is_empty());
        assert!(diff.describe().is_empty());
    }

    #[test]
    fn test_diff_default_drift() {
        let declared = ColumnSpec::new("status", SqlType::Integer).default(DefaultValue::Integer(1));
        let diff = diff_column(&live("status", "INTEGER", Some("0")), false, &declared, Dialect::Sqlite);
        assert!(diff.has(ColumnChange::Default));
        assert!(!diff.has(ColumnChange::Type));
        assert_eq!(diff.describe(), vec!["default"]);
    }

    #[test]
    fn test_diff_generated_default_is_never_compared() {
        let declared = ColumnSpec::new("created_at", SqlType::DateTime)
            .default(DefaultValue::Generated("now".into()));
        let diff = diff_column(
            &live("created_at", "DATETIME", Some("CURRENT_TIMESTAMP")),
            false,
            &declared,
            Dialect::Sqlite,
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_foreign_key_presence() {
        let declared = ColumnSpec::new("mp_id", SqlType::Varchar(255)).references("feeds", "id");
        let diff = diff_column(&live("mp_id", "VARCHAR(255)", None), false, &declared, Dialect::Sqlite);
        assert!(diff.has(ColumnChange::ForeignKey));

        let plain = ColumnSpec::new("mp_id", SqlType::Varchar(255));
        let diff = diff_column(&live("mp_id", "VARCHAR(255)", None), true, &plain, Dialect::Sqlite);
        assert_eq!(diff.changes, vec![ColumnChange::ForeignKey]);
    }

    #[test]
    fn test_diff_autoincrement_only_on_keys() {
        let mut id = live("id", "INTEGER", None);
        id.primary_key = true;
        id.nullable = false;
        let declared = ColumnSpec::new("id", SqlType::Integer).primary_key().auto_increment();
        assert!(diff_column(&id, false, &declared, Dialect::Sqlite).has(ColumnChange::AutoIncrement));

        id.auto_increment = true;
        assert!(diff_column(&id, false, &declared, Dialect::Sqlite).is_empty());
    }

    #[test]
    fn test_diff_ignores_nullability() {
        let declared = ColumnSpec::new("name", SqlType::Text).not_null();
        let diff = diff_column(&live("name", "TEXT", None), false, &declared, Dialect::Sqlite);
        assert!(diff.is_empty());
    }
}
