//! Canonical column form.
//!
//! Declared columns and live columns are both reduced to a
//! [`CanonicalColumn`] before comparison. The interesting part is the
//! default: engines echo defaults back in their own syntax (`'abc'`,
//! `'abc'::character varying`, `(0)`, `current_timestamp()`), so both
//! sides are rewritten into one literal form.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::dialect::Dialect;
use crate::equivalence::TypeName;
use crate::introspect::LiveColumn;
use crate::schema::{ColumnSpec, DefaultValue};

/// Trailing PostgreSQL cast, e.g. `::character varying` or `::numeric(10,2)`.
static PG_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*?)::[A-Za-z_][A-Za-z0-9_ ]*(\([0-9, ]*\))?(\[\])?$")
        .expect("Invalid cast pattern regex")
});

const TIME_KEYWORDS: &[&str] = &["CURRENT_TIMESTAMP", "CURRENT_DATE", "CURRENT_TIME", "NOW"];

/// A default value in comparable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NormalizedDefault {
    /// Produced by the application at insert time; never compared.
    Unenforced,
    /// No default, or an explicit NULL default.
    Absent,
    /// Canonical literal text.
    Literal(String),
}

impl NormalizedDefault {
    /// Normalizes a declared default.
    #[must_use]
    pub fn from_declared(default: &DefaultValue) -> Self {
        match default {
            DefaultValue::None | DefaultValue::Null => Self::Absent,
            DefaultValue::Generated(_) => Self::Unenforced,
            DefaultValue::Bool(b) => Self::Literal(if *b { "1" } else { "0" }.to_string()),
            DefaultValue::Integer(i) => Self::Literal(i.to_string()),
            DefaultValue::Float(f) => {
                let text = f.to_string();
                Self::Literal(canonical_number(&text).unwrap_or(text))
            }
            DefaultValue::String(s) => {
                Self::Literal(canonical_number(s).unwrap_or_else(|| s.clone()))
            }
            DefaultValue::Expression(expr) => Self::from_live(Some(expr)),
        }
    }

    /// Normalizes a default as reported by the engine's catalog.
    #[must_use]
    pub fn from_live(default: Option<&str>) -> Self {
        let Some(raw) = default else {
            return Self::Absent;
        };

        let value = strip_wrapping(raw);
        if value.eq_ignore_ascii_case("NULL") {
            return Self::Absent;
        }

        if let Some(inner) = unquote(&value) {
            return Self::Literal(canonical_number(&inner).unwrap_or(inner));
        }

        if value.eq_ignore_ascii_case("true") {
            return Self::Literal("1".to_string());
        }
        if value.eq_ignore_ascii_case("false") {
            return Self::Literal("0".to_string());
        }

        let upper = value.to_ascii_uppercase();
        let keyword = upper.strip_suffix("()").unwrap_or(&upper);
        if TIME_KEYWORDS.contains(&keyword) {
            return Self::Literal(keyword.to_string());
        }

        Self::Literal(canonical_number(&value).unwrap_or(value))
    }
}

/// Strips whitespace, wrapping parentheses and PostgreSQL casts until the
/// value stops changing.
fn strip_wrapping(raw: &str) -> String {
    let mut value = raw.trim().to_string();
    loop {
        let before = value.len();

        if let Some(caps) = PG_CAST.captures(&value) {
            let inner = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            // A bare `::` inside a string literal is not a cast.
            if !inner.is_empty() && unquote(&value).is_none() {
                value = inner;
            }
        }

        if has_wrapping_parens(&value) {
            value = value[1..value.len() - 1].trim().to_string();
        }

        if value.len() == before {
            return value;
        }
    }
}

/// Whether the whole value is wrapped in one matching pair of parentheses.
fn has_wrapping_parens(value: &str) -> bool {
    if !(value.starts_with('(') && value.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != value.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Returns the content of a single-quoted SQL string literal.
fn unquote(value: &str) -> Option<String> {
    let inner = value.strip_prefix('\'')?.strip_suffix('\'')?;
    // `'a' || 'b'` starts and ends with quotes but is not one literal.
    if inner.replace("''", "").contains('\'') {
        return None;
    }
    Some(inner.replace("''", "'"))
}

/// Canonical text of a numeric literal: `1.50` and `1.5` agree, `0.0`
/// and `0` agree.
fn canonical_number(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(i) = value.parse::<i64>() {
        return Some(i.to_string());
    }
    let f = value.parse::<f64>().ok().filter(|f| f.is_finite())?;
    // Reject things Rust parses but SQL would not call a number.
    if !value.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
        return None;
    }
    if f == 0.0 {
        return Some("0".to_string());
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return Some(format!("{f:.0}"));
    }
    Some(f.to_string())
}

/// A column reduced to the attributes reconciliation compares.
///
/// Nullability is not part of it: it is never reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalColumn {
    /// Column name.
    pub name: String,
    /// Parsed type. Declared types are spelled as the DDL generator writes them.
    pub type_name: TypeName,
    /// Comparable default.
    pub default: NormalizedDefault,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Whether the engine generates values for the column.
    pub auto_increment: bool,
    /// Whether the column carries a foreign key.
    pub has_foreign_key: bool,
}

impl CanonicalColumn {
    /// Canonical form of a declared column, with the type spelled as the
    /// DDL generator for `dialect` would write it.
    #[must_use]
    pub fn from_declared(column: &ColumnSpec, dialect: Dialect) -> Self {
        Self {
            name: column.name.clone(),
            type_name: TypeName::parse(&dialect.ddl().type_name(&column.sql_type)),
            default: NormalizedDefault::from_declared(&column.default),
            primary_key: column.primary_key,
            auto_increment: column.is_auto_increment_key(),
            has_foreign_key: column.foreign_key.is_some(),
        }
    }

    /// Canonical form of a live column.
    #[must_use]
    pub fn from_live(column: &LiveColumn, has_foreign_key: bool) -> Self {
        Self {
            name: column.name.clone(),
            type_name: TypeName::parse(&column.raw_type),
            default: NormalizedDefault::from_live(column.default.as_deref()),
            primary_key: column.primary_key,
            auto_increment: column.auto_increment,
            has_foreign_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;

    fn live(value: &str) -> NormalizedDefault {
        NormalizedDefault::from_live(Some(value))
    }

    fn literal(value: &str) -> NormalizedDefault {
        NormalizedDefault::Literal(value.to_string())
    }

    #[test]
    fn test_declared_defaults() {
        assert_eq!(NormalizedDefault::from_declared(&DefaultValue::None), NormalizedDefault::Absent);
        assert_eq!(NormalizedDefault::from_declared(&DefaultValue::Null), NormalizedDefault::Absent);
        assert_eq!(
            NormalizedDefault::from_declared(&DefaultValue::Generated("now".into())),
            NormalizedDefault::Unenforced
        );
        assert_eq!(NormalizedDefault::from_declared(&DefaultValue::Bool(true)), literal("1"));
        assert_eq!(NormalizedDefault::from_declared(&DefaultValue::Float(2.0)), literal("2"));
        assert_eq!(
            NormalizedDefault::from_declared(&DefaultValue::String("/static/a.png".into())),
            literal("/static/a.png")
        );
        assert_eq!(
            NormalizedDefault::from_declared(&DefaultValue::Expression("current_timestamp".into())),
            literal("CURRENT_TIMESTAMP")
        );
    }

    #[test]
    fn test_live_sqlite_defaults() {
        assert_eq!(live("NULL"), NormalizedDefault::Absent);
        assert_eq!(live("'unnamed'"), literal("unnamed"));
        assert_eq!(live("'it''s'"), literal("it's"));
        assert_eq!(live("''"), literal(""));
        assert_eq!(live("0"), literal("0"));
        assert_eq!(live("'0'"), literal("0"));
        assert_eq!(live("1.50"), literal("1.5"));
        assert_eq!(live("-0.0"), literal("0"));
        assert_eq!(live("1e3"), literal("1000"));
    }

    #[test]
    fn test_live_mysql_defaults() {
        assert_eq!(live("abc"), literal("abc"));
        assert_eq!(live("current_timestamp()"), literal("CURRENT_TIMESTAMP"));
        assert_eq!(live("CURRENT_TIMESTAMP"), literal("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_live_postgres_defaults() {
        assert_eq!(live("'abc'::character varying"), literal("abc"));
        assert_eq!(live("true"), literal("1"));
        assert_eq!(live("'-1'::integer"), literal("-1"));
        assert_eq!(live("(0)"), literal("0"));
        assert_eq!(live("'1.50'::numeric(10,2)"), literal("1.5"));
        assert_eq!(live("now()"), literal("NOW"));
        assert_eq!(live("NULL::character varying"), NormalizedDefault::Absent);
    }

    #[test]
    fn test_string_containing_cast_marker_is_kept() {
        assert_eq!(live("'a::b'"), literal("a::b"));
    }

    #[test]
    fn test_canonical_column_from_declared() {
        let column = ColumnSpec::new("title", SqlType::Varchar(255)).not_null();
        let canonical = CanonicalColumn::from_declared(&column, Dialect::Postgres);
        assert_eq!(canonical.type_name.to_string(), "VARCHAR(255)");
        assert_eq!(canonical.default, NormalizedDefault::Absent);

        let canonical = CanonicalColumn::from_declared(&column, Dialect::Sqlite);
        assert_eq!(canonical.type_name.to_string(), "TEXT");
    }
}
