//! Outcome of a synchronization pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dialect::Dialect;

/// What the orchestrator decided for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// The whole table was missing and got created.
    CreateTable,
    /// The column was missing from the live table.
    AddColumn,
    /// The column exists but differs from its declaration.
    AlterColumn,
    /// The column already matches.
    NoAction,
}

impl Decision {
    /// Returns the decision name as logged.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTable => "CREATE_TABLE",
            Self::AddColumn => "ADD_COLUMN",
            Self::AlterColumn => "ALTER_COLUMN",
            Self::NoAction => "NO_ACTION",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableOutcome {
    /// Every column of the table was reconciled.
    Synced,
    /// The table was abandoned after an error; later tables still ran.
    SkippedFailed {
        /// Error that stopped the table.
        reason: String,
    },
}

/// Decision taken for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    /// Column name.
    pub column: String,
    /// What was done to the column.
    pub decision: Decision,
    /// What differed, for `ALTER_COLUMN`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,
}

/// Everything that happened to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Table name.
    pub table: String,
    /// Terminal state of the table.
    pub outcome: TableOutcome,
    /// Columns processed before the table finished or failed.
    pub columns: Vec<ColumnReport>,
    /// Statements executed, or planned in a dry run.
    pub statements: Vec<String>,
}

impl TableReport {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            outcome: TableOutcome::Synced,
            columns: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Returns true if the table reached `SYNCED`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == TableOutcome::Synced
    }

    /// Columns that required DDL.
    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnReport> {
        self.columns.iter().filter(|c| c.decision != Decision::NoAction)
    }
}

/// Result of one synchronization pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Dialect the connection was classified as.
    pub dialect: Dialect,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the last table finished.
    pub finished_at: DateTime<Utc>,
    /// Whether statements were only planned.
    pub dry_run: bool,
    /// One entry per declared table, in declaration order.
    pub tables: Vec<TableReport>,
}

impl SyncReport {
    /// Returns true if every table reached `SYNCED`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tables.iter().all(TableReport::succeeded)
    }

    /// Gets the report of a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Tables that ended in `SKIPPED_FAILED`.
    pub fn failed_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| !t.succeeded())
    }

    /// All statements of the pass, in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|t| t.statements.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<TableOutcome>) -> SyncReport {
        let now = Utc::now();
        SyncReport {
            dialect: Dialect::Sqlite,
            started_at: now,
            finished_at: now,
            dry_run: false,
            tables: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| TableReport {
                    outcome,
                    ..TableReport::new(&format!("t{i}"))
                })
                .collect(),
        }
    }

    #[test]
    fn test_success_requires_every_table() {
        assert!(report(vec![TableOutcome::Synced, TableOutcome::Synced]).is_success());

        let partial = report(vec![
            TableOutcome::Synced,
            TableOutcome::SkippedFailed {
                reason: "boom".to_string(),
            },
        ]);
        assert!(!partial.is_success());
        assert!(partial.table("t0").unwrap().succeeded());
        assert_eq!(partial.failed_tables().count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut report = report(vec![TableOutcome::SkippedFailed {
            reason: "boom".to_string(),
        }]);
        report.tables[0].columns.push(ColumnReport {
            column: "id".to_string(),
            decision: Decision::NoAction,
            changes: Vec::new(),
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dialect"], "sqlite");
        assert_eq!(json["tables"][0]["outcome"]["status"], "SKIPPED_FAILED");
        assert_eq!(json["tables"][0]["outcome"]["reason"], "boom");
        assert_eq!(json["tables"][0]["columns"][0]["decision"], "NO_ACTION");
        assert!(json["tables"][0]["columns"][0].get("changes").is_none());
    }
}
