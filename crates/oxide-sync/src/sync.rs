//! Synchronization orchestrator.
//!
//! For each declared table: create it if it is missing, otherwise walk the
//! declared columns and add, alter or leave each one. Every table ends in
//! SYNCED or SKIPPED_FAILED; a failing table never stops the pass.

use chrono::Utc;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, error, info};

use crate::dialect::Dialect;
use crate::equivalence::diff_column;
use crate::error::{mask_url, Result, SyncError};
use crate::introspect::{Introspector, LiveTable};
use crate::rebuild::rebuild_table_with_altered_column;
use crate::report::{ColumnReport, Decision, SyncReport, TableOutcome, TableReport};
use crate::schema::{ColumnSpec, TableSpec};

/// Options for a synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Send every existing column through the ALTER path, equivalent or not.
    pub force_update: bool,
    /// Plan statements without executing them.
    pub dry_run: bool,
}

/// Reconciles declared tables against a live database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaSync {
    options: SyncOptions,
}

impl SchemaSync {
    /// Creates a synchronizer with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a synchronizer with the given options.
    #[must_use]
    pub const fn with_options(options: SyncOptions) -> Self {
        Self { options }
    }

    /// Enables forced ALTER of every existing column.
    #[must_use]
    pub const fn force_update(mut self, enabled: bool) -> Self {
        self.options.force_update = enabled;
        self
    }

    /// Enables dry-run mode (statements are planned but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> SyncOptions {
        self.options
    }

    /// Opens a connection and checks that the database answers.
    ///
    /// This is the one fatal failure: without a connection nothing can be
    /// reconciled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connection`], with the password masked, if the
    /// database cannot be reached.
    pub async fn connect(url: &str) -> Result<AnyConnection> {
        sqlx::any::install_default_drivers();

        let fail = |source: sqlx::Error| SyncError::Connection {
            url: mask_url(url),
            source,
        };
        let mut conn = AnyConnection::connect(url).await.map_err(fail)?;
        sqlx::query("SELECT 1").execute(&mut conn).await.map_err(fail)?;

        info!(
            url = %mask_url(url),
            backend = conn.backend_name(),
            "Connected to database"
        );
        Ok(conn)
    }

    /// Runs one synchronization pass over `tables`, in order.
    pub async fn run(&self, conn: &mut AnyConnection, tables: &[TableSpec]) -> SyncReport {
        let started_at = Utc::now();
        let dialect = Dialect::resolve(conn.backend_name());
        info!(
            dialect = %dialect,
            tables = tables.len(),
            force_update = self.options.force_update,
            dry_run = self.options.dry_run,
            "Starting schema synchronization"
        );

        let mut reports = Vec::with_capacity(tables.len());
        for table in tables {
            let mut report = TableReport::new(&table.name);
            match self.sync_table(conn, dialect, table, &mut report).await {
                Ok(()) => info!(table = %table.name, "Table synchronized"),
                Err(e) => {
                    let column = report.columns.last().map_or("", |c| c.column.as_str());
                    error!(
                        table = %table.name,
                        column,
                        error = %e,
                        "Table synchronization failed, skipping"
                    );
                    report.outcome = TableOutcome::SkippedFailed {
                        reason: e.to_string(),
                    };
                }
            }
            reports.push(report);
        }

        let report = SyncReport {
            dialect,
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            tables: reports,
        };
        info!(
            synced = report.tables.iter().filter(|t| t.succeeded()).count(),
            failed = report.failed_tables().count(),
            "Schema synchronization finished"
        );
        report
    }

    async fn sync_table(
        &self,
        conn: &mut AnyConnection,
        dialect: Dialect,
        table: &TableSpec,
        report: &mut TableReport,
    ) -> Result<()> {
        table.validate()?;
        let ddl = dialect.ddl();

        let Some(live) = Introspector::new(dialect).load_table(conn, &table.name).await? else {
            info!(
                table = %table.name,
                decision = %Decision::CreateTable,
                "Table missing, creating"
            );
            report.columns.extend(table.columns.iter().map(|c| ColumnReport {
                column: c.name.clone(),
                decision: Decision::CreateTable,
                changes: Vec::new(),
            }));
            return self.apply(conn, &table.name, vec![ddl.create_table(table)], report).await;
        };

        for column in &table.columns {
            let Some(current) = live.column(&column.name) else {
                info!(
                    table = %table.name,
                    column = %column.name,
                    decision = %Decision::AddColumn,
                    "Adding column"
                );
                report.columns.push(ColumnReport {
                    column: column.name.clone(),
                    decision: Decision::AddColumn,
                    changes: Vec::new(),
                });
                let statements = ddl.add_column(&table.name, column);
                self.apply(conn, &table.name, statements, report).await?;
                continue;
            };

            let diff = diff_column(current, live.has_foreign_key(&column.name), column, dialect);
            if diff.is_empty() && !self.options.force_update {
                debug!(
                    table = %table.name,
                    column = %column.name,
                    decision = %Decision::NoAction,
                    "Column up to date"
                );
                report.columns.push(ColumnReport {
                    column: column.name.clone(),
                    decision: Decision::NoAction,
                    changes: Vec::new(),
                });
                continue;
            }

            let changes: Vec<String> = if diff.is_empty() {
                vec!["forced".to_string()]
            } else {
                diff.describe().into_iter().map(String::from).collect()
            };
            info!(
                table = %table.name,
                column = %column.name,
                decision = %Decision::AlterColumn,
                changes = %changes.join(","),
                "Altering column"
            );
            report.columns.push(ColumnReport {
                column: column.name.clone(),
                decision: Decision::AlterColumn,
                changes,
            });
            self.alter(conn, dialect, &live, column, report).await?;
        }

        Ok(())
    }

    async fn alter(
        &self,
        conn: &mut AnyConnection,
        dialect: Dialect,
        live: &LiveTable,
        column: &ColumnSpec,
        report: &mut TableReport,
    ) -> Result<()> {
        if dialect.rebuilds_on_alter() && !self.options.dry_run {
            let statements = rebuild_table_with_altered_column(conn, &live.name, column).await?;
            report.statements.extend(statements);
            return Ok(());
        }

        let statements = dialect.ddl().alter_column(live, column)?;
        self.apply(conn, &live.name, statements, report).await
    }

    /// Executes `statements` in one transaction, or only records them in a
    /// dry run.
    async fn apply(
        &self,
        conn: &mut AnyConnection,
        table: &str,
        statements: Vec<String>,
        report: &mut TableReport,
    ) -> Result<()> {
        if !self.options.dry_run {
            execute_in_transaction(conn, table, &statements).await?;
        }
        report.statements.extend(statements);
        Ok(())
    }
}

/// Runs `statements` inside one transaction: all of them commit or none do.
///
/// MySQL commits implicitly around each DDL statement, so there the
/// transaction only groups the statements.
///
/// # Errors
///
/// Returns [`SyncError::Ddl`] for the first statement the database rejects,
/// or the driver error if the transaction cannot be opened or committed.
pub async fn execute_in_transaction(
    conn: &mut AnyConnection,
    table: &str,
    statements: &[String],
) -> Result<()> {
    let mut tx = conn.begin().await?;

    for sql in statements {
        debug!(table, sql = %sql, "Executing SQL");
        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::ddl(table, sql, e))?;
    }

    tx.commit().await?;
    Ok(())
}

/// Synchronizes `tables` against the database behind `conn`.
///
/// With `force_update`, every existing column goes through the ALTER path
/// even when it already matches.
pub async fn synchronize(
    conn: &mut AnyConnection,
    tables: &[TableSpec],
    force_update: bool,
) -> SyncReport {
    SchemaSync::with_options(SyncOptions {
        force_update,
        dry_run: false,
    })
    .run(conn, tables)
    .await
}
