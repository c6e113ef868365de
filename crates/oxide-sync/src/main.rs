//! oxide-sync CLI
//!
//! Command-line tool for synchronizing a database schema with declared tables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::AnyConnection;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::prelude::*;
use oxide_sync::{load_tables, models};

/// Additive schema synchronization for SQLite, MySQL and PostgreSQL.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (sqlite:, mysql:// or postgres://).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3?mode=rwc")]
    database: String,

    /// JSON file with the declared tables (built-in application tables if not specified).
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the database in line with the declared tables.
    Sync {
        /// Send every existing column through ALTER, even when it matches.
        #[arg(short, long)]
        force: bool,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the SQL a sync would execute.
    Plan {
        /// Plan as if every existing column had drifted.
        #[arg(short, long)]
        force: bool,
    },

    /// Show the live columns, keys and indexes of a table.
    Inspect {
        /// Table name.
        table: String,
    },

    /// Print the built-in application tables as JSON.
    Models,
}

fn declared_tables(schema: Option<&Path>) -> anyhow::Result<Vec<TableSpec>> {
    match schema {
        Some(path) => load_tables(path)
            .with_context(|| format!("Failed to read schema file {}", path.display())),
        None => Ok(models::application_tables()),
    }
}

fn print_report(report: &SyncReport) {
    for table in &report.tables {
        match &table.outcome {
            TableOutcome::Synced => println!("{}: SYNCED", table.table),
            TableOutcome::SkippedFailed { reason } => {
                println!("{}: SKIPPED_FAILED ({reason})", table.table);
            }
        }
        for column in table.changed_columns() {
            if column.changes.is_empty() {
                println!("  {} {}", column.decision, column.column);
            } else {
                println!(
                    "  {} {} [{}]",
                    column.decision,
                    column.column,
                    column.changes.join(", ")
                );
            }
        }
    }
}

fn print_live_table(live: &LiveTable, dialect: Dialect) {
    println!("{} ({dialect})", live.name);
    for column in &live.columns {
        let mut flags = Vec::new();
        if column.primary_key {
            flags.push("PK".to_string());
        }
        if column.auto_increment {
            flags.push("AUTOINCREMENT".to_string());
        }
        flags.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            flags.push(format!("DEFAULT {default}"));
        }
        println!("  {:<24} {:<24} {}", column.name, column.raw_type, flags.join(" "));
    }
    for fk in &live.foreign_keys {
        println!(
            "  FOREIGN KEY ({}) REFERENCES {} ({})",
            fk.column,
            fk.references_table,
            fk.references_column.as_deref().unwrap_or("<primary key>")
        );
    }
    for columns in &live.unique_constraints {
        println!("  UNIQUE ({})", columns.join(", "));
    }
    for index in &live.indexes {
        println!("  {index}");
    }
}

async fn run_sync(
    conn: &mut AnyConnection,
    tables: &[TableSpec],
    options: SyncOptions,
    json: bool,
) -> anyhow::Result<()> {
    if options.dry_run {
        info!("Dry run mode - SQL will be printed but not executed.");
    }
    let report = SchemaSync::with_options(options).run(conn, tables).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if options.dry_run {
            for sql in report.statements() {
                println!("{sql};");
            }
        }
        print_report(&report);
    }

    if !report.is_success() {
        bail!(
            "{} of {} tables failed to synchronize",
            report.failed_tables().count(),
            report.tables.len()
        );
    }
    Ok(())
}

async fn run_plan(conn: &mut AnyConnection, tables: &[TableSpec], force: bool) {
    let report = SchemaSync::new()
        .dry_run(true)
        .force_update(force)
        .run(conn, tables)
        .await;

    if report.statements().next().is_none() {
        info!("Schema is up to date.");
    }
    for sql in report.statements() {
        println!("{sql};");
    }
    for table in report.failed_tables() {
        warn!(table = %table.table, "Could not plan table");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if matches!(cli.command, Commands::Models) {
        println!("{}", serde_json::to_string_pretty(&models::application_tables())?);
        return Ok(());
    }

    let tables = declared_tables(cli.schema.as_deref())?;
    let mut conn = SchemaSync::connect(&cli.database).await?;

    match cli.command {
        Commands::Sync {
            force,
            dry_run,
            json,
        } => {
            let options = SyncOptions {
                force_update: force,
                dry_run,
            };
            run_sync(&mut conn, &tables, options, json).await?;
        }
        Commands::Plan { force } => run_plan(&mut conn, &tables, force).await,
        Commands::Inspect { table } => {
            let dialect = Dialect::resolve(conn.backend_name());
            let Some(live) = Introspector::new(dialect).load_table(&mut conn, &table).await? else {
                bail!("Table '{table}' does not exist");
            };
            print_live_table(&live, dialect);
        }
        Commands::Models => {}
    }

    Ok(())
}
