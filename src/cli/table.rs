//! Table transfer CLI commands
//!
//! CSV export and import for any table of the clinic database.

use std::path::PathBuf;

use clap::Subcommand;

use super::Session;
use crate::audit::Operation;
use crate::error::VaultResult;
use crate::tables::{CsvArtifact, SchemaReflector, TableExporter, TableImporter};

/// Table subcommands
#[derive(Subcommand)]
pub enum TableCommands {
    /// List the tables of the clinic database
    List,

    /// Show the column order of a table
    Columns {
        /// Table name
        table: String,
    },

    /// Export a table to CSV
    Export {
        /// Table name
        table: String,

        /// Write here instead of the exports directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export patients, appointments, invoices and doctors
    ExportAll,

    /// Import a CSV file into a table (all rows or none)
    Import {
        /// Table name
        table: String,

        /// CSV file whose header names the columns
        file: PathBuf,
    },
}

/// Handle a table command
pub fn handle_table_command(session: &Session, cmd: TableCommands) -> VaultResult<()> {
    match cmd {
        TableCommands::List => {
            for table in SchemaReflector::new(&session.store).tables()? {
                println!("{}", table);
            }
        }

        TableCommands::Columns { table } => {
            let schema = SchemaReflector::new(&session.store).schema(&table)?;
            println!("{}: {}", schema.table, schema.columns.join(", "));
        }

        TableCommands::Export { table, output } => {
            let exporter = TableExporter::new(&session.store, session.paths.export_dir());
            let result = match output {
                Some(dest) => exporter.export_to(&table, &dest),
                None => exporter.export(&table),
            };
            let artifact = session.record(Operation::Export, result, describe_export)?;
            println!("{}", describe_export(&artifact));
        }

        TableCommands::ExportAll => {
            let exporter = TableExporter::new(&session.store, session.paths.export_dir());
            let artifacts = session.record(Operation::Export, exporter.export_all(), |all| {
                format!("Exported {} tables", all.len())
            })?;
            for artifact in &artifacts {
                println!("{}", describe_export(artifact));
            }
        }

        TableCommands::Import { table, file } => {
            let importer = TableImporter::new(&session.store, &session.store);
            let report = session.record(Operation::Import, importer.import(&table, &file), |r| {
                format!(
                    "Imported {} rows into {} from {}",
                    r.rows_committed,
                    r.table,
                    r.source.display()
                )
            })?;
            println!(
                "Imported {} row(s) into {}",
                report.rows_committed, report.table
            );
        }
    }

    Ok(())
}

fn describe_export(artifact: &CsvArtifact) -> String {
    format!(
        "Exported {} rows from {} to {}",
        artifact.row_count,
        artifact.table,
        artifact.path.display()
    )
}
