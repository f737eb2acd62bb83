//! Table to CSV export
//!
//! Artifacts are named `<table>_<YYYYMMDD_HHMMSS>.csv`. The file is written
//! to a staging path and renamed into place, so an artifact is either
//! complete or absent.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use super::reflect::{QueryCapability, SchemaReflector, Value};
use crate::error::{VaultError, VaultResult};
use crate::storage::file_io::{commit_staged, stage_file, unique_path, STAMP_FORMAT};
use crate::storage::DOMAIN_TABLES;

/// A finished CSV export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvArtifact {
    pub path: PathBuf,
    pub table: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// Writes tables of the store out as CSV artifacts
pub struct TableExporter<'a> {
    source: &'a dyn QueryCapability,
    export_dir: PathBuf,
}

impl<'a> TableExporter<'a> {
    /// Create an exporter writing into `export_dir`
    pub fn new(source: &'a dyn QueryCapability, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            export_dir: export_dir.into(),
        }
    }

    /// Export one table under a fresh timestamped name
    pub fn export(&self, table: &str) -> VaultResult<CsvArtifact> {
        let stamp = Local::now().format(STAMP_FORMAT).to_string();
        self.export_stamped(table, &stamp)
    }

    /// Export the clinic tables with one shared timestamp
    ///
    /// Stops at the first failure; artifacts already written are kept.
    pub fn export_all(&self) -> VaultResult<Vec<CsvArtifact>> {
        let stamp = Local::now().format(STAMP_FORMAT).to_string();
        DOMAIN_TABLES
            .iter()
            .map(|table| self.export_stamped(table, &stamp))
            .collect()
    }

    fn export_stamped(&self, table: &str, stamp: &str) -> VaultResult<CsvArtifact> {
        let stem = format!("{}_{}", table, stamp);
        let dest = unique_path(&self.export_dir, &stem, "csv");
        self.export_to(table, &dest)
    }

    /// Export one table to an explicit destination
    ///
    /// An existing file at `dest` is only replaced once the new one is complete.
    pub fn export_to(&self, table: &str, dest: &Path) -> VaultResult<CsvArtifact> {
        let data = SchemaReflector::new(self.source)
            .read(table)
            .map_err(into_export_error)?;

        let staged = stage_file(dest, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(&data.schema.columns)?;
            for row in &data.rows {
                writer.write_record(row.iter().map(Value::render))?;
            }
            writer.flush()
        })
        .map_err(into_export_error)?;
        commit_staged(&staged, dest).map_err(into_export_error)?;

        info!(
            table = %data.schema.table,
            rows = data.rows.len(),
            path = %dest.display(),
            "table exported"
        );

        Ok(CsvArtifact {
            path: dest.to_path_buf(),
            table: data.schema.table,
            columns: data.schema.columns,
            row_count: data.rows.len(),
        })
    }
}

fn into_export_error(err: VaultError) -> VaultError {
    match err {
        VaultError::Export(_) => err,
        other => VaultError::Export(other.to_string()),
    }
}
