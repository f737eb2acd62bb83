//! CSV to table import
//!
//! The header row names the target columns. It may list any subset of the
//! table's columns in any order, but every name must exist in the table and
//! appear once. Rows go in as one transaction: all of them or none.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::reflect::{ColumnType, InsertCapability, QueryCapability, SchemaReflector, TableSchema};
use crate::error::{VaultError, VaultResult};

/// Result of a committed import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub table: String,
    pub source: PathBuf,
    pub columns: Vec<String>,
    pub rows_committed: usize,
}

/// Loads CSV artifacts into tables of the store
pub struct TableImporter<'a> {
    source: &'a dyn QueryCapability,
    sink: &'a dyn InsertCapability,
}

impl<'a> TableImporter<'a> {
    /// Create an importer reflecting schemas from `source` and writing to `sink`
    pub fn new(source: &'a dyn QueryCapability, sink: &'a dyn InsertCapability) -> Self {
        Self { source, sink }
    }

    /// Import `csv_path` into `table`
    ///
    /// Fields are bound according to the declared column types (see
    /// [`ColumnType::parse_field`]). CSV cannot tell NULL from an empty
    /// string: an empty field is NULL unless the column is `NOT NULL` text.
    pub fn import(&self, table: &str, csv_path: &Path) -> VaultResult<ImportReport> {
        let schema = SchemaReflector::new(self.source)
            .schema(table)
            .map_err(|e| match e {
                VaultError::NotFound { identifier, .. } => {
                    VaultError::ImportSchema(format!("Unknown table: {}", identifier))
                }
                other => other,
            })?;

        let file = File::open(csv_path).map_err(|e| {
            VaultError::Io(format!("Failed to open {}: {}", csv_path.display(), e))
        })?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| VaultError::ImportSchema(format!("Unreadable header row: {}", e)))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        let positions = match_header(&schema, &header)?;
        let columns: Vec<String> = positions.iter().map(|&i| schema.columns[i].clone()).collect();
        let types: Vec<ColumnType> = positions.iter().map(|&i| schema.types[i]).collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                VaultError::ImportSchema(format!("Malformed CSV at row {}: {}", index + 1, e))
            })?;
            rows.push(
                record
                    .iter()
                    .zip(&types)
                    .map(|(field, column)| column.parse_field(field))
                    .collect::<Vec<_>>(),
            );
        }

        let rows_committed = if rows.is_empty() {
            0
        } else {
            self.sink
                .insert_all(&schema.table, &columns, &rows)
                .map_err(|e| {
                    warn!(table = %schema.table, error = %e, "import rolled back");
                    e
                })?
        };

        info!(
            table = %schema.table,
            rows = rows_committed,
            path = %csv_path.display(),
            "import committed"
        );

        Ok(ImportReport {
            table: schema.table,
            source: csv_path.to_path_buf(),
            columns,
            rows_committed,
        })
    }
}

/// Positions of the header names in the table's columns, in header order
fn match_header(schema: &TableSchema, header: &[String]) -> VaultResult<Vec<usize>> {
    if header.is_empty() || header.iter().all(|name| name.is_empty()) {
        return Err(VaultError::ImportSchema(
            "CSV file has no header row".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(position, name)| {
            if name.is_empty() {
                return Err(VaultError::ImportSchema(format!(
                    "Blank column name at position {}",
                    position + 1
                )));
            }

            let position = schema.position(name).ok_or_else(|| {
                VaultError::ImportSchema(format!(
                    "Column '{}' does not exist in table '{}'",
                    name, schema.table
                ))
            })?;

            if !seen.insert(position) {
                return Err(VaultError::ImportSchema(format!(
                    "Column '{}' appears more than once",
                    name
                )));
            }

            Ok(position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::PrimaryStore;
    use crate::tables::TableExporter;
    use std::fs;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> PrimaryStore {
        PrimaryStore::open(dir.path().join("clinic.db")).unwrap()
    }

    fn patient_count(store: &PrimaryStore) -> i64 {
        store
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM patients", [], |row| row.get(0))?)
            })
            .unwrap()
    }

    fn write_csv(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("input.csv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_subset_header() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let csv = write_csv(&dir, "name,age\nAnn,34\nBob,\n");

        let report = TableImporter::new(&store, &store)
            .import("patients", &csv)
            .unwrap();

        assert_eq!(report.rows_committed, 2);
        assert_eq!(report.columns, vec!["name", "age"]);
        assert_eq!(patient_count(&store), 2);

        let bob_age: Option<i64> = store
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT age FROM patients WHERE name = 'Bob'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(bob_age, None);
    }

    #[test]
    fn test_import_header_only_is_empty_success() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let csv = write_csv(&dir, "name,age\n");

        let report = TableImporter::new(&store, &store)
            .import("patients", &csv)
            .unwrap();

        assert_eq!(report.rows_committed, 0);
        assert_eq!(patient_count(&store), 0);
    }

    #[test]
    fn test_import_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let csv = write_csv(&dir, "");

        let err = TableImporter::new(&store, &store)
            .import("patients", &csv)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportSchemaError);
    }

    #[test]
    fn test_import_rejects_unknown_and_duplicate_columns() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let importer = TableImporter::new(&store, &store);

        let csv = write_csv(&dir, "name,shoe_size\nAnn,9\n");
        let err = importer.import("patients", &csv).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportSchemaError);
        assert!(err.to_string().contains("shoe_size"));

        let csv = write_csv(&dir, "name,NAME\nAnn,Ann\n");
        let err = importer.import("patients", &csv).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportSchemaError);

        assert_eq!(patient_count(&store), 0);
    }

    #[test]
    fn test_import_unknown_table() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let csv = write_csv(&dir, "name\nAnn\n");

        let err = TableImporter::new(&store, &store)
            .import("ghosts", &csv)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportSchemaError);
    }

    #[test]
    fn test_import_ragged_row_imports_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let csv = write_csv(&dir, "name,age\nAnn,34\nBob\n");

        let err = TableImporter::new(&store, &store)
            .import("patients", &csv)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportSchemaError);
        assert_eq!(patient_count(&store), 0);
    }

    #[test]
    fn test_import_key_collision_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let importer = TableImporter::new(&store, &store);

        importer
            .import("patients", &write_csv(&dir, "id,name\n1,Ann\n"))
            .unwrap();

        let csv = write_csv(&dir, "id,name\n2,Bob\n1,Clash\n3,Cy\n");
        let err = importer.import("patients", &csv).unwrap_err();

        assert!(matches!(err, VaultError::ImportInsert { row: Some(2), .. }));
        assert_eq!(patient_count(&store), 1);
    }

    #[test]
    fn test_export_then_import_reproduces_rows() {
        let source_dir = TempDir::new().unwrap();
        let source = open_store(&source_dir);
        TableImporter::new(&source, &source)
            .import(
                "patients",
                &write_csv(
                    &source_dir,
                    "name,age,address\nAnn,34,\"1 Main St, Springfield\"\nBob,51,\"two\nlines\"\nCy,7,\n",
                ),
            )
            .unwrap();

        let artifact = TableExporter::new(&source, source_dir.path().join("exports"))
            .export("patients")
            .unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = open_store(&target_dir);
        let report = TableImporter::new(&target, &target)
            .import("patients", &artifact.path)
            .unwrap();
        assert_eq!(report.rows_committed, 3);

        let read = |store: &PrimaryStore| {
            store
                .with_connection(|conn| {
                    let mut stmt = conn
                        .prepare("SELECT id, name, age, address FROM patients ORDER BY id")?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, i64>(2)?,
                                row.get::<_, Option<String>>(3)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .unwrap()
        };

        assert_eq!(read(&source), read(&target));
    }

    #[test]
    fn test_round_trip_keeps_blob_and_untyped_values() {
        const SCANS: &str = "CREATE TABLE scans (
            id INTEGER PRIMARY KEY,
            image BLOB,
            tag,
            label TEXT NOT NULL,
            note TEXT
        )";

        let read = |store: &PrimaryStore| {
            store
                .with_connection(|conn| {
                    let mut stmt = conn.prepare(
                        "SELECT typeof(image), coalesce(hex(image), ''), typeof(tag), quote(tag), \
                                typeof(label), quote(label), typeof(note) \
                         FROM scans ORDER BY id",
                    )?;
                    let rows = stmt
                        .query_map([], |row| {
                            (0..7)
                                .map(|i| row.get::<_, String>(i))
                                .collect::<Result<Vec<_>, _>>()
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .unwrap()
        };

        let source_dir = TempDir::new().unwrap();
        let source = open_store(&source_dir);
        source
            .with_connection(|conn| {
                conn.execute_batch(SCANS)?;
                conn.execute_batch(
                    "INSERT INTO scans VALUES (1, x'00ff10', 5, '', NULL);
                     INSERT INTO scans VALUES (2, NULL, 2.5, 'knee', 'follow up');
                     INSERT INTO scans VALUES (3, x'', 'left', 'hip', NULL);",
                )?;
                Ok(())
            })
            .unwrap();

        let artifact = TableExporter::new(&source, source_dir.path().join("exports"))
            .export("scans")
            .unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = open_store(&target_dir);
        target
            .with_connection(|conn| Ok(conn.execute_batch(SCANS)?))
            .unwrap();
        TableImporter::new(&target, &target)
            .import("scans", &artifact.path)
            .unwrap();

        let copied = read(&target);
        assert_eq!(
            copied[0],
            vec!["blob", "00FF10", "integer", "5", "text", "''", "null"]
        );
        assert_eq!(copied[1][2..4], ["real".to_string(), "2.5".to_string()]);
        assert_eq!(copied[2][2..4], ["text".to_string(), "'left'".to_string()]);
        assert_eq!(read(&source)[..2], copied[..2]);
    }
}
