//! SQLite-backed primary store
//!
//! The store owns its single connection behind a mutex. Snapshots and swaps
//! take that mutex for their whole duration, so no query or insert can
//! interleave with a lifecycle step.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

use super::file_io::{commit_staged, discard, stage_file};
use super::schema;
use crate::error::{VaultError, VaultResult};
use crate::tables::reflect::quote_ident;
use crate::tables::{InsertCapability, QueryCapability, QueryResult, Value};

/// Files SQLite may keep next to the database
pub(crate) const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// The single file-backed clinic database
pub struct PrimaryStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for PrimaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PrimaryStore {
    /// Open (or create) the store at `path`
    ///
    /// A brand-new database gets the clinic schema.
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = open_connection(&path)?;
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> VaultResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::Store("primary store lock poisoned".into()))
    }

    /// Run `f` against the open connection while holding the store lock
    pub fn with_connection<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&Connection) -> VaultResult<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(closed)?;
        f(conn)
    }

    /// Copy the database file byte-for-byte to `dest`
    ///
    /// The copy is staged next to `dest` and renamed into place, so `dest`
    /// either holds the complete snapshot or does not exist. Returns the
    /// snapshot size in bytes.
    pub fn snapshot_to(&self, dest: &Path) -> VaultResult<u64> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(closed)?;

        // Fold any WAL content into the main file before copying it.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;

        let mut source = File::open(&self.path).map_err(|e| {
            VaultError::Io(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        let staged = stage_file(dest, |writer| io::copy(&mut source, writer).map(|_| ()))?;
        commit_staged(&staged, dest)?;

        let size = fs::metadata(dest)?.len();
        debug!(dest = %dest.display(), size, "snapshot copied");
        Ok(size)
    }

    /// Replace the database file with an already staged file
    ///
    /// The connection is closed, the staged file renamed over the database,
    /// leftover journal files removed and the connection reopened. If the
    /// rename fails the old database stays in place and is reopened.
    pub fn swap_in(&self, staged: &Path) -> VaultResult<()> {
        let mut guard = self.lock()?;

        if let Some(conn) = guard.take() {
            if let Err((conn, e)) = conn.close() {
                *guard = Some(conn);
                discard(staged);
                return Err(VaultError::Store(format!(
                    "Failed to close primary store before restore: {}",
                    e
                )));
            }
        }

        if let Err(e) = commit_staged(staged, &self.path) {
            match open_connection(&self.path) {
                Ok(conn) => *guard = Some(conn),
                Err(reopen) => {
                    warn!(error = %reopen, "failed to reopen primary store after aborted swap")
                }
            }
            return Err(e);
        }

        for suffix in SIDECAR_SUFFIXES {
            discard(&sidecar_path(&self.path, suffix));
        }

        *guard = Some(open_connection(&self.path)?);
        info!(path = %self.path.display(), "primary store replaced");
        Ok(())
    }
}

fn open_connection(path: &Path) -> VaultResult<Connection> {
    let conn = Connection::open(path)?;
    if schema::init(&conn)? {
        info!(path = %path.display(), "created clinic schema");
    }
    Ok(conn)
}

/// `<path><suffix>`, e.g. `clinic.db-wal`
pub(crate) fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn closed() -> VaultError {
    VaultError::Store("primary store is closed".into())
}

impl QueryCapability for PrimaryStore {
    fn query(&self, sql: &str) -> VaultResult<QueryResult> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let mut result = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(Value::from(row.get_ref(i)?));
                }
                result.push(values);
            }

            Ok(QueryResult {
                columns,
                rows: result,
            })
        })
    }
}

impl InsertCapability for PrimaryStore {
    fn insert_all(&self, table: &str, columns: &[String], rows: &[Vec<Value>]) -> VaultResult<usize> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(closed)?;

        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            column_list,
            placeholders
        );

        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| VaultError::ImportSchema(e.to_string()))?;

            for (index, row) in rows.iter().enumerate() {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| VaultError::ImportInsert {
                        row: Some(index + 1),
                        cause: e.to_string(),
                    })?;
            }
        }
        tx.commit().map_err(|e| VaultError::ImportInsert {
            row: None,
            cause: e.to_string(),
        })?;

        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> PrimaryStore {
        PrimaryStore::open(dir.path().join("clinic.db")).unwrap()
    }

    fn count(store: &PrimaryStore, table: &str) -> i64 {
        store
            .with_connection(|conn| {
                Ok(conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap()
    }

    #[test]
    fn test_open_bootstraps_schema() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.path().exists());
        assert_eq!(count(&store, "patients"), 0);
        assert_eq!(count(&store, "users"), 1);
    }

    #[test]
    fn test_query_returns_ordered_columns() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO doctors (name, specialty) VALUES ('Dr. Who', NULL)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let result = store.query("SELECT * FROM doctors").unwrap();
        assert_eq!(result.columns, vec!["id", "name", "specialty", "phone", "email"]);
        assert_eq!(
            result.rows,
            vec![vec![
                Value::Integer(1),
                Value::Text("Dr. Who".into()),
                Value::Null,
                Value::Null,
                Value::Null,
            ]]
        );
    }

    #[test]
    fn test_insert_all_commits_every_row() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let columns = vec!["name".to_string(), "age".to_string()];
        let rows = vec![
            vec![Value::Text("Ann".into()), Value::Integer(30)],
            vec![Value::Text("Bob".into()), Value::Null],
        ];

        assert_eq!(store.insert_all("patients", &columns, &rows).unwrap(), 2);
        assert_eq!(count(&store, "patients"), 2);
    }

    #[test]
    fn test_insert_all_rolls_back_on_conflict() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let columns = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec![Value::Integer(1), Value::Text("Ann".into())],
            vec![Value::Integer(1), Value::Text("Bob".into())],
        ];

        let err = store.insert_all("patients", &columns, &rows).unwrap_err();
        assert!(matches!(err, VaultError::ImportInsert { row: Some(2), .. }));
        assert_eq!(count(&store, "patients"), 0);
    }

    #[test]
    fn test_insert_all_unknown_column() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let err = store
            .insert_all("patients", &["shoe_size".to_string()], &[vec![Value::Null]])
            .unwrap_err();
        assert!(matches!(err, VaultError::ImportSchema(_)));
    }

    #[test]
    fn test_snapshot_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let dest = dir.path().join("backups").join("snap.db");

        let size = store.snapshot_to(&dest).unwrap();

        let original = fs::read(store.path()).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), original);
        assert_eq!(size, original.len() as u64);
    }

    #[test]
    fn test_swap_in_replaces_content_and_reopens() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let snapshot = dir.path().join("snap.db");
        store.snapshot_to(&snapshot).unwrap();

        store
            .insert_all("patients", &["name".to_string()], &[vec![Value::Text("Ann".into())]])
            .unwrap();
        assert_eq!(count(&store, "patients"), 1);

        let staged = dir.path().join(".clinic.db.staged");
        fs::copy(&snapshot, &staged).unwrap();
        store.swap_in(&staged).unwrap();

        assert!(!staged.exists());
        assert_eq!(count(&store, "patients"), 0);
    }

    #[test]
    fn test_swap_in_missing_staged_keeps_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .insert_all("patients", &["name".to_string()], &[vec![Value::Text("Ann".into())]])
            .unwrap();

        let result = store.swap_in(&dir.path().join("nothing-here.db"));
        assert!(result.is_err());
        assert_eq!(count(&store, "patients"), 1);
    }
}
