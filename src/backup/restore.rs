//! Backup restoration for Clinic Vault
//!
//! The primary store is never written in place. The snapshot (decrypted
//! first, if needed) is staged next to the database, checked, and only then
//! swapped in. Any failure before the swap leaves the store as it was.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use super::manager::is_encrypted_artifact;
use crate::crypto::{decrypt, EncryptedData, KeyManager, KeyMaterial};
use crate::error::{VaultError, VaultResult};
use crate::storage::file_io::{discard, stage_file};
use crate::storage::store::{sidecar_path, SIDECAR_SUFFIXES};
use crate::storage::PrimaryStore;

/// First 16 bytes of every SQLite database file
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Result of a restore operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// The artifact that was restored
    pub source: PathBuf,
    /// Whether the artifact was decrypted
    pub encrypted: bool,
    /// Size of the restored database
    pub restored_bytes: u64,
}

impl RestoreReport {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        format!(
            "Restored {}{} ({} bytes)",
            self.source.display(),
            if self.encrypted { " (decrypted)" } else { "" },
            self.restored_bytes
        )
    }
}

/// Replaces the primary store from a backup artifact
pub struct RestoreService<'a> {
    store: &'a PrimaryStore,
    keys: KeyManager,
}

impl<'a> RestoreService<'a> {
    /// Create a new RestoreService
    pub fn new(store: &'a PrimaryStore, keys: KeyManager) -> Self {
        Self { store, keys }
    }

    /// Restore, choosing the mode from the artifact's file name
    pub fn restore_auto(
        &self,
        artifact: &Path,
        key: Option<&KeyMaterial>,
    ) -> VaultResult<RestoreReport> {
        self.restore(artifact, is_encrypted_artifact(artifact), key)
    }

    /// Restore the primary store from `artifact`
    ///
    /// Encrypted artifacts need the capability and the key they were sealed
    /// with. Staged content that is not a healthy SQLite database is
    /// rejected with `InvalidSnapshot`.
    pub fn restore(
        &self,
        artifact: &Path,
        encrypted: bool,
        key: Option<&KeyMaterial>,
    ) -> VaultResult<RestoreReport> {
        if !artifact.is_file() {
            return Err(VaultError::Io(format!(
                "Backup file not found: {}",
                artifact.display()
            )));
        }

        let target = self.store.path();
        let staged = if encrypted {
            self.keys.capability().require()?;
            let key = key.ok_or_else(|| {
                VaultError::MissingKey("an encrypted backup needs its key to restore".to_string())
            })?;

            let bytes = fs::read(artifact).map_err(|e| {
                VaultError::Io(format!("Failed to read backup file: {}", e))
            })?;
            let plain = decrypt(&EncryptedData::from_bytes(&bytes)?, key)?;
            stage_file(target, |writer| writer.write_all(&plain))?
        } else {
            let mut source = File::open(artifact).map_err(|e| {
                VaultError::Io(format!("Failed to open backup file: {}", e))
            })?;
            stage_file(target, |writer| io::copy(&mut source, writer).map(|_| ()))?
        };
        info!(artifact = %artifact.display(), staged = %staged.display(), "restore staged");

        let checked = verify_snapshot(&staged).and_then(|()| Ok(fs::metadata(&staged)?.len()));
        let restored_bytes = match checked {
            Ok(size) => size,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };

        self.store.swap_in(&staged)?;
        info!(artifact = %artifact.display(), encrypted, "restore complete");

        Ok(RestoreReport {
            source: artifact.to_path_buf(),
            encrypted,
            restored_bytes,
        })
    }
}

/// Check that `path` is a SQLite database that passes `quick_check`
pub fn verify_snapshot(path: &Path) -> VaultResult<()> {
    let mut header = [0u8; 16];
    let mut file = File::open(path)?;
    if file.read_exact(&mut header).is_err() || &header != SQLITE_HEADER {
        return Err(VaultError::InvalidSnapshot(
            "content is not an SQLite database".to_string(),
        ));
    }
    drop(file);

    let result = (|| -> rusqlite::Result<String> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let status: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        conn.close().map_err(|(_, e)| e)?;
        Ok(status)
    })();

    for suffix in SIDECAR_SUFFIXES {
        discard(&sidecar_path(path, suffix));
    }

    match result {
        Ok(status) if status == "ok" => Ok(()),
        Ok(status) => Err(VaultError::InvalidSnapshot(format!(
            "integrity check failed: {}",
            status
        ))),
        Err(e) => Err(VaultError::InvalidSnapshot(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupService;
    use crate::crypto::CryptoCapability;
    use crate::error::ErrorKind;
    use crate::tables::{InsertCapability, Value};
    use tempfile::TempDir;

    fn keys() -> KeyManager {
        KeyManager::new(CryptoCapability::Enabled)
    }

    fn setup() -> (TempDir, PrimaryStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = PrimaryStore::open(temp_dir.path().join("clinic.db")).unwrap();
        (temp_dir, store)
    }

    fn add_patient(store: &PrimaryStore, name: &str) {
        store
            .insert_all("patients", &["name".to_string()], &[vec![Value::Text(name.to_string())]])
            .unwrap();
    }

    fn patient_names(store: &PrimaryStore) -> Vec<String> {
        store
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM patients ORDER BY id")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .unwrap()
    }

    #[test]
    fn test_restore_plain_backup() {
        let (temp_dir, store) = setup();
        add_patient(&store, "Ann");
        let backup = BackupService::new(&store, temp_dir.path().join("backups"), keys())
            .create(false, None)
            .unwrap();
        add_patient(&store, "Bob");

        let report = RestoreService::new(&store, keys())
            .restore_auto(&backup.path, None)
            .unwrap();

        assert!(!report.encrypted);
        assert_eq!(patient_names(&store), vec!["Ann"]);
        assert!(backup.path.exists());
    }

    #[test]
    fn test_restore_encrypted_backup() {
        let (temp_dir, store) = setup();
        let key = keys().generate().unwrap();
        add_patient(&store, "Ann");
        let backup = BackupService::new(&store, temp_dir.path().join("backups"), keys())
            .create(true, Some(&key))
            .unwrap();
        add_patient(&store, "Bob");

        let report = RestoreService::new(&store, keys())
            .restore_auto(&backup.path, Some(&key))
            .unwrap();

        assert!(report.encrypted);
        assert!(report.summary().contains("decrypted"));
        assert_eq!(patient_names(&store), vec!["Ann"]);
    }

    #[test]
    fn test_wrong_key_leaves_store_untouched() {
        let (temp_dir, store) = setup();
        let key = keys().generate().unwrap();
        let other = keys().generate().unwrap();
        let backup = BackupService::new(&store, temp_dir.path().join("backups"), keys())
            .create(true, Some(&key))
            .unwrap();
        add_patient(&store, "Bob");
        let before = fs::read(store.path()).unwrap();

        let err = RestoreService::new(&store, keys())
            .restore_auto(&backup.path, Some(&other))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DecryptionAuthFailure);
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(patient_names(&store), vec!["Bob"]);
    }

    #[test]
    fn test_encrypted_restore_without_key_or_capability() {
        let (temp_dir, store) = setup();
        let key = keys().generate().unwrap();
        let backup = BackupService::new(&store, temp_dir.path().join("backups"), keys())
            .create(true, Some(&key))
            .unwrap();

        let err = RestoreService::new(&store, keys())
            .restore_auto(&backup.path, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingKey);

        let err = RestoreService::new(&store, KeyManager::new(CryptoCapability::Disabled))
            .restore_auto(&backup.path, Some(&key))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CryptoUnavailable);
    }

    #[test]
    fn test_corrupt_snapshot_is_rejected() {
        let (temp_dir, store) = setup();
        add_patient(&store, "Ann");
        let bogus = temp_dir.path().join("clinic_backup_20250101_120000.db");
        fs::write(&bogus, b"definitely not a database").unwrap();

        let err = RestoreService::new(&store, keys())
            .restore(&bogus, false, None)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSnapshot);
        assert_eq!(patient_names(&store), vec!["Ann"]);

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_artifact() {
        let (temp_dir, store) = setup();

        let err = RestoreService::new(&store, keys())
            .restore(&temp_dir.path().join("nope.db"), false, None)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_mode_override_treats_enc_name_as_plain() {
        let (temp_dir, store) = setup();
        add_patient(&store, "Ann");
        let plain = BackupService::new(&store, temp_dir.path().join("backups"), keys())
            .create(false, None)
            .unwrap();
        let renamed = temp_dir.path().join("copy.db.enc");
        fs::copy(&plain.path, &renamed).unwrap();
        add_patient(&store, "Bob");

        RestoreService::new(&store, keys())
            .restore(&renamed, false, None)
            .unwrap();

        assert_eq!(patient_names(&store), vec!["Ann"]);
    }
}
