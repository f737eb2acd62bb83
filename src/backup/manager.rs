//! Backup creation and lookup for Clinic Vault
//!
//! A backup is a byte-for-byte copy of the primary store named
//! `clinic_backup_<YYYYMMDD_HHMMSS>.db`. Encrypted backups replace that copy
//! with `clinic_backup_<YYYYMMDD_HHMMSS>.db.enc`; a finished backup is
//! always exactly one of the two.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::paths::ClinicPaths;
use crate::config::settings::Settings;
use crate::crypto::{encrypt, KeyManager, KeyMaterial};
use crate::error::{VaultError, VaultResult};
use crate::storage::file_io::{discard, write_bytes_atomic, STAMP_FORMAT};
use crate::storage::PrimaryStore;

/// File name prefix of every backup artifact
pub const BACKUP_PREFIX: &str = "clinic_backup";

/// Extension of a plain snapshot
pub const SNAPSHOT_EXT: &str = "db";

/// Extra suffix marking an encrypted snapshot
pub const ENCRYPTED_SUFFIX: &str = "enc";

/// Metadata about a backup artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    /// Backup filename
    pub filename: String,
    /// Full path to backup
    pub path: PathBuf,
    /// Whether the artifact holds ciphertext
    pub encrypted: bool,
    /// Local time encoded in the file name
    pub created_at: NaiveDateTime,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Whether `path` carries the encrypted-artifact suffix
pub fn is_encrypted_artifact(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case(ENCRYPTED_SUFFIX))
}

/// Path of the encrypted artifact derived from a plain snapshot path
pub fn encrypted_path(plain: &Path) -> PathBuf {
    let mut name = plain.as_os_str().to_os_string();
    name.push(".");
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// Creates and finds snapshots of the primary store
pub struct BackupService<'a> {
    store: &'a PrimaryStore,
    backup_dir: PathBuf,
    keys: KeyManager,
}

impl<'a> BackupService<'a> {
    /// Create a new BackupService
    pub fn new(store: &'a PrimaryStore, backup_dir: impl Into<PathBuf>, keys: KeyManager) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
            keys,
        }
    }

    /// Get backup directory path
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Take one full snapshot, encrypting it when `encrypt` is set
    ///
    /// Encryption preconditions are checked before anything is written:
    /// without the capability or a key the call fails and no artifact is
    /// created. If encrypting the fresh snapshot fails, the plain snapshot
    /// is kept and `EncryptionFailed` names it.
    pub fn create(&self, encrypt: bool, key: Option<&KeyMaterial>) -> VaultResult<BackupArtifact> {
        let key = if encrypt {
            self.keys.capability().require()?;
            Some(key.ok_or_else(|| {
                VaultError::MissingKey("no backup key is configured".to_string())
            })?)
        } else {
            None
        };

        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            VaultError::Io(format!("Failed to create backup directory: {}", e))
        })?;

        let now = Local::now().naive_local();
        let created_at = now.with_nanosecond(0).unwrap_or(now);
        let stamp = created_at.format(STAMP_FORMAT).to_string();
        let plain = self.next_snapshot_path(&stamp);

        let size_bytes = self.store.snapshot_to(&plain)?;
        info!(path = %plain.display(), size_bytes, "snapshot taken");

        let (path, size_bytes) = match key {
            Some(key) => self.encrypt_snapshot(&plain, key)?,
            None => (plain, size_bytes),
        };

        Ok(BackupArtifact {
            filename: file_name(&path),
            encrypted: key.is_some(),
            created_at,
            size_bytes,
            path,
        })
    }

    /// Take a snapshot under the policy held in `settings`
    ///
    /// With encryption enabled and no stored key, a key is generated and
    /// saved to the settings file first.
    pub fn create_from_settings(
        &self,
        settings: &mut Settings,
        paths: &ClinicPaths,
    ) -> VaultResult<BackupArtifact> {
        let key = settings.resolve_backup_key(paths, &self.keys)?;
        self.create(settings.encrypt_backups, key.as_ref())
    }

    /// First unused `<prefix>_<stamp>[_N].db` whose encrypted twin is unused too
    fn next_snapshot_path(&self, stamp: &str) -> PathBuf {
        let stem = format!("{}_{}", BACKUP_PREFIX, stamp);
        let mut counter = 0u32;
        loop {
            let name = if counter == 0 {
                format!("{}.{}", stem, SNAPSHOT_EXT)
            } else {
                format!("{}_{}.{}", stem, counter, SNAPSHOT_EXT)
            };
            let candidate = self.backup_dir.join(name);
            if !candidate.exists() && !encrypted_path(&candidate).exists() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Replace the plain snapshot at `plain` by its encrypted form
    fn encrypt_snapshot(&self, plain: &Path, key: &KeyMaterial) -> VaultResult<(PathBuf, u64)> {
        seal_snapshot(plain, key, |path| fs::remove_file(path))
    }

    /// List all backups, newest first
    pub fn list(&self) -> VaultResult<Vec<BackupArtifact>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backup_dir).map_err(|e| {
            VaultError::Io(format!("Failed to read backup directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                VaultError::Io(format!("Failed to read directory entry: {}", e))
            })?;

            if let Some(info) = parse_backup_info(&entry.path()) {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| {
            (b.created_at, sequence(&b.filename)).cmp(&(a.created_at, sequence(&a.filename)))
        });

        Ok(backups)
    }

    /// Get the most recent backup
    pub fn latest(&self) -> VaultResult<Option<BackupArtifact>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Resolve `latest`, a path, or a file name in the backup directory
    pub fn resolve(&self, identifier: &str) -> VaultResult<PathBuf> {
        if identifier.eq_ignore_ascii_case("latest") {
            return self
                .latest()?
                .map(|b| b.path)
                .ok_or_else(|| VaultError::backup_not_found("latest"));
        }

        let direct = PathBuf::from(identifier);
        if direct.is_file() {
            return Ok(direct);
        }

        let in_dir = self.backup_dir.join(identifier);
        if in_dir.is_file() {
            return Ok(in_dir);
        }

        Err(VaultError::backup_not_found(identifier))
    }
}

/// Write the sealed twin of `plain`, then drop `plain` with `remove_plain`
///
/// On any failure the plain snapshot stays, no sealed file is left behind
/// and the error is `EncryptionFailed`.
fn seal_snapshot<F>(plain: &Path, key: &KeyMaterial, remove_plain: F) -> VaultResult<(PathBuf, u64)>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let sealed_path = encrypted_path(plain);

    let result = (|| -> VaultResult<u64> {
        let bytes = fs::read(plain)?;
        let sealed = encrypt(&bytes, key)?.to_bytes();
        write_bytes_atomic(&sealed_path, &sealed)?;

        if let Err(e) = remove_plain(plain) {
            discard(&sealed_path);
            return Err(VaultError::Io(format!(
                "Failed to remove plain snapshot: {}",
                e
            )));
        }
        Ok(sealed.len() as u64)
    })();

    match result {
        Ok(size) => {
            info!(path = %sealed_path.display(), "snapshot encrypted, plain copy removed");
            Ok((sealed_path, size))
        }
        Err(e) => {
            warn!(path = %plain.display(), error = %e, "encryption failed, plain snapshot kept");
            Err(VaultError::EncryptionFailed {
                plain_snapshot: plain.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse backup info from a backup file name
fn parse_backup_info(path: &Path) -> Option<BackupArtifact> {
    let filename = path.file_name()?.to_string_lossy().into_owned();
    let encrypted = is_encrypted_artifact(path);

    let base = if encrypted {
        filename.get(..filename.len() - ENCRYPTED_SUFFIX.len() - 1)?
    } else {
        filename.as_str()
    };
    let rest = base
        .strip_suffix(&format!(".{}", SNAPSHOT_EXT))?
        .strip_prefix(&format!("{}_", BACKUP_PREFIX))?;

    // YYYYMMDD_HHMMSS, optionally followed by _N
    let stamp = rest.get(..15)?;
    let counter = &rest[15..];
    if !counter.is_empty() {
        let digits = counter.strip_prefix('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    let created_at = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;

    let size_bytes = fs::metadata(path).ok()?.len();

    Some(BackupArtifact {
        filename,
        path: path.to_path_buf(),
        encrypted,
        created_at,
        size_bytes,
    })
}

/// The `_N` collision counter of a backup name, 0 when absent
fn sequence(filename: &str) -> u32 {
    let stem = filename
        .split('.')
        .next()
        .unwrap_or_default()
        .trim_start_matches(BACKUP_PREFIX)
        .trim_start_matches('_');
    stem.get(16..).and_then(|n| n.parse().ok()).unwrap_or(0)
}
