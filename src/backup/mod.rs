//! Backup system for Clinic Vault
//!
//! Provides full snapshots of the primary store, optional authenticated
//! encryption of those snapshots, and restore functionality.
//!
//! # Architecture
//!
//! - `BackupService`: Creates, lists and resolves backup artifacts
//! - `RestoreService`: Stages, verifies and swaps a snapshot into place
//!
//! # Backup Format
//!
//! Plain backups are exact copies of the SQLite file:
//! `clinic_backup_<YYYYMMDD_HHMMSS>.db`. Encrypted backups append `.enc`
//! and hold the `CVE1` frame (magic, nonce, AES-256-GCM ciphertext).
//!
//! # Example
//!
//! ```rust,ignore
//! use clinic_vault::backup::{BackupService, RestoreService};
//!
//! let backups = BackupService::new(&store, paths.backup_dir(), keys);
//! let artifact = backups.create_from_settings(&mut settings, &paths)?;
//!
//! // Later, restore from backup
//! let key = settings.stored_key(&keys)?;
//! let report = RestoreService::new(&store, keys).restore_auto(&artifact.path, key.as_ref())?;
//! println!("{}", report.summary());
//! ```

mod manager;
mod restore;

pub use manager::{
    encrypted_path, is_encrypted_artifact, BackupArtifact, BackupService, BACKUP_PREFIX,
    ENCRYPTED_SUFFIX, SNAPSHOT_EXT,
};
pub use restore::{verify_snapshot, RestoreReport, RestoreService};
