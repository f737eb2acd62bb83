//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the lifecycle services.

pub mod backup;
pub mod encrypt;
pub mod table;

pub use backup::{handle_backup_command, BackupCommands};
pub use encrypt::{handle_encrypt_command, EncryptCommands};
pub use table::{handle_table_command, TableCommands};

use tracing::warn;

use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::config::{ClinicPaths, Settings};
use crate::crypto::{CryptoCapability, KeyManager, KeyMaterial};
use crate::error::{Outcome, VaultError, VaultResult};
use crate::storage::PrimaryStore;

/// Everything one CLI invocation works with
///
/// Settings are loaded once here and handed to each lifecycle call.
pub struct Session {
    pub paths: ClinicPaths,
    pub settings: Settings,
    pub store: PrimaryStore,
    pub keys: KeyManager,
    pub audit: AuditLogger,
}

impl Session {
    /// Prepare the data home, load settings and open the primary store
    pub fn open(paths: ClinicPaths, capability: CryptoCapability) -> VaultResult<Self> {
        paths.ensure_directories()?;
        let settings = Settings::load_or_create(&paths)?;
        let store = PrimaryStore::open(paths.database_file())?;
        let audit = AuditLogger::new(paths.audit_log());

        Ok(Self {
            paths,
            settings,
            store,
            keys: KeyManager::new(capability),
            audit,
        })
    }

    /// Append the outcome of `operation` to the audit log and pass the result on
    ///
    /// A failing audit write is logged but never masks the operation's result.
    pub fn record<T>(
        &self,
        operation: Operation,
        result: VaultResult<T>,
        describe: impl FnOnce(&T) -> String,
    ) -> VaultResult<T> {
        let outcome = Outcome::from_result(&result, describe);
        if let Err(e) = self.audit.log(&AuditEntry::from_outcome(operation, &outcome)) {
            warn!(error = %e, "failed to write audit entry");
        }
        result
    }
}

/// Key given on the command line, typed at a prompt, or none
pub(crate) fn supplied_key(key: Option<String>, prompt_key: bool) -> VaultResult<Option<String>> {
    if prompt_key {
        return prompt_secret("Encryption key: ").map(Some);
    }
    Ok(key)
}

/// Validate an explicitly supplied key, falling back to the stored one
pub(crate) fn key_for_use(
    session: &Session,
    supplied: Option<String>,
) -> VaultResult<Option<KeyMaterial>> {
    match supplied.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(candidate) => session.keys.validate(candidate).map(Some),
        None => session.settings.stored_key(&session.keys),
    }
}

/// Read a secret without echoing it
pub(crate) fn prompt_secret(prompt: &str) -> VaultResult<String> {
    rpassword::prompt_password(prompt)
        .map_err(|e| VaultError::Io(format!("Failed to read key: {}", e)))
}

/// Format a file size in human-readable form
pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
