//! Custom error types for Clinic Vault
//!
//! Every lifecycle operation (backup, restore, export, import, settings)
//! fails with a [`VaultError`]. Each variant maps onto exactly one
//! [`ErrorKind`], so callers can branch on the kind and show the message.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for Clinic Vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration blob could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption was requested but no cipher capability is available
    #[error("Encryption unavailable: {0}")]
    CryptoUnavailable(String),

    /// Encryption was requested but no key material is available
    #[error("Encryption requested but no key is available: {0}")]
    MissingKey(String),

    /// Key material that cannot build a cipher context
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Authenticated decryption rejected the ciphertext
    #[error("Decryption failed: wrong key or tampered backup")]
    DecryptionAuthFailure,

    /// Encrypting a fresh snapshot failed; the plain snapshot was kept
    #[error("Encryption of backup failed ({reason}); unencrypted snapshot kept at {}", plain_snapshot.display())]
    EncryptionFailed {
        plain_snapshot: PathBuf,
        reason: String,
    },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Primary store (SQLite) errors outside of export/import
    #[error("Store error: {0}")]
    Store(String),

    /// Staged restore content is not a usable database
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// CSV header or shape does not fit the target table
    #[error("Import schema error: {0}")]
    ImportSchema(String),

    /// The batch insert was rejected and rolled back
    #[error("Import rejected{}, no rows were imported: {cause}", at_row(.row))]
    ImportInsert { row: Option<usize>, cause: String },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },
}

/// Machine-checkable classification of a [`VaultError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigError,
    CryptoUnavailable,
    MissingKey,
    InvalidKey,
    DecryptionAuthFailure,
    EncryptionFailed,
    IoError,
    StoreError,
    InvalidSnapshot,
    ExportError,
    ImportSchemaError,
    ImportInsertError,
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::CryptoUnavailable => "CryptoUnavailable",
            ErrorKind::MissingKey => "MissingKey",
            ErrorKind::InvalidKey => "InvalidKey",
            ErrorKind::DecryptionAuthFailure => "DecryptionAuthFailure",
            ErrorKind::EncryptionFailed => "EncryptionFailed",
            ErrorKind::IoError => "IOError",
            ErrorKind::StoreError => "StoreError",
            ErrorKind::InvalidSnapshot => "InvalidSnapshot",
            ErrorKind::ExportError => "ExportError",
            ErrorKind::ImportSchemaError => "ImportSchemaError",
            ErrorKind::ImportInsertError => "ImportInsertError",
            ErrorKind::NotFound => "NotFound",
        };
        f.write_str(name)
    }
}

impl VaultError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigError,
            Self::CryptoUnavailable(_) => ErrorKind::CryptoUnavailable,
            Self::MissingKey(_) => ErrorKind::MissingKey,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::DecryptionAuthFailure => ErrorKind::DecryptionAuthFailure,
            Self::EncryptionFailed { .. } => ErrorKind::EncryptionFailed,
            Self::Io(_) => ErrorKind::IoError,
            Self::Store(_) => ErrorKind::StoreError,
            Self::InvalidSnapshot(_) => ErrorKind::InvalidSnapshot,
            Self::Export(_) => ErrorKind::ExportError,
            Self::ImportSchema(_) => ErrorKind::ImportSchemaError,
            Self::ImportInsert { .. } => ErrorKind::ImportInsertError,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Create a "not found" error for backup artifacts
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for tables
    pub fn table_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Table",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn at_row(row: &Option<usize>) -> String {
    row.map(|r| format!(" at row {}", r)).unwrap_or_default()
}

// Implement From traits for common error types

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type alias for Clinic Vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Success/failure report handed to the UI layer
///
/// Carries a human-readable message and, on failure, the error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl Outcome {
    /// A successful outcome with a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: None,
            message: message.into(),
        }
    }

    /// A failed outcome describing `err`
    pub fn failed(err: &VaultError) -> Self {
        Self {
            success: false,
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }

    /// Build an outcome from a result, describing the success value with `describe`
    pub fn from_result<T>(result: &VaultResult<T>, describe: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(value) => Self::ok(describe(value)),
            Err(err) => Self::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = VaultError::backup_not_found("latest");
        assert_eq!(err.to_string(), "Backup not found: latest");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_import_insert_error() {
        let err = VaultError::ImportInsert {
            row: Some(3),
            cause: "UNIQUE constraint failed: patients.id".into(),
        };
        assert_eq!(
            err.to_string(),
            "Import rejected at row 3, no rows were imported: UNIQUE constraint failed: patients.id"
        );
        assert_eq!(err.kind(), ErrorKind::ImportInsertError);

        let err = VaultError::ImportInsert {
            row: None,
            cause: "database is locked".into(),
        };
        assert_eq!(
            err.to_string(),
            "Import rejected, no rows were imported: database is locked"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
        assert_eq!(vault_err.kind().to_string(), "IOError");
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: VaultResult<usize> = Ok(3);
        let outcome = Outcome::from_result(&ok, |n| format!("Imported {} rows", n));
        assert!(outcome.success);
        assert_eq!(outcome.kind, None);
        assert_eq!(outcome.message, "Imported 3 rows");

        let err: VaultResult<usize> = Err(VaultError::DecryptionAuthFailure);
        let outcome = Outcome::from_result(&err, |_| unreachable!());
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(ErrorKind::DecryptionAuthFailure));
    }
}
