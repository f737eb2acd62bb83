//! Path management for Clinic Vault
//!
//! Resolves where the clinic database, settings, backups and exports live.
//!
//! ## Path Resolution Order
//!
//! 1. `CLINIC_VAULT_HOME` environment variable (if set)
//! 2. The platform data directory (`directories::ProjectDirs`), e.g.
//!    `~/.local/share/clinic-vault` on Linux

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::VaultError;

/// Environment variable overriding the data home
pub const HOME_ENV: &str = "CLINIC_VAULT_HOME";

/// Manages all paths used by Clinic Vault
#[derive(Debug, Clone)]
pub struct ClinicPaths {
    /// Base directory for all Clinic Vault data
    base_dir: PathBuf,
}

impl ClinicPaths {
    /// Create a new ClinicPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined for the platform.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = match std::env::var(HOME_ENV) {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("", "", "clinic-vault")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    VaultError::Config("Could not determine a home directory".into())
                })?,
        };

        Ok(Self { base_dir })
    }

    /// Create ClinicPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the primary store
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("clinic.db")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    /// Get the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the CSV export directory
    pub fn export_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Ensure the base, backup and export directories exist
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create backup directory: {}", e)))?;

        std::fs::create_dir_all(self.export_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create export directory: {}", e)))?;

        Ok(())
    }

    /// Check if Clinic Vault has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ClinicPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.database_file(), temp_dir.path().join("clinic.db"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.export_dir(), temp_dir.path().join("exports"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ClinicPaths::with_base_dir(temp_dir.path().join("home"));

        paths.ensure_directories().unwrap();

        assert!(paths.backup_dir().is_dir());
        assert!(paths.export_dir().is_dir());
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ClinicPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.settings_file(), temp_dir.path().join("settings.json"));
        assert_eq!(paths.audit_log(), temp_dir.path().join("audit.log"));
    }
}
