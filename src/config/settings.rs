//! User settings for Clinic Vault
//!
//! The settings blob holds UI preferences and the backup encryption policy.
//! It is loaded once per session and passed explicitly to lifecycle calls.
//!
//! Invariant: `encryption_key` is only ever present while `encrypt_backups`
//! is true. Disabling encryption clears the key; it is never left behind.

use serde::{Deserialize, Serialize};

use super::paths::ClinicPaths;
use crate::crypto::{KeyManager, KeyMaterial};
use crate::error::{VaultError, VaultResult};
use crate::storage::file_io::{read_json_required, write_json_atomic};

/// User settings for Clinic Vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// UI language code
    #[serde(default = "default_language")]
    pub language: String,

    /// Dark theme preference
    #[serde(default)]
    pub dark_mode: bool,

    /// Default login name
    #[serde(default = "default_username")]
    pub username: String,

    /// Whether new backups are encrypted
    #[serde(default)]
    pub encrypt_backups: bool,

    /// Encoded backup key (only while `encrypt_backups` is set)
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            dark_mode: false,
            username: default_username(),
            encrypt_backups: false,
            encryption_key: None,
        }
    }
}

/// Where the key in force after enabling encryption came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Encryption was already on and the stored key stays
    Kept,
    Generated,
    Supplied,
}

/// The backup key after enabling encryption
#[derive(Debug)]
pub struct EnabledKey {
    pub key: KeyMaterial,
    pub origin: KeyOrigin,
    /// A different key was stored before and has been dropped
    pub replaced: bool,
}

impl Settings {
    /// Load settings from disk, creating the file with defaults if it doesn't exist
    pub fn load_or_create(paths: &ClinicPaths) -> VaultResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            let settings = Settings::default();
            settings.save(paths)?;
            tracing::info!(path = %settings_path.display(), "created default settings");
            return Ok(settings);
        }

        let mut settings: Settings = read_json_required(&settings_path)
            .map_err(|e| VaultError::Config(format!("Failed to load settings: {}", e)))?;

        if settings.normalize() {
            tracing::warn!("settings held a key while encryption was disabled; key ignored");
        }

        Ok(settings)
    }

    /// Save settings to disk
    ///
    /// Always writes every field, so a cleared key is cleared on disk too.
    pub fn save(&self, paths: &ClinicPaths) -> VaultResult<()> {
        let mut settings = self.clone();
        settings.normalize();

        write_json_atomic(paths.settings_file(), &settings)
            .map_err(|e| VaultError::Config(format!("Failed to save settings: {}", e)))
    }

    /// Drop a key that is present while encryption is disabled
    ///
    /// Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        if !self.encrypt_backups && self.encryption_key.is_some() {
            self.encryption_key = None;
            return true;
        }
        false
    }

    /// Turn on backup encryption
    ///
    /// A supplied key must validate and replaces any stored key. Without one,
    /// an already enabled policy keeps its stored key, since existing
    /// encrypted backups need it; `rotate` generates a fresh key instead.
    /// Settings are only modified once a usable key is in hand.
    pub fn enable_encryption(
        &mut self,
        candidate: Option<&str>,
        rotate: bool,
        keys: &KeyManager,
    ) -> VaultResult<EnabledKey> {
        let (key, origin) = match candidate.map(str::trim).filter(|k| !k.is_empty()) {
            Some(candidate) => (keys.validate(candidate)?, KeyOrigin::Supplied),
            None => {
                if self.encrypt_backups && !rotate {
                    if let Some(stored) = self.stored_key(keys)? {
                        return Ok(EnabledKey {
                            key: stored,
                            origin: KeyOrigin::Kept,
                            replaced: false,
                        });
                    }
                }
                (keys.generate()?, KeyOrigin::Generated)
            }
        };

        let replaced = self
            .encryption_key
            .as_deref()
            .map_or(false, |old| old != key.as_str());
        self.encrypt_backups = true;
        self.encryption_key = Some(key.as_str().to_string());
        Ok(EnabledKey {
            key,
            origin,
            replaced,
        })
    }

    /// Turn off backup encryption and forget the key
    pub fn disable_encryption(&mut self) {
        self.encrypt_backups = false;
        self.encryption_key = None;
    }

    /// Validate the stored key, if any
    pub fn stored_key(&self, keys: &KeyManager) -> VaultResult<Option<KeyMaterial>> {
        self.encryption_key
            .as_deref()
            .map(|k| keys.validate(k))
            .transpose()
    }

    /// Key to use for the next backup under the current policy
    ///
    /// With encryption enabled and no stored key, a key is generated and
    /// persisted before it is returned. With encryption disabled, `None`.
    pub fn resolve_backup_key(
        &mut self,
        paths: &ClinicPaths,
        keys: &KeyManager,
    ) -> VaultResult<Option<KeyMaterial>> {
        if !self.encrypt_backups {
            return Ok(None);
        }

        if let Some(key) = self.stored_key(keys)? {
            return Ok(Some(key));
        }

        let key = keys.generate()?;
        self.encryption_key = Some(key.as_str().to_string());
        self.save(paths)?;
        tracing::info!("generated and stored a new backup key");
        Ok(Some(key))
    }
}
