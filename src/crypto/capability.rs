//! Runtime encryption capability
//!
//! Resolved once at startup and handed to the key manager and the backup
//! and restore services, instead of each call site probing for a cipher.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use crate::error::{VaultError, VaultResult};

/// Whether authenticated encryption can be used in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoCapability {
    Enabled,
    Disabled,
}

impl CryptoCapability {
    /// Check the cipher with a known-answer round trip
    ///
    /// Any failure of the OS random source or the cipher yields `Disabled`.
    pub fn detect() -> Self {
        match self_test() {
            Ok(()) => Self::Enabled,
            Err(reason) => {
                tracing::warn!(%reason, "encryption self-test failed, encrypted backups disabled");
                Self::Disabled
            }
        }
    }

    /// Whether encryption may be used
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Fail with `CryptoUnavailable` unless encryption may be used
    pub fn require(self) -> VaultResult<()> {
        match self {
            Self::Enabled => Ok(()),
            Self::Disabled => Err(VaultError::CryptoUnavailable(
                "no authenticated cipher is available in this build".into(),
            )),
        }
    }
}

fn self_test() -> Result<(), String> {
    let mut key = [0u8; 32];
    let mut nonce = [0u8; 12];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|e| format!("random source unavailable: {}", e))?;
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| format!("random source unavailable: {}", e))?;

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| e.to_string())?;
    let sample = b"clinic-vault self-test";
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), sample.as_ref())
        .map_err(|e| e.to_string())?;
    let opened = cipher
        .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
        .map_err(|e| e.to_string())?;

    if opened != sample {
        return Err("cipher round trip mismatch".into());
    }
    Ok(())
}
