//! Backup key material
//!
//! A key is 32 random bytes rendered as URL-safe base64 (44 characters with
//! padding). The encoded string is what users copy around and what the
//! settings file stores; [`KeyManager::validate`] is the only way to turn
//! such a string back into usable key material.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{KeyInit, OsRng},
    Aes256Gcm,
};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

use super::CryptoCapability;

/// Length of the raw key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Validated key material
///
/// Holds both the encoded form and the raw bytes; both are zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    encoded: String,
    bytes: [u8; KEY_LEN],
}

impl KeyMaterial {
    /// The URL-safe encoded key, as stored in settings
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// The raw key bytes
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

// Don't print the key in Debug output
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generates and validates key material
#[derive(Debug, Clone, Copy)]
pub struct KeyManager {
    capability: CryptoCapability,
}

impl KeyManager {
    /// Create a key manager bound to the process-wide capability
    pub fn new(capability: CryptoCapability) -> Self {
        Self { capability }
    }

    /// The capability this manager was created with
    pub fn capability(&self) -> CryptoCapability {
        self.capability
    }

    /// Generate fresh random key material
    pub fn generate(&self) -> VaultResult<KeyMaterial> {
        self.capability.require()?;

        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| VaultError::CryptoUnavailable(format!("Random source failed: {}", e)))?;

        let key = KeyMaterial {
            encoded: URL_SAFE.encode(bytes),
            bytes,
        };
        bytes.zeroize();
        Ok(key)
    }

    /// Validate a candidate key string
    ///
    /// Malformed encodings and wrong lengths are rejected with `InvalidKey`
    /// regardless of capability. A well-formed key still needs the cipher to
    /// be available, and is only returned once a cipher context was built.
    pub fn validate(&self, candidate: &str) -> VaultResult<KeyMaterial> {
        let mut decoded = URL_SAFE
            .decode(candidate)
            .map_err(|e| VaultError::InvalidKey(format!("not URL-safe base64: {}", e)))?;

        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(VaultError::InvalidKey(format!(
                "expected {} key bytes, got {}",
                KEY_LEN, len
            )));
        }

        self.capability.require()?;

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| VaultError::InvalidKey(format!("cipher rejected key: {}", e)))?;

        Ok(KeyMaterial {
            encoded: candidate.to_string(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> KeyManager {
        KeyManager::new(CryptoCapability::Enabled)
    }

    #[test]
    fn test_generate_is_valid() {
        let key = manager().generate().unwrap();
        assert_eq!(key.as_str().len(), 44);

        let again = manager().validate(key.as_str()).unwrap();
        assert_eq!(again.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = manager().generate().unwrap();
        let b = manager().generate().unwrap();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_generate_without_capability() {
        let result = KeyManager::new(CryptoCapability::Disabled).generate();
        assert!(matches!(result, Err(VaultError::CryptoUnavailable(_))));
    }

    #[test]
    fn test_invalid_keys_rejected_deterministically() {
        let short = URL_SAFE.encode([7u8; 16]);
        let long = URL_SAFE.encode([7u8; 48]);
        let candidates = [
            "",
            "not a key",
            "!!!!",
            short.as_str(),
            long.as_str(),
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", // 43 chars, missing padding
        ];

        for candidate in candidates {
            for _ in 0..2 {
                let result = manager().validate(candidate);
                assert!(
                    matches!(result, Err(VaultError::InvalidKey(_))),
                    "expected InvalidKey for {:?}",
                    candidate
                );
            }
        }
    }

    #[test]
    fn test_malformed_key_is_invalid_even_without_capability() {
        let result = KeyManager::new(CryptoCapability::Disabled).validate("garbage");
        assert!(matches!(result, Err(VaultError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = manager().generate().unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains(key.as_str()));
        assert!(debug.contains("REDACTED"));
    }
}
