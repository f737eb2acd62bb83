//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for backup snapshots using AES-256-GCM.
//! Each encryption operation generates a unique nonce.
//!
//! On disk an encrypted snapshot is framed as:
//!
//! ```text
//! | magic "CVE1" (4) | nonce (12) | ciphertext + tag (n + 16) |
//! ```
//!
//! The magic is bound to the ciphertext as associated data, so altering any
//! byte of the file makes decryption fail.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};

use crate::error::{VaultError, VaultResult};

use super::KeyMaterial;

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

/// Format marker at the start of every encrypted snapshot
const MAGIC: &[u8; 4] = b"CVE1";

/// Encrypted payload with its nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize into the on-disk frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAGIC.len() + NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the on-disk frame
    ///
    /// A frame that is truncated or lacks the marker cannot have come from
    /// [`encrypt`], so it is reported as an authentication failure.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        let header = MAGIC.len() + NONCE_SIZE;
        if bytes.len() < header + TAG_SIZE || &bytes[..MAGIC.len()] != MAGIC {
            tracing::debug!(len = bytes.len(), "encrypted frame rejected");
            return Err(VaultError::DecryptionAuthFailure);
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[MAGIC.len()..header]);

        Ok(Self {
            nonce,
            ciphertext: bytes[header..].to_vec(),
        })
    }
}

/// Encrypt plaintext data using AES-256-GCM
///
/// Generates a random nonce for each encryption operation.
pub fn encrypt(plaintext: &[u8], key: &KeyMaterial) -> VaultResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: MAGIC,
            },
        )
        .map_err(|e| VaultError::CryptoUnavailable(format!("Cipher rejected the payload: {}", e)))?;

    Ok(EncryptedData { nonce, ciphertext })
}

/// Decrypt ciphertext using AES-256-GCM
///
/// A wrong key and a modified ciphertext are indistinguishable here; both
/// yield [`VaultError::DecryptionAuthFailure`].
pub fn decrypt(encrypted: &EncryptedData, key: &KeyMaterial) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            Payload {
                msg: &encrypted.ciphertext,
                aad: MAGIC,
            },
        )
        .map_err(|_| VaultError::DecryptionAuthFailure)
}
