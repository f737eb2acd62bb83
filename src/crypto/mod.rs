//! Cryptographic functions for Clinic Vault
//!
//! Provides AES-256-GCM encryption of backup snapshots, key material
//! generation/validation, and the runtime encryption capability flag.

pub mod capability;
pub mod encryption;
pub mod keys;

pub use capability::CryptoCapability;
pub use encryption::{decrypt, encrypt, EncryptedData};
pub use keys::{KeyManager, KeyMaterial, KEY_LEN};
