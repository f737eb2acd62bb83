//! Clinic Vault - data lifecycle manager for a clinic database
//!
//! This library takes point-in-time snapshots of the clinic's SQLite store,
//! optionally seals them with authenticated encryption, restores the store
//! from a snapshot, and moves any table in and out of CSV.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Data home paths and the settings blob
//! - `error`: Error taxonomy and structured outcomes
//! - `crypto`: Cipher capability, key material, AES-256-GCM framing
//! - `storage`: SQLite primary store and atomic file helpers
//! - `tables`: Schema reflection, CSV export and import
//! - `backup`: Snapshot creation and restore
//! - `audit`: Audit logging system
//! - `cli`: Command handlers for the `clinic-vault` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use clinic_vault::backup::BackupService;
//! use clinic_vault::config::{ClinicPaths, Settings};
//! use clinic_vault::crypto::{CryptoCapability, KeyManager};
//! use clinic_vault::storage::PrimaryStore;
//!
//! let paths = ClinicPaths::new()?;
//! let mut settings = Settings::load_or_create(&paths)?;
//! let store = PrimaryStore::open(paths.database_file())?;
//! let keys = KeyManager::new(CryptoCapability::detect());
//!
//! let artifact = BackupService::new(&store, paths.backup_dir(), keys)
//!     .create_from_settings(&mut settings, &paths)?;
//! ```

pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;
pub mod tables;

pub use error::{ErrorKind, Outcome, VaultError, VaultResult};
