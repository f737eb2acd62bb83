//! Configuration module for Clinic Vault
//!
//! This module provides configuration management including:
//! - Data home and artifact directory resolution
//! - Settings blob persistence and the backup encryption policy

pub mod paths;
pub mod settings;

pub use paths::ClinicPaths;
pub use settings::{EnabledKey, KeyOrigin, Settings};
