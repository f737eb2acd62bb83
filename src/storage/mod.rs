//! Storage layer for Clinic Vault
//!
//! Provides the SQLite primary store, its first-run schema, and the atomic
//! file helpers every artifact writer goes through.

pub mod file_io;
pub mod schema;
pub mod store;

pub use file_io::{read_json_required, write_bytes_atomic, write_json_atomic};
pub use schema::DOMAIN_TABLES;
pub use store::PrimaryStore;
