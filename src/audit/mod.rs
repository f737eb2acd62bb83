//! Audit logging system for Clinic Vault
//!
//! Records the outcome of every backup, restore, export, import and settings
//! change in an append-only audit log.
//!
//! - `AuditEntry`: timestamp, operation, success flag, error kind and detail
//! - `AuditLogger`: appends entries to the log as line-delimited JSON (JSONL)

mod entry;
mod logger;

pub use entry::{AuditEntry, Operation};
pub use logger::AuditLogger;
