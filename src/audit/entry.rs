//! Audit entry data structures
//!
//! One entry per lifecycle operation: what ran, when, and how it ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Outcome};

/// Lifecycle operations that are audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Backup,
    Restore,
    Export,
    Import,
    Settings,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Backup => "BACKUP",
            Operation::Restore => "RESTORE",
            Operation::Export => "EXPORT",
            Operation::Import => "IMPORT",
            Operation::Settings => "SETTINGS",
        };
        f.pad(name)
    }
}

/// A single audit log entry
///
/// `detail` carries the outcome message. Key material never appears in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation finished (UTC)
    pub timestamp: DateTime<Utc>,

    /// Operation performed
    pub operation: Operation,

    /// Whether it succeeded
    pub success: bool,

    /// Error kind on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    /// Human-readable outcome
    pub detail: String,
}

impl AuditEntry {
    /// Record the outcome of `operation`
    pub fn from_outcome(operation: Operation, outcome: &Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            success: outcome.success,
            kind: outcome.kind,
            detail: outcome.message.clone(),
        }
    }

    /// Format the entry for human-readable display
    pub fn format_human_readable(&self) -> String {
        let status = match (self.success, self.kind) {
            (true, _) => "ok".to_string(),
            (false, Some(kind)) => kind.to_string(),
            (false, None) => "failed".to_string(),
        };
        format!(
            "{} {:<8} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            status,
            self.detail
        )
    }
}
