//! Append-only audit log
//!
//! One JSON object per line. A line that fails to parse (for example one
//! cut short by a crash) is skipped when reading instead of hiding the rest
//! of the history.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{VaultError, VaultResult};

use super::entry::AuditEntry;

/// Records lifecycle outcomes in the data home
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append one entry as a single line
    pub fn log(&self, entry: &AuditEntry) -> VaultResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| self.io_error(e))
    }

    /// Every readable entry, oldest first
    pub fn read_all(&self) -> VaultResult<Vec<AuditEntry>> {
        let contents = match fs::read_to_string(&self.log_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "skipping unreadable audit entry");
                    None
                }
            })
            .collect())
    }

    /// The last `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> VaultResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(count);
        entries.drain(..skip);
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn io_error(&self, err: io::Error) -> VaultError {
        VaultError::Io(format!("audit log {}: {}", self.log_path.display(), err))
    }
}
