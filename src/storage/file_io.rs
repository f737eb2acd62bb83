//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure: content
//! is written to a staging file next to the target, synced, and then renamed
//! over the target in one step.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

/// Timestamp format used in every artifact file name
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, VaultError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(VaultError::Io(format!("File not found: {}", path.display())));
    }

    let file = File::open(path)
        .map_err(|e| VaultError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| VaultError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), VaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = serde_json::to_vec_pretty(data)
        .map_err(|e| VaultError::Config(format!("Failed to serialize data: {}", e)))?;
    write_bytes_atomic(path, &json)
}

/// Write bytes to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_bytes_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), VaultError> {
    let path = path.as_ref();
    let temp_path = stage_file(path, |writer| writer.write_all(data))?;
    commit_staged(&temp_path, path)
}

/// Path for a staging file in the same directory as `target`
///
/// Same directory matters: rename is only atomic within one filesystem.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "staged".to_string());
    target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Write a staging file for `target` using `fill`, synced to disk
///
/// Returns the staging path. The staging file is removed if `fill` fails.
pub fn stage_file<F>(target: &Path, fill: F) -> Result<PathBuf, VaultError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VaultError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = staging_path(target);
    let result = (|| {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = result {
        discard(&temp_path);
        return Err(VaultError::Io(format!(
            "Failed to write {}: {}",
            temp_path.display(),
            e
        )));
    }

    Ok(temp_path)
}

/// Rename a staged file over its target
///
/// On failure the staging file is removed and the target is left as it was.
pub fn commit_staged(staged: &Path, target: &Path) -> Result<(), VaultError> {
    fs::rename(staged, target).map_err(|e| {
        discard(staged);
        VaultError::Io(format!(
            "Failed to move {} into place: {}",
            target.display(),
            e
        ))
    })
}

/// Best-effort removal of a leftover file
pub fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

/// First path of the form `<dir>/<stem>.<ext>`, `<dir>/<stem>_1.<ext>`, ... that does not exist
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, ext));
    if !candidate.exists() {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_json_atomic(&path, &data).unwrap();
        assert!(path.exists());

        let loaded: TestData = read_json_required(&path).unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn test_atomic_write_no_temp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        write_json_atomic(&path, &TestData::default()).unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("test.bin");

        write_bytes_atomic(&path, b"abc").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_failed_stage_leaves_target_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target.bin");
        fs::write(&path, b"original").unwrap();

        let result = stage_file(&path, |_| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        });

        assert!(matches!(result, Err(VaultError::Io(_))));
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_json_required() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.json");

        assert!(read_json_required::<TestData, _>(&path).is_err());

        fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            read_json_required::<TestData, _>(&path),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_unique_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let first = unique_path(dir, "patients_20250101_120000", "csv");
        assert_eq!(first, dir.join("patients_20250101_120000.csv"));
        fs::write(&first, "").unwrap();

        let second = unique_path(dir, "patients_20250101_120000", "csv");
        assert_eq!(second, dir.join("patients_20250101_120000_1.csv"));
    }
}
