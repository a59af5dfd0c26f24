//! Snapshot and restore of a single target file.
//!
//! A snapshot is a byte-for-byte sibling copy named with a UTC timestamp
//! suffix so it never collides with the original or with earlier snapshots.
//! Backups are kept after a successful mutation so the user retains a manual
//! fallback; automatic restore only happens when a mutation fails.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Result, VscrubError};

/// References a snapshot and the original file it was taken from.
#[derive(Debug, Clone)]
pub struct BackupHandle {
    original: PathBuf,
    backup: PathBuf,
}

impl BackupHandle {
    /// Path of the file the snapshot was taken from.
    #[must_use]
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Path of the snapshot on disk.
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }
}

/// Snapshot `path` to a sibling backup file.
///
/// Fails with `NotFound` if `path` does not exist; in that case no backup
/// file is created. The original file is never modified.
pub fn snapshot(path: &Path) -> Result<BackupHandle> {
    if !path.is_file() {
        return Err(VscrubError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let backup = next_backup_path(path);
    fs::copy(path, &backup)?;
    tracing::info!(
        original = %path.display(),
        backup = %backup.display(),
        "Created backup"
    );

    Ok(BackupHandle {
        original: path.to_path_buf(),
        backup,
    })
}

/// Copy the snapshot back over the original path.
///
/// Idempotent: restoring twice yields the same end state. Fails with
/// `RestoreFailed` if the backup is missing or the write cannot complete.
pub fn restore(handle: &BackupHandle) -> Result<()> {
    fs::copy(&handle.backup, &handle.original).map_err(|e| VscrubError::RestoreFailed {
        detail: format!(
            "could not copy {} over {}: {e}",
            handle.backup.display(),
            handle.original.display()
        ),
    })?;
    tracing::info!(
        original = %handle.original.display(),
        backup = %handle.backup.display(),
        "Restored original from backup"
    );
    Ok(())
}

/// Derive a sibling backup path that does not collide with existing files.
fn next_backup_path(path: &Path) -> PathBuf {
    let name = path.file_name().map_or_else(
        || "file".to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");
    let mut candidate = path.with_file_name(format!("{name}.backup-{stamp}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{name}.backup-{stamp}-{n}"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn snapshot_then_restore_round_trips_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        fs::write(&path, b"{\"machineId\": \"abc\"}").unwrap();

        let handle = snapshot(&path).unwrap();
        assert!(handle.backup_path().exists());

        // Clobber the original, then restore
        fs::write(&path, b"garbage").unwrap();
        restore(&handle).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"machineId\": \"abc\"}");
    }

    #[test]
    fn restore_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.vscdb");
        fs::write(&path, b"original bytes").unwrap();

        let handle = snapshot(&path).unwrap();
        fs::write(&path, b"mutated").unwrap();

        restore(&handle).unwrap();
        restore(&handle).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"original bytes");
    }

    #[test]
    fn snapshot_missing_file_fails_without_creating_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.vscdb");

        let result = snapshot(&path);
        assert!(matches!(result, Err(VscrubError::NotFound { .. })));

        // No stray backup files
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn snapshot_does_not_mutate_original() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.vscdb");
        fs::write(&path, b"payload").unwrap();

        let _handle = snapshot(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn repeated_snapshots_get_distinct_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.vscdb");
        fs::write(&path, b"payload").unwrap();

        let first = snapshot(&path).unwrap();
        let second = snapshot(&path).unwrap();
        assert_ne!(first.backup_path(), second.backup_path());
        assert!(first.backup_path().exists());
        assert!(second.backup_path().exists());
    }

    #[test]
    fn restore_with_missing_backup_reports_restore_failed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        fs::write(&path, b"{}").unwrap();

        let handle = snapshot(&path).unwrap();
        fs::remove_file(handle.backup_path()).unwrap();

        let result = restore(&handle);
        assert!(matches!(result, Err(VscrubError::RestoreFailed { .. })));
    }
}
