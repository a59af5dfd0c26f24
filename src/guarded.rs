//! Scoped mutation: snapshot, attempt, restore on failure.
//!
//! Both mutators share the same safety discipline, so it lives in one
//! helper: take a snapshot, run the mutation closure, keep the snapshot on
//! success, restore it on failure. If the restore itself fails the error is
//! escalated to `RestoreFailed`, carrying the original mutation error in its
//! detail, because at that point the original artifact may be inconsistent.

use std::path::Path;

use crate::backup::{self, BackupHandle};
use crate::error::{Result, VscrubError};

/// A guarded mutation that could not complete.
///
/// `backup` is present whenever a snapshot was taken before the failure, so
/// callers can point the user at the on-disk copy.
#[derive(Debug)]
pub struct GuardedFailure {
    pub error: VscrubError,
    pub backup: Option<BackupHandle>,
}

/// Snapshot `path`, run `mutate` against it, restore on failure.
///
/// On success returns the mutation result together with the retained backup
/// handle. On mutation failure the snapshot is copied back over the original
/// before the failure is returned, so the caller never observes a
/// partially-written file.
pub fn run_guarded<T, F>(path: &Path, mutate: F) -> std::result::Result<(T, BackupHandle), GuardedFailure>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let handle = match backup::snapshot(path) {
        Ok(handle) => handle,
        Err(error) => return Err(GuardedFailure { error, backup: None }),
    };

    match mutate(path) {
        Ok(value) => Ok((value, handle)),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Mutation failed, restoring original from backup"
            );
            match backup::restore(&handle) {
                Ok(()) => Err(GuardedFailure {
                    error,
                    backup: Some(handle),
                }),
                Err(VscrubError::RestoreFailed { detail }) => Err(GuardedFailure {
                    error: VscrubError::RestoreFailed {
                        detail: format!("{detail}; mutation error was: {error}"),
                    },
                    backup: Some(handle),
                }),
                Err(restore_error) => Err(GuardedFailure {
                    error: restore_error,
                    backup: Some(handle),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn success_keeps_backup_and_mutation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("target");
        fs::write(&path, b"before").unwrap();

        let (value, handle) = run_guarded(&path, |p| {
            fs::write(p, b"after")?;
            Ok(42)
        })
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(fs::read(&path).unwrap(), b"after");
        assert!(handle.backup_path().exists());
        assert_eq!(fs::read(handle.backup_path()).unwrap(), b"before");
    }

    #[test]
    fn failure_restores_original_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("target");
        fs::write(&path, b"before").unwrap();

        let failure = run_guarded::<(), _>(&path, |p| {
            // Partial write, then failure
            fs::write(p, b"half-writ")?;
            Err(VscrubError::InvalidFilter)
        })
        .unwrap_err();

        assert!(matches!(failure.error, VscrubError::InvalidFilter));
        assert!(failure.backup.is_some());
        assert_eq!(fs::read(&path).unwrap(), b"before");
    }

    #[test]
    fn missing_target_fails_fast_without_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent");

        let failure = run_guarded::<(), _>(&path, |_| panic!("must not be called")).unwrap_err();
        assert!(matches!(failure.error, VscrubError::NotFound { .. }));
        assert!(failure.backup.is_none());
    }

    #[test]
    fn restore_failure_is_escalated_with_original_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("target");
        fs::write(&path, b"before").unwrap();

        let failure = run_guarded::<(), _>(&path, |_| {
            // Sabotage the restore by removing every backup sibling.
            for entry in fs::read_dir(tmp.path()).unwrap() {
                let entry = entry.unwrap();
                if entry.file_name().to_string_lossy().contains("backup") {
                    fs::remove_file(entry.path()).unwrap();
                }
            }
            Err(VscrubError::InvalidFilter)
        })
        .unwrap_err();

        match failure.error {
            VscrubError::RestoreFailed { detail } => {
                assert!(detail.contains("keyword must be non-empty"), "detail: {detail}");
            }
            other => panic!("expected RestoreFailed, got {other}"),
        }
    }
}
