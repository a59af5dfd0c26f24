//! Keyword-filtered row deletion against the `state.vscdb` database.
//!
//! The editor's global state lives in a single key/value table
//! (`ItemTable(key TEXT PRIMARY KEY, value BLOB)`). Cleaning deletes every
//! row whose key contains the keyword as a case-sensitive substring, inside
//! one transaction: either all matching rows go and the change commits, or
//! none do. A short busy timeout makes a lock held by a live editor surface
//! as `DatabaseLocked` promptly instead of hanging.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OpenFlags, params};
use serde::Serialize;

use crate::error::{Result, VscrubError};

/// Default keyword matched against row keys.
pub const DEFAULT_KEYWORD: &str = "augment";

/// How long to wait on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Outcome of a clean run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanResult {
    /// Number of rows deleted. Zero matches is success, not an error.
    pub rows_removed: usize,
}

/// Delete all rows of `ItemTable` whose key contains `keyword`.
///
/// Matching is substring-based and case-sensitive (SQLite `instr`, not
/// `LIKE`). The deletion is transactional; on any mid-operation failure the
/// transaction rolls back before the error propagates.
pub fn clean(path: &Path, keyword: &str) -> Result<CleanResult> {
    if keyword.is_empty() {
        return Err(VscrubError::InvalidFilter);
    }
    if !path.is_file() {
        return Err(VscrubError::NotFound {
            path: path.to_path_buf(),
        });
    }

    // READ_WRITE without CREATE: a missing database must never be created.
    let mut conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .map_err(|e| map_db_err(path, e))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| map_db_err(path, e))?;

    let tx = conn.transaction().map_err(|e| map_db_err(path, e))?;
    let rows_removed = tx
        .execute(
            "DELETE FROM ItemTable WHERE instr(key, ?1) > 0",
            params![keyword],
        )
        .map_err(|e| map_db_err(path, e))?;
    tx.commit().map_err(|e| map_db_err(path, e))?;

    tracing::info!(
        path = %path.display(),
        keyword,
        rows_removed,
        "Cleaned state database"
    );
    Ok(CleanResult { rows_removed })
}

/// Translate rusqlite errors into the crate's error kinds.
fn map_db_err(path: &Path, err: rusqlite::Error) -> VscrubError {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => VscrubError::DatabaseLocked {
                path: path.to_path_buf(),
            },
            ErrorCode::NotADatabase => VscrubError::MalformedDatabase {
                path: path.to_path_buf(),
                detail: "file is not a SQLite database".to_string(),
            },
            // Filesystem-level failures on a valid database are I/O errors,
            // not a malformed-database claim.
            ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull => VscrubError::Io(std::io::Error::other(format!(
                "{}: {}",
                path.display(),
                message.unwrap_or_else(|| code.to_string())
            ))),
            _ => VscrubError::MalformedDatabase {
                path: path.to_path_buf(),
                detail: message.unwrap_or_else(|| code.to_string()),
            },
        },
        other => VscrubError::MalformedDatabase {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}
