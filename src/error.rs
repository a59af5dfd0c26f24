//! Error types for vscrub.
//!
//! Every failure a mutation can hit maps to one variant here. `RestoreFailed`
//! is the highest-severity kind: it means a mutation failed *and* the
//! automatic restore from backup could not complete, so the original artifact
//! may be inconsistent. Callers must surface it prominently.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, VscrubError>;

/// Errors raised by the safe-mutation engine.
#[derive(Error, Debug)]
pub enum VscrubError {
    /// The target file does not exist. The engine never creates missing
    /// targets; absence is reported, not silently handled.
    #[error("target file not found: {path}")]
    NotFound { path: PathBuf },

    /// The database is locked by another process (usually a running editor
    /// instance holding a WAL lock).
    #[error("database is locked by another process: {path}")]
    DatabaseLocked { path: PathBuf },

    /// The file is not a valid state database of the expected schema.
    #[error("not a valid state database: {path}: {detail}")]
    MalformedDatabase { path: PathBuf, detail: String },

    /// The storage file is not valid JSON, or carries none of the expected
    /// identifier fields.
    #[error("invalid storage config: {path}: {detail}")]
    MalformedConfig { path: PathBuf, detail: String },

    /// A mutation failed and restoring the original from its backup also
    /// failed. The original file may be inconsistent.
    #[error("restore from backup failed: {detail}")]
    RestoreFailed { detail: String },

    /// The cleanup keyword was empty.
    #[error("cleanup keyword must be non-empty")]
    InvalidFilter,

    /// Filesystem-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure outside of config parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VscrubError {
    /// Whether this error means the original artifact may now be inconsistent.
    #[must_use]
    pub fn is_restore_failure(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}
