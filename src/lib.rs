//! vscrub: guarded, crash-safe cleanup of VS Code state artifacts.
//!
//! The crate mutates two local files belonging to an installed VS Code:
//! the `state.vscdb` SQLite database holding cached extension state, and the
//! `storage.json` file holding machine/telemetry identifiers. Every mutation
//! follows the same discipline: detect a running editor instance, snapshot
//! the target file, mutate, and restore the snapshot if the mutation fails.
//!
//! # Modules
//!
//! - `backup`: snapshot/restore of a single file
//! - `process`: running-instance detection and termination
//! - `cleaner`: keyword-filtered row deletion against `state.vscdb`
//! - `identity`: telemetry identifier regeneration in `storage.json`
//! - `guarded`: the snapshot → mutate → restore-on-failure helper
//! - `orchestrator`: sequences the above and reports structured outcomes
//! - `paths`: per-OS resolution of the default target paths
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod backup;
pub mod cleaner;
pub mod error;
pub mod guarded;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod process;

pub use error::{Result, VscrubError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
