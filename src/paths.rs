//! Per-OS resolution of the editor's default target paths.
//!
//! Both artifacts live under the user's `globalStorage` directory:
//! `%APPDATA%\Code\User\globalStorage` on Windows,
//! `~/Library/Application Support/Code/User/globalStorage` on macOS,
//! `~/.config/Code/User/globalStorage` on Linux. All three map onto
//! `dirs::config_dir()`. The core never calls this; resolution happens once
//! at the caller edge and the results flow in as explicit configuration.

use std::path::PathBuf;

/// Resolved default locations of the two target artifacts.
#[derive(Debug, Clone)]
pub struct TargetPaths {
    /// The `state.vscdb` SQLite database.
    pub state_db: PathBuf,
    /// The `storage.json` identifier file.
    pub storage_json: PathBuf,
}

/// Resolve the default paths for the current OS.
///
/// Returns `None` when no per-user configuration directory can be
/// determined (e.g. `%APPDATA%`/`$HOME` unset).
#[must_use]
pub fn default_paths() -> Option<TargetPaths> {
    let global_storage = dirs::config_dir()?
        .join("Code")
        .join("User")
        .join("globalStorage");
    Some(TargetPaths {
        state_db: global_storage.join("state.vscdb"),
        storage_json: global_storage.join("storage.json"),
    })
}
