//! Telemetry identifier regeneration for `storage.json`.
//!
//! The storage file identifies an install to a remote service through two
//! fields: `machineId` (64 lowercase hex chars, 256 bits of randomness) and
//! `devDeviceId` (canonical UUIDv4). Regeneration replaces existing values
//! with fresh cryptographically-random ones and rewrites the file atomically
//! (write to a temp path, then rename) so a crash mid-write cannot leave a
//! truncated file. All other fields pass through unchanged.

use std::fs;
use std::path::Path;

use rand::RngCore;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, VscrubError};

/// Number of random bytes behind a machine id (hex-encodes to 64 chars).
const MACHINE_ID_BYTES: usize = 32;

/// A freshly generated pair of telemetry identifiers.
///
/// Values are never derived from or persisted alongside prior identifiers;
/// every call produces an independent pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySet {
    /// 64-character lowercase hexadecimal machine identifier.
    #[serde(rename = "machineId")]
    pub machine_id: String,
    /// Version-4 UUID device identifier in canonical hyphenated form.
    #[serde(rename = "devDeviceId")]
    pub dev_device_id: String,
}

/// Generate a fresh identifier pair from the OS-seeded CSPRNG.
#[must_use]
pub fn generate() -> IdentitySet {
    let mut bytes = [0u8; MACHINE_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    IdentitySet {
        machine_id: hex::encode(bytes),
        dev_device_id: Uuid::new_v4().to_string(),
    }
}

/// Regenerate the identifier fields inside the storage file at `path`.
///
/// Overwrites `machineId` and `devDeviceId` wherever they already exist
/// (at the root and under the `telemetry` object). Fields that are absent
/// are not created; if no identifier field exists at all the call fails with
/// `MalformedConfig` rather than guessing a creation policy.
pub fn regenerate(path: &Path) -> Result<IdentitySet> {
    if !path.is_file() {
        return Err(VscrubError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = fs::read_to_string(path)?;
    let mut root: Value =
        serde_json::from_str(&raw).map_err(|e| VscrubError::MalformedConfig {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let Some(obj) = root.as_object_mut() else {
        return Err(VscrubError::MalformedConfig {
            path: path.to_path_buf(),
            detail: "root is not a JSON object".to_string(),
        });
    };

    let ids = generate();
    let mut updated = 0usize;

    if let Some(v) = obj.get_mut("machineId") {
        *v = Value::String(ids.machine_id.clone());
        updated += 1;
    }
    if let Some(v) = obj.get_mut("devDeviceId") {
        *v = Value::String(ids.dev_device_id.clone());
        updated += 1;
    }
    if let Some(Value::Object(telemetry)) = obj.get_mut("telemetry") {
        if let Some(v) = telemetry.get_mut("machineId") {
            *v = Value::String(ids.machine_id.clone());
            updated += 1;
        }
        if let Some(v) = telemetry.get_mut("devDeviceId") {
            *v = Value::String(ids.dev_device_id.clone());
            updated += 1;
        }
    }

    if updated == 0 {
        return Err(VscrubError::MalformedConfig {
            path: path.to_path_buf(),
            detail: "no machineId or devDeviceId field present".to_string(),
        });
    }

    write_atomic(path, &root)?;
    tracing::info!(
        path = %path.display(),
        fields_updated = updated,
        "Regenerated telemetry identifiers"
    );
    Ok(ids)
}

/// Serialize `value` and replace `path` via write-to-tmp then rename.
///
/// The temp path is a hidden sibling built from the full file name
/// (`.storage.json.tmp`), so it can never collide with an unrelated file
/// that merely shares the stem.
fn write_atomic(path: &Path, value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp_name = std::ffi::OsString::from(".");
    if let Some(name) = path.file_name() {
        tmp_name.push(name);
    }
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, json.as_bytes())?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
