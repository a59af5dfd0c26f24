//! Sequences process guard, backup, and mutation into one state machine.
//!
//! Per operation: detect running instances → (abort or terminate) → snapshot
//! → mutate → `Succeeded`, or `Failed` after an attempted restore, or
//! `Aborted` when no mutation was attempted (instance still running, or
//! target file missing). `run_all` executes both operations as independent
//! runs; a failure in the first never prevents the second.
//!
//! The orchestrator is deterministic: paths, keyword and the on-running
//! policy arrive as explicit configuration, and OS process interaction comes
//! through the injected [`InspectorHandle`]. It never prompts, prints, or
//! exits; callers render the structured reports.

use std::path::PathBuf;

use serde::Serialize;

use crate::cleaner::{self, CleanResult};
use crate::guarded;
use crate::identity::{self, IdentitySet};
use crate::process::InspectorHandle;

/// Operation selector for [`Orchestrator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CleanDatabase,
    ModifyIdentity,
    RunAll,
}

/// Identifies which mutation a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CleanDatabase,
    ModifyIdentity,
}

/// What to do when running instances of the target application are found.
///
/// Interactive confirmation lives in the caller; the core takes the decision
/// as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningPolicy {
    /// Abort the operation, leaving the files untouched.
    Abort,
    /// Terminate the instances, then proceed if all of them exited.
    Terminate,
}

/// Explicit configuration for one invocation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Resolved path of the state database.
    pub db_path: PathBuf,
    /// Resolved path of the storage JSON file.
    pub storage_path: PathBuf,
    /// Keyword matched against database row keys.
    pub keyword: String,
    /// Policy applied when running instances are detected.
    pub on_running: RunningPolicy,
}

/// Terminal state of a single operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OperationOutcome {
    /// Mutation committed. Exactly one of `rows_removed`/`identity` is set,
    /// depending on the operation.
    Succeeded {
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        rows_removed: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        identity: Option<IdentitySet>,
    },
    /// Mutation failed; a restore from backup was attempted first.
    /// `restore_failed` marks the high-severity case where the restore also
    /// failed and the original file may be inconsistent.
    Failed { reason: String, restore_failed: bool },
    /// No mutation attempted and no backup taken.
    Aborted { reason: String },
}

/// Structured result of one operation run.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: OperationKind,
    #[serde(flatten)]
    pub outcome: OperationOutcome,
    /// Backup retained on disk, when one was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

impl OperationReport {
    /// Whether the operation reached `Succeeded`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Succeeded { .. })
    }
}

/// Reports for every operation a [`Orchestrator::run`] call executed.
///
/// `run_all` yields two entries, reported separately per the caller
/// contract; single operations yield one.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reports: Vec<OperationReport>,
}

impl RunSummary {
    /// Whether every executed operation succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.reports.iter().all(OperationReport::succeeded)
    }
}

/// Value produced by whichever mutation ran.
enum MutationValue {
    Clean(CleanResult),
    Identity(IdentitySet),
}

/// Sequences ProcessGuard → BackupManager → mutator for each operation.
pub struct Orchestrator {
    config: OrchestratorConfig,
    inspector: InspectorHandle,
}

impl Orchestrator {
    /// Build an orchestrator from explicit configuration and an inspector.
    #[must_use]
    pub fn new(config: OrchestratorConfig, inspector: InspectorHandle) -> Self {
        Self { config, inspector }
    }

    /// Run the requested operation(s) and report every outcome.
    #[must_use]
    pub fn run(&self, operation: Operation) -> RunSummary {
        let reports = match operation {
            Operation::CleanDatabase => vec![self.run_one(OperationKind::CleanDatabase)],
            Operation::ModifyIdentity => vec![self.run_one(OperationKind::ModifyIdentity)],
            Operation::RunAll => vec![
                self.run_one(OperationKind::CleanDatabase),
                self.run_one(OperationKind::ModifyIdentity),
            ],
        };
        RunSummary { reports }
    }

    fn run_one(&self, kind: OperationKind) -> OperationReport {
        let path = match kind {
            OperationKind::CleanDatabase => &self.config.db_path,
            OperationKind::ModifyIdentity => &self.config.storage_path,
        };

        // Detect running instances before touching anything. This is a
        // mitigation, not a lock: the window between this check and the
        // mutation below is accepted.
        let running = self.inspector.list_running();
        if !running.is_empty() {
            tracing::info!(
                instances = running.len(),
                operation = ?kind,
                "Target application is running"
            );
            match self.config.on_running {
                RunningPolicy::Abort => {
                    return aborted(
                        kind,
                        format!(
                            "{} running instance(s) of the target application; termination not requested",
                            running.len()
                        ),
                    );
                }
                RunningPolicy::Terminate => {
                    let report = self.inspector.terminate(&running);
                    if !report.all_terminated() {
                        let pids: Vec<String> = report
                            .survivors()
                            .iter()
                            .map(|i| i.pid.to_string())
                            .collect();
                        return aborted(
                            kind,
                            format!(
                                "could not terminate running instance(s) (pid {}); refusing to mutate possibly-locked files",
                                pids.join(", ")
                            ),
                        );
                    }
                }
            }
        }

        if !path.is_file() {
            return aborted(kind, format!("target file not found: {}", path.display()));
        }

        let result = match kind {
            OperationKind::CleanDatabase => guarded::run_guarded(path, |p| {
                cleaner::clean(p, &self.config.keyword).map(MutationValue::Clean)
            }),
            OperationKind::ModifyIdentity => {
                guarded::run_guarded(path, |p| identity::regenerate(p).map(MutationValue::Identity))
            }
        };

        match result {
            Ok((MutationValue::Clean(clean), handle)) => OperationReport {
                operation: kind,
                outcome: OperationOutcome::Succeeded {
                    detail: format!("removed {} row(s) from {}", clean.rows_removed, path.display()),
                    rows_removed: Some(clean.rows_removed),
                    identity: None,
                },
                backup_path: Some(handle.backup_path().to_path_buf()),
            },
            Ok((MutationValue::Identity(ids), handle)) => OperationReport {
                operation: kind,
                outcome: OperationOutcome::Succeeded {
                    detail: format!("regenerated telemetry identifiers in {}", path.display()),
                    rows_removed: None,
                    identity: Some(ids),
                },
                backup_path: Some(handle.backup_path().to_path_buf()),
            },
            Err(failure) => {
                let restore_failed = failure.error.is_restore_failure();
                if restore_failed {
                    tracing::error!(
                        path = %path.display(),
                        error = %failure.error,
                        "Restore from backup failed; original file may be inconsistent"
                    );
                }
                OperationReport {
                    operation: kind,
                    outcome: OperationOutcome::Failed {
                        reason: failure.error.to_string(),
                        restore_failed,
                    },
                    backup_path: failure
                        .backup
                        .as_ref()
                        .map(|h| h.backup_path().to_path_buf()),
                }
            }
        }
    }
}

fn aborted(kind: OperationKind, reason: String) -> OperationReport {
    tracing::warn!(operation = ?kind, reason = %reason, "Operation aborted");
    OperationReport {
        operation: kind,
        outcome: OperationOutcome::Aborted { reason },
        backup_path: None,
    }
}
