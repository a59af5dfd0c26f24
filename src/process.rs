//! Running-instance detection and termination for the target editor.
//!
//! A live editor instance can hold an open handle or write-ahead-log lock on
//! the state database; mutating underneath it risks corruption or silent
//! overwrite. Detection and optional termination therefore precede every
//! mutation. This is a mitigation, not a lock: there is an accepted
//! time-of-check/time-of-use window between "not running" and the mutation.
//!
//! OS interaction sits behind the [`ProcessInspector`] capability trait so
//! tests run against [`MockProcessInspector`] instead of real processes.

use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

/// Shared handle to a process inspector implementation.
pub type InspectorHandle = Arc<dyn ProcessInspector>;

/// Executable names probed for running editor instances.
#[cfg(unix)]
const TARGET_PROCESS_NAMES: &[&str] = &["code", "code-insiders", "code-oss"];
#[cfg(windows)]
const TARGET_PROCESS_NAMES: &[&str] = &["Code.exe", "Code - Insiders.exe", "Code - OSS.exe"];

/// Default bound on the graceful-termination wait before escalating.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// An operating-system process believed to belong to the target editor.
///
/// Detected at the start of an operation and never tracked beyond the single
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningInstance {
    /// OS process id.
    pub pid: u32,
    /// Executable name the process matched on.
    pub name: String,
}

/// Per-instance termination outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum TerminationOutcome {
    /// The process exited within the grace period.
    Graceful,
    /// The process survived the grace period and was force-killed.
    Forced,
    /// The process could not be terminated.
    Failed { detail: String },
}

/// One termination attempt against one instance.
#[derive(Debug, Clone, Serialize)]
pub struct TerminationAttempt {
    pub instance: RunningInstance,
    pub outcome: TerminationOutcome,
}

/// Per-instance results of a termination request.
///
/// Termination never fails the overall call; instances that survive show up
/// here as partial results for the caller to act on (typically: abort the
/// mutation rather than proceed against locked files).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TerminationReport {
    pub attempts: Vec<TerminationAttempt>,
}

impl TerminationReport {
    /// Whether every targeted instance is gone.
    #[must_use]
    pub fn all_terminated(&self) -> bool {
        self.attempts
            .iter()
            .all(|a| !matches!(a.outcome, TerminationOutcome::Failed { .. }))
    }

    /// Instances that survived the request.
    #[must_use]
    pub fn survivors(&self) -> Vec<&RunningInstance> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, TerminationOutcome::Failed { .. }))
            .map(|a| &a.instance)
            .collect()
    }
}

/// Abstraction over OS process-table queries and termination.
pub trait ProcessInspector: Send + Sync {
    /// Query the process table for running editor instances.
    ///
    /// Never fails: a query error is logged as a warning and treated as
    /// "none found".
    fn list_running(&self) -> Vec<RunningInstance>;

    /// Request termination of each instance: graceful signal, bounded wait,
    /// forced kill if still alive. Reports per-instance success/failure.
    fn terminate(&self, instances: &[RunningInstance]) -> TerminationReport;
}

// ---------------------------------------------------------------------------
// SystemProcessInspector: real OS backend
// ---------------------------------------------------------------------------

/// OS-backed inspector shelling out to the platform's process tools.
pub struct SystemProcessInspector {
    names: Vec<String>,
    grace_period: Duration,
}

impl Default for SystemProcessInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProcessInspector {
    /// Inspector targeting the known editor executable names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: TARGET_PROCESS_NAMES.iter().map(ToString::to_string).collect(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Override the graceful-termination grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Wrap in a shareable handle.
    #[must_use]
    pub fn into_handle(self) -> InspectorHandle {
        Arc::new(self)
    }
}

impl ProcessInspector for SystemProcessInspector {
    fn list_running(&self) -> Vec<RunningInstance> {
        let mut found = Vec::new();
        for name in &self.names {
            match pids_for(name) {
                Ok(pids) => {
                    found.extend(pids.into_iter().map(|pid| RunningInstance {
                        pid,
                        name: name.clone(),
                    }));
                }
                Err(e) => {
                    tracing::warn!(name, error = %e, "Process query failed, treating as none found");
                }
            }
        }
        found
    }

    fn terminate(&self, instances: &[RunningInstance]) -> TerminationReport {
        let mut report = TerminationReport::default();
        for instance in instances {
            let outcome = terminate_one(instance, self.grace_period);
            tracing::info!(
                pid = instance.pid,
                name = %instance.name,
                outcome = ?outcome,
                "Termination attempt"
            );
            report.attempts.push(TerminationAttempt {
                instance: instance.clone(),
                outcome,
            });
        }
        report
    }
}

/// Signal one instance, wait out the grace period, escalate if needed.
fn terminate_one(instance: &RunningInstance, grace_period: Duration) -> TerminationOutcome {
    if let Err(e) = signal_term(instance.pid) {
        return TerminationOutcome::Failed { detail: e };
    }

    let poll = Duration::from_millis(100);
    let deadline = std::time::Instant::now() + grace_period;
    while std::time::Instant::now() < deadline {
        if !is_alive(instance.pid) {
            return TerminationOutcome::Graceful;
        }
        std::thread::sleep(poll);
    }

    if let Err(e) = signal_kill(instance.pid) {
        return TerminationOutcome::Failed { detail: e };
    }
    std::thread::sleep(Duration::from_millis(200));
    if is_alive(instance.pid) {
        TerminationOutcome::Failed {
            detail: "process survived forced kill".to_string(),
        }
    } else {
        TerminationOutcome::Forced
    }
}

#[cfg(unix)]
fn pids_for(name: &str) -> std::io::Result<Vec<u32>> {
    let output = Command::new("pgrep").args(["-x", name]).output()?;
    // pgrep exits 1 when nothing matched; that is an empty result, not an error.
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect())
}

#[cfg(unix)]
fn signal_term(pid: u32) -> std::result::Result<(), String> {
    run_signal("-TERM", pid)
}

#[cfg(unix)]
fn signal_kill(pid: u32) -> std::result::Result<(), String> {
    run_signal("-KILL", pid)
}

#[cfg(unix)]
fn run_signal(sig: &str, pid: u32) -> std::result::Result<(), String> {
    let status = Command::new("kill")
        .args([sig, &pid.to_string()])
        .status()
        .map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("kill {sig} {pid} exited with {status}"))
    }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn pids_for(name: &str) -> std::io::Result<Vec<u32>> {
    let output = Command::new("tasklist")
        .args(["/FI", &format!("IMAGENAME eq {name}"), "/FO", "CSV", "/NH"])
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| {
            // CSV row: "Image Name","PID","Session Name","Session#","Mem Usage"
            let mut fields = line.split("\",\"");
            let _image = fields.next()?;
            fields.next()?.trim_matches('"').parse().ok()
        })
        .collect())
}

#[cfg(windows)]
fn signal_term(pid: u32) -> std::result::Result<(), String> {
    run_taskkill(pid, false)
}

#[cfg(windows)]
fn signal_kill(pid: u32) -> std::result::Result<(), String> {
    run_taskkill(pid, true)
}

#[cfg(windows)]
fn run_taskkill(pid: u32, force: bool) -> std::result::Result<(), String> {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string(), "/T"]);
    if force {
        cmd.arg("/F");
    }
    let status = cmd.status().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("taskkill /PID {pid} exited with {status}"))
    }
}

#[cfg(windows)]
fn is_alive(pid: u32) -> bool {
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/FO", "CSV", "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\"")))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// MockProcessInspector: in-memory process table for testing
// ---------------------------------------------------------------------------

/// In-memory inspector for tests; no real processes involved.
///
/// Instances marked unkillable survive termination requests so tests can
/// exercise the partial-failure path.
#[derive(Default)]
pub struct MockProcessInspector {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    running: Vec<RunningInstance>,
    unkillable: Vec<u32>,
}

impl MockProcessInspector {
    /// Inspector with an empty process table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running instance to the mock process table.
    pub fn add_instance(&self, pid: u32, name: &str) {
        let mut state = self.state.lock().expect("mock inspector poisoned");
        state.running.push(RunningInstance {
            pid,
            name: name.to_string(),
        });
    }

    /// Make an instance survive termination requests.
    pub fn mark_unkillable(&self, pid: u32) {
        let mut state = self.state.lock().expect("mock inspector poisoned");
        state.unkillable.push(pid);
    }

    /// Wrap in a shareable handle.
    #[must_use]
    pub fn into_handle(self) -> InspectorHandle {
        Arc::new(self)
    }
}

impl ProcessInspector for MockProcessInspector {
    fn list_running(&self) -> Vec<RunningInstance> {
        self.state
            .lock()
            .expect("mock inspector poisoned")
            .running
            .clone()
    }

    fn terminate(&self, instances: &[RunningInstance]) -> TerminationReport {
        let mut state = self.state.lock().expect("mock inspector poisoned");
        let mut report = TerminationReport::default();
        for instance in instances {
            let outcome = if state.unkillable.contains(&instance.pid) {
                TerminationOutcome::Failed {
                    detail: "marked unkillable".to_string(),
                }
            } else {
                state.running.retain(|r| r.pid != instance.pid);
                TerminationOutcome::Graceful
            };
            report.attempts.push(TerminationAttempt {
                instance: instance.clone(),
                outcome,
            });
        }
        report
    }
}
