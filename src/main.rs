//! vscrub CLI: thin wrapper over the safe-mutation engine.
//!
//! The binary resolves target paths, decides the on-running policy (prompt
//! or `--yes`), and renders the orchestrator's structured reports. All
//! mutation logic lives in the library.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vscrub::cleaner::DEFAULT_KEYWORD;
use vscrub::orchestrator::{
    Operation, OperationKind, OperationOutcome, Orchestrator, OrchestratorConfig, RunSummary,
    RunningPolicy,
};
use vscrub::process::{InspectorHandle, MockProcessInspector, SystemProcessInspector};
use vscrub::{logging, paths};

#[derive(Parser)]
#[command(name = "vscrub", version, about = "Guarded cleanup of VS Code extension state and telemetry identifiers")]
struct Cli {
    /// Terminate running editor instances without prompting.
    #[arg(long, global = true)]
    yes: bool,

    /// Skip running-instance detection entirely (scripting/CI).
    #[arg(long, global = true)]
    no_guard: bool,

    /// Override the state database path.
    #[arg(long, global = true, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Override the storage JSON path.
    #[arg(long, global = true, value_name = "PATH")]
    storage_path: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove keyword-matching rows from the state database.
    CleanDb {
        /// Substring matched (case-sensitively) against row keys.
        #[arg(long, default_value = DEFAULT_KEYWORD)]
        keyword: String,
    },
    /// Regenerate telemetry identifiers in storage.json.
    ModifyIds,
    /// Run clean-db then modify-ids as two independent steps.
    RunAll {
        /// Substring matched (case-sensitively) against row keys.
        #[arg(long, default_value = DEFAULT_KEYWORD)]
        keyword: String,
    },
}

impl Command {
    fn operation(&self) -> Operation {
        match self {
            Self::CleanDb { .. } => Operation::CleanDatabase,
            Self::ModifyIds => Operation::ModifyIdentity,
            Self::RunAll { .. } => Operation::RunAll,
        }
    }

    fn keyword(&self) -> &str {
        match self {
            Self::CleanDb { keyword } | Self::RunAll { keyword } => keyword,
            Self::ModifyIds => DEFAULT_KEYWORD,
        }
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let defaults = match (&cli.db_path, &cli.storage_path) {
        (Some(_), Some(_)) => None,
        _ => Some(
            paths::default_paths()
                .context("could not determine the VS Code data directory for this OS")?,
        ),
    };
    let db_path = cli
        .db_path
        .clone()
        .or_else(|| defaults.as_ref().map(|p| p.state_db.clone()))
        .context("no state database path")?;
    let storage_path = cli
        .storage_path
        .clone()
        .or_else(|| defaults.as_ref().map(|p| p.storage_json.clone()))
        .context("no storage JSON path")?;

    let inspector: InspectorHandle = if cli.no_guard {
        // Empty process table: detection is skipped by construction.
        MockProcessInspector::new().into_handle()
    } else {
        SystemProcessInspector::new().into_handle()
    };

    let on_running = decide_running_policy(&cli, &inspector)?;

    let config = OrchestratorConfig {
        db_path,
        storage_path,
        keyword: cli.command.keyword().to_string(),
        on_running,
    };
    let summary = Orchestrator::new(config, inspector).run(cli.command.operation());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_human(&summary);
    }

    if summary.all_succeeded() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Map `--yes` / an interactive prompt onto a running policy.
fn decide_running_policy(cli: &Cli, inspector: &InspectorHandle) -> anyhow::Result<RunningPolicy> {
    if cli.yes {
        return Ok(RunningPolicy::Terminate);
    }
    let running = inspector.list_running();
    if running.is_empty() {
        // Nothing to terminate; the orchestrator re-checks before mutating.
        return Ok(RunningPolicy::Abort);
    }

    eprintln!("Found {} running editor instance(s):", running.len());
    for instance in &running {
        eprintln!("  pid {} ({})", instance.pid, instance.name);
    }
    eprint!("Close them before continuing? [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    if answer.trim().eq_ignore_ascii_case("y") {
        Ok(RunningPolicy::Terminate)
    } else {
        Ok(RunningPolicy::Abort)
    }
}

fn render_human(summary: &RunSummary) {
    for report in &summary.reports {
        let name = match report.operation {
            OperationKind::CleanDatabase => "clean-db",
            OperationKind::ModifyIdentity => "modify-ids",
        };
        match &report.outcome {
            OperationOutcome::Succeeded {
                detail, identity, ..
            } => {
                println!("{name}: ok - {detail}");
                if let Some(ids) = identity {
                    println!("  machineId:   {}", ids.machine_id);
                    println!("  devDeviceId: {}", ids.dev_device_id);
                }
                if let Some(backup) = &report.backup_path {
                    println!("  backup kept at {}", backup.display());
                }
            }
            OperationOutcome::Failed {
                reason,
                restore_failed,
            } => {
                println!("{name}: FAILED - {reason}");
                if *restore_failed {
                    println!("  WARNING: restore from backup also failed; the original file may be inconsistent");
                }
                if let Some(backup) = &report.backup_path {
                    println!("  backup available at {}", backup.display());
                }
            }
            OperationOutcome::Aborted { reason } => {
                println!("{name}: aborted - {reason}");
            }
        }
    }
}
