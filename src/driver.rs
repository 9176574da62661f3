//! Sweep driver
//!
//! Expands the declaration once, then drives one run per edit set, strictly
//! sequentially: patch every referenced file, execute, record the outcome,
//! move on. A failure inside an iteration never escapes the loop; one
//! misconfigured edit must not block the rest of the sweep. Only
//! declaration-level errors abort before any run starts.

use crate::exec;
use crate::expand::{expand, EditSet};
use crate::manifest::{RunRecord, RunStatus, SweepLedger, SweepManifest};
use crate::patch::patch_lines;
use crate::sweep_file::SweepConfig;
use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative cancellation flag, checked between iterations (never
/// mid-run: a started child is allowed to finish).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// What one iteration produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub index: usize,
    pub total: usize,
    pub edit_set: EditSet,
    pub log_path: Option<PathBuf>,
    pub artifact_paths: Vec<PathBuf>,
    pub exit_code: Option<i32>,
    pub status: RunStatus,
}

impl RunOutcome {
    fn to_record(&self) -> RunRecord {
        RunRecord {
            index: self.index,
            configuration: self.edit_set.describe(),
            edits: self.edit_set.edits.clone(),
            log_path: self.log_path.clone(),
            artifact_paths: self.artifact_paths.clone(),
            exit_code: self.exit_code,
            status: self.status.clone(),
        }
    }
}

/// Summary of a finished (or cancelled) sweep.
#[derive(Debug)]
pub struct SweepReport {
    pub total: usize,
    pub outcomes: Vec<RunOutcome>,
    pub cancelled: bool,
    pub manifest_id: Option<String>,
}

impl SweepReport {
    pub fn completed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == RunStatus::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.completed_count()
    }
}

/// Drives a whole sweep: expander -> patcher -> executor, one edit set at a
/// time, with per-run records pushed into the ledger as they happen.
pub struct SweepDriver<'a> {
    config: &'a SweepConfig,
    config_path: PathBuf,
    command: Vec<String>,
    ledger: Option<SweepLedger>,
    cancel: CancelToken,
}

impl<'a> SweepDriver<'a> {
    pub fn new(config: &'a SweepConfig, config_path: &Path, command: Vec<String>) -> Self {
        Self {
            config,
            config_path: config_path.to_path_buf(),
            command,
            ledger: None,
            cancel: CancelToken::new(),
        }
    }

    /// Record every run in the given ledger.
    pub fn with_ledger(mut self, ledger: SweepLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Token that stops the sweep at the next iteration boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every combination. Returns `Err` only for declaration-level
    /// problems; per-run failures are recorded in the report instead.
    pub fn run(&mut self) -> Result<SweepReport> {
        let sets = expand(self.config)?;
        let total = sets.total();

        if exec::resolve_program(&self.command).is_none() {
            if let Some(program) = self.command.first() {
                warn!(program = %program, "command not found on PATH; runs may fail to launch");
                eprintln!(
                    "{} {} not found on PATH",
                    "warning:".yellow().bold(),
                    program
                );
            }
        }

        let mut manifest = self
            .ledger
            .as_ref()
            .map(|l| l.new_manifest(&self.config_path, &self.command, total));

        info!(total, command = %exec::render_command(&self.command), "starting sweep");

        let mut outcomes: Vec<RunOutcome> = Vec::new();
        let mut cancelled = false;

        for (i, set) in sets.enumerate() {
            if self.cancel.is_cancelled() {
                warn!(completed = outcomes.len(), total, "sweep cancelled");
                cancelled = true;
                break;
            }

            let index = i + 1;
            println!(
                "{} {}",
                format!("[{index}/{total}]").bold().cyan(),
                set.describe()
            );

            let outcome = self.run_one(index, total, set);
            match &outcome.status {
                RunStatus::Completed => {
                    let log = outcome
                        .log_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    let exit = outcome
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    println!("      log: {} (exit {})", log, exit);
                }
                RunStatus::Failed { error } => {
                    println!("      {} {}", "skipped:".yellow().bold(), error);
                }
            }

            if let Some(manifest) = manifest.as_mut() {
                manifest.runs.push(outcome.to_record());
                self.save_manifest(manifest);
            }
            outcomes.push(outcome);
        }

        Ok(SweepReport {
            total,
            outcomes,
            cancelled,
            manifest_id: manifest.map(|m| m.id),
        })
    }

    /// Patch and execute a single edit set. Never returns an error: every
    /// failure becomes a `Failed` outcome.
    fn run_one(&self, index: usize, total: usize, set: EditSet) -> RunOutcome {
        let mut artifacts: Vec<(PathBuf, PathBuf)> = Vec::new();

        for (path, edits) in set.by_path() {
            let original = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    return self.failed(
                        index,
                        total,
                        set.clone(),
                        artifacts,
                        format!("failed to read target {}: {}", path.display(), e),
                    );
                }
            };
            let lines: Vec<String> = original.lines().map(str::to_string).collect();

            let patched = match patch_lines(&lines, &edits) {
                Ok(patched) => patched,
                Err(e) => {
                    return self.failed(index, total, set.clone(), artifacts, e.to_string());
                }
            };

            match exec::write_artifact(path, &patched) {
                Ok(artifact) => artifacts.push((path.to_path_buf(), artifact)),
                Err(e) => {
                    return self.failed(index, total, set.clone(), artifacts, e.to_string());
                }
            }
        }

        match exec::execute(&artifacts, &self.command, &set) {
            Ok(run) => {
                info!(
                    index,
                    total,
                    log = %run.log_path.display(),
                    status = %exec::exit_status_string(&run.exit_status),
                    "run completed"
                );
                RunOutcome {
                    index,
                    total,
                    edit_set: set,
                    log_path: Some(run.log_path),
                    artifact_paths: artifacts.into_iter().map(|(_, a)| a).collect(),
                    exit_code: run.exit_status.code(),
                    status: RunStatus::Completed,
                }
            }
            Err(e) => self.failed(index, total, set, artifacts, e.to_string()),
        }
    }

    fn failed(
        &self,
        index: usize,
        total: usize,
        set: EditSet,
        artifacts: Vec<(PathBuf, PathBuf)>,
        error: String,
    ) -> RunOutcome {
        warn!(index, total, error = %error, "run skipped");
        RunOutcome {
            index,
            total,
            edit_set: set,
            log_path: None,
            artifact_paths: artifacts.into_iter().map(|(_, a)| a).collect(),
            exit_code: None,
            status: RunStatus::Failed { error },
        }
    }

    /// Ledger writes must not kill a sweep that is otherwise healthy.
    fn save_manifest(&self, manifest: &SweepManifest) {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.save(manifest) {
                warn!(error = %e, "failed to update sweep manifest");
            }
        }
    }
}
