//! Run execution
//!
//! Writes each patched file to a uniquely-named temp artifact, swaps the
//! artifact paths into the command template, and runs the command with
//! combined stdout/stderr streamed into a per-run log file.
//!
//! Artifacts and logs are deliberately kept on disk after the run: the whole
//! point of the sweep is inspecting them afterwards. The ledger records
//! their paths; nothing cleans them up.

use crate::expand::EditSet;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::Builder;
use tracing::debug;

/// A run that could not be carried out. Recovered at the driver level: the
/// current run is abandoned, the sweep continues. A child that launches and
/// exits non-zero is NOT an error; its status lands in the log and ledger.
#[derive(Debug)]
pub enum ExecError {
    /// The child process could not be launched at all.
    Spawn { program: String, source: io::Error },
    /// Creating or writing a temp artifact or log file failed.
    Io { what: String, source: io::Error },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Spawn { program, source } => {
                write!(f, "failed to launch {}: {}", program, source)
            }
            ExecError::Io { what, source } => write!(f, "{}: {}", what, source),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Spawn { source, .. } | ExecError::Io { source, .. } => Some(source),
        }
    }
}

fn io_err(what: impl Into<String>) -> impl FnOnce(io::Error) -> ExecError {
    let what = what.into();
    move |source| ExecError::Io { what, source }
}

/// A finished run: where its log landed and how the child exited.
#[derive(Debug)]
pub struct CompletedRun {
    pub log_path: PathBuf,
    pub exit_status: ExitStatus,
}

/// Write `patched_lines` to a fresh temp artifact carrying the original
/// file's extension, and keep it on disk.
pub fn write_artifact(original: &Path, patched_lines: &[String]) -> Result<PathBuf, ExecError> {
    let suffix = original
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut builder = Builder::new();
    builder.prefix("sweepx-");
    if !suffix.is_empty() {
        builder.suffix(&suffix);
    }

    let mut file = builder
        .tempfile()
        .map_err(io_err("failed to create patched artifact"))?;

    let mut text = patched_lines.join("\n");
    text.push('\n');
    file.write_all(text.as_bytes())
        .map_err(io_err("failed to write patched artifact"))?;
    file.flush()
        .map_err(io_err("failed to flush patched artifact"))?;

    let (_, path) = file
        .keep()
        .map_err(|e| ExecError::Io {
            what: "failed to keep patched artifact".to_string(),
            source: e.error,
        })?;

    debug!(artifact = %path.display(), original = %original.display(), "wrote patched artifact");
    Ok(path)
}

/// Build the argv actually run: every template element equal to an original
/// path is swapped for its artifact. If nothing matched, the first artifact
/// path is appended so the command still sees the patched file.
fn build_argv(command_template: &[String], artifacts: &[(PathBuf, PathBuf)]) -> Vec<String> {
    let mut substituted = false;
    let mut argv: Vec<String> = command_template
        .iter()
        .map(|arg| {
            match artifacts
                .iter()
                .find(|(original, _)| Path::new(arg) == original.as_path())
            {
                Some((_, artifact)) => {
                    substituted = true;
                    artifact.display().to_string()
                }
                None => arg.clone(),
            }
        })
        .collect();

    if !substituted {
        if let Some((_, artifact)) = artifacts.first() {
            argv.push(artifact.display().to_string());
        }
    }
    argv
}

/// Run the command for one edit set.
///
/// Creates the run log, writes the edit-set rendering as its first line,
/// launches the child with stdout and stderr appended to the same log, and
/// blocks until it terminates. The log path is always returned once the
/// child has launched, whatever its exit status.
pub fn execute(
    artifacts: &[(PathBuf, PathBuf)],
    command_template: &[String],
    edit_set: &EditSet,
) -> Result<CompletedRun, ExecError> {
    let argv = build_argv(command_template, artifacts);

    let mut log_file = Builder::new()
        .prefix("sweepx-")
        .suffix(".log")
        .tempfile()
        .map_err(io_err("failed to create run log"))?;

    writeln!(log_file, "configuration: {}", edit_set.describe())
        .and_then(|_| writeln!(log_file))
        .and_then(|_| log_file.flush())
        .map_err(io_err("failed to write run log header"))?;

    let (file, log_path) = log_file.keep().map_err(|e| ExecError::Io {
        what: "failed to keep run log".to_string(),
        source: e.error,
    })?;

    let stdout = file.try_clone().map_err(io_err("failed to clone log handle"))?;
    let stderr = file;

    let program = argv.first().cloned().unwrap_or_default();
    debug!(command = %render_command(&argv), log = %log_path.display(), "launching run");

    let mut child = Command::new(&program)
        .args(argv.get(1..).unwrap_or(&[]))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

    let exit_status = child
        .wait()
        .map_err(io_err("failed to wait for child process"))?;

    debug!(status = %exit_status_string(&exit_status), "run finished");

    Ok(CompletedRun {
        log_path,
        exit_status,
    })
}

/// Resolve the template's program through PATH, for a pre-sweep sanity
/// check. A miss is only worth a warning: spawn errors stay per-run.
pub fn resolve_program(command_template: &[String]) -> Option<PathBuf> {
    let program = command_template.first()?;
    which::which(program).ok()
}

/// Render an exit status for logs and the ledger.
pub fn exit_status_string(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Shell-style rendering of an argv for progress output.
pub fn render_command(argv: &[String]) -> String {
    let parts: Vec<String> = argv.iter().map(|a| shell_quote(a)).collect();
    parts.join(" ")
}

fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | ':' | '@' | '+' | '=')
    });
    if safe {
        return arg.to_string();
    }
    let escaped = arg.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}
