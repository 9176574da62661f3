//! Sweep ledger
//!
//! The per-run log files live in the temp dir and are the raw record of a
//! sweep; the ledger ties them back together. Each executed sweep writes a
//! manifest under `~/.sweepx/sweeps/<id>/manifest.json` correlating every
//! run index to its edit set, log path, artifacts, and exit status. The
//! manifest is rewritten after every run so a crashed sweep still leaves a
//! readable partial record.

use crate::expand::Edit;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";

/// How one run of the sweep ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The child was launched and ran to termination (any exit code).
    Completed,
    /// Patching or launching failed; the run was skipped.
    Failed { error: String },
}

/// The terminal record of one sweep iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// 1-based run index within the sweep.
    pub index: usize,
    /// Rendered edit set, matching the first line of the run log.
    pub configuration: String,
    pub edits: Vec<Edit>,
    pub log_path: Option<PathBuf>,
    pub artifact_paths: Vec<PathBuf>,
    pub exit_code: Option<i32>,
    pub status: RunStatus,
}

/// Everything recorded about one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepManifest {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub config_path: PathBuf,
    pub command: Vec<String>,
    /// Total combinations the declaration expanded to.
    pub total: usize,
    pub runs: Vec<RunRecord>,
}

impl SweepManifest {
    pub fn completed_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.runs.len() - self.completed_count()
    }
}

/// Stores and retrieves sweep manifests under a single directory.
pub struct SweepLedger {
    sweeps_dir: PathBuf,
}

impl SweepLedger {
    pub fn new() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        Self::with_directory(home_dir.join(".sweepx").join("sweeps"))
    }

    /// Use a custom ledger directory.
    pub fn with_directory(sweeps_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&sweeps_dir).with_context(|| {
            format!(
                "Failed to create sweeps directory: {}",
                sweeps_dir.display()
            )
        })?;
        Ok(Self { sweeps_dir })
    }

    pub fn sweeps_dir(&self) -> &Path {
        &self.sweeps_dir
    }

    /// Start a fresh manifest with a unique id.
    pub fn new_manifest(
        &self,
        config_path: &Path,
        command: &[String],
        total: usize,
    ) -> SweepManifest {
        // Millisecond timestamp prefix keeps ids sortable; the uuid fragment
        // keeps them unique when sweeps start within the same millisecond.
        let id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S%3f"),
            Uuid::new_v4().to_string().split_at(8).0
        );
        SweepManifest {
            id,
            started_at: Utc::now(),
            config_path: config_path.to_path_buf(),
            command: command.to_vec(),
            total,
            runs: Vec::new(),
        }
    }

    /// Write (or rewrite) a manifest to disk.
    pub fn save(&self, manifest: &SweepManifest) -> Result<()> {
        let sweep_dir = self.sweeps_dir.join(&manifest.id);
        fs::create_dir_all(&sweep_dir).with_context(|| {
            format!("Failed to create sweep directory: {}", sweep_dir.display())
        })?;

        let manifest_path = sweep_dir.join(MANIFEST_FILE);
        let json =
            serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
        fs::write(&manifest_path, json)
            .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;
        Ok(())
    }

    /// All manifests, oldest first.
    pub fn list(&self) -> Result<Vec<SweepManifest>> {
        let mut manifests = Vec::new();

        for entry in fs::read_dir(&self.sweeps_dir).with_context(|| {
            format!(
                "Failed to read sweeps directory: {}",
                self.sweeps_dir.display()
            )
        })? {
            let entry = entry?;
            let manifest_path = entry.path().join(MANIFEST_FILE);
            if !manifest_path.exists() {
                continue;
            }
            let json = fs::read_to_string(&manifest_path)?;
            if let Ok(manifest) = serde_json::from_str::<SweepManifest>(&json) {
                manifests.push(manifest);
            }
        }

        manifests.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(manifests)
    }

    /// The most recently started sweep, if any.
    pub fn latest(&self) -> Result<Option<SweepManifest>> {
        Ok(self.list()?.into_iter().last())
    }

    /// Remove the oldest sweeps beyond `keep`. Returns how many were removed.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let manifests = self.list()?;
        if manifests.len() <= keep {
            return Ok(0);
        }

        let excess = manifests.len() - keep;
        for manifest in manifests.iter().take(excess) {
            let sweep_dir = self.sweeps_dir.join(&manifest.id);
            fs::remove_dir_all(&sweep_dir).with_context(|| {
                format!("Failed to remove old sweep: {}", sweep_dir.display())
            })?;
        }
        Ok(excess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_file::LiteralValue;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, SweepLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = SweepLedger::with_directory(dir.path().join("sweeps")).unwrap();
        (dir, ledger)
    }

    fn record(index: usize) -> RunRecord {
        RunRecord {
            index,
            configuration: format!("PARAM={}", index),
            edits: vec![Edit {
                path: PathBuf::from("t.py"),
                line_number: 1,
                variable: "PARAM".to_string(),
                value: LiteralValue::Int(index as i64),
            }],
            log_path: Some(PathBuf::from(format!("/tmp/sweepx-{index}.log"))),
            artifact_paths: vec![PathBuf::from(format!("/tmp/sweepx-{index}.py"))],
            exit_code: Some(0),
            status: RunStatus::Completed,
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let (_dir, ledger) = ledger();
        let mut manifest =
            ledger.new_manifest(Path::new("sweep.yml"), &["python3".to_string()], 3);
        manifest.runs.push(record(1));
        manifest.runs.push(RunRecord {
            status: RunStatus::Failed {
                error: "no assignment to PARAM found on t.py:1".to_string(),
            },
            log_path: None,
            exit_code: None,
            ..record(2)
        });
        ledger.save(&manifest).unwrap();

        let loaded = ledger.list().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, manifest.id);
        assert_eq!(loaded[0].runs.len(), 2);
        assert_eq!(loaded[0].completed_count(), 1);
        assert_eq!(loaded[0].failed_count(), 1);
        assert_eq!(loaded[0].runs[0].edits[0].variable, "PARAM");
    }

    #[test]
    fn test_incremental_save_overwrites() {
        let (_dir, ledger) = ledger();
        let mut manifest = ledger.new_manifest(Path::new("sweep.yml"), &[], 2);
        ledger.save(&manifest).unwrap();

        manifest.runs.push(record(1));
        ledger.save(&manifest).unwrap();
        manifest.runs.push(record(2));
        ledger.save(&manifest).unwrap();

        let loaded = ledger.latest().unwrap().unwrap();
        assert_eq!(loaded.runs.len(), 2);
    }

    #[test]
    fn test_list_sorts_chronologically() {
        let (_dir, ledger) = ledger();
        let mut first = ledger.new_manifest(Path::new("a.yml"), &[], 1);
        first.started_at = Utc::now() - chrono::Duration::minutes(5);
        let second = ledger.new_manifest(Path::new("b.yml"), &[], 1);
        ledger.save(&second).unwrap();
        ledger.save(&first).unwrap();

        let loaded = ledger.list().unwrap();
        assert_eq!(loaded[0].config_path, PathBuf::from("a.yml"));
        assert_eq!(loaded[1].config_path, PathBuf::from("b.yml"));
        assert_eq!(
            ledger.latest().unwrap().unwrap().config_path,
            PathBuf::from("b.yml")
        );
    }

    #[test]
    fn test_prune_keeps_newest() {
        let (_dir, ledger) = ledger();
        let base = Utc::now();
        for i in 0..5 {
            let mut manifest =
                ledger.new_manifest(Path::new(&format!("{i}.yml")), &[], 1);
            manifest.started_at = base - chrono::Duration::minutes(10 - i);
            ledger.save(&manifest).unwrap();
        }

        let removed = ledger.prune(2).unwrap();
        assert_eq!(removed, 3);

        let remaining = ledger.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].config_path, PathBuf::from("3.yml"));
        assert_eq!(remaining[1].config_path, PathBuf::from("4.yml"));
    }

    #[test]
    fn test_prune_noop_under_limit() {
        let (_dir, ledger) = ledger();
        let manifest = ledger.new_manifest(Path::new("a.yml"), &[], 1);
        ledger.save(&manifest).unwrap();
        assert_eq!(ledger.prune(10).unwrap(), 0);
        assert_eq!(ledger.list().unwrap().len(), 1);
    }
}
