//! Dry-run preview
//!
//! Renders what a sweep would do without running anything: every combination
//! with its index, plus a unified diff of the first combination's patched
//! files against the originals. No artifacts, no logs, no ledger entries.

use crate::exec::render_command;
use crate::expand::{expand, EditSet};
use crate::patch::patch_lines;
use crate::sweep_file::SweepConfig;
use anyhow::Result;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;

/// Render the full dry-run report as a string.
pub fn render_dry_run(config: &SweepConfig, command: &[String]) -> Result<String> {
    let sets = expand(config)?;
    let total = sets.total();

    let mut out = String::new();
    out.push_str(&format!(
        "Sweep of {} combination{}; command: {}\n\n",
        total,
        if total == 1 { "" } else { "s" },
        render_command(command)
    ));

    let mut first: Option<EditSet> = None;
    for (i, set) in sets.enumerate() {
        out.push_str(&format!(
            "{} {}\n",
            format!("[{}/{}]", i + 1, total).bold().cyan(),
            set.describe()
        ));
        if first.is_none() {
            first = Some(set);
        }
    }

    if let Some(set) = first {
        out.push_str("\nPreview of combination 1 (nothing is run):\n");
        out.push_str(&render_patch_preview(&set));
    }

    Ok(out)
}

/// Unified diff of one edit set against the original files. Unreadable or
/// unpatchable targets render as a note instead of aborting the preview.
fn render_patch_preview(set: &EditSet) -> String {
    let mut out = String::new();

    for (path, edits) in set.by_path() {
        out.push_str(&format!("{}\n", path.display().to_string().bold().cyan()));

        let original = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                out.push_str(&format!(
                    "  {} failed to read target: {}\n",
                    "!".yellow().bold(),
                    e
                ));
                continue;
            }
        };
        let lines: Vec<String> = original.lines().map(str::to_string).collect();

        let patched = match patch_lines(&lines, &edits) {
            Ok(patched) => patched,
            Err(e) => {
                out.push_str(&format!("  {} {}\n", "!".yellow().bold(), e));
                continue;
            }
        };

        let before = lines.join("\n");
        let after = patched.join("\n");
        let diff = TextDiff::from_lines(&before, &after);

        for change in diff.iter_all_changes() {
            let line = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => {
                    out.push_str(&format!("  {}\n", format!("- {line}").red()));
                }
                ChangeTag::Insert => {
                    out.push_str(&format!("  {}\n", format!("+ {line}").green()));
                }
                ChangeTag::Equal => {}
            }
        }
    }

    out
}
