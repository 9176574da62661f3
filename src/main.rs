use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::Path;

use sweepx::cli::{parse_args, Args};
use sweepx::manifest::{RunStatus, SweepLedger};
use sweepx::{config, driver::SweepDriver, logger, preview, sweep_file};

fn main() -> Result<()> {
    let args = parse_args()?;

    match args {
        Args::Execute {
            sweep_file,
            command,
            dry_run,
            verbose,
        } => {
            execute_sweep(&sweep_file, command, dry_run, verbose)?;
        }
        Args::History => {
            show_history()?;
        }
        Args::Status => {
            show_status()?;
        }
        Args::Config { show } => {
            show_config(show)?;
        }
    }

    Ok(())
}

fn execute_sweep(
    sweep_file: &str,
    command: Vec<String>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    logger::init_logging(verbose)?;

    let tool_config = config::load_config()?;
    config::validate_config(&tool_config)?;
    if tool_config.output.color == Some(false) {
        colored::control::set_override(false);
    }

    let path = Path::new(sweep_file);
    let sweep = sweep_file::load_sweep_file(path)?;
    sweep.validate()?;

    if dry_run {
        let report = preview::render_dry_run(&sweep, &command)?;
        print!("{report}");
        return Ok(());
    }

    let ledger = SweepLedger::new()?;
    let mut driver = SweepDriver::new(&sweep, path, command).with_ledger(ledger);
    let report = driver.run()?;

    println!();
    if report.cancelled {
        println!(
            "{} after {} of {} runs",
            "Sweep cancelled".yellow().bold(),
            report.outcomes.len(),
            report.total
        );
    } else {
        println!(
            "{}: {} completed, {} skipped",
            "Sweep finished".bold(),
            report.completed_count(),
            report.failed_count()
        );
    }
    if let Some(id) = &report.manifest_id {
        println!("Manifest: {}", id);
        println!("Details with: sweepx status");
    }

    // Trim the ledger; today's sweep is always the newest entry
    if let Some(max_history) = tool_config.sweep.max_history {
        SweepLedger::new()?.prune(max_history)?;
    }

    Ok(())
}

fn show_history() -> Result<()> {
    let ledger = SweepLedger::new()?;
    let manifests = ledger.list()?;

    if manifests.is_empty() {
        println!("No sweeps recorded.");
        return Ok(());
    }

    println!("Sweep history:\n");
    for manifest in manifests {
        println!(
            "{}  {}  {}",
            manifest.id.bold(),
            manifest.started_at.format("%Y-%m-%d %H:%M:%S"),
            manifest.command.join(" ")
        );
        println!(
            "  config: {}  runs: {} of {} recorded, {} completed, {} skipped",
            manifest.config_path.display(),
            manifest.runs.len(),
            manifest.total,
            manifest.completed_count(),
            manifest.failed_count()
        );
    }

    Ok(())
}

fn show_status() -> Result<()> {
    let ledger = SweepLedger::new()?;

    let Some(manifest) = ledger.latest()? else {
        println!("No sweeps recorded.");
        return Ok(());
    };

    println!("Last sweep:\n");
    println!("  ID: {}", manifest.id);
    println!("  Time: {}", manifest.started_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Command: {}", manifest.command.join(" "));
    println!(
        "  Runs: {} of {} recorded, {} completed, {} skipped\n",
        manifest.runs.len(),
        manifest.total,
        manifest.completed_count(),
        manifest.failed_count()
    );

    for run in &manifest.runs {
        match &run.status {
            RunStatus::Completed => {
                let log = run
                    .log_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let exit = run
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                println!(
                    "  [{}/{}] {}",
                    run.index, manifest.total, run.configuration
                );
                println!("        log: {} (exit {})", log, exit);
            }
            RunStatus::Failed { error } => {
                println!(
                    "  [{}/{}] {}",
                    run.index, manifest.total, run.configuration
                );
                println!("        {} {}", "skipped:".yellow(), error);
            }
        }
    }

    Ok(())
}

fn show_config(show: bool) -> Result<()> {
    config::ensure_complete_config()?;
    let config_path = config::config_file_path()?;

    if show {
        let content = fs::read_to_string(&config_path)?;
        print!("{content}");
    } else {
        println!("Configuration file: {}", config_path.display());
        println!("Edit it with your editor, or view it with: sweepx config --show");
    }

    Ok(())
}
