use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

Copyright (c) 2025 InkyQuill
License: MIT
Source: https://github.com/InkyQuill/sweepx
Rust Edition: 2024"
);

#[derive(Parser)]
#[command(name = "sweepx")]
#[command(about = "Sweep hard-coded variables across value grids, one run per combination")]
#[command(long_about = "sweepx runs a script repeatedly, each time with chosen source lines
textually patched to a different literal value. The original file is never
modified: every run executes a patched temporary copy.

A YAML file declares, per target file, which line, which variable, and
which candidate values. sweepx expands the cross-product of all value
lists and runs the command once per combination, capturing combined
stdout/stderr into one log file per run.

FEATURES:
  • Original sources are never touched; runs use patched temp copies
  • One log file per run, prefixed with the applied configuration
  • A sweep ledger under ~/.sweepx/sweeps/ correlating runs to logs
  • Dry-run mode listing every combination with a preview diff
  • A failed combination is skipped; the rest of the sweep continues

DECLARATION FILE (one YAML document per target file):
  path: train.py
  configurations:
    - line_number: 1
      variable: LEARNING_RATE
      value: [0.1, 0.2, 0.3]
    - line_number: 2
      variable: DECAY
      value: 0.5

EXAMPLES:
  sweepx -f sweep.yml -- python3 train.py       Run the full sweep
  sweepx -f sweep.yml --dry-run -- python3 train.py
                                                Preview without running
  sweepx -f sweep.yml -v -- python3 train.py    Verbose diagnostics
  sweepx history                                List past sweeps
  sweepx status                                 Summarize the last sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the sweep declaration file (YAML)
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    sweep_file: Option<String>,

    /// Preview every combination without running anything
    #[arg(short = 'd', long, alias = "dry-run")]
    #[arg(help = "Expand the sweep and show a preview diff, run nothing")]
    dry_run: bool,

    /// Verbose diagnostics
    #[arg(short = 'v', long)]
    #[arg(help = "Enable debug-level diagnostics on stderr")]
    verbose: bool,

    /// Command to run, with the target file path among its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,

    /// Subcommands
    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List past sweeps
    #[command(long_about = "Display the sweep ledger.

Shows id, start time, command, and per-run results for every recorded
sweep, oldest first. Manifests live under ~/.sweepx/sweeps/.

EXAMPLES:
  sweepx history                  Show all recorded sweeps")]
    History,

    /// Summarize the most recent sweep
    #[command(long_about = "Display the most recent sweep's manifest.

Shows the sweep id, when it started, the command, and how many runs
completed, failed, or never started, with the log path of each run.

EXAMPLES:
  sweepx status                   Summarize the last sweep")]
    Status,

    /// Show or create the configuration file
    #[command(long_about = "Manage the sweepx configuration file.

The configuration lives at ~/.sweepx/config.toml and is created with a
commented default template on first use. A malformed file is replaced
with the defaults.

CONFIGURATION OPTIONS:
  [sweep]
    max_history = 50     # sweep manifests kept in the ledger

  [output]
    color = true         # colorize progress and previews

EXAMPLES:
  sweepx config                   Print the configuration file path
  sweepx config --show            Show current configuration")]
    Config {
        /// Show current configuration without editing
        #[arg(long = "show")]
        show: bool,
    },
}

pub fn parse_args() -> Result<Args> {
    let cli = Cli::parse();

    match cli.subcommand {
        Some(Commands::History) => Ok(Args::History),
        Some(Commands::Status) => Ok(Args::Status),
        Some(Commands::Config { show }) => Ok(Args::Config { show }),
        None => {
            let sweep_file = cli
                .sweep_file
                .context("Missing sweep file. Usage: sweepx -f sweep.yml -- command args...")?;

            if cli.command.is_empty() && !cli.dry_run {
                anyhow::bail!(
                    "Missing command. Usage: sweepx -f sweep.yml -- command args..."
                );
            }

            Ok(Args::Execute {
                sweep_file,
                command: cli.command,
                dry_run: cli.dry_run,
                verbose: cli.verbose,
            })
        }
    }
}

#[derive(Debug)]
pub enum Args {
    Execute {
        sweep_file: String,
        command: Vec<String>,
        dry_run: bool,
        verbose: bool,
    },
    History,
    Status,
    Config {
        show: bool,
    },
}
