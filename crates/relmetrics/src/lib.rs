//! The `relmetrics` command line, as a library.
//!
//! `main.rs` parses [`Cli`] and dispatches on [`Commands`]. The parser is
//! exposed here so `xtask` can render man pages and shell completions from
//! [`command()`], and so command handlers can be unit tested.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// When to emit ANSI colors.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Only when stdout is a terminal.
    #[default]
    Auto,
    /// Even when piped.
    Always,
    /// Plain text.
    Never,
}

impl ColorChoice {
    /// Install the choice as the process-wide owo-colors override.
    pub fn apply(self) {
        let forced = match self {
            Self::Auto => return,
            Self::Always => true,
            Self::Never => false,
        };
        owo_colors::set_override(forced);
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, relmetrics=trace)
    RELMETRICS_LOG_PATH     Explicit log file path
    RELMETRICS_LOG_DIR      Log directory
    GITHUB_TOKEN            GitHub API token (name configurable via target.token_env)
";

/// Command-line interface definition for relmetrics.
#[derive(Parser)]
#[command(name = "relmetrics")]
#[command(about = "Track static-analysis and coverage trends across the releases of a Java project", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Commands,

    /// Config file layered over the discovered ones
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Change to DIR before doing anything else
    #[arg(short = 'C', long = "chdir", global = true, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Log errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t, value_name = "WHEN")]
    pub color: ColorChoice,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// List the releases that would be analyzed
    Releases(commands::releases::ReleasesArgs),

    /// Build each release and run an analysis tool on it
    Analyze(commands::analyze::AnalyzeArgs),

    /// Chart metric trends from stored reports
    Plot(commands::plot::PlotArgs),

    /// Check that the tools a run needs are available
    Preflight(commands::preflight::PreflightArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),

    /// Show package information
    Info(commands::info::InfoArgs),
}

/// The clap command tree, for man pages and completions.
pub fn command() -> clap::Command {
    Cli::command()
}
