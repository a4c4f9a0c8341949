//! Analyze command: build each release and run a tool on it.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relmetrics_core::config::Config;
use relmetrics_core::pipeline::{
    self, ReleaseResult, ReleaseStatus, StudyEvent, StudyOutcome, StudySettings,
};
use relmetrics_core::tools::Tool;

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Tool to run on each release
    #[arg(value_enum)]
    pub tool: Tool,

    /// Number of releases (defaults to `target.releases`)
    #[arg(short = 'n', long)]
    pub releases: Option<usize>,

    /// Keep going until this many releases were analyzed
    #[arg(long)]
    pub until_successful: bool,

    /// Working copy directory (defaults to `target.clone_dir`)
    #[arg(long, value_name = "DIR")]
    pub clone_dir: Option<camino::Utf8PathBuf>,

    /// Reports root (defaults to `reports.dir`)
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<camino::Utf8PathBuf>,

    /// List the releases that would be processed without building anything
    #[arg(long)]
    pub dry_run: bool,
}

impl AnalyzeArgs {
    fn settings(&self, config: &Config) -> StudySettings {
        let mut settings = StudySettings::from_config(config);
        if let Some(releases) = self.releases {
            settings.releases = releases;
        }
        if self.until_successful {
            settings.until_successful = true;
        }
        if let Some(ref dir) = self.clone_dir {
            settings.clone_dir = dir.clone();
        }
        if let Some(ref dir) = self.reports_dir {
            settings.reports_dir = dir.clone();
        }
        settings.dry_run = self.dry_run;
        settings
    }
}

/// Run the per-release loop for one tool.
#[instrument(name = "cmd_analyze", skip_all, fields(tool = %args.tool))]
pub fn cmd_analyze(args: AnalyzeArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let settings = args.settings(config);
    debug!(
        json_output = global_json,
        releases = settings.releases,
        until_successful = settings.until_successful,
        dry_run = settings.dry_run,
        "executing analyze command"
    );
    if settings.releases == 0 {
        anyhow::bail!("--releases must be at least 1");
    }

    if !global_json {
        if settings.dry_run {
            println!("\n{}", "DRY RUN: nothing will be built".yellow().bold());
        }
        println!(
            "\n{}: {} on {}",
            "Analyze".bold(),
            args.tool.to_string().green().bold(),
            settings.repository.cyan(),
        );
        println!();
    }

    let mut progress = Progress::new(global_json, settings.releases, settings.until_successful);
    let outcome = pipeline::run_study(config, &settings, args.tool, |event| {
        progress.handle(event);
    });
    progress.finish();
    let outcome = outcome.with_context(|| format!("{} run failed", args.tool))?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    if !outcome.dry_run && outcome.analyzed == 0 {
        anyhow::bail!("no release could be analyzed");
    }
    Ok(())
}

/// Terminal progress driven by pipeline events. Silent in JSON mode.
struct Progress {
    bar: Option<ProgressBar>,
    target: usize,
    until_successful: bool,
}

impl Progress {
    fn new(json: bool, target: usize, until_successful: bool) -> Self {
        let bar = (!json).then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        });
        Self {
            bar,
            target,
            until_successful,
        }
    }

    fn handle(&mut self, event: StudyEvent) {
        if self.bar.is_none() {
            return;
        }
        match event {
            StudyEvent::Cloning { url } => self.message(format!("cloning {url}")),
            StudyEvent::ReleasesFetched { count } => {
                // With a fixed count the work is known up front.
                if !self.until_successful {
                    self.switch_to_bar(count.min(self.target));
                }
                self.println(format!("  {} {count} tags fetched", "✓".green()));
            }
            StudyEvent::ReleaseStarted { release, .. } => {
                if let Some(ref bar) = self.bar {
                    bar.set_prefix(release.name);
                }
                self.message(String::new());
            }
            StudyEvent::PhaseStarted(phase) => self.message(format!("{phase}...")),
            StudyEvent::ReleaseFinished(result) => {
                self.println(release_line(&result));
                if let Some(ref bar) = self.bar {
                    bar.inc(1);
                }
            }
            StudyEvent::Warning(message) => {
                self.println(format!("  {} {message}", "!".yellow()));
            }
        }
    }

    fn message(&self, msg: String) {
        if let Some(ref bar) = self.bar {
            bar.set_message(msg);
        }
    }

    fn println(&self, line: String) {
        if let Some(ref bar) = self.bar {
            bar.println(line);
        }
    }

    fn switch_to_bar(&mut self, len: usize) {
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("  [{bar:30.cyan/blue}] {pos}/{len} {prefix:.bold} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        if let Some(old) = self.bar.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

fn release_line(result: &ReleaseResult) -> String {
    let tag = result.tag.bold().to_string();
    match &result.status {
        ReleaseStatus::Analyzed { report } => format!(
            "  {} {tag} {}",
            "✓".green(),
            format!("{} rows", report.rows).dimmed()
        ),
        ReleaseStatus::BuildFailed { build } => {
            format!("  {} {tag} {}", "✗".red(), build.summary().dimmed())
        }
        ReleaseStatus::ToolFailed { message } => {
            format!("  {} {tag} {}", "✗".red(), message.dimmed())
        }
        ReleaseStatus::Planned => format!(
            "  {} {tag} {}",
            "○".yellow(),
            format!("({})", result.label).dimmed()
        ),
    }
}

fn print_summary(outcome: &StudyOutcome) {
    println!();
    if outcome.dry_run {
        println!(
            "{} Dry run complete: {} releases would be processed",
            "✓".green(),
            outcome.releases.len(),
        );
        return;
    }

    let icon = if outcome.analyzed > 0 {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    };
    println!(
        "{icon} {} analyzed, {} skipped",
        outcome.analyzed.to_string().bold(),
        outcome.skipped,
    );
    println!(
        "{}: {}",
        "Reports".dimmed(),
        outcome.reports_dir.join(outcome.tool.report_subdir()).cyan()
    );
    if outcome.analyzed > 0 {
        println!(
            "{}: relmetrics plot {}",
            "Next".dimmed(),
            outcome.tool.report_subdir()
        );
    }
}
