//! Doctor command: diagnose configuration, directories, and external tools.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relmetrics_core::config::{self, Config, ReportsConfig, TargetConfig};
use relmetrics_core::detect::{self, ToolStatus, ToolVersionCheck};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Never offer to create a config file
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Serialize)]
struct DoctorReport {
    config: ConfigStatus,
    directories: DirectoryPaths,
    tools: Vec<ToolStatus>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct ConfigStatus {
    files: Vec<String>,
    found: bool,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data_local: Option<String>,
    clone: String,
    reports: String,
    charts: String,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: String,
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: String,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &str, description: &'static str) -> Self {
        Self {
            name: name.to_string(),
            value: std::env::var(name).ok(),
            description,
        }
    }

    /// Token values are never echoed.
    fn read_secret(name: &str, description: &'static str) -> Self {
        let mut var = Self::read(name, description);
        if var.value.is_some() {
            var.value = Some("(set)".to_string());
        }
        var
    }
}

impl DoctorReport {
    fn gather(config: &Config, sources: &[Utf8PathBuf], cwd: &Utf8Path) -> Self {
        let token_env = config
            .target
            .as_ref()
            .and_then(|t| t.token_env.clone())
            .unwrap_or_else(|| config::DEFAULT_TOKEN_ENV.to_string());

        Self {
            config: ConfigStatus {
                found: !sources.is_empty(),
                files: sources.iter().map(ToString::to_string).collect(),
            },
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
                clone: config.clone_dir().to_string(),
                reports: config.reports_dir().to_string(),
                charts: config.charts_dir().to_string(),
            },
            tools: detect::check_tools(config),
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                env_vars: vec![
                    EnvVar::read_secret(&token_env, "GitHub API token"),
                    EnvVar::read("RELMETRICS_LOG_PATH", "Log file path"),
                    EnvVar::read("RELMETRICS_LOG_DIR", "Log directory"),
                    EnvVar::read("RUST_LOG", "Log filter directive"),
                    EnvVar::read("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::read("XDG_CACHE_HOME", "Override cache directory"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    args: DoctorArgs,
    global_json: bool,
    config: &Config,
    config_files: &[Utf8PathBuf],
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Probing tools...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config, config_files, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    for file in &report.config.files {
        println!("  {} Config file: {}", "✓".green(), file.cyan());
    }
    if !report.config.found {
        println!("  {} No config file found", "○".yellow());
        if !args.no_prompt {
            offer_config_creation()?;
        }
    }
    println!();

    println!("{}", "Tools".bold().underline());
    for status in &report.tools {
        print_tool(status);
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    print_dir("  Working copy", Some(&report.directories.clone));
    print_dir("  Reports", Some(&report.directories.reports));
    print_dir("  Charts", Some(&report.directories.charts));
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    let set: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set.is_empty() {
        println!("  {} No overrides set", "○".dimmed());
    }
    for var in set {
        println!(
            "  {}: {}",
            var.name.dimmed(),
            var.value.as_deref().unwrap_or_default().cyan()
        );
    }

    Ok(())
}

fn print_tool(status: &ToolStatus) {
    let name = status.tool.to_string();
    if !status.found {
        println!(
            "  {} {}: {}",
            "✗".red(),
            name.bold(),
            format!("`{}` not found", status.command).red()
        );
        return;
    }
    match &status.version {
        Some(ToolVersionCheck::TooOld { found, minimum }) => println!(
            "  {} {}: {} {}",
            "✗".red(),
            name.bold(),
            status.command,
            format!("{found} < {minimum}").red()
        ),
        Some(ToolVersionCheck::Ok { version }) => {
            println!("  {} {}: {} {}", "✓".green(), name.bold(), status.command, version.dimmed());
        }
        _ => println!("  {} {}: {}", "✓".green(), name.bold(), status.command),
    }
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// The config written by the create-config prompt, with every default spelled out.
fn starter_config() -> Config {
    Config {
        target: Some(TargetConfig {
            repository: Some(config::DEFAULT_REPOSITORY.to_string()),
            api_url: Some(config::DEFAULT_API_URL.to_string()),
            clone_dir: Some(config::DEFAULT_CLONE_DIR.into()),
            releases: Some(config::DEFAULT_RELEASES),
            until_successful: Some(false),
            token_env: Some(config::DEFAULT_TOKEN_ENV.to_string()),
        }),
        reports: Some(ReportsConfig {
            dir: Some(config::DEFAULT_REPORTS_DIR.into()),
            charts_dir: None,
        }),
        ..Config::default()
    }
}

/// Offer to create a user config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yaml");

    let answer = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted prompts leave things as they are.
    if matches!(answer, Ok(true)) {
        std::fs::create_dir_all(&config_dir)?;
        std::fs::write(&config_path, serde_saphyr::to_string(&starter_config())?)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
