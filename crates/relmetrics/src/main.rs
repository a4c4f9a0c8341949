//! relmetrics CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use relmetrics::{Cli, Commands, commands};
use relmetrics_core::config::ConfigLoader;

mod observability;

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|raw| anyhow::anyhow!("{what} is not valid UTF-8: {}", raw.display()))
}

fn config_loader(cli: &Cli, cwd: &Utf8PathBuf) -> anyhow::Result<ConfigLoader> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(path) = cli.config.clone() {
        loader = loader.with_file(utf8(path, "config path")?);
    }
    Ok(loader)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("cannot enter {}", dir.display()))?;
    }
    let cwd = utf8(
        std::env::current_dir().context("failed to determine current directory")?,
        "current directory",
    )?;
    let loader = config_loader(&cli, &cwd)?;
    let config_files = loader.sources();
    let config = loader.load().context("failed to load configuration")?;

    let logging = observability::LogSettings::for_binary(
        config.log_dir.clone().map(Utf8PathBuf::into_std_path_buf),
    );
    let filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init(&logging, filter)
        .context("failed to initialize logging")?;
    tracing::debug!(
        command = ?std::env::args().nth(1),
        cwd = %cwd,
        json = cli.json,
        verbose = cli.verbose,
        "starting"
    );

    let json = cli.json;
    let result = match cli.command {
        Commands::Releases(args) => commands::releases::cmd_releases(args, json, &config),
        Commands::Analyze(args) => commands::analyze::cmd_analyze(args, json, &config),
        Commands::Plot(args) => commands::plot::cmd_plot(args, json, &config),
        Commands::Preflight(args) => commands::preflight::cmd_preflight(args, json, &config),
        Commands::Doctor(args) => {
            commands::doctor::cmd_doctor(args, json, &config, &config_files, &cwd)
        }
        Commands::Info(args) => commands::info::cmd_info(args, json, &config, &config_files),
    };
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    result
}
