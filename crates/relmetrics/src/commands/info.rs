//! Info command: show package details and the resolved study settings.

use camino::Utf8PathBuf;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relmetrics_core::config::{self, Config, ExternalTool};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    /// Files merged into the configuration, lowest precedence first.
    config_files: Vec<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, sources: &[Utf8PathBuf]) -> Self {
        Self {
            config_files: sources.iter().map(ToString::to_string).collect(),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
        }
    }
}

/// What a study run would use.
#[derive(Serialize)]
struct StudyInfo {
    repository: String,
    api_url: String,
    clone_dir: String,
    releases: usize,
    until_successful: bool,
    reports_dir: String,
    charts_dir: String,
    maven: String,
    java: String,
    spotbugs: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ck_jar: Option<String>,
    token_set: bool,
}

impl StudyInfo {
    fn from_config(config: &Config) -> Self {
        let target = config.target.clone().unwrap_or_default();
        Self {
            repository: config.repository().to_string(),
            api_url: config.api_url().to_string(),
            clone_dir: config.clone_dir().to_string(),
            releases: target.releases.unwrap_or(config::DEFAULT_RELEASES),
            until_successful: target.until_successful.unwrap_or(false),
            reports_dir: config.reports_dir().to_string(),
            charts_dir: config.charts_dir().to_string(),
            maven: config.tool_command(ExternalTool::Maven),
            java: config.tool_command(ExternalTool::Java),
            spotbugs: config.tool_command(ExternalTool::SpotBugs),
            ck_jar: config.ck_jar().map(ToString::to_string),
            token_set: config.github_token().is_some(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    study: StudyInfo,
}

fn field(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print package information and resolved settings.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    config_files: &[Utf8PathBuf],
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, config_files),
        study: StudyInfo::from_config(config),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        field("License", info.package.license);
    }
    if !info.package.repository.is_empty() {
        field("Repository", info.package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    if info.config.config_files.is_empty() {
        field("Config file", "none loaded".yellow());
    }
    for path in &info.config.config_files {
        field("Config file", path.cyan());
    }
    field("Log level", &info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        field("Log directory", dir);
    }

    let study = &info.study;
    println!();
    println!("{}", "Study".bold().underline());
    field("Target", study.repository.cyan());
    field("Working copy", &study.clone_dir);
    let selection = if study.until_successful {
        format!("until {} analyzed", study.releases)
    } else {
        format!("first {}", study.releases)
    };
    field("Releases", selection);
    field("Reports", &study.reports_dir);
    field("Charts", &study.charts_dir);
    field("Maven", &study.maven);
    field("SpotBugs", &study.spotbugs);
    field("Java", &study.java);
    match study.ck_jar {
        Some(ref jar) => field("CK jar", jar),
        None => field("CK jar", "not configured".yellow()),
    }
    if study.token_set {
        field("GitHub token", "set".green());
    } else {
        field("GitHub token", "not set (rate limited)".yellow());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmetrics_core::config::TargetConfig;

    #[test]
    fn test_cmd_info_text_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &[]).is_ok());
    }

    #[test]
    fn test_cmd_info_json_via_global() {
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &[]).is_ok());
    }

    #[test]
    fn test_config_info_no_file() {
        let info = ConfigInfo::from_config(&Config::default(), &[]);
        assert!(info.config_files.is_empty());
        assert_eq!(info.log_level, "info");
    }

    #[test]
    fn test_config_info_lists_every_source() {
        let sources = [
            Utf8PathBuf::from("/home/me/.config/relmetrics/config.yaml"),
            Utf8PathBuf::from("/work/elsewhere.toml"),
        ];
        let info = ConfigInfo::from_config(&Config::default(), &sources);
        assert_eq!(
            info.config_files,
            [
                "/home/me/.config/relmetrics/config.yaml",
                "/work/elsewhere.toml"
            ]
        );
    }

    #[test]
    fn test_study_info_defaults() {
        let study = StudyInfo::from_config(&Config::default());
        assert_eq!(study.releases, config::DEFAULT_RELEASES);
        assert_eq!(study.clone_dir, config::DEFAULT_CLONE_DIR);
        assert_eq!(study.maven, "mvn");
        assert!(!study.until_successful);
        assert!(study.ck_jar.is_none());
    }

    #[test]
    fn test_study_info_overrides() {
        let config = Config {
            target: Some(TargetConfig {
                releases: Some(5),
                until_successful: Some(true),
                ..TargetConfig::default()
            }),
            ..Config::default()
        };
        let study = StudyInfo::from_config(&config);
        assert_eq!(study.releases, 5);
        assert!(study.until_successful);
    }
}
