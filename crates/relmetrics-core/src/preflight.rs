//! Preflight checks before a study run.
//!
//! Validates that the external tools a run needs are installed and that the
//! working copy location is usable. Returns structured results that the CLI
//! formats.

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::{Config, ExternalTool};
use crate::detect::{self, ToolVersionCheck};
use crate::tools::Tool;

/// A single preflight check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Description of the result (reason for failure, or confirmation).
    pub message: String,
}

impl CheckResult {
    fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Full preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Whether all checks passed.
    pub all_passed: bool,
}

impl PreflightReport {
    /// Messages of the failed checks.
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.message.as_str())
            .collect()
    }
}

/// Run all preflight checks for analyzing with `tool`.
#[instrument(skip(config))]
pub fn run_preflight(config: &Config, tool: Tool) -> PreflightReport {
    let mut checks = vec![
        check_binary(config, ExternalTool::Git),
        check_binary(config, ExternalTool::Maven),
    ];

    for &required in tool.requires() {
        checks.push(check_binary(config, required));
    }
    if tool == Tool::Ck {
        checks.push(check_ck_jar(config.ck_jar()));
    }

    checks.push(check_working_copy(&config.clone_dir()));

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport { checks, all_passed }
}

fn check_binary(config: &Config, tool: ExternalTool) -> CheckResult {
    let command = config.tool_command(tool);
    let name = tool.to_string();

    if !detect::has_binary(&command) {
        return CheckResult::fail(name, format!("`{command}` not found"));
    }

    match detect::minimum_version(tool) {
        Some(minimum) => match detect::check_tool_version(
            &command,
            detect::version_arg(tool),
            Some(&minimum),
        ) {
            ToolVersionCheck::Ok { version } => {
                CheckResult::pass(name, format!("{command} {version}"))
            }
            ToolVersionCheck::TooOld { found, minimum } => CheckResult::fail(
                name,
                format!("{command} {found} is too old (need >= {minimum})"),
            ),
            ToolVersionCheck::Unknown { reason } => {
                CheckResult::pass(name, format!("{command} found ({reason})"))
            }
        },
        None => CheckResult::pass(name, format!("{command} found")),
    }
}

fn check_ck_jar(jar: Option<&Utf8Path>) -> CheckResult {
    match jar {
        Some(jar) if jar.is_file() => CheckResult::pass("ck jar", jar.to_string()),
        Some(jar) => CheckResult::fail("ck jar", format!("{jar} does not exist")),
        None => CheckResult::fail("ck jar", "tools.ck_jar is not configured"),
    }
}

fn check_working_copy(clone_dir: &Utf8Path) -> CheckResult {
    if !clone_dir.exists() {
        CheckResult::pass("working copy", format!("{clone_dir} will be cloned"))
    } else if clone_dir.join(".git").exists() {
        CheckResult::pass("working copy", format!("{clone_dir} already cloned"))
    } else {
        CheckResult::fail(
            "working copy",
            format!("{clone_dir} exists but is not a git repository"),
        )
    }
}
