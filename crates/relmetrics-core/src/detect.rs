//! Environment checks for the external tools.
//!
//! Probes `PATH` (or the configured location) for each tool and asks it for
//! its version. Java and SpotBugs print versions in their own formats, so
//! parsing is lenient: the first token that starts with a digit wins.
//!
//! # Example
//!
//! ```no_run
//! use relmetrics_core::Config;
//! use relmetrics_core::detect;
//!
//! for status in detect::check_tools(&Config::default()) {
//!     println!("{}: {}", status.tool, status.found);
//! }
//! ```

use std::process::Command;

use semver::Version;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::{Config, ExternalTool};

/// Oldest Maven known to run the JaCoCo goals used for coverage.
pub const MIN_MAVEN_VERSION: Version = Version::new(3, 6, 3);

/// Check whether a binary is available on `PATH` (or at the given path).
pub fn has_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Result of a tool version check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ToolVersionCheck {
    /// Tool meets the minimum version (or has none).
    Ok {
        /// The version that was found.
        version: Version,
    },
    /// Tool is too old.
    TooOld {
        /// The version that was found.
        found: Version,
        /// The minimum required version.
        minimum: Version,
    },
    /// Could not determine the version (binary missing, parse failure, etc.).
    Unknown {
        /// What went wrong.
        reason: String,
    },
}

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    /// Which tool.
    pub tool: ExternalTool,
    /// Command that was probed.
    pub command: String,
    /// Whether the command resolved.
    pub found: bool,
    /// Version check result (only run when found).
    pub version: Option<ToolVersionCheck>,
}

/// Flag that makes a tool print its version.
pub const fn version_arg(tool: ExternalTool) -> &'static str {
    match tool {
        ExternalTool::Git | ExternalTool::Maven => "--version",
        ExternalTool::Java | ExternalTool::SpotBugs => "-version",
    }
}

/// Minimum version enforced for a tool, if any.
pub const fn minimum_version(tool: ExternalTool) -> Option<Version> {
    match tool {
        ExternalTool::Maven => Some(MIN_MAVEN_VERSION),
        _ => None,
    }
}

/// Probe every external tool with its configured command.
#[instrument(skip(config))]
pub fn check_tools(config: &Config) -> Vec<ToolStatus> {
    ExternalTool::ALL
        .iter()
        .map(|&tool| {
            let command = config.tool_command(tool);
            let found = has_binary(&command);
            let version = found.then(|| {
                check_tool_version(&command, version_arg(tool), minimum_version(tool).as_ref())
            });
            debug!(%tool, %command, found, "probed tool");
            ToolStatus {
                tool,
                command,
                found,
                version,
            }
        })
        .collect()
}

/// Check the installed version of a CLI tool.
///
/// Runs `<binary> <flag>` and scans stdout then stderr (`java -version`
/// writes to stderr). With a `minimum`, older versions are reported as
/// [`ToolVersionCheck::TooOld`].
pub fn check_tool_version(binary: &str, flag: &str, minimum: Option<&Version>) -> ToolVersionCheck {
    let output = match Command::new(binary).arg(flag).output() {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            return ToolVersionCheck::Unknown {
                reason: format!("`{binary} {flag}` exited with {}", o.status),
            };
        }
        Err(e) => {
            return ToolVersionCheck::Unknown {
                reason: format!("failed to run `{binary} {flag}`: {e}"),
            };
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let Some(version) =
        parse_version_from_output(&stdout).or_else(|| parse_version_from_output(&stderr))
    else {
        return ToolVersionCheck::Unknown {
            reason: format!("could not parse version from `{binary} {flag}` output"),
        };
    };

    match minimum {
        Some(minimum) if version < *minimum => ToolVersionCheck::TooOld {
            found: version,
            minimum: minimum.clone(),
        },
        _ => ToolVersionCheck::Ok { version },
    }
}

/// Extract a version from tool output.
///
/// Takes the first token that begins with a digit, strips quotes, keeps the
/// leading dotted-number run, and pads it to three components:
/// `git version 2.43.0` → 2.43.0, `openjdk version "21" 2023-09-19` → 21.0.0,
/// `java version "1.8.0_292"` → 1.8.0.
fn parse_version_from_output(output: &str) -> Option<Version> {
    output.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| c == '"' || c == '\'' || c == '(' || c == ')');
        if !token.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if let Ok(version) = Version::parse(token) {
            return Some(version);
        }

        let numeric: String = token
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let parts: Vec<u64> = numeric
            .split('.')
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [major] => Some(Version::new(*major, 0, 0)),
            [major, minor] => Some(Version::new(*major, *minor, 0)),
            [major, minor, patch, ..] => Some(Version::new(*major, *minor, *patch)),
            [] => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_git_output() {
        let v = parse_version_from_output("git version 2.43.0\n");
        assert_eq!(v, Some(Version::new(2, 43, 0)));
    }

    #[test]
    fn parse_maven_output() {
        let out = "Apache Maven 3.9.9 (8e8579a9e76f7d015ee5ec7bfcdc97d260186937)\nMaven home: /opt/maven\n";
        assert_eq!(parse_version_from_output(out), Some(Version::new(3, 9, 9)));
    }

    #[test]
    fn parse_java_outputs() {
        let modern = "openjdk version \"21\" 2023-09-19\nOpenJDK Runtime Environment";
        assert_eq!(parse_version_from_output(modern), Some(Version::new(21, 0, 0)));

        let legacy = "java version \"1.8.0_292\"\nJava(TM) SE Runtime Environment";
        assert_eq!(parse_version_from_output(legacy), Some(Version::new(1, 8, 0)));

        let lts = "openjdk version \"17.0.2\" 2022-01-18";
        assert_eq!(parse_version_from_output(lts), Some(Version::new(17, 0, 2)));
    }

    #[test]
    fn parse_spotbugs_output() {
        assert_eq!(parse_version_from_output("4.8.6\n"), Some(Version::new(4, 8, 6)));
    }

    #[test]
    fn parse_version_with_prerelease() {
        let v = parse_version_from_output("tool 3.0.0-rc.1");
        assert_eq!(v, Some(Version::parse("3.0.0-rc.1").unwrap()));
    }

    #[test]
    fn parse_version_from_garbage() {
        assert!(parse_version_from_output("not a version").is_none());
        assert!(parse_version_from_output("").is_none());
    }

    #[test]
    fn missing_binary_is_unknown() {
        let check = check_tool_version("relmetrics-no-such-tool", "--version", None);
        assert!(matches!(check, ToolVersionCheck::Unknown { .. }));
        assert!(!has_binary("relmetrics-no-such-tool"));
    }

    #[test]
    fn only_maven_has_a_minimum() {
        assert_eq!(minimum_version(ExternalTool::Maven), Some(MIN_MAVEN_VERSION));
        assert_eq!(minimum_version(ExternalTool::Java), None);
        assert_eq!(version_arg(ExternalTool::Java), "-version");
    }

    #[test]
    fn check_tools_covers_every_tool() {
        let statuses = check_tools(&Config::default());
        assert_eq!(statuses.len(), ExternalTool::ALL.len());
        assert_eq!(statuses[0].command, "git");
        assert!(statuses.iter().all(|s| s.found || s.version.is_none()));
    }
}
