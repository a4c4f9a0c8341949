//! The three analysis tools and their report formats.
//!
//! Each [`Tool`] knows which Maven goals prepare a release for it, which
//! build artifact must exist afterwards, how to invoke it, and where its
//! reports land under the reports directory:
//!
//! | Tool       | Goals                                   | Artifact         | Report                                   |
//! |------------|-----------------------------------------|------------------|------------------------------------------|
//! | `spotbugs` | `clean compile`                         | `target/classes` | `spotbugs/<safe-tag>_spotbugs.{xml,html}` |
//! | `ck`       | `clean compile`                         | `src/main`       | `ck/<safe-tag>_ck_class.csv`              |
//! | `jacoco`   | `clean compile ... test jacoco:report`  | none             | `jacoco/jacoco_metrics.csv` (appended)    |

pub mod ck;
pub mod jacoco;
pub mod spotbugs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{Config, ExternalTool};
use crate::github::ReleaseTag;
use crate::maven::{self, MavenError};
use crate::version::safe_tag;

/// Errors from running a tool or reading its reports.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool binary could not be started.
    #[error("failed to run {tool}: {source}")]
    Exec {
        /// Command that was invoked.
        tool: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The tool ran but exited non-zero.
    #[error("{tool} failed: {stderr}")]
    Failed {
        /// Command that was invoked.
        tool: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The tool exited cleanly but the expected report is missing.
    #[error("report not produced: {0}")]
    MissingReport(Utf8PathBuf),

    /// The report exists but holds nothing to record.
    #[error("report has no data: {0}")]
    EmptyReport(Utf8PathBuf),

    /// CK needs `tools.ck_jar` and it is unset or points nowhere.
    #[error("CK jar not found (set tools.ck_jar): {0}")]
    MissingJar(String),

    /// A CK class CSV lacks one of the required metric columns.
    #[error("{path} is missing required columns: {missing}")]
    MissingColumns {
        /// The CSV file.
        path: Utf8PathBuf,
        /// Comma-separated column names.
        missing: String,
    },

    /// File I/O on a report failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Malformed XML report.
    #[error("invalid XML report: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute.
    #[error("invalid XML attribute: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Malformed CSV report.
    #[error("invalid CSV report: {0}")]
    Csv(#[from] csv::Error),

    /// Preparing the POM failed.
    #[error(transparent)]
    Maven(#[from] MavenError),
}

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Build an I/O error mapper for `path`.
pub(crate) fn io_err(path: &Utf8Path) -> impl Fn(std::io::Error) -> ToolError + '_ {
    move |source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Attribute value of an XML element as an owned string.
pub(crate) fn attr(
    e: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> ToolResult<Option<String>> {
    Ok(e.try_get_attribute(name)?
        .map(|a| String::from_utf8_lossy(&a.value).into_owned()))
}

/// Goals for a plain compile.
const COMPILE_GOALS: &[&str] = &["clean", "compile"];

/// Goals that compile, run the tests under the JaCoCo agent, and write the report.
const COVERAGE_GOALS: &[&str] = &[
    "clean",
    "compile",
    "-Dmaven.test.failure.ignore=true",
    "jacoco:prepare-agent",
    "test",
    "jacoco:report",
];

/// An analysis tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Bug-pattern detection.
    #[value(name = "spotbugs")]
    SpotBugs,
    /// Class-level design metrics.
    Ck,
    /// Test coverage.
    Jacoco,
}

impl Tool {
    /// Every tool, in display order.
    pub const ALL: &[Self] = &[Self::SpotBugs, Self::Ck, Self::Jacoco];

    /// Maven goals to run before the tool.
    pub const fn goals(self) -> &'static [&'static str] {
        match self {
            Self::SpotBugs | Self::Ck => COMPILE_GOALS,
            Self::Jacoco => COVERAGE_GOALS,
        }
    }

    /// Path (relative to the working copy) that must exist after the build.
    pub fn artifact(self) -> Option<&'static Utf8Path> {
        match self {
            Self::SpotBugs => Some(Utf8Path::new(spotbugs::CLASSES_DIR)),
            Self::Ck => Some(Utf8Path::new(ck::SOURCES_DIR)),
            Self::Jacoco => None,
        }
    }

    /// Sub-directory of the reports root holding this tool's reports.
    pub const fn report_subdir(self) -> &'static str {
        match self {
            Self::SpotBugs => "spotbugs",
            Self::Ck => "ck",
            Self::Jacoco => "jacoco",
        }
    }

    /// External binaries this tool needs besides git and Maven.
    pub const fn requires(self) -> &'static [ExternalTool] {
        match self {
            Self::SpotBugs => &[ExternalTool::SpotBugs],
            Self::Ck => &[ExternalTool::Java],
            Self::Jacoco => &[],
        }
    }

    /// Adjust the checked-out release before building.
    ///
    /// JaCoCo is switched on in the POM; the other tools need nothing.
    pub fn prepare(self, clone_dir: &Utf8Path) -> ToolResult<()> {
        if self == Self::Jacoco {
            let pom = clone_dir.join("pom.xml");
            if maven::set_jacoco_skip(&pom, false)? {
                info!("jacoco.skip set to false");
            } else {
                warn!(%pom, "no jacoco.skip property found, building as is");
            }
        }
        Ok(())
    }

    /// Run the tool against a built release and persist its report.
    #[instrument(skip(self, ctx), fields(tool = %self, tag = %release.name))]
    pub fn run(self, ctx: &ToolContext<'_>, release: &ReleaseTag) -> ToolResult<ToolReport> {
        let report_dir = ctx.reports_dir.join(self.report_subdir());
        std::fs::create_dir_all(&report_dir).map_err(io_err(&report_dir))?;
        let safe = safe_tag(&release.name);

        match self {
            Self::SpotBugs => spotbugs::run(
                &ctx.config.tool_command(ExternalTool::SpotBugs),
                ctx.clone_dir,
                &report_dir,
                &safe,
            ),
            Self::Ck => {
                let jar = ctx
                    .config
                    .ck_jar()
                    .filter(|jar| jar.is_file())
                    .ok_or_else(|| {
                        ToolError::MissingJar(
                            ctx.config
                                .ck_jar()
                                .map_or_else(|| "<unset>".to_string(), ToString::to_string),
                        )
                    })?;
                ck::run(
                    &ctx.config.tool_command(ExternalTool::Java),
                    jar,
                    ctx.clone_dir,
                    &report_dir,
                    &safe,
                )
            }
            Self::Jacoco => jacoco::run(ctx.clone_dir, &report_dir, &release.name),
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.report_subdir())
    }
}

/// Locations a tool run works with.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    /// Working copy of the target repository.
    pub clone_dir: &'a Utf8Path,
    /// Reports root.
    pub reports_dir: &'a Utf8Path,
    /// Tool commands and paths.
    pub config: &'a Config,
}

/// What a tool run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReport {
    /// Report files written or updated.
    pub files: Vec<Utf8PathBuf>,
    /// Rows (bugs, classes, or coverage counters) found in the report.
    pub rows: usize,
}

/// Run `command` with `args` and fail on a non-zero exit.
pub(crate) fn run_command(command: &str, args: &[&str]) -> ToolResult<()> {
    let output = std::process::Command::new(command)
        .args(args)
        .output()
        .map_err(|source| ToolError::Exec {
            tool: command.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed {
            tool: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
