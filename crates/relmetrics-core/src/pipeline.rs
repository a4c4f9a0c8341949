//! The release-processing loop.
//!
//! For each release: checkout → prepare → build → run tool → reset. A release
//! that fails to build or whose tool fails is recorded and skipped. Failing to
//! clone, to fetch the release list, or to check out a commit aborts the run,
//! since every later release would fail the same way.
//!
//! # Release selection
//!
//! By default the first `releases` tags (newest first) are processed whatever
//! their outcome. With `until_successful`, tags are walked until `releases`
//! of them have been analyzed.
//!
//! Progress is reported through an `on_event` callback so the CLI can drive a
//! progress bar without the core knowing about terminals.

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{Config, ExternalTool};
use crate::git::{self, GitError};
use crate::github::{GithubError, ReleaseTag, TagsClient};
use crate::maven::{self, BuildOutcome, MavenError};
use crate::preflight;
use crate::tools::{Tool, ToolContext, ToolReport};
use crate::version::release_label;

/// Errors that abort a study run.
#[derive(Error, Debug)]
pub enum StudyError {
    /// Preflight checks failed.
    #[error("preflight checks failed: {0}")]
    PreflightFailed(String),

    /// Clone, checkout or another fatal git step failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The release list could not be fetched.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// Maven could not be started at all.
    #[error(transparent)]
    Maven(#[from] MavenError),

    /// No releases to process.
    #[error("no releases found for {0}")]
    NoReleases(String),
}

/// Result alias for study operations.
pub type StudyResult<T> = Result<T, StudyError>;

/// Resolved parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySettings {
    /// Clone URL of the target repository.
    pub repository: String,
    /// GitHub API root.
    pub api_url: String,
    /// Optional API token.
    pub token: Option<String>,
    /// Working copy location.
    pub clone_dir: Utf8PathBuf,
    /// Reports root.
    pub reports_dir: Utf8PathBuf,
    /// Number of releases to process (or to analyze, with `until_successful`).
    pub releases: usize,
    /// Walk older tags until `releases` succeed.
    pub until_successful: bool,
    /// List the releases without touching the working copy.
    pub dry_run: bool,
}

impl StudySettings {
    /// Settings from configuration; callers override fields from CLI flags.
    pub fn from_config(config: &Config) -> Self {
        let target = config.target.as_ref();
        Self {
            repository: config.repository().to_string(),
            api_url: config.api_url().to_string(),
            token: config.github_token(),
            clone_dir: config.clone_dir(),
            reports_dir: config.reports_dir(),
            releases: target
                .and_then(|t| t.releases)
                .unwrap_or(crate::config::DEFAULT_RELEASES),
            until_successful: target.and_then(|t| t.until_successful).unwrap_or(false),
            dry_run: false,
        }
    }
}

/// Steps of processing one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyPhase {
    /// `git checkout <sha>`.
    Checkout,
    /// Tool-specific POM adjustments.
    Prepare,
    /// Maven goals.
    Build,
    /// Tool invocation and report parsing.
    Analyze,
    /// `git reset --hard`.
    Reset,
}

impl std::fmt::Display for StudyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkout => write!(f, "checkout"),
            Self::Prepare => write!(f, "prepare"),
            Self::Build => write!(f, "build"),
            Self::Analyze => write!(f, "analyze"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Events emitted during a run for progress reporting.
#[derive(Debug, Clone)]
pub enum StudyEvent {
    /// The working copy is being cloned.
    Cloning {
        /// Clone URL.
        url: String,
    },
    /// The release list is known.
    ReleasesFetched {
        /// Number of tags fetched.
        count: usize,
    },
    /// Processing of a release started.
    ReleaseStarted {
        /// Zero-based position in the fetched list.
        index: usize,
        /// The release.
        release: ReleaseTag,
    },
    /// A step of the current release started.
    PhaseStarted(StudyPhase),
    /// Processing of a release finished.
    ReleaseFinished(ReleaseResult),
    /// Something went wrong that does not stop the run.
    Warning(String),
}

/// How one release ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ReleaseStatus {
    /// The tool ran and its report was stored.
    Analyzed {
        /// What the tool produced.
        report: ToolReport,
    },
    /// The build failed; the tool was not run.
    BuildFailed {
        /// Build result.
        build: BuildOutcome,
    },
    /// The tool failed.
    ToolFailed {
        /// Error text.
        message: String,
    },
    /// Dry run: the release would be processed.
    Planned,
}

/// One processed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResult {
    /// Tag name.
    pub tag: String,
    /// Version label used on chart axes.
    pub label: String,
    /// Tagged commit.
    pub commit_sha: String,
    /// Result.
    #[serde(flatten)]
    pub status: ReleaseStatus,
}

impl ReleaseResult {
    fn new(release: &ReleaseTag, status: ReleaseStatus) -> Self {
        Self {
            tag: release.name.clone(),
            label: release_label(&release.name),
            commit_sha: release.commit_sha.clone(),
            status,
        }
    }

    /// Whether the release was analyzed.
    pub const fn is_analyzed(&self) -> bool {
        matches!(self.status, ReleaseStatus::Analyzed { .. })
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct StudyOutcome {
    /// Tool that was run.
    pub tool: Tool,
    /// Clone URL.
    pub repository: String,
    /// Working copy.
    pub clone_dir: Utf8PathBuf,
    /// Reports root.
    pub reports_dir: Utf8PathBuf,
    /// Per-release results, in processing order.
    pub releases: Vec<ReleaseResult>,
    /// Number of releases analyzed.
    pub analyzed: usize,
    /// Number of releases skipped.
    pub skipped: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Run `tool` across the releases of the configured repository.
#[instrument(skip(config, settings, on_event), fields(
    repository = %settings.repository,
    releases = settings.releases,
    until_successful = settings.until_successful,
    dry_run = settings.dry_run
))]
pub fn run_study(
    config: &Config,
    settings: &StudySettings,
    tool: Tool,
    mut on_event: impl FnMut(StudyEvent),
) -> StudyResult<StudyOutcome> {
    if !settings.dry_run {
        let report = preflight::run_preflight(config, tool);
        if !report.all_passed {
            return Err(StudyError::PreflightFailed(report.failures().join("; ")));
        }

        if !settings.clone_dir.exists() {
            on_event(StudyEvent::Cloning {
                url: settings.repository.clone(),
            });
        }
        git::clone_if_missing(&settings.repository, &settings.clone_dir)?;
    }

    let client = TagsClient::for_repository(
        &settings.api_url,
        &settings.repository,
        settings.token.clone(),
    )?;
    let limit = (!settings.until_successful).then_some(settings.releases);
    let tags = client.fetch_releases(limit)?;
    if tags.is_empty() {
        return Err(StudyError::NoReleases(client.slug()));
    }
    on_event(StudyEvent::ReleasesFetched { count: tags.len() });
    info!(count = tags.len(), "releases fetched");

    let mut results = Vec::new();
    let mut analyzed = 0;

    for (index, release) in tags.iter().enumerate() {
        let enough = if settings.dry_run {
            results.len() >= settings.releases
        } else {
            settings.until_successful && analyzed >= settings.releases
        };
        if enough {
            break;
        }

        on_event(StudyEvent::ReleaseStarted {
            index,
            release: release.clone(),
        });

        let result = if settings.dry_run {
            ReleaseResult::new(release, ReleaseStatus::Planned)
        } else {
            process_release(config, settings, tool, release, &mut on_event)?
        };

        if result.is_analyzed() {
            analyzed += 1;
        }
        on_event(StudyEvent::ReleaseFinished(result.clone()));
        results.push(result);
    }

    let skipped = if settings.dry_run {
        info!(planned = results.len(), "dry run complete");
        0
    } else {
        let skipped = results.len() - analyzed;
        info!(analyzed, skipped, "study complete");
        skipped
    };

    Ok(StudyOutcome {
        tool,
        repository: settings.repository.clone(),
        clone_dir: settings.clone_dir.clone(),
        reports_dir: settings.reports_dir.clone(),
        releases: results,
        analyzed,
        skipped,
        dry_run: settings.dry_run,
    })
}

/// Checkout, build, analyze, and reset one release.
#[instrument(skip_all, fields(tag = %release.name, sha = %release.commit_sha))]
fn process_release(
    config: &Config,
    settings: &StudySettings,
    tool: Tool,
    release: &ReleaseTag,
    on_event: &mut impl FnMut(StudyEvent),
) -> StudyResult<ReleaseResult> {
    let dir = &settings.clone_dir;

    on_event(StudyEvent::PhaseStarted(StudyPhase::Checkout));
    git::checkout(dir, &release.commit_sha)?;

    let status = analyze_checked_out(config, settings, tool, release, on_event)?;
    match &status {
        ReleaseStatus::Analyzed { report } => {
            info!(rows = report.rows, "release analyzed");
        }
        ReleaseStatus::BuildFailed { build } => {
            warn!(reason = %build.summary(), "skipping release");
        }
        ReleaseStatus::ToolFailed { message } => {
            warn!(%message, "skipping release");
        }
        ReleaseStatus::Planned => {}
    }

    on_event(StudyEvent::PhaseStarted(StudyPhase::Reset));
    if let Err(e) = git::reset_hard(dir) {
        warn!(error = %e, "reset failed, continuing");
        on_event(StudyEvent::Warning(format!(
            "reset after {} failed: {e}",
            release.name
        )));
    }

    Ok(ReleaseResult::new(release, status))
}

fn analyze_checked_out(
    config: &Config,
    settings: &StudySettings,
    tool: Tool,
    release: &ReleaseTag,
    on_event: &mut impl FnMut(StudyEvent),
) -> StudyResult<ReleaseStatus> {
    let dir = &settings.clone_dir;

    on_event(StudyEvent::PhaseStarted(StudyPhase::Prepare));
    if let Err(e) = tool.prepare(dir) {
        warn!(error = %e, "prepare failed, building as is");
        on_event(StudyEvent::Warning(format!(
            "could not prepare {}: {e}",
            release.name
        )));
    }

    on_event(StudyEvent::PhaseStarted(StudyPhase::Build));
    let build = maven::build(
        dir,
        &config.tool_command(ExternalTool::Maven),
        tool.goals(),
        tool.artifact(),
    )?;
    if !build.is_success() {
        return Ok(ReleaseStatus::BuildFailed { build });
    }

    on_event(StudyEvent::PhaseStarted(StudyPhase::Analyze));
    let ctx = ToolContext {
        clone_dir: dir,
        reports_dir: &settings.reports_dir,
        config,
    };
    Ok(match tool.run(&ctx, release) {
        Ok(report) => ReleaseStatus::Analyzed { report },
        Err(e) => ReleaseStatus::ToolFailed {
            message: e.to_string(),
        },
    })
}
