//! Maven builds of a checked-out release.
//!
//! A build counts as successful only when Maven exits cleanly *and* the
//! artifact the next tool needs is on disk. Old releases sometimes "succeed"
//! without producing classes.

use std::fs;
use std::io::Write;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Lines of build output kept for display when a build fails.
const OUTPUT_TAIL_LINES: usize = 20;

/// Errors from running Maven or editing the POM.
#[derive(Error, Debug)]
pub enum MavenError {
    /// The Maven launcher could not be started.
    #[error("failed to run {command}: {source}")]
    Exec {
        /// Launcher that was invoked.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Reading or writing the POM failed.
    #[error("failed to update {path}: {source}")]
    Pom {
        /// Path to the POM.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for Maven operations.
pub type MavenResult<T> = Result<T, MavenError>;

/// How a build ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BuildOutcome {
    /// Exit status 0 and the expected artifact exists.
    Success,
    /// Maven exited non-zero.
    Failed {
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Last lines of the build output.
        output_tail: String,
    },
    /// Maven exited cleanly but the artifact is missing.
    MissingArtifact {
        /// The path that should have existed.
        artifact: Utf8PathBuf,
    },
}

impl BuildOutcome {
    /// Whether the build produced what the tool needs.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// One-line description for logs and summaries.
    pub fn summary(&self) -> String {
        match self {
            Self::Success => "build succeeded".to_string(),
            Self::Failed {
                exit_code: Some(code),
                ..
            } => format!("build failed with exit code {code}"),
            Self::Failed { exit_code: None, .. } => "build terminated by signal".to_string(),
            Self::MissingArtifact { artifact } => format!("build did not produce {artifact}"),
        }
    }
}

/// Run `maven` with `goals` inside `dir`.
///
/// `artifact` is relative to `dir`; when given, it must exist afterwards for
/// the build to count as successful.
#[instrument(skip(goals), fields(goals = %goals.join(" ")))]
pub fn build(
    dir: &Utf8Path,
    maven: &str,
    goals: &[&str],
    artifact: Option<&Utf8Path>,
) -> MavenResult<BuildOutcome> {
    info!("building");
    let output = Command::new(maven)
        .args(goals)
        .current_dir(dir.as_std_path())
        .output()
        .map_err(|source| MavenError::Exec {
            command: maven.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = BuildOutcome::Failed {
            exit_code: output.status.code(),
            output_tail: tail(&format!("{stdout}{stderr}"), OUTPUT_TAIL_LINES),
        };
        warn!(outcome = %outcome.summary(), "build failed");
        return Ok(outcome);
    }

    if let Some(artifact) = artifact {
        let path = dir.join(artifact);
        if !path.exists() {
            warn!(%path, "expected build artifact is missing");
            return Ok(BuildOutcome::MissingArtifact { artifact: path });
        }
    }

    debug!("build succeeded");
    Ok(BuildOutcome::Success)
}

/// Set the `jacoco.skip` property in a POM.
///
/// Only the literal `<jacoco.skip>true|false</jacoco.skip>` element is
/// touched; the rest of the file is written back byte for byte. Returns
/// whether the property was present.
#[instrument]
pub fn set_jacoco_skip(pom: &Utf8Path, skip: bool) -> MavenResult<bool> {
    let pom_err = |source| MavenError::Pom {
        path: pom.to_path_buf(),
        source,
    };

    let content = fs::read_to_string(pom).map_err(pom_err)?;
    let wanted = format!("<jacoco.skip>{skip}</jacoco.skip>");
    let other = format!("<jacoco.skip>{}</jacoco.skip>", !skip);

    if !content.contains(&other) {
        let present = content.contains(&wanted);
        debug!(present, "jacoco.skip already in desired state");
        return Ok(present);
    }

    let updated = content.replace(&other, &wanted);
    write_atomic(pom, &updated).map_err(pom_err)?;
    info!(skip, "updated jacoco.skip");
    Ok(true)
}

/// Replace `path` with `content` through a sibling temp file.
fn write_atomic(path: &Utf8Path, content: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(path.as_std_path()).map_err(|e| e.error)?;
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
