//! The working copy under study.
//!
//! Every operation runs the `git` binary so the user's credential helpers
//! and proxy settings apply to the clone.

use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// A git invocation that did not succeed.
#[derive(Error, Debug)]
pub enum GitError {
    /// `git` could not be started.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` ran and exited non-zero.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// First argument of the invocation, e.g. `checkout`.
        command: String,
        /// Trimmed stderr.
        stderr: String,
    },

    /// The directory is not inside a working copy.
    #[error("{0} is not a git repository")]
    NotARepo(String),
}

/// Shorthand for git results.
pub type GitResult<T> = Result<T, GitError>;

/// Clone `url` into `dir`. An existing `dir` is reused as is.
///
/// Returns whether a clone happened.
#[instrument]
pub fn clone_if_missing(url: &str, dir: &Utf8Path) -> GitResult<bool> {
    if dir.exists() {
        debug!(%dir, "reusing working copy");
        return Ok(false);
    }
    info!(%url, %dir, "cloning repository");
    Git::global().run(&["clone", url, dir.as_str()])?;
    Ok(true)
}

/// Detach HEAD at `commit`.
#[instrument]
pub fn checkout(dir: &Utf8Path, commit: &str) -> GitResult<()> {
    Git::in_dir(dir).run(&["checkout", "--quiet", commit])?;
    debug!(%commit, "checked out");
    Ok(())
}

/// Throw away edits to tracked files, such as a patched `pom.xml`.
#[instrument]
pub fn reset_hard(dir: &Utf8Path) -> GitResult<()> {
    Git::in_dir(dir).run(&["reset", "--hard", "--quiet"])?;
    Ok(())
}

/// Full SHA of HEAD.
#[instrument]
pub fn head_commit(dir: &Utf8Path) -> GitResult<String> {
    Git::in_dir(dir)
        .run(&["rev-parse", "HEAD"])
        .map(|out| out.trim().to_owned())
}

/// `(owner, repo)` of a GitHub clone URL, in HTTPS or scp-like SSH form.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = match url.strip_prefix("git@") {
        Some(ssh) => ssh.split_once(':')?.1,
        None => url.split_once("://")?.1.split_once('/')?.1,
    };
    let path = path.trim_end_matches('/');
    let mut parts = path.strip_suffix(".git").unwrap_or(path).split('/');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_owned(), repo.to_owned()))
        }
        _ => None,
    }
}

/// One `git` invocation, optionally run inside a working copy.
struct Git<'a> {
    dir: Option<&'a Utf8Path>,
}

impl<'a> Git<'a> {
    const fn global() -> Self {
        Self { dir: None }
    }

    const fn in_dir(dir: &'a Utf8Path) -> Self {
        Self { dir: Some(dir) }
    }

    /// Run with `args` and return stdout.
    fn run(&self, args: &[&str]) -> GitResult<String> {
        let mut command = Command::new("git");
        if let Some(dir) = self.dir {
            command.current_dir(dir);
        }
        let output = command.args(args).output()?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo(self.dir.map_or(".", Utf8Path::as_str).to_owned()));
        }
        Err(GitError::Command {
            command: args.first().copied().unwrap_or_default().to_owned(),
            stderr,
        })
    }
}
