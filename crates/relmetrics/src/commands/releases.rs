//! Releases command: list the tags a study would walk.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relmetrics_core::config::Config;
use relmetrics_core::github::{ReleaseTag, TagsClient};
use relmetrics_core::version::release_label;

/// Arguments for the `releases` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleasesArgs {
    /// Number of tags to list (defaults to `target.releases`)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// List every tag the repository has
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,
}

#[derive(Serialize)]
struct ReleaseEntry<'a> {
    tag: &'a str,
    label: String,
    commit_sha: &'a str,
}

impl<'a> From<&'a ReleaseTag> for ReleaseEntry<'a> {
    fn from(tag: &'a ReleaseTag) -> Self {
        Self {
            tag: &tag.name,
            label: release_label(&tag.name),
            commit_sha: &tag.commit_sha,
        }
    }
}

#[derive(Serialize)]
struct ReleasesReport<'a> {
    repository: String,
    releases: Vec<ReleaseEntry<'a>>,
}

/// Fetch and print the release tags of the target repository, newest first.
#[instrument(name = "cmd_releases", skip_all, fields(json_output))]
pub fn cmd_releases(args: ReleasesArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let limit = if args.all {
        None
    } else {
        Some(args.limit.unwrap_or_else(|| {
            config
                .target
                .as_ref()
                .and_then(|t| t.releases)
                .unwrap_or(relmetrics_core::config::DEFAULT_RELEASES)
        }))
    };
    debug!(json_output = global_json, ?limit, "executing releases command");

    let client = TagsClient::for_repository(
        config.api_url(),
        config.repository(),
        config.github_token(),
    )?;
    let tags = client
        .fetch_releases(limit)
        .with_context(|| format!("failed to list tags of {}", client.slug()))?;

    let report = ReleasesReport {
        repository: client.slug(),
        releases: tags.iter().map(ReleaseEntry::from).collect(),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {}",
        report.repository.bold(),
        format!("({} tags)", report.releases.len()).dimmed()
    );
    if report.releases.is_empty() {
        println!("  {} No tags found", "○".yellow());
    }
    for entry in &report.releases {
        let short = entry.commit_sha.get(..7).unwrap_or(entry.commit_sha);
        println!(
            "  {}  {:<28} {}",
            short.dimmed(),
            entry.tag,
            entry.label.cyan()
        );
    }

    Ok(())
}
