//! Plot command: turn stored reports into trend charts.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relmetrics_core::config::Config;
use relmetrics_core::tools::Tool;
use relmetrics_core::trends::{self, SkippedReport};

/// Arguments for the `plot` subcommand.
#[derive(Args, Debug)]
pub struct PlotArgs {
    /// Tool whose reports are charted
    #[arg(value_enum)]
    pub tool: Tool,

    /// Reports root (defaults to `reports.dir`)
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<Utf8PathBuf>,

    /// Where charts are written (defaults to `reports.charts_dir`)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<Utf8PathBuf>,

    /// Only render charts with these names (repeatable)
    #[arg(long = "chart", value_name = "NAME")]
    pub charts: Vec<String>,
}

#[derive(Serialize)]
struct PlotReport<'a> {
    tool: Tool,
    releases: &'a [String],
    charts: Vec<Utf8PathBuf>,
    skipped: &'a [SkippedReport],
}

/// Load the reports of one tool and render its charts.
#[instrument(name = "cmd_plot", skip_all, fields(tool = %args.tool))]
pub fn cmd_plot(args: PlotArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let reports_dir = args.reports_dir.unwrap_or_else(|| config.reports_dir());
    let out = args.out.unwrap_or_else(|| config.charts_dir());
    debug!(json_output = global_json, %reports_dir, %out, "executing plot command");

    let mut trends = trends::load(args.tool, &reports_dir)?;
    if !args.charts.is_empty() {
        let unknown: Vec<&str> = args
            .charts
            .iter()
            .filter(|name| !trends.charts.iter().any(|c| &c.name == *name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            let known: Vec<&str> = trends.charts.iter().map(|c| c.name.as_str()).collect();
            anyhow::bail!(
                "unknown chart(s): {} (available: {})",
                unknown.join(", "),
                known.join(", ")
            );
        }
        trends.charts.retain(|c| args.charts.contains(&c.name));
    }

    let written = trends
        .render(&out)
        .with_context(|| format!("failed to render {} charts", args.tool))?;

    let report = PlotReport {
        tool: args.tool,
        releases: &trends.releases,
        charts: written,
        skipped: &trends.skipped,
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} {}",
        "Plot".bold(),
        args.tool.to_string().green().bold(),
        format!("({} releases)", report.releases.len()).dimmed()
    );
    for skipped in report.skipped {
        println!(
            "  {} skipped {}: {}",
            "!".yellow(),
            skipped.path.dimmed(),
            skipped.reason
        );
    }
    if report.charts.is_empty() {
        println!("  {} No chart had data to draw", "○".yellow());
    }
    for path in &report.charts {
        println!("  {} {}", "✓".green(), path.cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(tmp: &TempDir) -> PlotArgs {
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        PlotArgs {
            tool: Tool::SpotBugs,
            reports_dir: Some(root.join("reports")),
            out: Some(root.join("charts")),
            charts: Vec::new(),
        }
    }

    #[test]
    fn missing_reports_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = cmd_plot(args(&tmp), true, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("no spotbugs reports"));
    }

    #[test]
    fn renders_spotbugs_charts() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("reports/spotbugs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("rel_commons-lang-3.1_spotbugs.xml"),
            r#"<BugCollection><BugInstance type="DM_CONVERT_CASE" priority="2" category="I18N"/></BugCollection>"#,
        )
        .unwrap();

        cmd_plot(args(&tmp), true, &Config::default()).unwrap();
        assert!(tmp.path().join("charts/spotbugs_total.svg").exists());
    }

    #[test]
    fn unknown_chart_name_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("reports/spotbugs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("v1.0_spotbugs.xml"),
            "<BugCollection></BugCollection>",
        )
        .unwrap();

        let mut a = args(&tmp);
        a.charts = vec!["nope".into()];
        let err = cmd_plot(a, true, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("spotbugs_total"));
    }
}
