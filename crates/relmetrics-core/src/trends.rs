//! Trend charts built from the reports of past runs.
//!
//! Reads whatever a tool left in its reports sub-directory, turns each report
//! into metric rows keyed by release label, and lays the aggregates out as
//! [`LineChart`]s. Unreadable reports are skipped and listed in the result.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::chart::{self, ChartError, LineChart};
use crate::health;
use crate::table::{Aggregation, MetricRow, MetricTable, Series};
use crate::tools::ck::{self, CLASS_REPORT_SUFFIX};
use crate::tools::jacoco::{self, METRICS_FILE};
use crate::tools::spotbugs::{self, REPORT_SUFFIX};
use crate::tools::{Tool, ToolError};
use crate::version::release_label;

/// Errors from loading reports or rendering trend charts.
#[derive(Error, Debug)]
pub enum TrendError {
    /// The tool's report directory or file does not exist.
    #[error("no {tool} reports found in {path}")]
    NoReports {
        /// Tool whose reports were looked for.
        tool: Tool,
        /// Where they were looked for.
        path: Utf8PathBuf,
    },

    /// Listing the report directory failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Directory involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A report could not be read.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A chart could not be rendered.
    #[error(transparent)]
    Chart(#[from] ChartError),
}

/// Result alias for trend operations.
pub type TrendResult<T> = Result<T, TrendError>;

/// A report left out of the trends.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedReport {
    /// The report file.
    pub path: Utf8PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Charts for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct Trends {
    /// Tool the reports came from.
    pub tool: Tool,
    /// Releases found, in version order.
    pub releases: Vec<String>,
    /// Charts to render.
    pub charts: Vec<LineChart>,
    /// Reports that could not be used.
    pub skipped: Vec<SkippedReport>,
}

impl Trends {
    /// Render every chart that has data into `dir`.
    pub fn render(&self, dir: &Utf8Path) -> TrendResult<Vec<Utf8PathBuf>> {
        let mut written = Vec::new();
        for chart in self.charts.iter().filter(|c| c.has_data()) {
            written.push(chart::render_svg(chart, dir)?);
        }
        info!(count = written.len(), %dir, "charts rendered");
        Ok(written)
    }
}

/// Load the reports of `tool` from `reports_dir` and build its charts.
#[instrument]
pub fn load(tool: Tool, reports_dir: &Utf8Path) -> TrendResult<Trends> {
    let dir = reports_dir.join(tool.report_subdir());
    if !dir.is_dir() {
        return Err(TrendError::NoReports { tool, path: dir });
    }

    let trends = match tool {
        Tool::SpotBugs => spotbugs_trends(&dir)?,
        Tool::Ck => ck_trends(&dir)?,
        Tool::Jacoco => jacoco_trends(&dir)?,
    };

    if trends.releases.is_empty() {
        return Err(TrendError::NoReports { tool, path: dir });
    }
    debug!(
        releases = trends.releases.len(),
        charts = trends.charts.len(),
        skipped = trends.skipped.len(),
        "trends loaded"
    );
    Ok(trends)
}

/// Release label encoded in a report file name, if it has `suffix`.
pub fn release_from_file_name(file_name: &str, suffix: &str) -> Option<String> {
    let stem = file_name.strip_suffix(suffix)?;
    (!stem.is_empty()).then(|| release_label(stem))
}

/// Files in `dir` whose names end with `suffix`, sorted by name.
fn reports_with_suffix(dir: &Utf8Path, suffix: &str) -> TrendResult<Vec<(Utf8PathBuf, String)>> {
    let entries = dir.read_dir_utf8().map_err(|source| TrendError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut reports = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TrendError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if let Some(release) = release_from_file_name(entry.file_name(), suffix) {
            reports.push((entry.path().to_path_buf(), release));
        }
    }
    reports.sort();
    Ok(reports)
}

fn skip(skipped: &mut Vec<SkippedReport>, path: Utf8PathBuf, error: &ToolError) {
    warn!(%path, %error, "skipping report");
    skipped.push(SkippedReport {
        path,
        reason: error.to_string(),
    });
}

fn spotbugs_trends(dir: &Utf8Path) -> TrendResult<Trends> {
    let mut table = MetricTable::new();
    let mut skipped = Vec::new();

    for (path, release) in reports_with_suffix(dir, &format!("{REPORT_SUFFIX}.xml"))? {
        match spotbugs::read_report(&path) {
            Ok(bugs) => {
                table.register_release(release.clone());
                for bug in bugs {
                    table.push(MetricRow::new(release.clone(), bug.category, 1.0));
                }
            }
            Err(e) => skip(&mut skipped, path, &e),
        }
    }

    let releases = table.releases();
    let charts = vec![
        LineChart {
            name: "spotbugs_total".into(),
            title: "Total bugs per release".into(),
            x_desc: "Release".into(),
            y_desc: "Bugs".into(),
            releases: releases.clone(),
            series: vec![table.totals("Total")],
        },
        LineChart {
            name: "spotbugs_by_category".into(),
            title: "Bugs per release by category".into(),
            x_desc: "Release".into(),
            y_desc: "Bugs".into(),
            releases: releases.clone(),
            series: table.all_series(Aggregation::Count),
        },
    ];

    Ok(Trends {
        tool: Tool::SpotBugs,
        releases,
        charts,
        skipped,
    })
}

fn ck_trends(dir: &Utf8Path) -> TrendResult<Trends> {
    let mut table = MetricTable::new();
    let mut health_table = MetricTable::new();
    let mut skipped = Vec::new();

    for (path, release) in reports_with_suffix(dir, CLASS_REPORT_SUFFIX)? {
        let classes = match ck::read_class_csv(&path) {
            Ok(classes) => classes,
            Err(e) => {
                skip(&mut skipped, path, &e);
                continue;
            }
        };

        table.register_release(release.clone());
        health_table.register_release(release.clone());
        for class in &classes {
            for ((metric, _), value) in ck::CK_METRICS.iter().zip(class.values) {
                if let Some(value) = value {
                    table.push(MetricRow::new(release.clone(), *metric, value));
                }
            }
        }
        if let Some(score) = health::release_health(&classes) {
            health_table.push(MetricRow::new(release, "health", score));
        }
    }

    let releases = table.releases();
    let mut charts: Vec<LineChart> = ck::CK_METRICS
        .iter()
        .map(|(metric, long)| LineChart {
            name: format!("ck_{}", metric.replace('*', "_star")),
            title: format!("{long} ({metric}) per release"),
            x_desc: "Release".into(),
            y_desc: format!("Mean {metric}"),
            releases: releases.clone(),
            series: vec![Series {
                name: (*long).to_string(),
                ..table.series(metric, Aggregation::Mean)
            }],
        })
        .collect();

    charts.push(LineChart {
        name: "ck_health".into(),
        title: "Code health index per release".into(),
        x_desc: "Release".into(),
        y_desc: "Mean of inverted and raw metrics".into(),
        releases: releases.clone(),
        series: vec![Series {
            name: "Health index".into(),
            ..health_table.series("health", Aggregation::Mean)
        }],
    });

    Ok(Trends {
        tool: Tool::Ck,
        releases,
        charts,
        skipped,
    })
}

fn jacoco_trends(dir: &Utf8Path) -> TrendResult<Trends> {
    let csv_path = dir.join(METRICS_FILE);
    if !csv_path.is_file() {
        return Err(TrendError::NoReports {
            tool: Tool::Jacoco,
            path: csv_path,
        });
    }

    let csv = jacoco::read_metrics_csv(&csv_path)?;
    let skipped = csv
        .rejected
        .into_iter()
        .map(|row| SkippedReport {
            path: csv_path.clone(),
            reason: format!("line {}: {}", row.line, row.reason),
        })
        .collect();

    let mut table = MetricTable::new();
    for record in csv.records {
        table.push(MetricRow::new(
            release_label(&record.release),
            record.metric,
            record.coverage,
        ));
    }

    let releases = table.releases();
    let charts = table
        .metrics()
        .iter()
        .map(|metric| LineChart {
            name: format!("{metric}_coverage"),
            title: format!("Coverage: {metric}"),
            x_desc: "Release".into(),
            y_desc: "Coverage (%)".into(),
            releases: releases.clone(),
            series: vec![Series {
                name: "Coverage (%)".into(),
                ..table.series(metric, Aggregation::Mean)
            }],
        })
        .collect();

    Ok(Trends {
        tool: Tool::Jacoco,
        releases,
        charts,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn reports() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    fn bug(category: &str) -> String {
        format!(r#"<BugInstance type="T" priority="2" category="{category}"/>"#)
    }

    fn bug_report(bugs: &[&str]) -> String {
        let body: String = bugs.iter().map(|c| bug(c)).collect();
        format!("<BugCollection>{body}</BugCollection>")
    }

    fn chart<'a>(trends: &'a Trends, name: &str) -> &'a LineChart {
        trends.charts.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn release_from_report_names() {
        assert_eq!(
            release_from_file_name("rel_commons-lang-3.17.0_spotbugs.xml", "_spotbugs.xml"),
            Some("3.17.0".into())
        );
        assert_eq!(
            release_from_file_name("rel_commons-lang-3.9_ck_class.csv", "_ck_class.csv"),
            Some("3.9".into())
        );
        assert_eq!(release_from_file_name("rel_commons-lang-3.9_spotbugs.html", "_spotbugs.xml"), None);
        assert_eq!(release_from_file_name("_spotbugs.xml", "_spotbugs.xml"), None);
    }

    #[test]
    fn missing_directory_is_no_reports() {
        let (_tmp, dir) = reports();
        assert!(matches!(
            load(Tool::SpotBugs, &dir),
            Err(TrendError::NoReports { .. })
        ));
    }

    #[test]
    fn spotbugs_totals_and_categories() {
        let (_tmp, dir) = reports();
        let sb = dir.join("spotbugs");
        fs::create_dir_all(&sb).unwrap();
        fs::write(
            sb.join("rel_commons-lang-3.10_spotbugs.xml"),
            bug_report(&["BAD_PRACTICE", "BAD_PRACTICE", "PERFORMANCE"]),
        )
        .unwrap();
        fs::write(sb.join("rel_commons-lang-3.9_spotbugs.xml"), bug_report(&["BAD_PRACTICE"])).unwrap();
        fs::write(sb.join("rel_commons-lang-3.11_spotbugs.xml"), bug_report(&[])).unwrap();
        fs::write(sb.join("rel_commons-lang-3.11_spotbugs.html"), "<html/>").unwrap();

        let trends = load(Tool::SpotBugs, &dir).unwrap();
        assert_eq!(trends.releases, ["3.9", "3.10", "3.11"]);

        let total = chart(&trends, "spotbugs_total");
        assert_eq!(total.series[0].points, [Some(1.0), Some(3.0), Some(0.0)]);

        let by_category = chart(&trends, "spotbugs_by_category");
        let names: Vec<&str> = by_category.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["BAD_PRACTICE", "PERFORMANCE"]);
        assert_eq!(by_category.series[0].points, [Some(1.0), Some(2.0), None]);
        assert_eq!(by_category.series[1].points, [None, Some(1.0), None]);
    }

    #[test]
    fn broken_spotbugs_report_is_skipped() {
        let (_tmp, dir) = reports();
        let sb = dir.join("spotbugs");
        fs::create_dir_all(&sb).unwrap();
        fs::write(sb.join("rel_commons-lang-3.9_spotbugs.xml"), bug_report(&["STYLE"])).unwrap();
        fs::write(sb.join("rel_commons-lang-3.10_spotbugs.xml"), "<BugCollection><x></BugCollection>").unwrap();

        let trends = load(Tool::SpotBugs, &dir).unwrap();
        assert_eq!(trends.releases, ["3.9"]);
        assert_eq!(trends.skipped.len(), 1);
        assert!(trends.skipped[0].path.as_str().ends_with("3.10_spotbugs.xml"));
    }

    #[test]
    fn ck_means_and_health() {
        let (_tmp, dir) = reports();
        let ck_dir = dir.join("ck");
        fs::create_dir_all(&ck_dir).unwrap();
        fs::write(
            ck_dir.join("rel_commons-lang-3.9_ck_class.csv"),
            "class,wmc,dit,noc,cbo,lcom*,rfc,loc\nA,2,0,0,0,0,0,0\nB,4,0,0,0,0,0,0\n",
        )
        .unwrap();
        fs::write(
            ck_dir.join("rel_commons-lang-3.10_ck_class.csv"),
            "class,wmc,dit,noc\nA,1,1,1\n",
        )
        .unwrap();

        let trends = load(Tool::Ck, &dir).unwrap();
        assert_eq!(trends.releases, ["3.9"]);
        assert_eq!(trends.skipped.len(), 1);
        assert_eq!(trends.charts.len(), 8);

        let wmc = chart(&trends, "ck_wmc");
        assert_eq!(wmc.series[0].name, "Weighted Methods per Class");
        assert_eq!(wmc.series[0].points, [Some(3.0)]);
        assert!(trends.charts.iter().any(|c| c.name == "ck_lcom_star"));

        // A: (1/3 + 1 + 0 + 1 + 1 + 0 + 0) / 7, B: (1/5 + 3) / 7
        let expected = ((1.0 / 3.0 + 3.0) / 7.0 + (1.0 / 5.0 + 3.0) / 7.0) / 2.0;
        let health = chart(&trends, "ck_health").series[0].points[0].unwrap();
        assert!((health - expected).abs() < 1e-12);
    }

    #[test]
    fn jacoco_chart_per_counter() {
        let (_tmp, dir) = reports();
        let jc = dir.join("jacoco");
        fs::create_dir_all(&jc).unwrap();
        fs::write(
            jc.join(METRICS_FILE),
            "Release,Metric,Coverage,Covered,Total,Missed\n\
             rel/commons-lang-3.17.0,LINE,90.0,90,100,10\n\
             rel/commons-lang-3.16.0,LINE,80.0,80,100,20\n\
             rel/commons-lang-3.16.0,BRANCH,50.0,1,2,1\n",
        )
        .unwrap();

        let trends = load(Tool::Jacoco, &dir).unwrap();
        assert_eq!(trends.releases, ["3.16.0", "3.17.0"]);
        let names: Vec<&str> = trends.charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["BRANCH_coverage", "LINE_coverage"]);
        assert_eq!(
            chart(&trends, "LINE_coverage").series[0].points,
            [Some(80.0), Some(90.0)]
        );
    }

    #[test]
    fn jacoco_bad_row_is_skipped_not_fatal() {
        let (_tmp, dir) = reports();
        let jc = dir.join("jacoco");
        fs::create_dir_all(&jc).unwrap();
        fs::write(
            jc.join(METRICS_FILE),
            "Release,Metric,Coverage,Covered,Total,Missed\n\
             rel/commons-lang-3.16.0,LINE,80.0,80,100,20\n\
             rel/commons-lang-3.17.0,LINE,n/a,0,0,0\n\
             rel/commons-lang-3.18.0,LINE,95.0,95,100,5\n",
        )
        .unwrap();

        let trends = load(Tool::Jacoco, &dir).unwrap();
        assert_eq!(trends.releases, ["3.16.0", "3.18.0"]);
        assert_eq!(trends.skipped.len(), 1);
        assert_eq!(trends.skipped[0].path, jc.join(METRICS_FILE));
        assert!(trends.skipped[0].reason.starts_with("line 3:"));
    }

    #[test]
    fn jacoco_without_csv_is_no_reports() {
        let (_tmp, dir) = reports();
        fs::create_dir_all(dir.join("jacoco")).unwrap();
        assert!(matches!(
            load(Tool::Jacoco, &dir),
            Err(TrendError::NoReports { .. })
        ));
    }

    #[test]
    fn render_skips_empty_charts() {
        let (_tmp, dir) = reports();
        let sb = dir.join("spotbugs");
        fs::create_dir_all(&sb).unwrap();
        fs::write(sb.join("rel_commons-lang-3.9_spotbugs.xml"), bug_report(&[])).unwrap();

        let trends = load(Tool::SpotBugs, &dir).unwrap();
        let written = trends.render(&dir.join("charts")).unwrap();
        assert_eq!(written, [dir.join("charts/spotbugs_total.svg")]);
    }
}
