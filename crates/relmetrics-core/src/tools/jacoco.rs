//! JaCoCo XML report parsing and the cumulative coverage CSV.
//!
//! Coverage runs do not invoke a separate tool: the Maven goals already ran
//! the tests under the JaCoCo agent. What remains is reading
//! `target/site/jacoco/jacoco.xml` and appending one row per counter type to
//! `jacoco_metrics.csv`, which accumulates across releases and runs.

use std::fs::OpenOptions;

use camino::Utf8Path;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ToolError, ToolReport, ToolResult, attr, io_err};

/// Report location relative to the working copy.
pub const REPORT_PATH: &str = "target/site/jacoco/jacoco.xml";

/// Cumulative CSV inside the JaCoCo reports directory.
pub const METRICS_FILE: &str = "jacoco_metrics.csv";

const CSV_HEADER: [&str; 6] = ["Release", "Metric", "Coverage", "Covered", "Total", "Missed"];

/// Covered/missed totals for one counter type (`INSTRUCTION`, `LINE`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageCounter {
    /// Counter type.
    pub metric: String,
    /// Covered items.
    pub covered: u64,
    /// Missed items.
    pub missed: u64,
}

impl CoverageCounter {
    /// Covered plus missed.
    pub const fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// Percentage covered; 0 when there is nothing to cover.
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.covered as f64 / total as f64 * 100.0,
        }
    }
}

/// One row of `jacoco_metrics.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoverageRecord {
    /// Tag name as fetched (e.g., `rel/commons-lang-3.17.0`).
    #[serde(rename = "Release")]
    pub release: String,
    /// Counter type.
    #[serde(rename = "Metric")]
    pub metric: String,
    /// Percentage covered.
    #[serde(rename = "Coverage")]
    pub coverage: f64,
    /// Covered items.
    #[serde(rename = "Covered")]
    pub covered: u64,
    /// Covered plus missed.
    #[serde(rename = "Total")]
    pub total: u64,
    /// Missed items.
    #[serde(rename = "Missed")]
    pub missed: u64,
}

pub(super) fn run(clone_dir: &Utf8Path, report_dir: &Utf8Path, tag: &str) -> ToolResult<ToolReport> {
    let report = clone_dir.join(REPORT_PATH);
    if !report.is_file() {
        return Err(ToolError::MissingReport(report));
    }

    let counters = read_report(&report)?;
    if counters.is_empty() {
        return Err(ToolError::EmptyReport(report));
    }
    for counter in &counters {
        info!(
            metric = %counter.metric,
            coverage = format_args!("{:.2}%", counter.coverage()),
            covered = counter.covered,
            total = counter.total(),
            "coverage"
        );
    }

    let csv_path = report_dir.join(METRICS_FILE);
    append_rows(&csv_path, tag, &counters)?;
    Ok(ToolReport {
        files: vec![csv_path],
        rows: counters.len(),
    })
}

/// Read and parse a JaCoCo XML report from disk.
pub fn read_report(path: &Utf8Path) -> ToolResult<Vec<CoverageCounter>> {
    let xml = std::fs::read_to_string(path).map_err(io_err(path))?;
    parse_report(&xml)
}

/// Collect `counter` elements from a JaCoCo XML report.
///
/// Counters appear at every level (method, class, package, report). For each
/// type the last one in document order wins, which is the report-level total.
/// Types keep the order in which they first appear.
pub fn parse_report(xml: &str) -> ToolResult<Vec<CoverageCounter>> {
    let mut reader = Reader::from_str(xml);
    let mut counters: Vec<CoverageCounter> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"counter" => {
                let Some(metric) = attr(&e, "type")? else {
                    continue;
                };
                let count = |name| -> ToolResult<u64> {
                    Ok(attr(&e, name)?.and_then(|v| v.parse().ok()).unwrap_or(0))
                };
                let counter = CoverageCounter {
                    covered: count("covered")?,
                    missed: count("missed")?,
                    metric,
                };

                match counters.iter_mut().find(|c| c.metric == counter.metric) {
                    Some(existing) => *existing = counter,
                    None => counters.push(counter),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(counters)
}

/// Append one row per counter, writing the header if the file is new.
pub fn append_rows(csv_path: &Utf8Path, release: &str, counters: &[CoverageCounter]) -> ToolResult<()> {
    let is_new = !csv_path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)
        .map_err(io_err(csv_path))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        writer.write_record(CSV_HEADER)?;
    }
    for counter in counters {
        writer.serialize(CoverageRecord {
            release: release.to_string(),
            metric: counter.metric.clone(),
            coverage: counter.coverage(),
            covered: counter.covered,
            total: counter.total(),
            missed: counter.missed,
        })?;
    }
    writer.flush().map_err(io_err(csv_path))?;
    debug!(%csv_path, rows = counters.len(), "coverage rows appended");
    Ok(())
}

/// A CSV row that did not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the file.
    pub line: u64,
    /// Parser message.
    pub reason: String,
}

/// Contents of a coverage CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsCsv {
    /// Rows that parsed.
    pub records: Vec<CoverageRecord>,
    /// Rows that did not.
    pub rejected: Vec<RejectedRow>,
}

/// Read a coverage CSV, setting malformed rows aside.
///
/// # Errors
///
/// Fails only when the file cannot be opened.
pub fn read_metrics_csv(path: &Utf8Path) -> ToolResult<MetricsCsv> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut parsed = MetricsCsv::default();
    for row in reader.deserialize::<CoverageRecord>() {
        match row {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                warn!(%path, line, error = %e, "skipping malformed coverage row");
                parsed.rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}
