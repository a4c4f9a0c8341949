//! CK invocation and class-metrics CSV parsing.

use camino::Utf8Path;
use serde::Serialize;
use tracing::debug;

use super::{ToolError, ToolReport, ToolResult, io_err, run_command};

/// Source tree that must exist before CK runs, relative to the working copy.
pub const SOURCES_DIR: &str = "src/main";

/// Suffix of the class-level CSV CK writes after the output prefix.
pub const CLASS_REPORT_SUFFIX: &str = "_ck_class.csv";

/// The class metrics tracked across releases: CSV column and display name.
pub const CK_METRICS: [(&str, &str); 7] = [
    ("wmc", "Weighted Methods per Class"),
    ("dit", "Depth of Inheritance Tree"),
    ("noc", "Number of Children"),
    ("cbo", "Coupling Between Object Classes"),
    ("lcom*", "Lack of Cohesion of Methods"),
    ("rfc", "Response For a Class"),
    ("loc", "Lines of Code"),
];

/// Metric values for one class, in [`CK_METRICS`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CkClass {
    /// Fully qualified class name, when the CSV has a `class` column.
    pub class: Option<String>,
    /// `None` where the cell was empty or not a finite number.
    pub values: [Option<f64>; 7],
}

impl CkClass {
    /// Value of a metric by column name.
    pub fn get(&self, metric: &str) -> Option<f64> {
        CK_METRICS
            .iter()
            .position(|(column, _)| *column == metric)
            .and_then(|i| self.values[i])
    }
}

/// Display name for a CK column, or the column itself.
pub fn long_name(metric: &str) -> &str {
    CK_METRICS
        .iter()
        .find(|(column, _)| *column == metric)
        .map_or(metric, |(_, long)| *long)
}

/// `java -jar <ck.jar> <project> true 0 true <prefix>`.
///
/// CK appends `class.csv`, `method.csv` and friends to the prefix.
pub(super) fn run(
    java: &str,
    jar: &Utf8Path,
    clone_dir: &Utf8Path,
    report_dir: &Utf8Path,
    safe_tag: &str,
) -> ToolResult<ToolReport> {
    let prefix = report_dir.join(format!("{safe_tag}_ck_"));
    run_command(
        java,
        &[
            "-jar",
            jar.as_str(),
            clone_dir.as_str(),
            "true",
            "0",
            "true",
            prefix.as_str(),
        ],
    )?;

    let class_csv = report_dir.join(format!("{safe_tag}{CLASS_REPORT_SUFFIX}"));
    if !class_csv.is_file() {
        return Err(ToolError::MissingReport(class_csv));
    }

    let classes = read_class_csv(&class_csv)?;
    debug!(classes = classes.len(), "CK class report parsed");
    Ok(ToolReport {
        files: vec![class_csv],
        rows: classes.len(),
    })
}

/// Read and parse a CK class CSV from disk.
pub fn read_class_csv(path: &Utf8Path) -> ToolResult<Vec<CkClass>> {
    let data = std::fs::read_to_string(path).map_err(io_err(path))?;
    parse_class_csv(&data, path)
}

/// Parse a CK class CSV. `origin` names the file in errors.
///
/// Every column in [`CK_METRICS`] must be present.
pub fn parse_class_csv(data: &str, origin: &Utf8Path) -> ToolResult<Vec<CkClass>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let mut columns = [0usize; 7];
    let mut missing = Vec::new();
    for (slot, (name, _)) in columns.iter_mut().zip(CK_METRICS) {
        match position(name) {
            Some(i) => *slot = i,
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(ToolError::MissingColumns {
            path: origin.to_path_buf(),
            missing: missing.join(", "),
        });
    }
    let class_column = position("class");

    let mut classes = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values = columns.map(|i| {
            record
                .get(i)
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        });
        classes.push(CkClass {
            class: class_column.and_then(|i| record.get(i)).map(str::to_string),
            values,
        });
    }
    Ok(classes)
}
