//! SpotBugs invocation and XML report parsing.

use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ToolError, ToolReport, ToolResult, attr, io_err, run_command};

/// Compiled classes SpotBugs analyzes, relative to the working copy.
pub const CLASSES_DIR: &str = "target/classes";

/// File-name suffix shared by the XML and HTML reports.
pub const REPORT_SUFFIX: &str = "_spotbugs";

/// One `BugInstance` from a SpotBugs XML report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugInstance {
    /// Category (e.g., `BAD_PRACTICE`, `PERFORMANCE`).
    pub category: String,
    /// Bug pattern type (e.g., `SE_BAD_FIELD`).
    pub bug_type: String,
    /// Priority (1 = high).
    pub priority: Option<u8>,
}

/// Run SpotBugs twice: XML (required) then HTML (best effort).
pub(super) fn run(
    spotbugs: &str,
    clone_dir: &Utf8Path,
    report_dir: &Utf8Path,
    safe_tag: &str,
) -> ToolResult<ToolReport> {
    let classes = clone_dir.join(CLASSES_DIR);
    let xml_path = report_dir.join(format!("{safe_tag}{REPORT_SUFFIX}.xml"));
    let html_path = report_dir.join(format!("{safe_tag}{REPORT_SUFFIX}.html"));

    run_command(
        spotbugs,
        &["-textui", "-xml", "-output", xml_path.as_str(), classes.as_str()],
    )?;
    if !xml_path.is_file() {
        return Err(ToolError::MissingReport(xml_path));
    }

    let mut files: Vec<Utf8PathBuf> = vec![xml_path.clone()];
    match run_command(
        spotbugs,
        &["-textui", "-html", "-output", html_path.as_str(), classes.as_str()],
    ) {
        Ok(()) if html_path.is_file() => files.push(html_path),
        Ok(()) => warn!(%html_path, "HTML report not produced"),
        Err(e) => warn!(error = %e, "HTML report failed"),
    }

    let bugs = read_report(&xml_path)?;
    debug!(bugs = bugs.len(), "SpotBugs report parsed");
    Ok(ToolReport {
        files,
        rows: bugs.len(),
    })
}

/// Read and parse a SpotBugs XML report from disk.
pub fn read_report(path: &Utf8Path) -> ToolResult<Vec<BugInstance>> {
    let xml = std::fs::read_to_string(path).map_err(io_err(path))?;
    parse_report(&xml)
}

/// Parse every `BugInstance` element of a SpotBugs XML report.
pub fn parse_report(xml: &str) -> ToolResult<Vec<BugInstance>> {
    let mut reader = Reader::from_str(xml);
    let mut bugs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"BugInstance" => {
                bugs.push(BugInstance {
                    category: attr(&e, "category")?.unwrap_or_else(|| "UNKNOWN".to_string()),
                    bug_type: attr(&e, "type")?.unwrap_or_default(),
                    priority: attr(&e, "priority")?.and_then(|p| p.parse().ok()),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(bugs)
}
