//! Configuration integration tests.
//!
//! Config discovery, format parsing, and precedence, observed through
//! `info --json` on the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("RELMETRICS_LOG_DIR", tmp.path().join("logs"));
    cmd
}

/// Run `info --json` from `dir` and return the parsed document.
fn info_json(tmp: &TempDir, dir: &Path) -> serde_json::Value {
    let output = cmd(tmp)
        .args(["-C", dir.to_str().unwrap(), "--json", "info"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    serde_json::from_str(&stdout).expect("valid JSON")
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["releases"], 20);
    assert_eq!(json["config"]["log_level"], "info");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("nested/deep");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        tmp.path().join("relmetrics.toml"),
        "[target]\nreleases = 5\n",
    )
    .unwrap();

    let json = info_json(&tmp, &nested);
    assert_eq!(json["study"]["releases"], 5);
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".relmetrics.toml"), "[target]\nreleases = 3\n").unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target]\nreleases = 9\n").unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["releases"], 3);
}

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub = tmp.path().join("sub");
    fs::create_dir_all(&sub).unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target]\nreleases = 9\n").unwrap();
    fs::write(sub.join("relmetrics.toml"), "[target]\nreleases = 4\n").unwrap();

    let json = info_json(&tmp, &sub);
    assert_eq!(json["study"]["releases"], 4);
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    let src = project.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(project.join(".git")).unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target]\nreleases = 9\n").unwrap();

    let json = info_json(&tmp, &src);
    assert_eq!(json["study"]["releases"], 20);
}

#[test]
fn explicit_config_flag_wins() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target]\nreleases = 9\n").unwrap();
    let explicit = tmp.path().join("other.yaml");
    fs::write(&explicit, "target:\n  releases: 2\n").unwrap();

    let output = cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "-c"])
        .arg(&explicit)
        .arg("info")
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["study"]["releases"], 2);
}

#[test]
fn info_reports_every_loaded_config_file() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("relmetrics.toml");
    fs::write(&project, "[target]\nreleases = 9\n").unwrap();
    let explicit = tmp.path().join("other.yaml");
    fs::write(&explicit, "target:\n  releases: 2\n").unwrap();

    let output = cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "-c"])
        .arg(&explicit)
        .arg("info")
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let files: Vec<&str> = json["config"]["config_files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert_eq!(
        files[files.len() - 2..],
        [project.to_str().unwrap(), explicit.to_str().unwrap()]
    );
}

// =============================================================================
// Formats
// =============================================================================

#[test]
fn parses_toml_sections() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("relmetrics.toml"),
        r#"
log_level = "debug"

[target]
repository = "https://github.com/apache/commons-io.git"
clone_dir = "io_repo"
until_successful = true

[tools]
maven = "./mvnw"
ck_jar = "tools/ck.jar"

[reports]
dir = "out"
"#,
    )
    .unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["config"]["log_level"], "debug");
    assert_eq!(json["study"]["repository"], "https://github.com/apache/commons-io.git");
    assert_eq!(json["study"]["clone_dir"], "io_repo");
    assert_eq!(json["study"]["until_successful"], true);
    assert_eq!(json["study"]["maven"], "./mvnw");
    assert_eq!(json["study"]["ck_jar"], "tools/ck.jar");
    assert_eq!(json["study"]["reports_dir"], "out");
    assert_eq!(json["study"]["charts_dir"], "out/charts");
}

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("relmetrics.yaml"),
        "reports:\n  dir: yaml-reports\n  charts_dir: pics\n",
    )
    .unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["reports_dir"], "yaml-reports");
    assert_eq!(json["study"]["charts_dir"], "pics");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("relmetrics.json"),
        r#"{"tools": {"spotbugs": "/opt/spotbugs/bin/spotbugs"}}"#,
    )
    .unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["spotbugs"], "/opt/spotbugs/bin/spotbugs");
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target]\nreleases = 6\n").unwrap();
    fs::write(tmp.path().join("relmetrics.yaml"), "target:\n  releases: 8\n").unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["releases"], 6);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("relmetrics.toml"), "[target\nreleases = ").unwrap();

    cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn wrong_type_is_an_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("relmetrics.toml"),
        "[target]\nreleases = \"many\"\n",
    )
    .unwrap();

    cmd(&tmp)
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("relmetrics.toml"),
        "plotting_backend = \"matplotlib\"\n[target]\nreleases = 7\n",
    )
    .unwrap();

    let json = info_json(&tmp, tmp.path());
    assert_eq!(json["study"]["releases"], 7);
}
