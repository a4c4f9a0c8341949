//! Layered configuration.
//!
//! Settings come from up to three kinds of files, merged over
//! [`Config::default`] with figment. A later layer wins on every key it sets:
//!
//! 1. the user file, `config.<ext>` in the platform config directory
//!    (`~/.config/relmetrics/` on Linux)
//! 2. the nearest project file, `.relmetrics.<ext>` or `relmetrics.<ext>`,
//!    found by walking up from the working directory
//! 3. files named explicitly with `--config`
//!
//! `<ext>` is `toml`, `yaml`, `yml` or `json`, tried in that order inside each
//! directory, and a dotfile beats the plain name. The upward walk ends at the
//! first directory holding a `.git` entry, after that directory was searched.
//!
//! Unset values are resolved where they are read (see [`Config::clone_dir`]
//! and friends), so a config file only needs the keys it changes.
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use relmetrics_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cwd = Utf8PathBuf::try_from(std::env::current_dir()?)?;
//! let config = ConfigLoader::new().with_project_search(&cwd).load()?;
//! println!("studying {}", config.repository());
//! # Ok(())
//! # }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Clone URL analyzed when no `target.repository` is configured.
pub const DEFAULT_REPOSITORY: &str = "https://github.com/apache/commons-lang.git";

/// GitHub REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Directory the target repository is cloned into.
pub const DEFAULT_CLONE_DIR: &str = "apache_commons_repo";

/// Number of releases analyzed per run.
pub const DEFAULT_RELEASES: usize = 20;

/// Environment variable holding an optional GitHub token.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Root directory for tool reports.
pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// The configuration for relmetrics.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
/// All section fields are optional. Defaults are resolved where the values
/// are used, and config values act as overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// The repository under study.
    pub target: Option<TargetConfig>,
    /// Paths to the external tools.
    pub tools: Option<ToolsConfig>,
    /// Where reports and charts are written.
    pub reports: Option<ReportsConfig>,
}

/// The repository whose releases are analyzed.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Clone URL (HTTPS or SSH). Owner and repo for the API are derived from it.
    pub repository: Option<String>,
    /// GitHub API root (default: `https://api.github.com`).
    pub api_url: Option<String>,
    /// Local directory for the working copy.
    pub clone_dir: Option<Utf8PathBuf>,
    /// How many releases to analyze (default: 20).
    pub releases: Option<usize>,
    /// Keep walking older tags until `releases` of them analyze successfully.
    pub until_successful: Option<bool>,
    /// Name of the env var holding a GitHub token (default: `GITHUB_TOKEN`).
    pub token_env: Option<String>,
}

/// External tool locations.
///
/// Bare names are looked up on `PATH`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolsConfig {
    /// The Maven launcher (e.g., `mvn` or `C:/apache-maven/bin/mvn.cmd`).
    pub maven: Option<String>,
    /// The `java` binary used to run CK.
    pub java: Option<String>,
    /// The SpotBugs launcher script.
    pub spotbugs: Option<String>,
    /// Path to the CK jar-with-dependencies.
    pub ck_jar: Option<Utf8PathBuf>,
}

/// Report and chart output locations.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReportsConfig {
    /// Root directory; each tool writes to a sub-directory.
    pub dir: Option<Utf8PathBuf>,
    /// Directory for rendered charts (default: `<dir>/charts`).
    pub charts_dir: Option<Utf8PathBuf>,
}

impl Config {
    /// Resolved reports root.
    pub fn reports_dir(&self) -> Utf8PathBuf {
        self.reports
            .as_ref()
            .and_then(|r| r.dir.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_REPORTS_DIR))
    }

    /// Resolved charts directory.
    pub fn charts_dir(&self) -> Utf8PathBuf {
        self.reports
            .as_ref()
            .and_then(|r| r.charts_dir.clone())
            .unwrap_or_else(|| self.reports_dir().join("charts"))
    }

    /// Resolved clone URL of the target repository.
    pub fn repository(&self) -> &str {
        self.target
            .as_ref()
            .and_then(|t| t.repository.as_deref())
            .unwrap_or(DEFAULT_REPOSITORY)
    }

    /// Resolved working copy directory.
    pub fn clone_dir(&self) -> Utf8PathBuf {
        self.target
            .as_ref()
            .and_then(|t| t.clone_dir.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CLONE_DIR))
    }

    /// Resolved GitHub API root.
    pub fn api_url(&self) -> &str {
        self.target
            .as_ref()
            .and_then(|t| t.api_url.as_deref())
            .unwrap_or(DEFAULT_API_URL)
    }

    /// Read the GitHub token from the configured env var, if set and non-empty.
    pub fn github_token(&self) -> Option<String> {
        let var = self
            .target
            .as_ref()
            .and_then(|t| t.token_env.as_deref())
            .unwrap_or(DEFAULT_TOKEN_ENV);
        std::env::var(var).ok().filter(|t| !t.trim().is_empty())
    }

    /// Resolved command for a tool, falling back to its bare name.
    ///
    /// `git` is always taken from `PATH`.
    pub fn tool_command(&self, tool: ExternalTool) -> String {
        let tools = self.tools.as_ref();
        let configured = match tool {
            ExternalTool::Git => None,
            ExternalTool::Maven => tools.and_then(|t| t.maven.clone()),
            ExternalTool::Java => tools.and_then(|t| t.java.clone()),
            ExternalTool::SpotBugs => tools.and_then(|t| t.spotbugs.clone()),
        };
        configured.unwrap_or_else(|| tool.default_command().to_string())
    }

    /// Configured CK jar, if any.
    pub fn ck_jar(&self) -> Option<&Utf8Path> {
        self.tools.as_ref().and_then(|t| t.ck_jar.as_deref())
    }
}

/// External executables relmetrics shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalTool {
    /// Version control.
    Git,
    /// Build tool.
    Maven,
    /// JVM launcher (for CK).
    Java,
    /// Bug-pattern detector.
    SpotBugs,
}

impl ExternalTool {
    /// Every external tool, in doctor display order.
    pub const ALL: &[Self] = &[Self::Git, Self::Maven, Self::Java, Self::SpotBugs];

    /// Command used when nothing is configured.
    pub const fn default_command(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Maven => "mvn",
            Self::Java => "java",
            Self::SpotBugs => "spotbugs",
        }
    }
}

impl std::fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Maven => write!(f, "maven"),
            Self::Java => write!(f, "java"),
            Self::SpotBugs => write!(f, "spotbugs"),
        }
    }
}

/// Verbosity written to the log file when no `-v`/`-q` flag is given.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-command tracing.
    Debug,
    /// Progress of a study run.
    #[default]
    Info,
    /// Skipped releases and recoverable problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// File name stem for project configs and the platform directory name.
const APP_NAME: &str = "relmetrics";

/// Extensions tried in every directory, best first.
const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Entry whose presence marks the top of a project.
const REPO_MARKER: &str = ".git";

/// Collects config files and merges them into a [`Config`].
#[derive(Debug)]
pub struct ConfigLoader {
    search_from: Option<Utf8PathBuf>,
    user_config: bool,
    stop_at: Option<String>,
    files: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader that reads the user file and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            search_from: None,
            user_config: true,
            stop_at: Some(REPO_MARKER.to_owned()),
            files: Vec::new(),
        }
    }

    /// Look for a project file in `dir` and its ancestors.
    pub fn with_project_search(mut self, dir: impl AsRef<Utf8Path>) -> Self {
        self.search_from = Some(dir.as_ref().to_owned());
        self
    }

    /// Toggle the user file layer.
    pub const fn with_user_config(mut self, enabled: bool) -> Self {
        self.user_config = enabled;
        self
    }

    /// End the upward walk at the first directory containing `marker`.
    pub fn with_boundary_marker(mut self, marker: impl Into<String>) -> Self {
        self.stop_at = Some(marker.into());
        self
    }

    /// Walk up to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.stop_at = None;
        self
    }

    /// Layer `path` on top of everything discovered. Repeatable; the last one wins.
    pub fn with_file(mut self, path: impl AsRef<Utf8Path>) -> Self {
        self.files.push(path.as_ref().to_owned());
        self
    }

    /// Files that [`load`](Self::load) would read, lowest precedence first.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = self.user_config.then(user_config_file).flatten();
        let project = self
            .search_from
            .as_deref()
            .and_then(|dir| search_upwards(dir, self.stop_at.as_deref()));

        user.into_iter()
            .chain(project)
            .chain(self.files.iter().cloned())
            .collect()
    }

    /// Merge every source over the defaults.
    ///
    /// # Errors
    ///
    /// Fails when an explicit file is missing or any file does not
    /// deserialize into [`Config`].
    #[tracing::instrument(skip(self), fields(search_from = ?self.search_from))]
    pub fn load(self) -> ConfigResult<Config> {
        if let Some(missing) = self.files.iter().find(|f| !f.is_file()) {
            return Err(ConfigError::MissingFile(missing.clone()));
        }

        let sources = self.sources();
        let figment = sources.iter().fold(
            Figment::from(Serialized::defaults(Config::default())),
            |figment, path| layer(figment, path),
        );
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;

        tracing::info!(
            sources = sources.len(),
            log_level = config.log_level.as_str(),
            repository = config.repository(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Add one file to `figment`, picking the parser from its extension.
fn layer(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// The preferred project file directly inside `dir`.
fn project_file_in(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    EXTENSIONS.iter().find_map(|ext| {
        [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

fn search_upwards(start: &Utf8Path, stop_at: Option<&str>) -> Option<Utf8PathBuf> {
    for dir in start.ancestors() {
        if let Some(found) = project_file_in(dir) {
            return Some(found);
        }
        if stop_at.is_some_and(|marker| dir.join(marker).exists()) {
            break;
        }
    }
    None
}

/// The project file a default loader searching from `start` would read.
pub fn find_project_config(start: impl AsRef<Utf8Path>) -> Option<Utf8PathBuf> {
    search_upwards(start.as_ref(), Some(REPO_MARKER))
}

fn user_config_file() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn platform_dir(pick: fn(&directories::ProjectDirs) -> &std::path::Path) -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(pick(&dirs).to_path_buf()).ok()
}

/// Where the user config file lives (`~/.config/relmetrics` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    platform_dir(directories::ProjectDirs::config_dir)
}

/// Per-user cache directory.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    platform_dir(directories::ProjectDirs::cache_dir)
}

/// Machine-local data directory; the default home of log files.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    platform_dir(directories::ProjectDirs::data_local_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap()
    }

    fn put(path: &Utf8Path, body: &str) -> Utf8PathBuf {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        path.to_owned()
    }

    /// A loader isolated from the developer's own user config.
    fn isolated() -> ConfigLoader {
        ConfigLoader::new().with_user_config(false)
    }

    #[test]
    fn empty_config_resolves_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.repository(), DEFAULT_REPOSITORY);
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.clone_dir(), DEFAULT_CLONE_DIR);
        assert_eq!(config.reports_dir(), "reports");
        assert_eq!(config.charts_dir(), "reports/charts");
        assert_eq!(config.tool_command(ExternalTool::Maven), "mvn");
        assert_eq!(config.tool_command(ExternalTool::Git), "git");
        assert!(config.ck_jar().is_none());
    }

    #[test]
    fn no_sources_gives_defaults() {
        let loader = isolated().without_boundary_marker();
        assert!(loader.sources().is_empty());
        assert_eq!(loader.load().unwrap(), Config::default());
    }

    #[test]
    fn explicit_files_stack_in_order() {
        let tmp = TempDir::new().unwrap();
        let dir = root(&tmp);
        let first = put(&dir.join("a.toml"), "log_level = \"warn\"\nlog_dir = \"/var/log/rm\"\n");
        let second = put(&dir.join("b.json"), r#"{"log_level": "error"}"#);

        let config = isolated().with_file(&first).with_file(&second).load().unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.log_dir.as_deref().map(Utf8Path::as_str), Some("/var/log/rm"));
    }

    #[test]
    fn missing_explicit_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let ghost = root(&tmp).join("ghost.toml");
        let err = isolated().with_file(&ghost).load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(ref p) if *p == ghost));
    }

    #[test]
    fn project_file_found_from_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = root(&tmp);
        let file = put(&dir.join("study/.relmetrics.yml"), "target:\n  releases: 4\n");
        let deep = dir.join("study/a/b");
        fs::create_dir_all(&deep).unwrap();

        let loader = isolated().without_boundary_marker().with_project_search(&deep);
        assert_eq!(loader.sources(), vec![file]);
        let target = loader.load().unwrap().target.unwrap();
        assert_eq!(target.releases, Some(4));
    }

    #[test]
    fn walk_stops_after_marker_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = root(&tmp);
        put(&dir.join("relmetrics.toml"), "log_level = \"warn\"\n");
        fs::create_dir_all(dir.join("repo/.git")).unwrap();
        let work = dir.join("repo/module");
        fs::create_dir_all(&work).unwrap();

        let loader = isolated().with_project_search(&work);
        assert!(loader.sources().is_empty());

        let inside = put(&dir.join("repo/relmetrics.toml"), "log_level = \"debug\"\n");
        let loader = isolated().with_project_search(&work);
        assert_eq!(loader.sources(), vec![inside]);
        assert_eq!(loader.load().unwrap().log_level, LogLevel::Debug);
    }

    #[test]
    fn custom_marker_is_honored() {
        let tmp = TempDir::new().unwrap();
        let dir = root(&tmp);
        put(&dir.join("relmetrics.toml"), "log_level = \"warn\"\n");
        put(&dir.join("ws/pom.xml"), "<project/>");

        let loader = isolated()
            .with_boundary_marker("pom.xml")
            .with_project_search(dir.join("ws"));
        assert!(loader.sources().is_empty());
        assert_eq!(find_project_config(dir.join("ws")), Some(dir.join("relmetrics.toml")));
    }

    #[test]
    fn dotfile_and_extension_order() {
        let tmp = TempDir::new().unwrap();
        let dir = root(&tmp);
        put(&dir.join("relmetrics.json"), "{}");
        put(&dir.join("relmetrics.yaml"), "{}");
        assert_eq!(project_file_in(&dir), Some(dir.join("relmetrics.yaml")));

        put(&dir.join(".relmetrics.yaml"), "{}");
        assert_eq!(project_file_in(&dir), Some(dir.join(".relmetrics.yaml")));

        put(&dir.join("relmetrics.toml"), "");
        assert_eq!(project_file_in(&dir), Some(dir.join("relmetrics.toml")));
    }

    #[test]
    fn study_sections_deserialize() {
        let tmp = TempDir::new().unwrap();
        let file = put(
            &root(&tmp).join("study.yaml"),
            r#"
target:
  repository: git@github.com:apache/commons-io.git
  clone_dir: work/commons-io
  until_successful: true
tools:
  maven: /opt/maven/bin/mvn
  ck_jar: ck/target/ck.jar
reports:
  dir: out
"#,
        );

        let config = isolated().with_file(&file).load().unwrap();
        assert_eq!(config.repository(), "git@github.com:apache/commons-io.git");
        assert_eq!(config.clone_dir(), "work/commons-io");
        assert_eq!(config.target.as_ref().unwrap().until_successful, Some(true));
        assert_eq!(config.tool_command(ExternalTool::Maven), "/opt/maven/bin/mvn");
        assert_eq!(config.tool_command(ExternalTool::SpotBugs), "spotbugs");
        assert_eq!(config.ck_jar().map(Utf8Path::as_str), Some("ck/target/ck.jar"));
        assert_eq!(config.charts_dir(), "out/charts");
    }

    #[test]
    fn mistyped_value_fails_to_deserialize() {
        let tmp = TempDir::new().unwrap();
        let file = put(&root(&tmp).join("bad.toml"), "[target]\nreleases = \"many\"\n");
        let err = isolated().with_file(&file).load().unwrap_err();
        assert!(matches!(err, ConfigError::Deserialize(_)));
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn platform_dirs_are_named_after_the_app() {
        for dir in [user_config_dir(), user_cache_dir(), user_data_local_dir()]
            .into_iter()
            .flatten()
        {
            assert!(dir.as_str().contains(APP_NAME), "{dir}");
        }
    }
}
