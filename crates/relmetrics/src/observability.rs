//! Structured JSONL logging for the CLI.
//!
//! Log records go to a daily-rolled file, or to stderr when no location is
//! writable. Stdout carries command output (tables and `--json` documents)
//! and is never used for logs.

use anyhow::Result;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Full path of the log file, overriding everything else.
pub const ENV_LOG_PATH: &str = "RELMETRICS_LOG_PATH";
/// Directory for the log file, overriding the config file.
pub const ENV_LOG_DIR: &str = "RELMETRICS_LOG_DIR";

const SYSTEM_LOG_DIR: &str = "/var/log";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and under what name logs are written.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Log file stem.
    pub service: String,
    /// `log_dir` from the config file; the env vars still take precedence.
    pub log_dir: Option<PathBuf>,
}

impl LogSettings {
    /// Settings for this binary.
    pub fn for_binary(log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_owned(),
            log_dir,
        }
    }
}

/// Flushes the background writer on drop; hold it until `main` returns.
pub struct LogGuard {
    _writer: WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Currently always succeeds; an unwritable log location degrades to stderr.
pub fn init(settings: &LogSettings, filter: EnvFilter) -> Result<LogGuard> {
    let (writer, guard) = match open_log_writer(&settings.service, settings.log_dir.as_deref()) {
        Ok(pair) => pair,
        Err(reason) => {
            eprintln!("Warning: {reason}. Logging to stderr instead.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonLogLayer { writer })
        .init();

    tracing::debug!(service = %settings.service, "logging initialized");
    Ok(LogGuard { _writer: guard })
}

/// Filter from CLI flags, falling back to `RUST_LOG` and then `default_level`.
///
/// `--quiet` wins over `-v`, which wins over the environment.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ----------------------------------------------------------------------------
// JSONL layer
// ----------------------------------------------------------------------------

struct JsonLogLayer<W> {
    writer: W,
}

/// Fields recorded on a span, merged into every event inside it.
#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".into(), Value::String(format_timestamp()));
        record.insert(
            "level".into(),
            Value::String(meta.level().as_str().to_lowercase()),
        );
        record.insert("target".into(), Value::String(meta.target().to_string()));

        // Outer spans first so inner fields win on name clashes.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record.extend(fields.0.clone());
                }
            }
        }

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        record.extend(fields.0);

        let mut out = self.writer.make_writer();
        if serde_json::to_writer(&mut out, &Value::Object(record)).is_ok() {
            let _ = out.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form.
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn format_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = elapsed.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let of_day = secs % 86_400;

    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        of_day / 3600,
        of_day % 3600 / 60,
        of_day % 60,
        elapsed.subsec_millis()
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (Hinnant's algorithm).
const fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year as i32, month, day)
}

// ----------------------------------------------------------------------------
// Log file location
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

impl LogTarget {
    /// `<dir>/<service>.jsonl`, provided it can be created and appended to.
    fn in_dir(dir: PathBuf, service: &str) -> Result<Self, String> {
        let target = Self {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        };
        target.probe()?;
        Ok(target)
    }

    /// An explicit file path, provided it can be created and appended to.
    fn at_path(path: &Path) -> Result<Self, String> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("{ENV_LOG_PATH} must end in a UTF-8 file name"))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target = Self { dir, file_name };
        target.probe()?;
        Ok(target)
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn probe(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("cannot create log directory {}: {e}", self.dir.display()))?;
        let path = self.path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
        Ok(())
    }
}

fn open_log_writer(
    service: &str,
    config_dir: Option<&Path>,
) -> Result<(NonBlocking, WorkerGuard), String> {
    let target = resolve_log_target(
        service,
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        config_dir.map(Path::to_path_buf),
    )?;
    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Pick the log location.
///
/// Explicit settings (path env var, dir env var, config file) are used as-is
/// and fail loudly. Without any, the first writable default wins: the system
/// log dir on unix, the per-user data dir, then the working directory.
fn resolve_log_target(
    service: &str,
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<LogTarget, String> {
    if let Some(path) = path_override {
        return LogTarget::at_path(&path);
    }
    if let Some(dir) = dir_override.or(config_dir) {
        return LogTarget::in_dir(dir, service);
    }

    let mut defaults = Vec::new();
    if cfg!(unix) {
        defaults.push(PathBuf::from(SYSTEM_LOG_DIR));
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", service) {
        defaults.push(dirs.data_local_dir().join("logs"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        defaults.push(cwd);
    }

    defaults
        .into_iter()
        .find_map(|dir| LogTarget::in_dir(dir, service).ok())
        .ok_or_else(|| "no writable log directory found".to_string())
}
