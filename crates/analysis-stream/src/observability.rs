//! Log setup for processes that drive analysis sessions.
//!
//! Analysis text is written to stdout by presenters, so human-readable logs
//! always go to stderr. A JSONL file can be requested instead when session
//! logs need to be collected.
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Session lifecycle at `info`; HTTP client internals only when they warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,analysis_stream=info";

const DEFAULT_JSON_LOG_NAME: &str = "analysis-stream.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where and how much to log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `EnvFilter` directives. Invalid directives fall back to
    /// [`DEFAULT_LOG_FILTER`].
    pub filter: String,
    /// Write JSON lines here instead of the stderr console.
    pub json_path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: DEFAULT_LOG_FILTER.to_string(),
            json_path: None,
        }
    }
}

impl LogSettings {
    /// Reads settings from the process environment:
    ///
    /// - `ANALYSIS_STREAM_LOG`: `off`/`false`/`0` disables logging entirely.
    /// - `ANALYSIS_STREAM_LOG_LEVEL`, then `RUST_LOG`: filter directives.
    /// - `ANALYSIS_STREAM_JSON_LOG_PATH`: JSONL destination.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(flag) = lookup("ANALYSIS_STREAM_LOG") {
            settings.enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        if let Some(filter) = lookup("ANALYSIS_STREAM_LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
        {
            settings.filter = filter;
        }
        settings.json_path = lookup("ANALYSIS_STREAM_JSON_LOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        settings
    }

    /// Sends logs to a JSONL file instead of stderr.
    pub fn json_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Splits a log path into the directory and file name `tracing-appender`
/// wants. A bare file name lands in the working directory.
fn log_file_parts(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_NAME)
        .to_string();
    (dir, file)
}

/// Installs the global subscriber. Only the first call in a process has any
/// effect; later calls, and calls after another subscriber was installed,
/// are ignored.
pub fn init_observability(settings: &LogSettings) {
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }
        let filter = settings.env_filter();
        match &settings.json_path {
            Some(path) => {
                let (dir, file) = log_file_parts(path);
                if let Err(e) = std::fs::create_dir_all(&dir) {
                    eprintln!("cannot create log directory {}: {e}", dir.display());
                }
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(tracing_appender::rolling::never(dir, file));
                let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            }
            None => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_log_this_crate_at_info_on_stderr() {
        let settings = settings_from(&[]);
        assert_eq!(settings, LogSettings::default());
        assert_eq!(settings.filter, DEFAULT_LOG_FILTER);
        assert!(settings.json_path.is_none());
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn crate_level_wins_over_rust_log() {
        let settings = settings_from(&[
            ("ANALYSIS_STREAM_LOG_LEVEL", "analysis_stream=debug"),
            ("RUST_LOG", "trace"),
        ]);
        assert_eq!(settings.filter, "analysis_stream=debug");

        let settings = settings_from(&[("RUST_LOG", "reqwest=debug")]);
        assert_eq!(settings.filter, "reqwest=debug");
    }

    #[test]
    fn log_switch_and_json_path_are_read() {
        let settings = settings_from(&[
            ("ANALYSIS_STREAM_LOG", " Off "),
            ("ANALYSIS_STREAM_JSON_LOG_PATH", "logs/session.jsonl"),
        ]);
        assert!(!settings.enabled);
        assert_eq!(settings.json_path, Some(PathBuf::from("logs/session.jsonl")));
        assert!(settings_from(&[("ANALYSIS_STREAM_LOG", "on")]).enabled);
    }

    #[test]
    fn log_file_parts_default_to_working_directory() {
        assert_eq!(
            log_file_parts(Path::new("logs/session.jsonl")),
            (PathBuf::from("logs"), "session.jsonl".to_string())
        );
        assert_eq!(
            log_file_parts(Path::new("session.jsonl")),
            (PathBuf::from("."), "session.jsonl".to_string())
        );
    }

    #[test]
    fn init_is_idempotent() {
        let settings = LogSettings {
            filter: "not a [valid filter".into(),
            ..LogSettings::default()
        };
        init_observability(&settings);
        init_observability(&LogSettings::default());
    }
}
