//! Tracing setup for the coordinator and its worker subprocesses.
//!
//! Both sides write to stderr; a worker inherits the coordinator's stderr
//! and keeps its stdout for protocol lines, so nothing here may ever print
//! to stdout.
//!
//! # Environment Variables
//!
//! - `PARMIN_LOG` - Log filter (overrides RUST_LOG)
//! - `PARMIN_LOG_LEVEL` - Log level: error, warn, info, debug, trace
//! - `PARMIN_LOG_FORMAT` - Output format: pretty, compact, json
//! - `PARMIN_LOG_FILE` - Also append logs to this file
//! - `PARMIN_LOG_ROTATION` - Rotation of that file: hourly, daily, never
//! - `RUST_LOG` - Standard Rust log filter (fallback)
//!
//! # Example
//!
//! ```no_run
//! use parmin::logging::{LogConfig, Role, init};
//!
//! init(LogConfig::new(Role::Coordinator).with_env_overrides());
//! ```

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Which side of the pool a process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    /// Started with `--internal-worker`; several of them share one stderr.
    Worker,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    const NAMES: [(&'static str, LogFormat); 4] = [
        ("pretty", LogFormat::Pretty),
        ("full", LogFormat::Pretty),
        ("compact", LogFormat::Compact),
        ("json", LogFormat::Json),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, format)| *format)
            .ok_or_else(|| format!("unknown log format '{}' (expected pretty, compact or json)", s))
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_rotation(s: &str) -> Option<Rotation> {
    match s.to_ascii_lowercase().as_str() {
        "hourly" => Some(Rotation::HOURLY),
        "daily" => Some(Rotation::DAILY),
        "never" => Some(Rotation::NEVER),
        _ => None,
    }
}

/// Logging configuration. Build one, then pass it to [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub role: Role,
    pub level: Level,
    /// Set once the level came from the command line; the environment
    /// then no longer overrides it.
    level_explicit: bool,
    pub format: LogFormat,
    /// Filter directives; wins over `level` when present.
    pub filter: Option<String>,
    pub file: Option<PathBuf>,
    pub rotation: Rotation,
    pub ansi: bool,
}

impl LogConfig {
    /// Warnings and above on stderr. Workers log compact lines tagged with
    /// their thread id so interleaved output stays readable.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            level: Level::WARN,
            level_explicit: false,
            format: match role {
                Role::Coordinator => LogFormat::Pretty,
                Role::Worker => LogFormat::Compact,
            },
            filter: None,
            file: None,
            rotation: Rotation::DAILY,
            ansi: std::io::stderr().is_terminal(),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self.level_explicit = true;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file = Some(path);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Apply the `PARMIN_LOG*` / `RUST_LOG` variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self.filter.is_none() && !self.level_explicit {
            self.filter = var("PARMIN_LOG").or_else(|| var("RUST_LOG"));
        }
        if self.filter.is_none()
            && !self.level_explicit
            && let Some(level) = var("PARMIN_LOG_LEVEL").as_deref().and_then(parse_level)
        {
            self.level = level;
        }
        if let Some(format) = var("PARMIN_LOG_FORMAT").and_then(|f| f.parse().ok()) {
            self.format = format;
        }
        if let Some(path) = var("PARMIN_LOG_FILE") {
            self.file = Some(PathBuf::from(path));
        }
        if let Some(rotation) = var("PARMIN_LOG_ROTATION").as_deref().and_then(parse_rotation) {
            self.rotation = rotation;
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string().to_ascii_lowercase());
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| {
                eprintln!("Warning: invalid log filter '{}', using default", directives);
                fallback()
            }),
            None => fallback(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(config: &LogConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(config.role == Role::Coordinator)
        .with_thread_ids(config.role == Role::Worker)
        .with_ansi(ansi)
        .with_writer(writer);

    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

fn file_appender(config: &LogConfig) -> Option<RollingFileAppender> {
    let path = config.file.as_ref()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("parmin.log");
    Some(RollingFileAppender::new(config.rotation.clone(), dir, name))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: LogConfig) {
    let mut layers = vec![fmt_layer(&config, std::io::stderr, config.ansi)];
    if let Some(appender) = file_appender(&config) {
        layers.push(fmt_layer(&config, appender, false));
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter())
        .try_init();
}
