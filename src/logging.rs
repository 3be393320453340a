//! File logging for ratcomplete.
//!
//! Logs are written to timestamped files under ~/.ratcomplete/logs/ and
//! removed once older than the retention period.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

/// Logging section of the rc file.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Hours a log file is kept before cleanup removes it.
    pub retention_hours: u32,
    /// Maximum level written to the log file.
    pub level: LevelFilter,
    /// Whether a log file is written at all.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL,
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Parses a level name, falling back to the default level.
    #[must_use]
    pub fn parse_level(value: &str) -> LevelFilter {
        match value.trim().to_ascii_lowercase().as_str() {
            "warning" => LevelFilter::WARN,
            "none" | "disabled" => LevelFilter::OFF,
            other => other.parse().unwrap_or(DEFAULT_LOG_LEVEL),
        }
    }

    /// Parses a retention period in hours, falling back to the default.
    #[must_use]
    pub fn parse_retention(value: &str) -> u32 {
        value.trim().parse().unwrap_or(DEFAULT_LOG_RETENTION_HOURS)
    }

    /// Returns true when no log file should be written.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        !self.enabled || self.level == LevelFilter::OFF
    }
}

/// Returns the log directory path (~/.ratcomplete/logs/).
#[must_use]
pub fn log_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ratcomplete")
        .join("logs")
}

/// Returns a new log file path in `log_dir`.
#[must_use]
pub fn log_path_in(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("ratcomplete_{stamp}.log"))
}

/// Age of a file by its modification time, if the platform reports one.
fn file_age(entry: &fs::DirEntry, now: SystemTime) -> Option<Duration> {
    let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
    now.duration_since(modified).ok()
}

/// Removes `.log` files in `log_dir` older than `retention_hours`.
///
/// Returns the number of deleted files. A missing directory counts as empty.
///
/// # Errors
/// Returns error if the directory exists but cannot be read.
pub fn cleanup_old_logs(log_dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !log_dir.is_dir() {
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "log") {
            continue;
        }
        let expired = file_age(&entry, now).is_some_and(|age| age > retention);
        if expired && fs::remove_file(&path).is_ok() {
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Installs the global file subscriber described by `config`.
///
/// `RUST_LOG` overrides the configured level when set. Expired log files
/// are removed first.
///
/// # Errors
/// Returns error if the log file cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LogConfig) -> io::Result<()> {
    if config.is_silent() {
        return Ok(());
    }

    let log_dir = log_directory();
    fs::create_dir_all(&log_dir)?;
    let deleted = cleanup_old_logs(&log_dir, config.retention_hours)?;

    let log_path = log_path_in(&log_dir);
    let log_file = File::create(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.level.into()));

    let file_layer = fmt::layer()
        .with_writer(log_file.with_max_level(tracing::Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::info!(
        path = %log_path.display(),
        level = %config.level,
        retention_hours = config.retention_hours,
        removed = deleted,
        "ratcomplete logging initialized"
    );

    Ok(())
}
