//! Configuration module for ratcomplete.
//!
//! Handles loading and parsing the .ratcomplete configuration file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::completion::{CompletionConfig, TieBreak};
use crate::editor::DEFAULT_INDENT_UNIT;
use crate::logging::LogConfig;

/// Default .ratcomplete file content with all settings documented.
const DEFAULT_RC: &str = r#"# Ratcomplete Configuration File
# ==============================
# Lines starting with '#' are comments.

# Activation
# ----------
# Open completion while typing (true/false)
# activate_on_typing = true

# Select the first option when the dialog opens (true/false)
# select_on_open = true

# Dialog
# ------
# Number of options shown at once
# max_rendered_options = 100

# Milliseconds the dialog ignores accept and selection moves after opening
# interaction_delay_ms = 75

# Order of equally scored options: declaration or label
# tie_break = declaration

# Queries
# -------
# Quiet period before sources are queried, in milliseconds
# debounce_ms = 50

# Wait for slower sources before showing finished ones, in milliseconds
# accept_debounce_ms = 50

# Edits buffered for a slow query before it is abandoned
# max_update_count = 50

# Minimum query age before it may be abandoned, in milliseconds
# min_abort_ms = 1000

# Snippets
# --------
# Indentation inserted per leading tab of a snippet line
# indent_unit = 4

# Logging Configuration
# ---------------------
# Logs are stored in ~/.ratcomplete/logs/ with automatic cleanup.
#
# log_enabled = true       # Enable/disable file logging (true/false)
# log_level = info         # Log level: trace, debug, info, warn, error, off
# log_retention = 24       # Hours to keep log files (default: 24)
"#;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion behavior.
    pub completion: CompletionConfig,
    /// Indentation used for snippet tabs.
    pub indent_unit: String,
    /// Logging configuration.
    pub log_config: LogConfig,
    /// Path to config file.
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            indent_unit: DEFAULT_INDENT_UNIT.to_string(),
            log_config: LogConfig::default(),
            config_path: Self::default_config_path(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.ratcomplete).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ratcomplete")
    }

    /// Loads configuration from the default path, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load() -> io::Result<Self> {
        let path = Self::default_config_path();
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self {
            config_path: path.to_path_buf(),
            ..Self::default()
        };
        config.parse(&content);
        Ok(config)
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_RC.as_bytes())?;
        Ok(())
    }

    /// Parses the config file content.
    pub fn parse(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Remove inline comments
                let value = value.split('#').next().unwrap_or(value).trim();

                self.apply_setting(key, value);
            }
        }
    }

    /// Applies a single setting.
    fn apply_setting(&mut self, key: &str, value: &str) {
        let completion = &mut self.completion;
        match key {
            "activate_on_typing" => completion.activate_on_typing = parse_bool(value),
            "select_on_open" => completion.select_on_open = parse_bool(value),
            "max_rendered_options" => {
                if let Some(max) = parse_number(key, value) {
                    completion.max_rendered_options = usize::try_from(max).unwrap_or(usize::MAX).max(1);
                }
            }
            "max_update_count" => {
                if let Some(count) = parse_number(key, value) {
                    completion.max_update_count = usize::try_from(count).unwrap_or(usize::MAX).max(1);
                }
            }
            "debounce_ms" | "debounce" => {
                if let Some(ms) = parse_number(key, value) {
                    completion.debounce = Duration::from_millis(ms);
                }
            }
            "accept_debounce_ms" => {
                if let Some(ms) = parse_number(key, value) {
                    completion.accept_debounce = Duration::from_millis(ms);
                }
            }
            "min_abort_ms" => {
                if let Some(ms) = parse_number(key, value) {
                    completion.min_abort_time = Duration::from_millis(ms);
                }
            }
            "interaction_delay_ms" => {
                if let Some(ms) = parse_number(key, value) {
                    completion.interaction_delay = Duration::from_millis(ms);
                }
            }
            "tie_break" => match TieBreak::from_name(value) {
                Some(tie_break) => completion.tie_break = tie_break,
                None => warn!("Unknown tie_break value: {}", value),
            },
            "indent_unit" => self.indent_unit = parse_indent_unit(value),
            "log_level" => {
                self.log_config.level = LogConfig::parse_level(value);
            }
            "log_retention" | "log_retention_hours" => {
                self.log_config.retention_hours = LogConfig::parse_retention(value);
            }
            "log_enabled" | "logging" => {
                self.log_config.enabled = parse_bool(value);
            }
            _ => warn!("Unknown config key: {}", key),
        }
    }

    /// Reloads the configuration from disk.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn reload(&mut self) -> io::Result<()> {
        let path = self.config_path.clone();
        *self = Self::load_from(&path)?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "on")
}

fn parse_number(key: &str, value: &str) -> Option<u64> {
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Invalid number for {}: {}", key, value);
            None
        }
    }
}

/// A number is a count of spaces; `tab` is a tab; anything else is used
/// verbatim.
fn parse_indent_unit(value: &str) -> String {
    match value.to_lowercase().as_str() {
        "tab" | "\\t" => "\t".to_string(),
        _ => value
            .parse::<usize>()
            .map_or_else(|_| value.to_string(), |n| " ".repeat(n.max(1))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_settings() {
        let mut config = Config::default();
        config.parse(
            "activate_on_typing = off\n\
             max_rendered_options = 5 # small dialog\n\
             debounce_ms = 120\n\
             min_abort_ms = 250\n\
             tie_break = label\n",
        );
        assert!(!config.completion.activate_on_typing);
        assert_eq!(config.completion.max_rendered_options, 5);
        assert_eq!(config.completion.debounce, Duration::from_millis(120));
        assert_eq!(config.completion.min_abort_time, Duration::from_millis(250));
        assert_eq!(config.completion.tie_break.name(), "label");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let mut config = Config::default();
        config.parse("debounce_ms = soon\ntie_break = random\nmax_update_count = 0\n");
        let defaults = CompletionConfig::default();
        assert_eq!(config.completion.debounce, defaults.debounce);
        assert_eq!(config.completion.tie_break.name(), "declaration");
        assert_eq!(config.completion.max_update_count, 1);
    }

    #[test]
    fn test_indent_unit() {
        assert_eq!(parse_indent_unit("2"), "  ");
        assert_eq!(parse_indent_unit("tab"), "\t");
        assert_eq!(parse_indent_unit("--"), "--");
    }

    #[test]
    fn test_log_settings() {
        let mut config = Config::default();
        config.parse("log_level = DEBUG\nlog_retention = 48\nlog_enabled = false\n");
        assert_eq!(
            config.log_config.level,
            tracing::level_filters::LevelFilter::DEBUG
        );
        assert_eq!(config.log_config.retention_hours, 48);
        assert!(!config.log_config.enabled);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ratcomplete");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert!(config.completion.activate_on_typing);
        assert_eq!(config.indent_unit, DEFAULT_INDENT_UNIT);
    }

    #[test]
    fn test_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ratcomplete");
        let mut config = Config::load_from(&path).unwrap();
        fs::write(&path, "select_on_open = false\n").unwrap();
        config.reload().unwrap();
        assert!(!config.completion.select_on_open);
    }
}
