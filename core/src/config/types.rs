use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub repeat: RepeatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "encore_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Defaults for a repeat run, overridable per invocation from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_progress_format")]
    pub progress_format: String,

    #[serde(default = "default_retry_on_fail")]
    pub retry_on_fail: bool,
}

fn default_workers() -> usize {
    1
}

fn default_progress_format() -> String {
    crate::output::DEFAULT_PROGRESS_FORMAT.to_string()
}

fn default_retry_on_fail() -> bool {
    true
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            progress_format: default_progress_format(),
            retry_on_fail: default_retry_on_fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert!(cfg.logging.enabled);
        assert_eq!(cfg.repeat.workers, 1);
        assert!(cfg.repeat.retry_on_fail);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str("[repeat]\nworkers = 4\n").unwrap();
        assert_eq!(cfg.repeat.workers, 4);
        assert_eq!(
            cfg.repeat.progress_format,
            crate::output::DEFAULT_PROGRESS_FORMAT
        );
    }
}
